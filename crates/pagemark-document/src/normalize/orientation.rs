// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EXIF orientation — read tag 0x0112 and undo the camera's rotation/mirroring.

use std::io::Cursor;

use image::DynamicImage;
use tracing::{debug, instrument};

/// Read the EXIF orientation (1-8) from encoded image bytes.
///
/// Returns `Ok(None)` when the container has EXIF data without an
/// orientation tag, and `Err` when the metadata cannot be parsed at all.
pub fn read_orientation(bytes: &[u8]) -> Result<Option<u32>, exif::Error> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor)?;

    Ok(exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0)))
}

/// Apply the flip/rotate combination an EXIF orientation value calls for.
///
/// | value | transform                         |
/// |-------|-----------------------------------|
/// | 2     | flip horizontal                   |
/// | 3     | rotate 180                        |
/// | 4     | flip vertical                     |
/// | 5     | flip vertical, then rotate 90 CW  |
/// | 6     | rotate 90 CW                      |
/// | 7     | flip vertical, then rotate 90 CCW |
/// | 8     | rotate 90 CCW                     |
///
/// Any other value (0, 1, out of range) leaves the image untouched.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    debug!(orientation, "Applying EXIF orientation");
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.flipv().rotate90(),
        6 => image.rotate90(),
        7 => image.flipv().rotate270(),
        8 => image.rotate270(),
        _ => image,
    }
}
