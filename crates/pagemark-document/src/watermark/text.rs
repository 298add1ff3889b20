// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark text layer — ten long lines of repeated text on a transparent
// square canvas.

use ab_glyph::{FontRef, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use pagemark_core::error::{PagemarkError, Result};
use rand::Rng;

static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Palette used when colours are enabled: grays, navy and red.
pub const PALETTE: [Rgba<u8>; 5] = [
    Rgba([64, 64, 64, 255]),
    Rgba([32, 32, 32, 220]),
    Rgba([0, 0, 0, 110]),
    Rgba([0, 0, 91, 170]),
    Rgba([255, 0, 0, 170]),
];

/// Flat colour used when the palette is disabled.
pub const DARK_GRAY: Rgba<u8> = Rgba([64, 64, 64, 255]);

pub const LINE_COUNT: u32 = 10;

/// Each line repeats the text until it is longer than this many characters.
pub const MIN_LINE_CHARS: usize = 128;

/// Font size, in pixels, on an image exactly `max_page_width` wide.
pub const BASE_FONT_SIZE: f32 = 28.0;

/// Load the bundled watermark font.
pub fn load_font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(FONT_BYTES)
        .map_err(|err| PagemarkError::Watermark(format!("bundled font unreadable: {err}")))
}

/// Repeat `text` so a single line exceeds [`MIN_LINE_CHARS`].
pub fn repeat_to_line(text: &str) -> Result<String> {
    let chars = text.chars().count();
    if chars == 0 {
        return Err(PagemarkError::Watermark("watermark text is empty".into()));
    }
    Ok(text.repeat(1 + MIN_LINE_CHARS / chars))
}

/// Font size proportional to the image width.
pub fn font_size(image_width: u32, max_page_width: u32) -> f32 {
    (BASE_FONT_SIZE * image_width as f32 / max_page_width.max(1) as f32).max(1.0)
}

/// Parameters for one text layer.
#[derive(Debug, Clone, Copy)]
pub struct TextLayout {
    /// Side of the square canvas.
    pub diagonal: u32,
    pub font_size: f32,
    /// Distance between consecutive baselines.
    pub spacing: f32,
    /// Layer translucency applied to every glyph.
    pub opacity: f32,
    pub use_colors: bool,
}

/// Draw the text layer. Line `i` (1-based) has its baseline at `i * spacing`.
pub fn draw_text_layer<R: Rng + ?Sized>(
    font: &FontRef<'_>,
    line: &str,
    layout: TextLayout,
    rng: &mut R,
) -> RgbaImage {
    let mut layer = RgbaImage::new(layout.diagonal, layout.diagonal);
    let scale = PxScale::from(layout.font_size);

    for i in 1..=LINE_COUNT {
        let base = if layout.use_colors {
            PALETTE[rng.random_range(0..PALETTE.len())]
        } else {
            DARK_GRAY
        };
        let Rgba([r, g, b, a]) = base;
        let color = Rgba([r, g, b, (a as f32 * layout.opacity).round() as u8]);

        let baseline = i as f32 * layout.spacing;
        let top = (baseline - layout.font_size).round() as i32;
        draw_text_mut(&mut layer, color, 0, top, scale, font, line);
    }
    layer
}
