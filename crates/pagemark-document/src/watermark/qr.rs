// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR code detection: find verification codes on a page so the watermark
// can leave them readable.

use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use tracing::{debug, instrument};

/// Neighbourhood radius of the local-mean binarizer used on the second pass.
const BINARIZE_RADIUS: u32 = 20;
/// Offset below the local mean a pixel must reach to count as dark.
const BINARIZE_OFFSET: i32 = 8;

/// A decoded QR code and its corner points in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetection {
    pub points: Vec<(f32, f32)>,
    pub content: String,
}

/// Axis-aligned pixel rectangle, `x..x + width`, `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl QrDetection {
    /// Bounding box of the locator points grown by `margin` on every side
    /// and clipped to a `bounds` sized image. Needs at least three points.
    pub fn clear_rect(&self, margin: u32, bounds: (u32, u32)) -> Option<ClearRect> {
        if self.points.len() < 3 {
            return None;
        }
        let margin = margin as f32;
        let min_x = self.points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min) - margin;
        let min_y = self.points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min) - margin;
        let max_x = self.points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max) + margin;
        let max_y = self.points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max) + margin;

        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(bounds.0);
        let y1 = (max_y.ceil().max(0.0) as u32).min(bounds.1);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(ClearRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Detect and decode every QR code in `image`.
///
/// The first pass runs on plain luminance. When it finds nothing, a second
/// pass runs on a locally binarized copy, which recovers codes printed on
/// uneven or tinted backgrounds.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn detect_qr_codes(image: &RgbImage) -> Vec<QrDetection> {
    let luma = image::imageops::grayscale(image);

    let found = decode_all(&luma);
    if !found.is_empty() {
        debug!(count = found.len(), "QR codes found on luminance");
        return found;
    }

    let binarized = binarize(&luma, BINARIZE_RADIUS, BINARIZE_OFFSET);
    let found = decode_all(&binarized);
    debug!(count = found.len(), "QR codes found after binarization");
    found
}

/// Make every pixel inside `rect` fully transparent.
pub fn clear_region(layer: &mut RgbaImage, rect: ClearRect) {
    let x_end = (rect.x + rect.width).min(layer.width());
    let y_end = (rect.y + rect.height).min(layer.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            layer.put_pixel(x, y, Rgba([0, 0, 0, 0]));
        }
    }
}

fn decode_all(gray: &GrayImage) -> Vec<QrDetection> {
    let (width, height) = gray.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0]
        });

    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| {
            let points = grid
                .bounds
                .iter()
                .map(|p| (p.x as f32, p.y as f32))
                .collect();
            match grid.decode() {
                Ok((_meta, content)) => Some(QrDetection { points, content }),
                Err(err) => {
                    debug!(%err, "QR grid found but not decodable");
                    None
                }
            }
        })
        .collect()
}

/// Local-mean thresholding over a summed-area table.
fn binarize(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = integral_image(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let mean = region_mean(&integral, width, height, x, y, radius);
        let threshold = (mean as i32 - offset).clamp(0, 255);
        let value = i32::from(gray.get_pixel(x, y).0[0]);
        Luma([if value < threshold { 0 } else { 255 }])
    })
}

/// `table[y * (w + 1) + x]` is the sum of all pixels above and left of
/// `(x, y)`, exclusive, with a zero border.
fn integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += u64::from(gray.get_pixel(x, y).0[0]);
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }
    table
}

fn region_mean(integral: &[u64], width: u32, height: u32, cx: u32, cy: u32, radius: u32) -> f64 {
    let stride = (width + 1) as usize;
    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(width as usize);
    let y2 = ((cy + radius + 1) as usize).min(height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }
    let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;
    sum / area
}
