// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF rasterizer seam — turns PDF bytes into one RGB raster per page.

use image::RgbImage;
use pagemark_core::error::Result;

/// Unrotated page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel size of this box rendered at `scale` pixels per point.
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        (
            ((self.width * scale).round() as u32).max(1),
            ((self.height * scale).round() as u32).max(1),
        )
    }
}

/// Renders PDF pages to RGB rasters.
///
/// `scale_for` maps each page's box to a render scale in pixels per point.
/// The outer `Result` fails only when the document cannot be opened; each
/// page carries its own result so a single bad page never costs the others.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(
        &self,
        pdf: &[u8],
        scale_for: &dyn Fn(PageBox) -> f32,
    ) -> Result<Vec<Result<RgbImage>>>;
}

impl<T: PageRasterizer + ?Sized> PageRasterizer for &T {
    fn rasterize(
        &self,
        pdf: &[u8],
        scale_for: &dyn Fn(PageBox) -> f32,
    ) -> Result<Vec<Result<RgbImage>>> {
        (**self).rasterize(pdf, scale_for)
    }
}
