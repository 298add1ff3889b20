// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page fitter — centre an image on a white canvas that has exactly the
// target page's aspect ratio, downscaling only when the canvas would be
// wider than the configured maximum page width.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use pagemark_core::PageDimension;
use pagemark_core::error::{PagemarkError, Result};
use tracing::{debug, instrument};

/// Canvas geometry for fitting a `source` box onto a page ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitGeometry {
    /// Unscaled canvas width (same units as the source).
    pub target_width: f32,
    /// Unscaled canvas height.
    pub target_height: f32,
    /// Uniform factor applied to canvas and source alike (never above 1).
    pub scale: f32,
}

impl FitGeometry {
    /// Compute the canvas for a `source_width` x `source_height` box.
    ///
    /// The source's own height/width ratio is compared with the page's: a
    /// source flatter than the page keeps its width and gains height, a
    /// taller source keeps its height and gains width.
    pub fn compute(
        source_width: f32,
        source_height: f32,
        page: &PageDimension,
        max_page_width: u32,
    ) -> Self {
        let ratio_image = source_height / source_width;
        let ratio_page = page.ratio();

        let (target_width, target_height) = if ratio_image < ratio_page {
            (source_width, source_width * ratio_page)
        } else {
            (source_height / ratio_page, source_height)
        };

        let max_width = max_page_width as f32;
        let scale = if target_width < max_width {
            1.0
        } else {
            max_width / target_width
        };

        Self {
            target_width,
            target_height,
            scale,
        }
    }

    /// Final canvas size in whole pixels. Height is derived from the width so
    /// the ratio stays as close to the page ratio as integers allow.
    pub fn canvas_size(&self, page: &PageDimension, max_page_width: u32) -> (u32, u32) {
        let width = ((self.scale * self.target_width).round() as u32).clamp(1, max_page_width.max(1));
        let height = ((width as f32 * page.ratio()).round() as u32).max(1);
        (width, height)
    }
}

/// Fits images onto a fixed page box.
#[derive(Debug, Clone, Copy)]
pub struct PageFitter {
    page: PageDimension,
    max_page_width: u32,
}

impl PageFitter {
    pub fn new(page: PageDimension, max_page_width: u32) -> Self {
        Self {
            page,
            max_page_width,
        }
    }

    /// Scale and centre `image` onto a white RGB canvas with the page ratio.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn fit(&self, image: DynamicImage) -> Result<RgbImage> {
        let (src_w, src_h) = (image.width(), image.height());
        if src_w == 0 || src_h == 0 {
            return Err(PagemarkError::PageFit(format!(
                "cannot fit an empty {src_w}x{src_h} image"
            )));
        }
        if !self.page.is_valid() {
            return Err(PagemarkError::PageFit(format!(
                "page box {}x{} is empty",
                self.page.width, self.page.height
            )));
        }

        let geometry =
            FitGeometry::compute(src_w as f32, src_h as f32, &self.page, self.max_page_width);
        let (canvas_w, canvas_h) = geometry.canvas_size(&self.page, self.max_page_width);

        let source = image.to_rgb8();
        let source = if geometry.scale < 1.0 {
            let scaled_w = ((src_w as f32 * geometry.scale).round() as u32).clamp(1, canvas_w);
            let scaled_h = ((src_h as f32 * geometry.scale).round() as u32).clamp(1, canvas_h);
            imageops::resize(&source, scaled_w, scaled_h, FilterType::Lanczos3)
        } else {
            source
        };

        let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([255, 255, 255]));
        let offset_x = (i64::from(canvas_w) - i64::from(source.width())) / 2;
        let offset_y = (i64::from(canvas_h) - i64::from(source.height())) / 2;
        imageops::replace(&mut canvas, &source, offset_x, offset_y);

        debug!(
            canvas_w,
            canvas_h,
            scale = geometry.scale,
            offset_x,
            offset_y,
            "Image fitted to page"
        );
        Ok(canvas)
    }
}
