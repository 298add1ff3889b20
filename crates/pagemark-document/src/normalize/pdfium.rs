// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pdfium rasterizer — full-fidelity page rendering (text, vectors, images)
// through the pdfium library. Enabled with the `pdfium` feature.

use image::RgbImage;
use pagemark_core::error::{PagemarkError, Result};
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument};

use super::rasterizer::{PageBox, PageRasterizer};

/// Renders pages with pdfium, bound once at construction.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to a pdfium library next to the executable, falling back to the
    /// system library.
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| PagemarkError::PdfLoad(format!("pdfium library unavailable: {err:?}")))?;
        info!("Pdfium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Wrap an already-bound pdfium instance.
    pub fn from_pdfium(pdfium: Pdfium) -> Self {
        Self { pdfium }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    #[instrument(skip_all, fields(bytes_len = pdf.len()))]
    fn rasterize(
        &self,
        pdf: &[u8],
        scale_for: &dyn Fn(PageBox) -> f32,
    ) -> Result<Vec<Result<RgbImage>>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|err| PagemarkError::PdfLoad(format!("pdfium could not open PDF: {err:?}")))?;

        let pages = document.pages();
        debug!(pages = pages.len(), "PDF loaded by pdfium");

        Ok(pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let page_box = PageBox::new(page.width().value, page.height().value);
                let (width, height) = page_box.pixel_size(scale_for(page_box));
                let config = PdfRenderConfig::new()
                    .set_target_width(width as i32)
                    .set_target_height(height as i32);

                page.render_with_config(&config)
                    .map(|bitmap| bitmap.as_image().to_rgb8())
                    .map_err(|err| PagemarkError::PdfRender {
                        page: index + 1,
                        detail: format!("{err:?}"),
                    })
            })
            .collect())
    }
}
