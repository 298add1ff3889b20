// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PagemarkError, Result};
use crate::types::PageDimension;

/// Watermark used when no localised message is configured.
pub const DEFAULT_WATERMARK: &str =
    "  DOCUMENTS EXCLUSIVEMENT DESTIN\u{c9}S \u{c0} LA LOCATION IMMOBILI\u{c8}RE     ";

/// Watermark used when the caller supplies a blank text.
pub const FALLBACK_WATERMARK: &str = " https://filigrane.beta.gouv.fr/   ";

/// Relative difference allowed between the media box and max page ratios.
const RATIO_TOLERANCE: f32 = 0.02;

/// Read-only rendering settings, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParameters {
    /// Output page in PDF points (A4 by default).
    pub media_box: PageDimension,
    /// Largest raster page, in pixels, and the DPI it corresponds to. Its
    /// width caps page images; its proportions must match `media_box`.
    pub max_page: PageDimension,
    /// JPEG quality for embedded page images (1-100).
    pub compression_quality: u8,
    /// Watermark text when the message provider has no entry.
    pub default_watermark: String,
    /// Watermark text when the caller passes a blank string.
    pub fallback_watermark: String,
    /// Padding, in pixels, kept clear of watermark around each QR code.
    pub qr_margin: u32,
    /// Locale used for watermark message lookup.
    pub locale: String,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            media_box: PageDimension::a4_points(),
            max_page: PageDimension::a4_150_dpi(),
            compression_quality: 75,
            default_watermark: DEFAULT_WATERMARK.to_string(),
            fallback_watermark: FALLBACK_WATERMARK.to_string(),
            qr_margin: 20,
            locale: "fr".to_string(),
        }
    }
}

impl RenderParameters {
    /// Parse parameters from JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !self.media_box.is_valid() {
            return Err(PagemarkError::Config(format!(
                "media box must be non-empty, got {}x{}",
                self.media_box.width, self.media_box.height
            )));
        }
        if !self.max_page.is_valid() {
            return Err(PagemarkError::Config(format!(
                "max page must be non-empty, got {}x{}",
                self.max_page.width, self.max_page.height
            )));
        }
        let (page_ratio, raster_ratio) = (self.media_box.ratio(), self.max_page.ratio());
        if (raster_ratio - page_ratio).abs() > page_ratio * RATIO_TOLERANCE {
            return Err(PagemarkError::Config(format!(
                "max page {}x{} does not have the proportions of the {}x{} media box",
                self.max_page.width, self.max_page.height, self.media_box.width, self.media_box.height
            )));
        }
        if !(1..=100).contains(&self.compression_quality) {
            return Err(PagemarkError::Config(format!(
                "compression quality must be within 1..=100, got {}",
                self.compression_quality
            )));
        }
        Ok(())
    }

    /// DPI images are tagged with when written to the output document.
    pub fn output_dpi(&self) -> u32 {
        self.max_page.dpi.unwrap_or(150)
    }
}
