// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagemark rendering pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one render call, carried in tracing spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderId(pub Uuid);

impl RenderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RenderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raster formats we recognise from a declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Tiff,
    Bmp,
    Gif,
    WebP,
}

/// Declared media type of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Pdf,
    /// A raster image; the hint is only a hint, decoding sniffs the content.
    Image(Option<RasterFormat>),
}

impl MediaType {
    /// Parse a declared MIME string such as `image/jpeg; charset=binary`.
    ///
    /// Anything that is not `application/pdf` is treated as a raster
    /// candidate, with a format hint when the subtype is one we know.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" | "application/x-pdf" => Self::Pdf,
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Image(Some(RasterFormat::Jpeg)),
            "image/png" => Self::Image(Some(RasterFormat::Png)),
            "image/tiff" => Self::Image(Some(RasterFormat::Tiff)),
            "image/bmp" | "image/x-ms-bmp" => Self::Image(Some(RasterFormat::Bmp)),
            "image/gif" => Self::Image(Some(RasterFormat::Gif)),
            "image/webp" => Self::Image(Some(RasterFormat::WebP)),
            _ => Self::Image(None),
        }
    }

    /// Canonical MIME string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Image(Some(RasterFormat::Jpeg)) => "image/jpeg",
            Self::Image(Some(RasterFormat::Png)) => "image/png",
            Self::Image(Some(RasterFormat::Tiff)) => "image/tiff",
            Self::Image(Some(RasterFormat::Bmp)) => "image/bmp",
            Self::Image(Some(RasterFormat::Gif)) => "image/gif",
            Self::Image(Some(RasterFormat::WebP)) => "image/webp",
            Self::Image(None) => "application/octet-stream",
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// One tenant-submitted file: raw bytes plus what the uploader said it is.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub content: Vec<u8>,
    pub media_type: MediaType,
}

impl InputDocument {
    pub fn new(content: impl Into<Vec<u8>>, media_type: MediaType) -> Self {
        Self {
            content: content.into(),
            media_type,
        }
    }

    /// Build from a declared MIME string.
    pub fn from_mime(content: impl Into<Vec<u8>>, mime: &str) -> Self {
        Self::new(content, MediaType::from_mime(mime))
    }

    pub fn pdf(content: impl Into<Vec<u8>>) -> Self {
        Self::new(content, MediaType::Pdf)
    }

    pub fn image(content: impl Into<Vec<u8>>) -> Self {
        Self::new(content, MediaType::Image(None))
    }
}

/// Integer rendering box: pixels (or PDF points) with an optional DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDimension {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub dpi: Option<u32>,
}

impl PageDimension {
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            dpi: None,
        }
    }

    pub const fn with_dpi(width: u32, height: u32, dpi: u32) -> Self {
        Self {
            width,
            height,
            dpi: Some(dpi),
        }
    }

    /// A4 in PDF points.
    pub const fn a4_points() -> Self {
        Self::new(595, 842)
    }

    /// A4 rasterised at 150 DPI.
    pub const fn a4_150_dpi() -> Self {
        Self::with_dpi(1240, 1754, 150)
    }

    /// Height over width.
    pub fn ratio(&self) -> f32 {
        self.height as f32 / self.width as f32
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
