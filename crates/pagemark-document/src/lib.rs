// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagemark-document — Turns uploaded images and PDFs into one watermarked,
// page-normalised PDF.
//
// Stages, in pipeline order: source normalisation (PDF rasterisation, EXIF
// orientation), crop policy, page fitting, watermark compositing (text
// layer, glow, distortion, QR protection), page assembly and signing.

pub mod crop;
pub mod fit;
pub mod normalize;
pub mod pdf;
pub mod renderer;
pub mod watermark;

// Re-export the primary structs so callers can use `pagemark_document::DocumentRenderer` etc.
pub use crop::{CropPolicy, IdentityCrop};
pub use fit::{FitGeometry, PageFitter};
pub use normalize::{
    DefaultRasterizer, EmbeddedImageRasterizer, PageBox, PageRasterizer, SourceNormalizer,
    default_rasterizer,
};
pub use pdf::{FingerprintSigner, PageAssembler, Signer, UnsignedSigner, verify_fingerprint};
pub use renderer::DocumentRenderer;
pub use watermark::{WatermarkOptions, Watermarker};

#[cfg(feature = "pdfium")]
pub use normalize::PdfiumRasterizer;
