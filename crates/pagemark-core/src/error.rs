// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagemark.

use thiserror::Error;

/// Top-level error type for every rendering operation.
///
/// Each variant names the pipeline stage that failed, so a caller can tell a
/// bad upload (`Decode`) from an infrastructure failure (`Signing`) without
/// parsing messages.
#[derive(Debug, Error)]
pub enum PagemarkError {
    // -- Source normalisation --
    #[error("image decoding failed: {0}")]
    Decode(String),

    #[error("PDF loading failed: {0}")]
    PdfLoad(String),

    #[error("PDF page {page} could not be rendered: {detail}")]
    PdfRender { page: usize, detail: String },

    // -- Page transforms --
    #[error("page fitting failed: {0}")]
    PageFit(String),

    #[error("watermarking failed: {0}")]
    Watermark(String),

    // -- Output --
    #[error("page write failed: {0}")]
    PageWrite(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // -- Configuration / plumbing --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Fit,
    Watermark,
    Assemble,
    Sign,
    Setup,
}

impl PagemarkError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Decode(_) | Self::PdfLoad(_) | Self::PdfRender { .. } => Stage::Normalize,
            Self::PageFit(_) => Stage::Fit,
            Self::Watermark(_) => Stage::Watermark,
            Self::PageWrite(_) => Stage::Assemble,
            Self::Signing(_) => Stage::Sign,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => Stage::Setup,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagemarkError>;
