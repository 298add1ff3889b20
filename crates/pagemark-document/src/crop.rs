// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop stage — a policy point between normalisation and page fitting.

use image::DynamicImage;

/// Decides what part of an image reaches the page, if any.
///
/// Returning `None` removes the image from the output entirely.
pub trait CropPolicy: Send + Sync {
    fn crop(&self, image: DynamicImage) -> Option<DynamicImage>;
}

/// Keeps every image as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCrop;

impl CropPolicy for IdentityCrop {
    fn crop(&self, image: DynamicImage) -> Option<DynamicImage> {
        Some(image)
    }
}

impl<F> CropPolicy for F
where
    F: Fn(DynamicImage) -> Option<DynamicImage> + Send + Sync,
{
    fn crop(&self, image: DynamicImage) -> Option<DynamicImage> {
        self(image)
    }
}
