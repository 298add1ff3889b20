// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark compositor — a rotated, blurred, randomised text overlay blended
// onto each fitted page, with QR codes left legible.

pub mod blur;
pub mod distort;
pub mod qr;
pub mod text;

use ab_glyph::FontRef;
use image::imageops;
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use pagemark_core::FeatureFlags;
use pagemark_core::error::{PagemarkError, Result};
use rand::Rng;
use tracing::{debug, instrument};

use self::text::TextLayout;

/// Rotation applied to the text layer, in degrees (counter-clockwise).
pub const ROTATION_DEGREES: f32 = 25.0;

/// Feature toggles read once per watermark call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatermarkOptions {
    pub use_colors: bool,
    pub use_distortion: bool,
}

impl WatermarkOptions {
    pub fn from_flags(flags: &dyn FeatureFlags) -> Self {
        Self {
            use_colors: flags.should_use_colors(),
            use_distortion: flags.should_use_distortion(),
        }
    }
}

/// Draws the watermark onto fitted page images.
pub struct Watermarker {
    max_page_width: u32,
    qr_margin: u32,
    font: FontRef<'static>,
}

impl Watermarker {
    pub fn new(max_page_width: u32, qr_margin: u32) -> Result<Self> {
        if max_page_width == 0 {
            return Err(PagemarkError::Watermark("max page width is zero".into()));
        }
        Ok(Self {
            max_page_width,
            qr_margin,
            font: text::load_font()?,
        })
    }

    /// Watermark `image` with `text`. The output has the input's dimensions.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), colors = options.use_colors, distortion = options.use_distortion))]
    pub fn apply<R: Rng + ?Sized>(
        &self,
        image: RgbImage,
        text: &str,
        options: WatermarkOptions,
        rng: &mut R,
    ) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PagemarkError::Watermark("cannot watermark an empty image".into()));
        }

        let overlay = self.overlay(&image, text, options, rng)?;

        let mut page = DynamicImage::ImageRgb8(image).into_rgba8();
        imageops::overlay(&mut page, &overlay, 0, 0);
        Ok(DynamicImage::ImageRgba8(page).into_rgb8())
    }

    /// Build the transparent overlay for `image`, already cropped to its
    /// size and with QR regions cleared.
    fn overlay<R: Rng + ?Sized>(
        &self,
        image: &RgbImage,
        text: &str,
        options: WatermarkOptions,
        rng: &mut R,
    ) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        let diagonal = diagonal(width, height);
        let line = text::repeat_to_line(text)?;

        let layout = TextLayout {
            diagonal,
            font_size: text::font_size(width, self.max_page_width),
            spacing: line_spacing(diagonal, rng),
            opacity: rng.random_range(0.52..0.6),
            use_colors: options.use_colors,
        };
        let sharp = text::draw_text_layer(&self.font, &line, layout, rng);

        let glow_opacity: f32 = rng.random_range(0.75..0.95);
        let glow_radius: u32 = rng.random_range(45..=65);
        let glow = blur::blur_layer(&blur::scale_alpha(&sharp, glow_opacity), glow_radius);

        let sharp = if options.use_distortion {
            distort::distort(&sharp, rng)
        } else {
            sharp
        };

        let mut composite = rotate_about_center(
            &sharp,
            (-ROTATION_DEGREES).to_radians(),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );
        imageops::overlay(&mut composite, &glow, 0, 0);

        let left = (diagonal - width) / 2;
        let top = (diagonal - height) / 2;
        let mut cropped = imageops::crop_imm(&composite, left, top, width, height).to_image();

        for detection in qr::detect_qr_codes(image) {
            if let Some(rect) = detection.clear_rect(self.qr_margin, (width, height)) {
                debug!(?rect, "Clearing watermark over QR code");
                qr::clear_region(&mut cropped, rect);
            }
        }

        debug!(
            diagonal,
            spacing = layout.spacing,
            opacity = layout.opacity,
            glow_opacity,
            glow_radius,
            "Watermark overlay built"
        );
        Ok(cropped)
    }
}

/// Distance between text lines: the diagonal divided by a factor drawn
/// uniformly from [8, 10).
fn line_spacing<R: Rng + ?Sized>(diagonal: u32, rng: &mut R) -> f32 {
    diagonal as f32 / rng.random_range(8.0f32..10.0)
}

/// Side of the square canvas that holds any rotation of a `w`×`h` image.
pub fn diagonal(width: u32, height: u32) -> u32 {
    let (w, h) = (f64::from(width), f64::from(height));
    (w * w + h * h).sqrt().ceil() as u32
}
