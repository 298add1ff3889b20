// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Distortion filter — makes the sharp text layer harder to strip
// automatically. Glyphs are bent along two low-frequency waves so no two
// repetitions of the text share the exact same shape, then a sparse speckle
// thins the ink inside the glyphs. Transparent areas are never touched.

use std::f32::consts::TAU;

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, warp_with};
use rand::Rng;
use tracing::{debug, instrument};

/// Randomised parameters for one distortion pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distortion {
    pub amplitude_x: f32,
    pub wavelength_y: f32,
    pub phase_x: f32,
    pub amplitude_y: f32,
    pub wavelength_x: f32,
    pub phase_y: f32,
    /// Share of inked pixels whose alpha is thinned.
    pub speckle: f64,
}

impl Distortion {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            amplitude_x: rng.random_range(1.0..3.0),
            wavelength_y: rng.random_range(40.0..120.0),
            phase_x: rng.random_range(0.0..TAU),
            amplitude_y: rng.random_range(1.0..3.0),
            wavelength_x: rng.random_range(60.0..180.0),
            phase_y: rng.random_range(0.0..TAU),
            speckle: rng.random_range(0.04..0.08),
        }
    }

    /// Source position sampled for output pixel `(x, y)`.
    pub fn displace(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x + self.amplitude_x * (TAU * y / self.wavelength_y + self.phase_x).sin(),
            y + self.amplitude_y * (TAU * x / self.wavelength_x + self.phase_y).sin(),
        )
    }
}

/// Apply a random distortion to `layer`.
#[instrument(skip_all, fields(width = layer.width(), height = layer.height()))]
pub fn distort<R: Rng + ?Sized>(layer: &RgbaImage, rng: &mut R) -> RgbaImage {
    let params = Distortion::random(rng);
    debug!(?params, "Distorting text layer");

    let mut out = warp_with(
        layer,
        move |x, y| params.displace(x, y),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    );

    for pixel in out.pixels_mut() {
        if pixel.0[3] > 0 && rng.random_bool(params.speckle) {
            pixel.0[3] /= 3;
        }
    }
    out
}
