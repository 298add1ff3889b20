// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Soft-glow blur — separable Gaussian over a transparent RGBA layer.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::filter::{horizontal_filter, vertical_filter};
use tracing::{debug, instrument};

/// The glow is blurred at 1/GLOW_DOWNSAMPLE resolution. With sigma of 15 px
/// and up, the lost detail is far below what the blur removes anyway.
pub const GLOW_DOWNSAMPLE: u32 = 4;

/// Normalised 1D Gaussian kernel of `2 * radius + 1` taps, sigma = radius / 3.
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let r = radius as i64;
    let sigma = radius as f32 / 3.0;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let total: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= total);
    kernel
}

/// Horizontal pass then vertical pass with the same kernel.
pub fn separable_gaussian(layer: &RgbaImage, radius: u32) -> RgbaImage {
    let kernel = gaussian_kernel(radius);
    let horizontal = horizontal_filter(layer, &kernel);
    vertical_filter(&horizontal, &kernel)
}

/// Blur a straight-alpha layer without darkening its edges.
///
/// The result approximates a Gaussian of `radius` rather than computing it
/// exactly: the layer is filtered at 1/[`GLOW_DOWNSAMPLE`] resolution and
/// scaled back up, which widens the blur slightly. Colour is premultiplied
/// before filtering so transparent pixels do not bleed black into the glow.
#[instrument(skip(layer), fields(width = layer.width(), height = layer.height()))]
pub fn blur_layer(layer: &RgbaImage, radius: u32) -> RgbaImage {
    let (width, height) = layer.dimensions();
    let premultiplied = map_pixels(layer, premultiply);

    let small_w = width.div_ceil(GLOW_DOWNSAMPLE).max(1);
    let small_h = height.div_ceil(GLOW_DOWNSAMPLE).max(1);
    let small = imageops::resize(&premultiplied, small_w, small_h, FilterType::Triangle);
    let small_radius = (radius as f32 / GLOW_DOWNSAMPLE as f32).round().max(1.0) as u32;

    let blurred = separable_gaussian(&small, small_radius);
    let restored = imageops::resize(&blurred, width, height, FilterType::Triangle);

    debug!(radius, small_radius, "Glow layer blurred");
    map_pixels(&restored, unpremultiply)
}

/// Multiply every alpha value by `opacity`.
pub fn scale_alpha(layer: &RgbaImage, opacity: f32) -> RgbaImage {
    map_pixels(layer, |Rgba([r, g, b, a])| {
        Rgba([r, g, b, (a as f32 * opacity).round().clamp(0.0, 255.0) as u8])
    })
}

fn map_pixels(layer: &RgbaImage, f: impl Fn(Rgba<u8>) -> Rgba<u8>) -> RgbaImage {
    let mut out = layer.clone();
    out.pixels_mut().for_each(|p| *p = f(*p));
    out
}

fn premultiply(Rgba([r, g, b, a]): Rgba<u8>) -> Rgba<u8> {
    let m = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
    Rgba([m(r), m(g), m(b), a])
}

fn unpremultiply(Rgba([r, g, b, a]): Rgba<u8>) -> Rgba<u8> {
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let u = |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
    Rgba([u(r), u(g), u(b), a])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        for radius in [1, 3, 45, 64] {
            let kernel = gaussian_kernel(radius);
            assert_eq!(kernel.len(), (2 * radius + 1) as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "radius {radius} sums to {sum}");
            for i in 0..kernel.len() / 2 {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
            }
            // Peak in the middle.
            let mid = kernel[radius as usize];
            assert!(kernel.iter().all(|&k| k <= mid));
        }
    }

    #[test]
    fn zero_radius_is_identity_kernel() {
        assert_eq!(gaussian_kernel(0), vec![1.0]);
    }

    #[test]
    fn blur_spreads_a_dot_and_keeps_size() {
        let mut layer = RgbaImage::new(64, 48);
        for y in 20..28 {
            for x in 28..36 {
                layer.put_pixel(x, y, Rgba([200, 0, 0, 255]));
            }
        }
        let out = blur_layer(&layer, 12);
        assert_eq!(out.dimensions(), (64, 48));
        // Alpha leaks outside the original square and the core softens.
        assert!(out.get_pixel(22, 24).0[3] > 0);
        assert!(out.get_pixel(32, 24).0[3] < 255);
    }

    #[test]
    fn downsampled_blur_stays_close_to_the_exact_filter() {
        let mut layer = RgbaImage::new(160, 120);
        for y in 48..72 {
            for x in 68..92 {
                layer.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let approx = blur_layer(&layer, 48);
        let exact = separable_gaussian(&layer, 48);

        for x in (0..160).step_by(4) {
            let (a, e) = (approx.get_pixel(x, 60).0[3], exact.get_pixel(x, 60).0[3]);
            assert!(a.abs_diff(e) <= 16, "x {x}: approx {a}, exact {e}");
        }
    }

    #[test]
    fn blurred_colour_is_not_darkened_by_transparency() {
        let mut layer = RgbaImage::new(40, 40);
        for y in 16..24 {
            for x in 16..24 {
                layer.put_pixel(x, y, Rgba([200, 0, 0, 255]));
            }
        }
        let out = blur_layer(&layer, 8);
        let p = out.get_pixel(20, 20).0;
        assert!(p[3] > 0);
        assert!(p[0] > 150, "glow colour darkened to {p:?}");
    }

    #[test]
    fn scale_alpha_only_touches_alpha() {
        let layer = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 200]));
        let out = scale_alpha(&layer, 0.5);
        assert_eq!(out.get_pixel(1, 1).0, [10, 20, 30, 100]);
    }

    #[test]
    fn premultiply_round_trips_opaque_pixels() {
        let p = Rgba([12, 34, 56, 255]);
        assert_eq!(unpremultiply(premultiply(p)), p);
    }
}
