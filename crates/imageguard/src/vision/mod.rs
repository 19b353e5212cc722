//! Shared raster helpers for the vision-based detectors: grayscale
//! conversions, binarization and array views.

pub mod clahe;
pub mod regions;

use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;

/// Grayscale view of an RGB buffer.
pub fn grayscale(rgb: &RgbImage) -> GrayImage {
    image::imageops::grayscale(rgb)
}

/// Grayscale pixels as `f32` in [0, 1], row-major.
pub fn gray_to_unit_f32(gray: &GrayImage) -> Array2<f32> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        f32::from(gray.get_pixel(x as u32, y as u32)[0]) / 255.0
    })
}

/// Grayscale pixels as raw `u8`, row-major.
pub fn gray_to_u8(gray: &GrayImage) -> Array2<u8> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        gray.get_pixel(x as u32, y as u32)[0]
    })
}

/// Fixed-threshold binarization: pixels strictly above `threshold` become
/// white (255), the rest black.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        *pixel = if pixel[0] > threshold { Luma([255]) } else { Luma([0]) };
    }
    out
}

/// Split an RGB buffer into its three channels as grayscale images.
pub fn split_channels(rgb: &RgbImage) -> [GrayImage; 3] {
    let (width, height) = rgb.dimensions();
    let mut channels = [
        GrayImage::new(width, height),
        GrayImage::new(width, height),
        GrayImage::new(width, height),
    ];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for (i, channel) in channels.iter_mut().enumerate() {
            channel.put_pixel(x, y, Luma([pixel[i]]));
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn binarize_uses_strict_threshold() {
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(0, 0, Luma([100]));
        gray.put_pixel(1, 0, Luma([101]));
        let binary = binarize(&gray, 100);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn split_channels_isolates_components() {
        let mut rgb = RgbImage::new(1, 1);
        rgb.put_pixel(0, 0, Rgb([10, 20, 30]));
        let [r, g, b] = split_channels(&rgb);
        assert_eq!(r.get_pixel(0, 0)[0], 10);
        assert_eq!(g.get_pixel(0, 0)[0], 20);
        assert_eq!(b.get_pixel(0, 0)[0], 30);
    }

    #[test]
    fn unit_f32_view_is_normalized() {
        let gray = GrayImage::from_pixel(2, 2, Luma([255]));
        let arr = gray_to_unit_f32(&gray);
        assert_eq!(arr.shape(), &[2, 2]);
        assert!((arr[[0, 0]] - 1.0).abs() < f32::EPSILON);
    }
}
