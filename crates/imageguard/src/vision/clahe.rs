//! Contrast-Limited Adaptive Histogram Equalization.
//!
//! Tile-based CLAHE with clipped histograms and bilinear interpolation
//! between neighboring tile lookup tables, used to expose low-contrast text
//! before thresholding.

use image::{GrayImage, Luma};

/// Apply CLAHE with the given clip limit and square tile grid.
///
/// `clip_limit` is relative (OpenCV convention): the per-bin cap is
/// `clip_limit * tile_pixels / 256`, with excess mass redistributed evenly.
/// `grid` tiles per axis; callers use 8 for the hidden-text detector.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return gray.clone();
    }
    let grid = grid.min(width).min(height).max(1);

    let tile_w = width.div_ceil(grid);
    let tile_h = height.div_ceil(grid);

    // One 256-entry LUT per tile.
    let mut luts = vec![[0u8; 256]; (grid * grid) as usize];
    for ty in 0..grid {
        for tx in 0..grid {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            // Trailing tiles can be empty when the grid overshoots the image.
            let tile_pixels = x1.saturating_sub(x0) * y1.saturating_sub(y0);
            luts[(ty * grid + tx) as usize] = tile_lut(&hist, tile_pixels, clip_limit);
        }
    }

    // Interpolate between the four nearest tile LUTs, anchored at tile centers.
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = gray.get_pixel(x, y)[0] as usize;

            let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (grid - 1) as f32);
            let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (grid - 1) as f32);
            let tx0 = fx.floor() as u32;
            let ty0 = fy.floor() as u32;
            let tx1 = (tx0 + 1).min(grid - 1);
            let ty1 = (ty0 + 1).min(grid - 1);
            let wx = fx - fx.floor();
            let wy = fy - fy.floor();

            let top = lerp(
                f32::from(luts[(ty0 * grid + tx0) as usize][value]),
                f32::from(luts[(ty0 * grid + tx1) as usize][value]),
                wx,
            );
            let bottom = lerp(
                f32::from(luts[(ty1 * grid + tx0) as usize][value]),
                f32::from(luts[(ty1 * grid + tx1) as usize][value]),
                wx,
            );
            let blended = lerp(top, bottom, wy).round().clamp(0.0, 255.0) as u8;
            out.put_pixel(x, y, Luma([blended]));
        }
    }
    out
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clip a tile histogram, redistribute the excess and turn the CDF into a
/// 0..=255 lookup table.
fn tile_lut(hist: &[u32; 256], tile_pixels: u32, clip_limit: f32) -> [u8; 256] {
    if tile_pixels == 0 {
        return std::array::from_fn(|i| i as u8);
    }

    let cap = ((clip_limit * tile_pixels as f32 / 256.0).max(1.0)) as u32;
    let mut clipped = [0u32; 256];
    let mut excess = 0u32;
    for (bin, &count) in hist.iter().enumerate() {
        if count > cap {
            clipped[bin] = cap;
            excess += count - cap;
        } else {
            clipped[bin] = count;
        }
    }
    let bonus = excess / 256;
    let mut remainder = excess % 256;
    for bin in clipped.iter_mut() {
        *bin += bonus;
        if remainder > 0 {
            *bin += 1;
            remainder -= 1;
        }
    }

    let scale = 255.0 / tile_pixels as f32;
    let mut cdf = 0u32;
    std::array::from_fn(|i| {
        cdf += clipped[i];
        (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_stays_uniformly_mapped() {
        let gray = GrayImage::from_pixel(64, 64, Luma([128]));
        let out = clahe(&gray, 2.0, 8);
        assert_eq!(out.dimensions(), (64, 64));
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn low_contrast_text_gains_contrast() {
        // Near-flat background with a slightly darker band.
        let mut gray = GrayImage::from_pixel(64, 64, Luma([200]));
        for y in 28..36 {
            for x in 8..56 {
                gray.put_pixel(x, y, Luma([190]));
            }
        }
        let out = clahe(&gray, 2.0, 8);
        let spread_before = 200u16 - 190;
        let mut min = 255u8;
        let mut max = 0u8;
        for p in out.pixels() {
            min = min.min(p[0]);
            max = max.max(p[0]);
        }
        assert!(u16::from(max - min) >= spread_before, "CLAHE should not reduce local contrast");
    }

    #[test]
    fn output_dimensions_match_input() {
        let gray = GrayImage::new(33, 17);
        let out = clahe(&gray, 2.0, 8);
        assert_eq!(out.dimensions(), (33, 17));
    }
}
