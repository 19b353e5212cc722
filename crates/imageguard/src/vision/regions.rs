//! Region extraction: mean-adaptive thresholding and external contour
//! bounding boxes, used by the screenshot and text-overlay heuristics.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};

/// A bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width-to-height ratio; height is clamped to at least 1.
    pub fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

/// Inverted mean-adaptive threshold: a pixel becomes white when it is darker
/// than its local `block x block` mean minus `c`.
pub fn adaptive_threshold_mean_inv(gray: &GrayImage, block: u32, c: f64) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let radius = (block / 2) as i64;

    // Summed-area table with a leading zero row/column.
    let w = width as usize;
    let h = height as usize;
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += u64::from(gray.get_pixel(x as u32, y as u32)[0]);
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let x0 = (x - radius).max(0) as usize;
            let y0 = (y - radius).max(0) as usize;
            let x1 = ((x + radius).min(w as i64 - 1) + 1) as usize;
            let y1 = ((y + radius).min(h as i64 - 1) + 1) as usize;
            let count = ((x1 - x0) * (y1 - y0)) as f64;
            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let mean = sum as f64 / count;
            let value = f64::from(gray.get_pixel(x as u32, y as u32)[0]);
            let pixel = if value <= mean - c { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([pixel]));
        }
    }
    out
}

/// Bounding boxes of the external (outer, parentless) contours of a binary
/// image, where nonzero pixels are foreground.
pub fn external_bounding_boxes(binary: &GrayImage) -> Vec<BoundingBox> {
    find_contours::<u32>(binary)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let mut min_x = u32::MAX;
            let mut min_y = u32::MAX;
            let mut max_x = 0u32;
            let mut max_y = 0u32;
            for point in &contour.points {
                min_x = min_x.min(point.x);
                min_y = min_y.min(point.y);
                max_x = max_x.max(point.x);
                max_y = max_y.max(point.y);
            }
            if min_x > max_x || min_y > max_y {
                return None;
            }
            Some(BoundingBox {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            })
        })
        .collect()
}
