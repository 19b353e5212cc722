//! Multi-level 2D Haar wavelet decomposition.
//!
//! Odd-length axes are extended by edge replication before each pairing
//! step. Only the Haar basis is implemented; the frequency detector treats
//! any other configured wavelet name as Haar with a warning.

use ndarray::{s, Array2};

const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// One decomposition level: horizontal, vertical and diagonal detail bands.
#[derive(Debug, Clone)]
pub struct DetailBands {
    pub horizontal: Array2<f32>,
    pub vertical: Array2<f32>,
    pub diagonal: Array2<f32>,
}

/// Full decomposition: the final approximation plus detail bands per level,
/// finest level first.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub approx: Array2<f32>,
    pub details: Vec<DetailBands>,
}

/// Pair an axis with the Haar filters, replicating the last sample when the
/// length is odd. Returns (approximation, detail), each of length ceil(n/2).
fn haar_pairs(samples: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let half = samples.len().div_ceil(2);
    let mut approx = Vec::with_capacity(half);
    let mut detail = Vec::with_capacity(half);
    for i in 0..half {
        let a = samples[2 * i];
        let b = if 2 * i + 1 < samples.len() { samples[2 * i + 1] } else { a };
        approx.push((a + b) * INV_SQRT2);
        detail.push((a - b) * INV_SQRT2);
    }
    (approx, detail)
}

/// One analysis step: rows first, then columns, yielding the four subbands.
fn haar_step(input: &Array2<f32>) -> (Array2<f32>, DetailBands) {
    let (height, width) = input.dim();
    let half_w = width.div_ceil(2);
    let half_h = height.div_ceil(2);

    // Row pass: [L | H] halves.
    let mut rows = Array2::<f32>::zeros((height, half_w * 2));
    for y in 0..height {
        let row: Vec<f32> = input.row(y).to_vec();
        let (low, high) = haar_pairs(&row);
        for (x, v) in low.iter().enumerate() {
            rows[[y, x]] = *v;
        }
        for (x, v) in high.iter().enumerate() {
            rows[[y, half_w + x]] = *v;
        }
    }

    // Column pass over both halves.
    let mut full = Array2::<f32>::zeros((half_h * 2, half_w * 2));
    for x in 0..half_w * 2 {
        let column: Vec<f32> = rows.column(x).to_vec();
        let (low, high) = haar_pairs(&column);
        for (y, v) in low.iter().enumerate() {
            full[[y, x]] = *v;
        }
        for (y, v) in high.iter().enumerate() {
            full[[half_h + y, x]] = *v;
        }
    }

    let approx = full.slice(s![..half_h, ..half_w]).to_owned();
    let horizontal = full.slice(s![..half_h, half_w..]).to_owned();
    let vertical = full.slice(s![half_h.., ..half_w]).to_owned();
    let diagonal = full.slice(s![half_h.., half_w..]).to_owned();
    (approx, DetailBands { horizontal, vertical, diagonal })
}

/// Decompose `input` over `levels` Haar levels (at least one). Decomposition
/// stops early when the approximation can no longer be halved.
pub fn haar_decompose(input: &Array2<f32>, levels: u32) -> Decomposition {
    let mut approx = input.clone();
    let mut details = Vec::new();
    for _ in 0..levels.max(1) {
        if approx.nrows() < 2 || approx.ncols() < 2 {
            break;
        }
        let (next, bands) = haar_step(&approx);
        details.push(bands);
        approx = next;
    }
    Decomposition { approx, details }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_abs(a: &Array2<f32>) -> f32 {
        if a.is_empty() {
            return 0.0;
        }
        a.iter().map(|v| v.abs()).sum::<f32>() / a.len() as f32
    }

    #[test]
    fn constant_image_has_zero_detail() {
        let input = Array2::from_elem((16, 16), 0.5f32);
        let dec = haar_decompose(&input, 1);
        assert_eq!(dec.details.len(), 1);
        assert!(mean_abs(&dec.details[0].horizontal) < 1e-6);
        assert!(mean_abs(&dec.details[0].vertical) < 1e-6);
        assert!(mean_abs(&dec.details[0].diagonal) < 1e-6);
        // Haar approximation of a constant c is 2c per level.
        assert!((dec.approx[[0, 0]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn vertical_stripes_land_in_horizontal_detail() {
        let input = Array2::from_shape_fn((8, 8), |(_, x)| if x % 2 == 0 { 1.0f32 } else { 0.0 });
        let dec = haar_decompose(&input, 1);
        assert!(mean_abs(&dec.details[0].horizontal) > 0.4);
        assert!(mean_abs(&dec.details[0].vertical) < 1e-6);
    }

    #[test]
    fn multi_level_shrinks_approximation() {
        let input = Array2::from_elem((16, 16), 1.0f32);
        let dec = haar_decompose(&input, 2);
        assert_eq!(dec.details.len(), 2);
        assert_eq!(dec.approx.dim(), (4, 4));
    }

    #[test]
    fn odd_dimensions_are_edge_replicated() {
        let input = Array2::from_elem((9, 7), 0.25f32);
        let dec = haar_decompose(&input, 1);
        assert_eq!(dec.approx.dim(), (5, 4));
    }

    #[test]
    fn tiny_image_stops_early() {
        let input = Array2::from_elem((1, 8), 0.5f32);
        let dec = haar_decompose(&input, 3);
        assert!(dec.details.is_empty());
        assert_eq!(dec.approx.dim(), (1, 8));
    }
}
