//! JPEG-style 8x8 block DCT-II energies.
//!
//! The image is tiled into non-overlapping 8x8 blocks (trailing rows/columns
//! beyond a multiple of 8 are trimmed). Per block, the low-frequency energy
//! is the mean |coefficient| of the top-left 2x2 and the high-frequency
//! energy the mean |coefficient| of rows >= 2, columns >= 2.

use ndarray::Array2;
use once_cell::sync::Lazy;
use rayon::prelude::*;

const N: usize = 8;

/// Orthonormal DCT-II basis matrix `C`, so a block transforms as `C B C^T`.
static BASIS: Lazy<[[f32; N]; N]> = Lazy::new(|| {
    let mut c = [[0.0f32; N]; N];
    for (u, row) in c.iter_mut().enumerate() {
        let alpha = if u == 0 {
            (1.0 / N as f32).sqrt()
        } else {
            (2.0 / N as f32).sqrt()
        };
        for (x, value) in row.iter_mut().enumerate() {
            *value = alpha * (std::f32::consts::PI * (2.0 * x as f32 + 1.0) * u as f32 / (2.0 * N as f32)).cos();
        }
    }
    c
});

fn dct_block(block: &[[f32; N]; N]) -> [[f32; N]; N] {
    let c = &*BASIS;
    // tmp = C * block
    let mut tmp = [[0.0f32; N]; N];
    for u in 0..N {
        for x in 0..N {
            let mut sum = 0.0;
            for k in 0..N {
                sum += c[u][k] * block[k][x];
            }
            tmp[u][x] = sum;
        }
    }
    // out = tmp * C^T
    let mut out = [[0.0f32; N]; N];
    for u in 0..N {
        for v in 0..N {
            let mut sum = 0.0;
            for k in 0..N {
                sum += tmp[u][k] * c[v][k];
            }
            out[u][v] = sum;
        }
    }
    out
}

/// Mean low- and high-frequency |DCT| energies over all complete 8x8 blocks.
///
/// Returns `None` when the image holds no complete block.
pub fn block_energies(gray: &Array2<f32>) -> Option<(f64, f64)> {
    let (height, width) = gray.dim();
    let block_rows = height / N;
    let block_cols = width / N;
    let block_count = block_rows * block_cols;
    if block_count == 0 {
        return None;
    }

    let energies: Vec<(f64, f64)> = (0..block_count)
        .into_par_iter()
        .map(|index| {
            let by = index / block_cols;
            let bx = index % block_cols;
            let mut block = [[0.0f32; N]; N];
            for (y, row) in block.iter_mut().enumerate() {
                for (x, value) in row.iter_mut().enumerate() {
                    *value = gray[[by * N + y, bx * N + x]];
                }
            }
            let coeffs = dct_block(&block);

            let mut lf = 0.0f64;
            for row in coeffs.iter().take(2) {
                for &c in row.iter().take(2) {
                    lf += f64::from(c.abs());
                }
            }
            lf /= 4.0;

            let mut hf = 0.0f64;
            for row in coeffs.iter().skip(2) {
                for &c in row.iter().skip(2) {
                    hf += f64::from(c.abs());
                }
            }
            hf /= 36.0;

            (lf, hf)
        })
        .collect();

    let count = energies.len() as f64;
    let (lf_sum, hf_sum) = energies
        .iter()
        .fold((0.0, 0.0), |(lf, hf), (l, h)| (lf + l, hf + h));
    Some((lf_sum / count, hf_sum / count))
}
