//! 2D FFT magnitude spectrum with the DC component shifted to the center.

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Compute `|FFT2(input)|` with the zero frequency moved to the center,
/// matching the usual `fftshift(fft2(x))` composition.
pub fn fft2_shifted_magnitude(input: &Array2<f32>) -> Array2<f32> {
    let (height, width) = input.dim();
    if height == 0 || width == 0 {
        return Array2::zeros((height, width));
    }

    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_forward(width);
    let col_fft = planner.plan_fft_forward(height);

    // Row pass.
    let mut data: Vec<Complex<f32>> = input.iter().map(|&v| Complex::new(v, 0.0)).collect();
    for row in data.chunks_exact_mut(width) {
        row_fft.process(row);
    }

    // Column pass via gather/scatter.
    let mut column = vec![Complex::new(0.0, 0.0); height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        col_fft.process(&mut column);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }

    // Shift quadrants so the DC term lands at (height/2, width/2).
    let shift_y = height / 2;
    let shift_x = width / 2;
    Array2::from_shape_fn((height, width), |(y, x)| {
        let sy = (y + height - shift_y) % height;
        let sx = (x + width - shift_x) % width;
        data[sy * width + sx].norm()
    })
}
