//! Spectral transforms backing the frequency-domain detector: 2D FFT with a
//! centered spectrum, JPEG-style 8x8 block DCT energies, and a multi-level
//! Haar wavelet decomposition.

pub mod dct;
pub mod fft;
pub mod wavelet;
