//! Shared fixtures for the integration tests: generated images and a
//! scripted OCR engine, so the suite needs no system tesseract.

#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageguard::ocr::{OcrEngine, OcrOutput, PageSegMode};
use imageguard::Result;
use std::path::{Path, PathBuf};

/// Write a flat white RGB PNG and return its path.
pub fn make_blank_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    img.save(&path).unwrap();
    path
}

/// Write a mid-gray image with the bits of `message` embedded in the first
/// LSBs (row-major), mirroring a naive LSB embedder.
pub fn make_lsb_stego_image(dir: &Path, message: &str, width: u32, height: u32) -> PathBuf {
    let bits: Vec<u8> = message
        .bytes()
        .flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1))
        .collect();
    let mut gray = GrayImage::from_pixel(width, height, Luma([128]));
    for (index, bit) in bits.iter().enumerate() {
        let x = (index as u32) % width;
        let y = (index as u32) / width;
        if y >= height {
            break;
        }
        gray.put_pixel(x, y, Luma([(128 & 0xFE) | bit]));
    }
    let rgb: RgbImage = RgbImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    let path = dir.join("stego.png");
    rgb.save(&path).unwrap();
    path
}

/// OCR engine that always reports the same extraction.
pub struct ScriptedOcr {
    pub text: String,
    pub confidence: f64,
}

impl ScriptedOcr {
    pub fn new(text: &str, confidence: f64) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, _: &image::DynamicImage, _: &[String], _: PageSegMode) -> Result<OcrOutput> {
        Ok(OcrOutput {
            text: self.text.clone(),
            mean_confidence: self.confidence,
        })
    }
}

/// OCR engine that fails every call, for fail-open/fail-closed tests.
pub struct FailingOcr;

impl OcrEngine for FailingOcr {
    fn recognize(&self, _: &image::DynamicImage, _: &[String], _: PageSegMode) -> Result<OcrOutput> {
        Err(imageguard::GuardError::ocr("scripted OCR failure"))
    }
}

/// OCR engine that sleeps before answering, for deadline tests.
pub struct SlowOcr {
    pub delay_ms: u64,
}

impl OcrEngine for SlowOcr {
    fn recognize(&self, _: &image::DynamicImage, _: &[String], _: PageSegMode) -> Result<OcrOutput> {
        std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
        Ok(OcrOutput {
            text: "slow".to_string(),
            mean_confidence: 90.0,
        })
    }
}
