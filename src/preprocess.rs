use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

use crate::types::DocumentMode;

/// Contrast boost applied to invoice photos before upload.
pub const INVOICE_CONTRAST: f32 = 1.5;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Bytes to upload for one image. License photos go as-is; invoices get contrast-enhanced JPEG.
pub fn prepare_for_ocr(mode: DocumentMode, data: Vec<u8>) -> Result<Vec<u8>, PreprocessError> {
    match mode {
        DocumentMode::License => Ok(data),
        DocumentMode::Invoice => {
            let img = image::load_from_memory(&data)?;
            encode_as_jpeg(enhance_contrast(img.to_rgb8(), INVOICE_CONTRAST))
        }
    }
}

/// Scale every channel away from the mean gray level by `factor`.
fn enhance_contrast(rgb: RgbImage, factor: f32) -> RgbImage {
    let gray = DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
    let pixels = (gray.width() as f64 * gray.height() as f64).max(1.0);
    let mean = (gray.pixels().map(|p| p[0] as f64).sum::<f64>() / pixels + 0.5).floor() as f32;

    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let adjust = |c: u8| (mean + factor * (c as f32 - mean)).round().clamp(0.0, 255.0) as u8;
        Rgb([adjust(p[0]), adjust(p[1]), adjust(p[2])])
    })
}

fn encode_as_jpeg(img: RgbImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
