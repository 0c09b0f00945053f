use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageResult};
use tandem_core::EncodingConfig;

/// Encodes decoded images into the delivery formats.
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    jpeg_quality: u8,
    webp_quality: f32,
}

impl ImageEncoder {
    pub fn new(jpeg_quality: u8, webp_quality: f32) -> Self {
        Self {
            jpeg_quality,
            webp_quality,
        }
    }

    pub fn from_config(config: &EncodingConfig) -> Self {
        Self::new(config.jpeg_quality, config.webp_quality)
    }

    pub fn jpeg(&self, img: &DynamicImage) -> ImageResult<Bytes> {
        let rgb_img = img.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        encoder.encode_image(&rgb_img)?;
        Ok(Bytes::from(buffer))
    }

    pub fn webp(&self, img: &DynamicImage) -> Bytes {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(self.webp_quality);

        Bytes::copy_from_slice(&webp_data)
    }

    /// Lossless intermediate, used for extracted frames in tests and tooling.
    pub fn png(img: &DynamicImage) -> ImageResult<Bytes> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        img.write_to(&mut cursor, ImageFormat::Png)?;
        Ok(Bytes::from(buffer))
    }
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self::from_config(&EncodingConfig::default())
    }
}
