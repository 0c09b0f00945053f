use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageResult};

pub fn decode(data: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(data)
}

/// Centered 1:1 crop along the longer axis.
pub fn crop_to_square(img: &DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    img.crop_imm(x, y, side, side)
}

/// Square crop scaled to exactly `size`×`size`.
pub fn square_thumbnail(img: &DynamicImage, size: u32) -> DynamicImage {
    crop_to_square(img).resize_exact(size, size, FilterType::Triangle)
}

/// Downscale so neither side exceeds `max_dimension`, keeping the aspect ratio.
/// Smaller images are returned unchanged.
pub fn fit_within(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return img.clone();
    }
    img.resize(max_dimension, max_dimension, FilterType::Triangle)
}
