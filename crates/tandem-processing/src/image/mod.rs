//! Image processing module

pub mod encode;
pub mod ops;

pub use encode::ImageEncoder;
pub use ops::{crop_to_square, decode, fit_within, square_thumbnail};
