use std::path::Path;
use image::imageops::{resize, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use ndarray::Array4;
use crate::error::AnalysisError;

/// Gray used by YOLO-style letterboxing for the padded border.
pub const LETTERBOX_FILL: u8 = 114;

pub fn byte_data_to_image(im_bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    let img = match image::load_from_memory(im_bytes) {
        Ok(img) => img,
        Err(e) => return Err(AnalysisError::ImageDecode(e.to_string())),
    };

    // Alpha and grayscale inputs are normalized to three channels
    let img = match img {
        DynamicImage::ImageRgb8(img) => img,
        other => other.into_rgb8(),
    };

    if img.width() == 0 || img.height() == 0 {
        return Err(AnalysisError::ImageDecode("image has zero dimensions".to_string()));
    }
    Ok(img)
}

pub fn load_image(path: &Path) -> Result<RgbImage, AnalysisError> {
    let im_bytes = match std::fs::read(path) {
        Ok(im_bytes) => im_bytes,
        Err(e) => {
            return Err(AnalysisError::ImageDecode(format!("{}: {}", path.display(), e)))
        }
    };
    byte_data_to_image(&im_bytes)
}

pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    DynamicImage::ImageRgb8(img.clone()).into_luma8()
}

/// Resizes to `size` and lays the pixels out as a `[1, 3, h, w]` tensor,
/// applying `(pixel * scale - mean[c]) / std[c]` per channel.
pub fn rgb_to_nchw_tensor(
    img: &RgbImage,
    size: (u32, u32),
    scale: f32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Array4<f32> {
    let (width, height) = size;
    let resized = resize(img, width, height, FilterType::Triangle);

    let mut im_tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for i in 0..3 {
        for y in 0..height {
            for x in 0..width {
                let pixel_value = resized.get_pixel(x, y)[i] as f32;
                im_tensor[[0, i, y as usize, x as usize]] = (pixel_value * scale - mean[i]) / std[i];
            }
        }
    }
    im_tensor
}

/// Placement of the source image inside a letterboxed square input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub x_offset: u32,
    pub y_offset: u32,
}

impl Letterbox {
    /// Maps a point from model input space back to source image space.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.x_offset as f32) / self.scale,
            (y - self.y_offset as f32) / self.scale,
        )
    }
}

/// Aspect-preserving resize into a `target_size` square padded with gray,
/// scaled to `[0, 1]` in NCHW layout.
pub fn letterbox_tensor(img: &RgbImage, target_size: u32) -> (Array4<f32>, Letterbox) {
    let (orig_width, orig_height) = img.dimensions();
    let max_dim = orig_width.max(orig_height).max(1);
    let scale = target_size as f32 / max_dim as f32;
    let new_width = ((orig_width as f32 * scale) as u32).clamp(1, target_size);
    let new_height = ((orig_height as f32 * scale) as u32).clamp(1, target_size);

    let resized = resize(img, new_width, new_height, FilterType::Triangle);

    let mut letterboxed = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([LETTERBOX_FILL, LETTERBOX_FILL, LETTERBOX_FILL]),
    );
    let x_offset = (target_size - new_width) / 2;
    let y_offset = (target_size - new_height) / 2;
    image::imageops::replace(&mut letterboxed, &resized, x_offset as i64, y_offset as i64);

    let size = target_size as usize;
    let mut im_tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in letterboxed.enumerate_pixels() {
        for c in 0..3 {
            im_tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (im_tensor, Letterbox { scale, x_offset, y_offset })
}
