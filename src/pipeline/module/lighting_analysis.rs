use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use crate::pipeline::face_pipeline::config::LightingConfig;
use crate::utils::utils::to_grayscale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightingStatus {
    Even,
    Uneven,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingVerdict {
    pub status: LightingStatus,
    /// Spread between the brightest and darkest quadrant mean, 0-255 scale.
    pub brightness_diff: f32,
}

impl LightingVerdict {
    pub fn is_uneven(&self) -> bool {
        self.status == LightingStatus::Uneven
    }
}

#[derive(Debug, Clone)]
pub struct LightingAnalyzer {
    threshold: f32,
}

impl LightingAnalyzer {
    pub fn new(config: &LightingConfig) -> Self {
        LightingAnalyzer {
            threshold: config.threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn analyze(&self, img: &RgbImage) -> LightingVerdict {
        self.analyze_gray(&to_grayscale(img))
    }

    pub fn analyze_gray(&self, gray: &GrayImage) -> LightingVerdict {
        let brightness = quadrant_means(gray);
        let max_brightness = brightness.iter().cloned().fold(f32::MIN, f32::max);
        let min_brightness = brightness.iter().cloned().fold(f32::MAX, f32::min);
        let brightness_diff = if brightness.is_empty() { 0.0 } else { max_brightness - min_brightness };

        let status = if brightness_diff > self.threshold {
            LightingStatus::Uneven
        } else {
            LightingStatus::Even
        };
        LightingVerdict { status, brightness_diff }
    }
}

// top-left, top-right, bottom-left, bottom-right; quadrants that are empty
// on 1-pixel-wide or -high images are skipped
fn quadrant_means(gray: &GrayImage) -> Vec<f32> {
    let (w, h) = gray.dimensions();
    let (mid_x, mid_y) = (w / 2, h / 2);
    let quadrants = [
        (0, 0, mid_x, mid_y),
        (mid_x, 0, w, mid_y),
        (0, mid_y, mid_x, h),
        (mid_x, mid_y, w, h),
    ];

    quadrants
        .iter()
        .filter(|(x0, y0, x1, y1)| x1 > x0 && y1 > y0)
        .map(|&(x0, y0, x1, y1)| {
            let mut sum: u64 = 0;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += gray.get_pixel(x, y)[0] as u64;
                }
            }
            let count = ((x1 - x0) as u64) * ((y1 - y0) as u64);
            (sum as f64 / count as f64) as f32
        })
        .collect()
}
