use std::sync::Arc;
use image::RgbImage;
use tracing::debug;
use crate::error::AnalysisError;
use crate::inference::{CascadeParams, FaceBoxSource};
use crate::pipeline::face_pipeline::config::{FaceLocatorConfig, MIN_FACE_SIZE};
use crate::processing::bbox::{clip_box, expand_box, FaceBox};
use crate::utils::utils::to_grayscale;

/// Context-expanded crop of the photo that detectors run on. Shared
/// read-only by every detector of one run.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    image: Arc<RgbImage>,
    bounds: FaceBox,
}

impl FaceRegion {
    /// Crops `bounds` out of `image`. Fails on an empty box.
    pub fn crop(image: &RgbImage, bounds: FaceBox) -> Result<Self, AnalysisError> {
        if bounds.is_empty() || bounds.right() > image.width() || bounds.bottom() > image.height() {
            return Err(AnalysisError::InvalidRegion);
        }
        let cropped = image::imageops::crop_imm(image, bounds.x, bounds.y, bounds.w, bounds.h).to_image();
        Ok(FaceRegion {
            image: Arc::new(cropped),
            bounds,
        })
    }

    /// The whole photo as a region.
    pub fn full_frame(image: &RgbImage) -> Result<Self, AnalysisError> {
        let bounds = FaceBox { x: 0, y: 0, w: image.width(), h: image.height() };
        Self::crop(image, bounds)
    }

    #[cfg(test)]
    pub(crate) fn unchecked(image: RgbImage) -> Self {
        let bounds = FaceBox { x: 0, y: 0, w: image.width(), h: image.height() };
        FaceRegion { image: Arc::new(image), bounds }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Where the region sits in the source photo.
    pub fn bounds(&self) -> FaceBox {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

pub struct FaceLocator {
    detector: Arc<dyn FaceBoxSource>,
    scale_factor: f64,
    min_neighbors: i32,
    expand_ratio: f32,
}

impl FaceLocator {
    pub fn new(detector: Arc<dyn FaceBoxSource>, config: &FaceLocatorConfig) -> Self {
        FaceLocator {
            detector,
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
            expand_ratio: config.expand_ratio,
        }
    }

    /// Every face the detector finds, clipped to the image, in detector order.
    /// Boxes with nothing left after clipping are dropped.
    pub fn locate(&self, img: &RgbImage) -> Result<Vec<FaceBox>, anyhow::Error> {
        let gray = to_grayscale(img);
        let params = CascadeParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: MIN_FACE_SIZE,
        };
        let raw_boxes = self.detector.detect(&gray, &params)?;
        debug!("face detector returned {} boxes", raw_boxes.len());

        Ok(raw_boxes
            .iter()
            .filter_map(|raw| clip_box(raw, img.width(), img.height()))
            .collect())
    }

    /// Detection order carries no confidence ranking; the first box wins.
    pub fn primary(face_boxes: &[FaceBox]) -> Result<FaceBox, AnalysisError> {
        face_boxes.first().copied().ok_or(AnalysisError::NoFaceDetected)
    }

    pub fn expand(&self, face_box: &FaceBox, img: &RgbImage) -> FaceBox {
        expand_box(face_box, self.expand_ratio, img.width(), img.height())
    }

    /// Locates the primary face and crops its expanded region.
    pub fn extract(&self, img: &RgbImage) -> Result<FaceRegion, AnalysisError> {
        let face_boxes = match self.locate(img) {
            Ok(face_boxes) => face_boxes,
            Err(e) => {
                return Err(AnalysisError::DetectorInvocation {
                    detector: "face_locator".to_string(),
                    message: format!("{:#}", e),
                })
            }
        };
        if face_boxes.len() > 1 {
            debug!("{} faces found, using the first", face_boxes.len());
        }
        let face_box = Self::primary(&face_boxes)?;
        FaceRegion::crop(img, self.expand(&face_box, img))
    }
}
