use std::sync::Arc;
use anyhow::Error;
use tracing::debug;
use crate::inference::InferenceModel;
use crate::pipeline::face_pipeline::config::AcneConfig;
use crate::pipeline::module::attribute_detector::{Attribute, AttributeDetector, AttributeValue};
use crate::pipeline::module::face_locator::FaceRegion;
use crate::processing::yolo::decode_yolo_output;
use crate::utils::utils::letterbox_tensor;

/// Counts acne lesions found by an object detector. Zero is a valid count.
pub struct AcneDetector {
    model: Arc<dyn InferenceModel>,
    image_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl AcneDetector {
    pub fn new(model: Arc<dyn InferenceModel>, config: &AcneConfig) -> Self {
        AcneDetector {
            model,
            image_size: config.image_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        }
    }
}

impl AttributeDetector for AcneDetector {
    fn attribute(&self) -> Attribute {
        Attribute::AcnePrediction
    }

    fn detect(&self, region: &FaceRegion) -> Result<AttributeValue, Error> {
        let img = region.image();
        let (im_tensor, letterbox) = letterbox_tensor(img, self.image_size);
        let net_out = self.model.forward(im_tensor)?;
        let detections = decode_yolo_output(
            &net_out,
            self.confidence_threshold,
            self.iou_threshold,
            &letterbox,
            img.dimensions(),
        )?;
        debug!("acne - {} lesions", detections.len());
        Ok(AttributeValue::AcneCount(detections.len() as u32))
    }
}
