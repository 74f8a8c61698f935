use std::sync::Arc;
use anyhow::{anyhow, Error};
use tracing::debug;
use crate::inference::InferenceModel;
use crate::pipeline::face_pipeline::config::FaceShapeConfig;
use crate::pipeline::module::attribute_detector::{Attribute, AttributeDetector, AttributeValue, FaceShapeLabel};
use crate::pipeline::module::face_locator::FaceRegion;
use crate::processing::yolo::decode_yolo_output;
use crate::utils::utils::letterbox_tensor;

pub struct FaceShapeDetector {
    model: Arc<dyn InferenceModel>,
    image_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl FaceShapeDetector {
    pub fn new(model: Arc<dyn InferenceModel>, config: &FaceShapeConfig) -> Self {
        FaceShapeDetector {
            model,
            image_size: config.image_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        }
    }
}

impl AttributeDetector for FaceShapeDetector {
    fn attribute(&self) -> Attribute {
        Attribute::FaceShape
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
        debug!("face_shape - {} detections", detections.len());

        // detections come back sorted by confidence
        let best = match detections.first() {
            Some(best) => best,
            None => return Err(anyhow!("no face shape detected")),
        };
        match FaceShapeLabel::from_class_id(best.class_id) {
            Some(label) => Ok(AttributeValue::FaceShape(label)),
            None => Err(anyhow!("face shape model returned unknown class {}", best.class_id)),
        }
    }
}
