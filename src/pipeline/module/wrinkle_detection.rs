use std::sync::Arc;
use anyhow::Error;
use tracing::debug;
use crate::inference::InferenceModel;
use crate::pipeline::face_pipeline::config::WrinkleConfig;
use crate::pipeline::module::attribute_detector::{Attribute, AttributeDetector, AttributeValue, WrinkleRegion};
use crate::pipeline::module::face_locator::FaceRegion;
use crate::processing::yolo::decode_yolo_output;
use crate::utils::utils::letterbox_tensor;

pub struct WrinkleDetector {
    model: Arc<dyn InferenceModel>,
    image_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    class_names: Vec<String>,
}

impl WrinkleDetector {
    pub fn new(model: Arc<dyn InferenceModel>, config: &WrinkleConfig) -> Self {
        WrinkleDetector {
            model,
            image_size: config.image_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            class_names: config.class_names.clone(),
        }
    }

    fn label(&self, class_id: usize) -> String {
        match self.class_names.get(class_id) {
            Some(name) => name.clone(),
            None => format!("class_{}", class_id),
        }
    }
}

impl AttributeDetector for WrinkleDetector {
    fn attribute(&self) -> Attribute {
        Attribute::Wrinkles
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
        debug!("wrinkle - {} regions", detections.len());

        let wrinkles = detections
            .iter()
            .map(|d| WrinkleRegion {
                label: self.label(d.class_id),
                confidence: d.confidence,
                bbox: [d.x1, d.y1, d.x2, d.y2],
            })
            .collect();
        Ok(AttributeValue::Wrinkles(wrinkles))
    }
}
