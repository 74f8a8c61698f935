use std::sync::Arc;
use anyhow::{anyhow, Error};
use tracing::debug;
use crate::inference::InferenceModel;
use crate::pipeline::face_pipeline::config::SkinTypeConfig;
use crate::pipeline::module::attribute_detector::{Attribute, AttributeDetector, AttributeValue, SkinTypeLabel};
use crate::pipeline::module::face_locator::FaceRegion;
use crate::utils::utils::rgb_to_nchw_tensor;

/// Three-way skin classifier over an ImageNet-normalized crop.
pub struct SkinTypeDetector {
    model: Arc<dyn InferenceModel>,
    image_size: (u32, u32),
    mean: [f32; 3],
    std: [f32; 3],
}

impl SkinTypeDetector {
    pub fn new(model: Arc<dyn InferenceModel>, config: &SkinTypeConfig) -> Self {
        SkinTypeDetector {
            model,
            image_size: config.image_size,
            mean: config.mean,
            std: config.std,
        }
    }
}

impl AttributeDetector for SkinTypeDetector {
    fn attribute(&self) -> Attribute {
        Attribute::SkinType
    }

    fn detect(&self, region: &FaceRegion) -> Result<AttributeValue, Error> {
        let im_tensor = rgb_to_nchw_tensor(region.image(), self.image_size, 1.0 / 255.0, self.mean, self.std);
        let net_out = self.model.forward(im_tensor)?;

        let logits: Vec<f32> = net_out.iter().cloned().collect();
        if logits.len() != SkinTypeLabel::CLASSES.len() {
            return Err(anyhow!(
                "skin type model returned {} scores, expected {}",
                logits.len(),
                SkinTypeLabel::CLASSES.len()
            ));
        }
        debug!("skin_type - logits: {:?}", logits);

        let mut best = 0;
        for (idx, score) in logits.iter().enumerate() {
            if score.is_nan() {
                return Err(anyhow!("skin type model returned NaN"));
            }
            if *score > logits[best] {
                best = idx;
            }
        }
        Ok(AttributeValue::SkinType(SkinTypeLabel::CLASSES[best]))
    }
}
