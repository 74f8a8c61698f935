//! Model backends.
//!
//! Every model the pipeline talks to sits behind one of two traits so the
//! weights can be loaded once at startup and shared by reference across
//! requests. The OpenCV implementations live behind the `opencv` feature.

use std::sync::Arc;
use anyhow::{anyhow, Error};
use image::GrayImage;
use ndarray::{Array4, ArrayD};
use tracing::{info, warn};
use crate::pipeline::face_pipeline::config::AnalysisConfig;
use crate::processing::bbox::RawFaceBox;

#[cfg(feature = "opencv")]
pub mod opencv_backend;

/// A loaded network: NCHW `f32` tensor in, first output tensor out.
pub trait InferenceModel: Send + Sync {
    fn name(&self) -> &str;

    fn forward(&self, input: Array4<f32>) -> Result<ArrayD<f32>, Error>;
}

/// Parameters for the sliding-window face detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: u32,
}

/// A face detector over grayscale images. Returned boxes are unclipped and in
/// detector order.
pub trait FaceBoxSource: Send + Sync {
    fn detect(&self, gray: &GrayImage, params: &CascadeParams) -> Result<Vec<RawFaceBox>, Error>;
}

/// Stand-in for a model that could not be loaded; every call fails with the
/// load error so the affected attribute degrades instead of the whole run.
#[derive(Debug, Clone)]
pub struct UnavailableModel {
    name: String,
    reason: String,
}

impl UnavailableModel {
    pub fn new(name: &str, reason: impl Into<String>) -> Self {
        UnavailableModel {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl InferenceModel for UnavailableModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, _input: Array4<f32>) -> Result<ArrayD<f32>, Error> {
        Err(anyhow!("model {} unavailable: {}", self.name, self.reason))
    }
}

impl FaceBoxSource for UnavailableModel {
    fn detect(&self, _gray: &GrayImage, _params: &CascadeParams) -> Result<Vec<RawFaceBox>, Error> {
        Err(anyhow!("face detector unavailable: {}", self.reason))
    }
}

/// Shared, read-only handles to every model the pipeline needs.
#[derive(Clone)]
pub struct ModelRegistry {
    pub face_detector: Arc<dyn FaceBoxSource>,
    pub face_shape: Arc<dyn InferenceModel>,
    pub skin_type: Arc<dyn InferenceModel>,
    pub acne: Arc<dyn InferenceModel>,
    pub wrinkle: Arc<dyn InferenceModel>,
}

impl ModelRegistry {
    /// Loads every configured model. A model that fails to load is replaced by
    /// an [`UnavailableModel`] and reported with a warning.
    pub fn load(config: &AnalysisConfig) -> Self {
        let registry = ModelRegistry {
            face_detector: load_face_detector(config),
            face_shape: load_model("face_shape", config.face_shape.model_path.as_deref()),
            skin_type: load_model("skin_type", config.skin_type.model_path.as_deref()),
            acne: load_model("acne", config.acne.model_path.as_deref()),
            wrinkle: load_model("wrinkle", config.wrinkle.model_path.as_deref()),
        };
        info!("model registry ready");
        registry
    }
}

fn unavailable(name: &str, reason: String) -> UnavailableModel {
    warn!("{} model unavailable: {}", name, reason);
    UnavailableModel::new(name, reason)
}

#[cfg(feature = "opencv")]
fn load_face_detector(config: &AnalysisConfig) -> Arc<dyn FaceBoxSource> {
    let Some(path) = config.face_locator.cascade_path.as_deref() else {
        return Arc::new(unavailable("face_detector", "no cascade path configured".to_string()));
    };
    match opencv_backend::HaarCascadeDetector::load(path) {
        Ok(detector) => {
            info!("loaded face cascade from {}", path.display());
            Arc::new(detector)
        }
        Err(e) => Arc::new(unavailable("face_detector", format!("{:#}", e))),
    }
}

#[cfg(not(feature = "opencv"))]
fn load_face_detector(_config: &AnalysisConfig) -> Arc<dyn FaceBoxSource> {
    Arc::new(unavailable("face_detector", "built without the `opencv` feature".to_string()))
}

#[cfg(feature = "opencv")]
fn load_model(name: &str, path: Option<&std::path::Path>) -> Arc<dyn InferenceModel> {
    let Some(path) = path else {
        return Arc::new(unavailable(name, "no model path configured".to_string()));
    };
    match opencv_backend::DnnModel::load(name, path) {
        Ok(model) => {
            info!("loaded {} model from {}", name, path.display());
            Arc::new(model)
        }
        Err(e) => Arc::new(unavailable(name, format!("{:#}", e))),
    }
}

#[cfg(not(feature = "opencv"))]
fn load_model(name: &str, _path: Option<&std::path::Path>) -> Arc<dyn InferenceModel> {
    Arc::new(unavailable(name, "built without the `opencv` feature".to_string()))
}
