use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use crate::error::AnalysisError;

/// Smallest face the cascade detector will report, in pixels per side.
pub const MIN_FACE_SIZE: u32 = 30;
/// Largest margin, as a fraction of the face size, added around a detected face.
pub const MAX_EXPAND_RATIO: f32 = 5.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaceLocatorConfig {
    pub cascade_path: Option<PathBuf>,
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub expand_ratio: f32,
}

impl FaceLocatorConfig {
    pub fn new() -> Self {
        FaceLocatorConfig {
            cascade_path: None,
            scale_factor: 1.1,
            min_neighbors: 5,
            expand_ratio: 0.3,
        }
    }
}

impl Default for FaceLocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub enabled: bool,
    pub threshold: f32,
    /// When set, an `Uneven` verdict fails every detector instead of only
    /// being reported.
    pub gate_detectors: bool,
}

impl LightingConfig {
    pub fn new() -> Self {
        LightingConfig {
            enabled: true,
            threshold: 30.0,
            gate_detectors: false,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaceShapeConfig {
    pub model_path: Option<PathBuf>,
    pub image_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl FaceShapeConfig {
    pub fn new() -> Self {
        FaceShapeConfig {
            model_path: None,
            image_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl Default for FaceShapeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkinTypeConfig {
    pub model_path: Option<PathBuf>,
    pub image_size: (u32, u32),
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl SkinTypeConfig {
    pub fn new() -> Self {
        SkinTypeConfig {
            model_path: None,
            image_size: (224, 224),
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl Default for SkinTypeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcneConfig {
    pub model_path: Option<PathBuf>,
    pub image_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl AcneConfig {
    pub fn new() -> Self {
        AcneConfig {
            model_path: None,
            image_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl Default for AcneConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WrinkleConfig {
    pub model_path: Option<PathBuf>,
    pub image_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub class_names: Vec<String>,
}

impl WrinkleConfig {
    pub fn new() -> Self {
        WrinkleConfig {
            model_path: None,
            image_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            class_names: vec!["wrinkle".to_string()],
        }
    }
}

impl Default for WrinkleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What detectors run on when no face is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFacePolicy {
    /// Run every detector on the whole photo.
    FullFrame,
    /// Record "no face detected" for every detector.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub timeout_ms: u64,
    pub concurrent_detectors: bool,
    pub no_face_policy: NoFacePolicy,
}

impl PipelineConfig {
    pub fn new() -> Self {
        PipelineConfig {
            timeout_ms: 30_000,
            concurrent_detectors: true,
            no_face_policy: NoFacePolicy::FullFrame,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub face_locator: FaceLocatorConfig,
    pub lighting: LightingConfig,
    pub face_shape: FaceShapeConfig,
    pub skin_type: SkinTypeConfig,
    pub acne: AcneConfig,
    pub wrinkle: WrinkleConfig,
    pub pipeline: PipelineConfig,
}

impl AnalysisConfig {
    pub fn new() -> Self {
        AnalysisConfig::default()
    }

    pub fn from_toml(contents: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = match toml::from_str(contents) {
            Ok(config) => config,
            Err(e) => return Err(AnalysisError::Config(e.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AnalysisError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => return Err(AnalysisError::Config(format!("{}: {}", path.display(), e))),
        };
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let locator = &self.face_locator;
        if !(locator.scale_factor > 1.0) {
            return Err(AnalysisError::Config(format!(
                "face_locator.scale_factor must be greater than 1, got {}",
                locator.scale_factor
            )));
        }
        if locator.min_neighbors < 0 {
            return Err(AnalysisError::Config("face_locator.min_neighbors must not be negative".to_string()));
        }
        if !(locator.expand_ratio >= 0.0 && locator.expand_ratio <= MAX_EXPAND_RATIO) {
            return Err(AnalysisError::Config(format!(
                "face_locator.expand_ratio must be within [0, {}], got {}",
                MAX_EXPAND_RATIO, locator.expand_ratio
            )));
        }
        if !(self.lighting.threshold >= 0.0) {
            return Err(AnalysisError::Config("lighting.threshold must not be negative".to_string()));
        }
        let sizes = [
            ("face_shape.image_size", self.face_shape.image_size),
            ("skin_type.image_size", self.skin_type.image_size.0.min(self.skin_type.image_size.1)),
            ("acne.image_size", self.acne.image_size),
            ("wrinkle.image_size", self.wrinkle.image_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(AnalysisError::Config(format!("{} must be positive", name)));
            }
        }
        let thresholds = [
            ("face_shape.confidence_threshold", self.face_shape.confidence_threshold),
            ("face_shape.iou_threshold", self.face_shape.iou_threshold),
            ("acne.confidence_threshold", self.acne.confidence_threshold),
            ("acne.iou_threshold", self.acne.iou_threshold),
            ("wrinkle.confidence_threshold", self.wrinkle.confidence_threshold),
            ("wrinkle.iou_threshold", self.wrinkle.iou_threshold),
        ];
        for (name, value) in thresholds {
            if !(value > 0.0 && value <= 1.0) {
                return Err(AnalysisError::Config(format!("{} must be within (0, 1], got {}", name, value)));
            }
        }
        if self.skin_type.std.iter().any(|s| *s == 0.0) {
            return Err(AnalysisError::Config("skin_type.std must not contain zeros".to_string()));
        }
        if self.pipeline.timeout_ms == 0 {
            return Err(AnalysisError::Config("pipeline.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}
