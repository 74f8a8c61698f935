use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use anyhow::Error;
use serde::{Deserialize, Serialize};
use crate::error::AnalysisError;
use crate::pipeline::module::face_locator::FaceRegion;

/// Report key owned by each detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    FaceShape,
    SkinType,
    AcnePrediction,
    Wrinkles,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::FaceShape,
        Attribute::SkinType,
        Attribute::AcnePrediction,
        Attribute::Wrinkles,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Attribute::FaceShape => "FaceShape",
            Attribute::SkinType => "SkinType",
            Attribute::AcnePrediction => "AcnePrediction",
            Attribute::Wrinkles => "Wrinkles",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceShapeLabel {
    Oval,
    Round,
    Square,
    Heart,
    Oblong,
}

impl FaceShapeLabel {
    /// Model class order.
    pub const CLASSES: [FaceShapeLabel; 5] = [
        FaceShapeLabel::Oval,
        FaceShapeLabel::Round,
        FaceShapeLabel::Square,
        FaceShapeLabel::Heart,
        FaceShapeLabel::Oblong,
    ];

    pub fn from_class_id(class_id: usize) -> Option<Self> {
        Self::CLASSES.get(class_id).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinTypeLabel {
    Dry,
    Normal,
    Oily,
}

impl SkinTypeLabel {
    /// Model class order.
    pub const CLASSES: [SkinTypeLabel; 3] = [SkinTypeLabel::Dry, SkinTypeLabel::Normal, SkinTypeLabel::Oily];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrinkleRegion {
    pub label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in face region pixels.
    pub bbox: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    AcneCount(u32),
    FaceShape(FaceShapeLabel),
    SkinType(SkinTypeLabel),
    Wrinkles(Vec<WrinkleRegion>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Success(AttributeValue),
    Failure(String),
}

impl DetectionResult {
    pub fn failure(err: impl fmt::Display) -> Self {
        DetectionResult::Failure(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DetectionResult::Success(_))
    }
}

/// A pretrained model wrapped behind a uniform success/failure contract.
///
/// Implementors provide `detect`; callers use `infer`, which never fails and
/// never unwinds.
pub trait AttributeDetector: Send + Sync {
    fn attribute(&self) -> Attribute;

    fn detect(&self, region: &FaceRegion) -> Result<AttributeValue, Error>;

    fn infer(&self, region: &FaceRegion) -> DetectionResult {
        if region.is_empty() {
            return DetectionResult::failure(AnalysisError::InvalidRegion);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.detect(region))) {
            Ok(Ok(value)) => DetectionResult::Success(value),
            Ok(Err(e)) => DetectionResult::Failure(format!("{:#}", e)),
            Err(payload) => DetectionResult::Failure(format!("{} panicked: {}", self.attribute(), panic_message(&*payload))),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
