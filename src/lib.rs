mod processing;
mod utils;
pub mod error;
pub mod inference;
pub mod pipeline;

pub use error::AnalysisError;
pub use inference::{CascadeParams, FaceBoxSource, InferenceModel, ModelRegistry, UnavailableModel};
pub use pipeline::face_pipeline::config::AnalysisConfig;
pub use pipeline::face_pipeline::pipeline::{error_document, FaceAnalysis, FacePipeline, PipelineStage};
pub use pipeline::module::attribute_detector::{
    Attribute, AttributeDetector, AttributeValue, DetectionResult, FaceShapeLabel, SkinTypeLabel, WrinkleRegion,
};
pub use pipeline::module::face_locator::FaceRegion;
pub use pipeline::module::lighting_analysis::{LightingStatus, LightingVerdict};
pub use pipeline::module::result_aggregator::{AggregatedReport, ReportEntry};
pub use processing::bbox::{FaceBox, RawFaceBox};
