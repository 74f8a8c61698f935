pub mod face_pipeline;
pub mod module;
