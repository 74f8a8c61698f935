pub mod acne_detection;
pub mod attribute_detector;
pub mod face_locator;
pub mod face_shape;
pub mod lighting_analysis;
pub mod result_aggregator;
pub mod skin_type;
pub mod wrinkle_detection;
