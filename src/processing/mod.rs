pub mod bbox;
pub mod nms;
pub mod yolo;
