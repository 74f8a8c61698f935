use anyhow::{anyhow, Error};
use ndarray::ArrayD;
use crate::processing::bbox::Detection;
use crate::processing::nms::nms;
use crate::utils::utils::Letterbox;

/// Decodes a `[1, 4 + classes, boxes]` YOLO output. Boxes are center-format
/// in model input pixels and are mapped back through `letterbox` and clipped
/// to `source_size`. Applies class-wise NMS and returns detections sorted by
/// descending confidence.
pub fn decode_yolo_output(
    output: &ArrayD<f32>,
    confidence_threshold: f32,
    iou_threshold: f32,
    letterbox: &Letterbox,
    source_size: (u32, u32),
) -> Result<Vec<Detection>, Error> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(anyhow!("expected output of shape [1, 4 + classes, boxes], got {:?}", shape));
    }
    if shape[1] < 5 {
        return Err(anyhow!("output has {} rows, need box coordinates plus at least one class", shape[1]));
    }

    let num_classes = shape[1] - 4;
    let num_boxes = shape[2];
    let (width, height) = (source_size.0 as f32, source_size.1 as f32);

    let mut detections = Vec::new();
    for i in 0..num_boxes {
        let mut confidence = 0.0;
        let mut class_id = 0;
        for c in 0..num_classes {
            let score = output[[0, 4 + c, i]];
            if score > confidence {
                confidence = score;
                class_id = c;
            }
        }
        if confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (
            output[[0, 0, i]],
            output[[0, 1, i]],
            output[[0, 2, i]],
            output[[0, 3, i]],
        );
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);

        detections.push(Detection {
            x1: x1.clamp(0.0, width),
            y1: y1.clamp(0.0, height),
            x2: x2.clamp(0.0, width),
            y2: y2.clamp(0.0, height),
            confidence,
            class_id,
        });
    }

    Ok(nms(detections, iou_threshold))
}
