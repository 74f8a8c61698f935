use std::cmp::Ordering;
use std::collections::BTreeMap;
use crate::processing::bbox::Detection;

// greedily keep the highest-confidence box per class and drop the ones
// overlapping it by more than `iou_threshold`
pub fn nms(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut class_groups: BTreeMap<usize, Vec<Detection>> = BTreeMap::new();
    for detection in detections {
        class_groups.entry(detection.class_id).or_default().push(detection);
    }

    let mut keep = Vec::new();
    for (_, mut group) in class_groups {
        group.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

        let mut suppressed = vec![false; group.len()];
        for i in 0..group.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..group.len() {
                if !suppressed[j] && group[i].iou(&group[j]) > iou_threshold {
                    suppressed[j] = true;
                }
            }
            keep.push(group[i].clone());
        }
    }

    keep.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
    keep
}
