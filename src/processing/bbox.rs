use serde::{Deserialize, Serialize};

/// Axis-aligned face rectangle in image pixels, always inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl FaceBox {
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Box as reported by a face detector backend, which may extend past the
/// image or carry negative origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFaceBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Clips a detector box to `width` x `height`. Returns `None` when nothing
/// of the box is left inside the image.
pub fn clip_box(raw: &RawFaceBox, width: u32, height: u32) -> Option<FaceBox> {
    let x1 = (raw.x as i64).clamp(0, width as i64);
    let y1 = (raw.y as i64).clamp(0, height as i64);
    let x2 = (raw.x as i64 + raw.w.max(0) as i64).clamp(0, width as i64);
    let y2 = (raw.y as i64 + raw.h.max(0) as i64).clamp(0, height as i64);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(FaceBox {
        x: x1 as u32,
        y: y1 as u32,
        w: (x2 - x1) as u32,
        h: (y2 - y1) as u32,
    })
}

/// Grows `face_box` by `expand_ratio` of its size: symmetric left and right,
/// 1.5x the vertical margin above (forehead) and 1x below (chin), clamped to
/// the image.
pub fn expand_box(face_box: &FaceBox, expand_ratio: f32, width: u32, height: u32) -> FaceBox {
    let expand_w = (face_box.w as f32 * expand_ratio) as u32;
    let expand_h = (face_box.h as f32 * expand_ratio) as u32;
    // top edge is floored after the fractional 1.5x margin is applied
    let top = (face_box.y as f32 - expand_h as f32 * 1.5).floor().max(0.0);

    let new_x = face_box.x.saturating_sub(expand_w);
    let new_y = top as u32;
    let right = face_box.right().saturating_add(expand_w).min(width);
    let bottom = face_box.bottom().saturating_add(expand_h).min(height);

    FaceBox {
        x: new_x,
        y: new_y,
        w: right.saturating_sub(new_x),
        h: bottom.saturating_sub(new_y),
    }
}

/// One object found by a YOLO-style model, in source pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}
