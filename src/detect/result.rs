use crate::frame::PixelRect;

/// Axis-aligned box in frame pixel coordinates. May extend past the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Truncate to integer pixels and clip to `0..width` / `0..height`.
    ///
    /// Boxes that touch or cross the frame edge never index out of bounds;
    /// a box entirely outside the frame clips to an empty rectangle.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> PixelRect {
        let clip = |v: f32, max: u32| -> u32 {
            if !v.is_finite() || v <= 0.0 {
                0
            } else {
                (v.trunc() as u64).min(max as u64) as u32
            }
        };
        let x1 = clip(self.x1, frame_width);
        let y1 = clip(self.y1, frame_height);
        let x2 = clip(self.x2, frame_width).max(x1);
        let y2 = clip(self.y2, frame_height).max(y1);
        PixelRect::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// One detector output for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
}

impl RawDetection {
    pub fn new(bounding_box: BoundingBox, confidence: f32, class_id: u32) -> Self {
        Self {
            bounding_box,
            confidence,
            class_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_clips_negative_and_overflowing_coordinates() {
        let bbox = BoundingBox::new(-12.5, -3.0, 700.0, 90.9);
        assert_eq!(bbox.clamp_to(640, 480), PixelRect::new(0, 0, 640, 90));
    }

    #[test]
    fn clamp_outside_frame_is_empty() {
        let bbox = BoundingBox::new(700.0, 10.0, 800.0, 20.0);
        let rect = bbox.clamp_to(640, 480);
        assert!(rect.is_empty());
        assert_eq!(rect.x, 640);
    }

    #[test]
    fn clamp_handles_inverted_and_nan_boxes() {
        assert!(BoundingBox::new(50.0, 50.0, 10.0, 10.0).clamp_to(100, 100).is_empty());
        assert!(BoundingBox::new(f32::NAN, 0.0, f32::NAN, 5.0).clamp_to(100, 100).is_empty());
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < f32::EPSILON);
        assert_eq!(a.iou(&b), 0.0);
        let half = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }
}
