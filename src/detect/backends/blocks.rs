use std::collections::BTreeSet;

use anyhow::Result;

use crate::color::rgb_to_hsv;
use crate::detect::backend::{admits, ObjectDetector};
use crate::detect::result::{BoundingBox, RawDetection};
use crate::frame::Frame;

const MIN_SATURATION: u8 = 100;
const MIN_VALUE: u8 = 60;
const DEFAULT_MIN_PIXELS: u64 = 16;
const DEFAULT_CONFIDENCE: f32 = 0.90;

/// Reports the extent of strongly saturated pixels as a single object.
///
/// Synthetic `stub://` sources paint a coloured block into a neutral
/// background; this backend finds it, which exercises the whole evidence path
/// without a trained model. Neutral colours (white, black, grey) are ignored.
#[derive(Debug, Clone)]
pub struct ColorBlockDetector {
    class_id: u32,
    confidence: f32,
    min_pixels: u64,
}

impl ColorBlockDetector {
    pub fn new(class_id: u32) -> Self {
        Self {
            class_id,
            confidence: DEFAULT_CONFIDENCE,
            min_pixels: DEFAULT_MIN_PIXELS,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_min_pixels(mut self, min_pixels: u64) -> Self {
        self.min_pixels = min_pixels.max(1);
        self
    }
}

impl Default for ColorBlockDetector {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ObjectDetector for ColorBlockDetector {
    fn name(&self) -> &'static str {
        "blocks"
    }

    fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        class_allowlist: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        if self.confidence < confidence_threshold || !admits(class_allowlist, self.class_id) {
            return Ok(Vec::new());
        }

        let mut count = 0u64;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        for (x, y, px) in frame.image().enumerate_pixels() {
            let [_, s, v] = rgb_to_hsv(px.0);
            if s >= MIN_SATURATION && v >= MIN_VALUE {
                count += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        if count < self.min_pixels {
            return Ok(Vec::new());
        }

        let bbox = BoundingBox::new(
            min_x as f32,
            min_y as f32,
            (max_x + 1) as f32,
            (max_y + 1) as f32,
        );
        Ok(vec![RawDetection::new(bbox, self.confidence, self.class_id)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame_with_block(rgb: [u8; 3]) -> Frame {
        let mut frame = Frame::filled(20, 10, [128, 128, 128]);
        for y in 2..6 {
            for x in 4..12 {
                frame.image_mut().put_pixel(x, y, Rgb(rgb));
            }
        }
        frame
    }

    #[test]
    fn finds_saturated_block_extent() {
        let mut detector = ColorBlockDetector::new(2);
        let out = detector
            .predict(&frame_with_block([220, 20, 20]), 0.25, &BTreeSet::new())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 2);
        assert_eq!(out[0].bounding_box, BoundingBox::new(4.0, 2.0, 12.0, 6.0));
    }

    #[test]
    fn ignores_neutral_frames() {
        let mut detector = ColorBlockDetector::default();
        let out = detector
            .predict(&frame_with_block([250, 250, 250]), 0.25, &BTreeSet::new())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn honours_threshold_and_allowlist() {
        let frame = frame_with_block([20, 20, 220]);
        let mut detector = ColorBlockDetector::new(0).with_confidence(0.5);
        assert!(detector.predict(&frame, 0.6, &BTreeSet::new()).unwrap().is_empty());
        let cars: BTreeSet<u32> = [2].into_iter().collect();
        assert!(detector.predict(&frame, 0.25, &cars).unwrap().is_empty());
        let people: BTreeSet<u32> = [0].into_iter().collect();
        assert_eq!(detector.predict(&frame, 0.25, &people).unwrap().len(), 1);
    }
}
