#![cfg(feature = "backend-tract")]

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::{admits, ObjectDetector};
use crate::detect::result::{BoundingBox, RawDetection};
use crate::frame::Frame;

const NMS_IOU_THRESHOLD: f32 = 0.45;
const BOX_CHANNELS: usize = 4;

/// Tract-based backend for YOLOv8-style ONNX exports.
///
/// The model takes a `[1, 3, S, S]` RGB tensor scaled to `0..1` and produces
/// `[1, 4 + C, N]`: `cx, cy, w, h` in input pixels followed by one score per
/// class. The backend loads a local model file only; it performs no network
/// I/O and writes nothing to disk.
pub struct TractDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be > 0"));
        }
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "tract detector loaded {} (input {}x{})",
            model_path.display(),
            input_size,
            input_size
        );
        Ok(Self { model, input_size })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        frame: &Frame,
        confidence_threshold: f32,
        class_allowlist: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .get(0)
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= BOX_CHANNELS {
            return Err(anyhow!("unexpected detector output shape {:?}", shape));
        }
        let channels = shape[1];
        let anchors = shape[2];

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class_idx, score) = (BOX_CHANNELS..channels)
                .map(|c| (c - BOX_CHANNELS, view[[0, c, i]]))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            let class_id = class_idx as u32;
            if !score.is_finite() || score < confidence_threshold || !admits(class_allowlist, class_id)
            {
                continue;
            }

            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            let bbox = BoundingBox::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
            );
            candidates.push(RawDetection::new(bbox, score, class_id));
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

impl ObjectDetector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        class_allowlist: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        if frame.is_empty() {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame, confidence_threshold, class_allowlist)
    }
}

/// Greedy per-class suppression, highest confidence first.
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for det in detections {
        let overlaps = kept.iter().any(|k| {
            k.class_id == det.class_id && k.bounding_box.iou(&det.bounding_box) > iou_threshold
        });
        if !overlaps {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_keeps_best_per_class() {
        let a = RawDetection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9, 0);
        let b = RawDetection::new(BoundingBox::new(1.0, 1.0, 11.0, 11.0), 0.8, 0);
        let c = RawDetection::new(BoundingBox::new(1.0, 1.0, 11.0, 11.0), 0.7, 2);
        let kept = non_max_suppression(vec![b, c, a.clone()], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], a);
        assert_eq!(kept[1].class_id, 2);
    }
}
