use std::collections::BTreeSet;

use anyhow::Result;

use crate::detect::backend::ObjectDetector;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detector that never reports anything. Drives runs without a model.
#[derive(Debug, Default)]
pub struct StubDetector {
    frames_seen: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl ObjectDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn predict(
        &mut self,
        _frame: &Frame,
        _confidence_threshold: f32,
        _class_allowlist: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        self.frames_seen += 1;
        Ok(Vec::new())
    }
}
