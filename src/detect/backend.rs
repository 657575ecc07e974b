use std::collections::BTreeSet;

use anyhow::Result;

use crate::detect::classes;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Object detector boundary.
///
/// The engine treats a detector as an opaque classifier: it hands over the
/// unannotated frame and gets back pixel-space boxes. Implementations must
/// treat the frame as read-only and must not keep it past the call.
///
/// A detector is owned by exactly one run and moved onto the worker thread,
/// hence `Send`.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Only detections with `confidence >= confidence_threshold` whose class
    /// is in `class_allowlist` are returned. An empty allowlist admits every
    /// class.
    fn predict(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        class_allowlist: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>>;

    /// Human-readable class name for a class id.
    fn class_name(&self, class_id: u32) -> String {
        classes::coco_class_name(class_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared allowlist check for backends.
pub(crate) fn admits(class_allowlist: &BTreeSet<u32>, class_id: u32) -> bool {
    class_allowlist.is_empty() || class_allowlist.contains(&class_id)
}
