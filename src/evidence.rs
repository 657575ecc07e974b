//! Evidence log.
//!
//! `EvidenceRecorder` consumes frame results and keeps an ordered, append-only
//! log of the frames that carried validated detections. Each entry stores a
//! deep copy of the annotated frame together with the filter settings that
//! were active when it was captured.

use crate::engine::{AnalysisConfig, FrameResult};
use crate::frame::Frame;
use crate::timecode::format_timecode;

/// Filter settings captured with an evidence entry, as ordered
/// `(name, value)` pairs. The first entry's keys define the CSV columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSnapshot {
    pairs: Vec<(String, String)>,
}

impl FilterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a run configuration.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut snapshot = Self::new();
        snapshot.push("target_objects", config.target_class_names());
        snapshot.push(
            "conf_threshold",
            format!("{:.2}", config.confidence_threshold()),
        );
        snapshot.push("frame_skip", config.frame_skip_factor().to_string());
        snapshot.push("start_time", config.start_timecode());
        snapshot.push("end_time", config.end_timecode());
        snapshot.push("color_filter", config.color_filter().to_string());
        snapshot
    }

    /// Append a setting. An existing key keeps its position and takes the
    /// new value.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvidenceEntry {
    /// Zero-based source frame number (`position - 1`).
    pub frame_number: u64,
    /// Source time as `HH:MM:SS`.
    pub timestamp: String,
    pub detection_count: usize,
    pub frame_image: Frame,
    pub filters_used: FilterSnapshot,
}

#[derive(Debug, Default)]
pub struct EvidenceRecorder {
    entries: Vec<EvidenceEntry>,
}

impl EvidenceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a frame result if it carries validated detections.
    ///
    /// The timestamp is reconstructed here as `(position - 1) / fps`,
    /// independently of the engine. Returns whether an entry was appended.
    pub fn on_frame_result(&mut self, result: &FrameResult, filters: &FilterSnapshot) -> bool {
        if result.validated_detection_count == 0 {
            return false;
        }
        let seconds = if result.video_fps > 0.0 && result.source_frame_position >= 1.0 {
            (result.source_frame_position - 1.0) / result.video_fps
        } else {
            0.0
        };
        let frame_number = if result.source_frame_position >= 1.0 {
            (result.source_frame_position - 1.0) as u64
        } else {
            0
        };
        self.entries.push(EvidenceEntry {
            frame_number,
            timestamp: format_timecode(seconds),
            detection_count: result.validated_detection_count,
            frame_image: result.annotated_frame.clone(),
            filters_used: filters.clone(),
        });
        log::debug!(
            "evidence #{}: frame {} at {} ({} detections)",
            self.entries.len(),
            frame_number,
            format_timecode(seconds),
            result.validated_detection_count
        );
        true
    }

    pub fn entries(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorFilter;

    fn result(count: usize, position: f64, fps: f64) -> FrameResult {
        FrameResult {
            annotated_frame: Frame::filled(4, 4, [1, 2, 3]),
            detections: Vec::new(),
            validated_detection_count: count,
            frame_index: 1,
            source_frame_position: position,
            video_fps: fps,
        }
    }

    #[test]
    fn ignores_frames_without_detections() {
        let mut recorder = EvidenceRecorder::new();
        assert!(!recorder.on_frame_result(&result(0, 10.0, 30.0), &FilterSnapshot::new()));
        assert!(recorder.is_empty());
    }

    #[test]
    fn reconstructs_timestamp_from_position() {
        let mut recorder = EvidenceRecorder::new();
        recorder.on_frame_result(&result(2, 301.0, 30.0), &FilterSnapshot::new());
        recorder.on_frame_result(&result(1, 3_601.0 * 25.0, 25.0), &FilterSnapshot::new());
        let entries = recorder.entries();
        assert_eq!(entries[0].frame_number, 300);
        assert_eq!(entries[0].timestamp, "00:00:10");
        assert_eq!(entries[0].detection_count, 2);
        assert_eq!(entries[1].timestamp, "01:00:00");
    }

    #[test]
    fn snapshot_is_captured_per_entry() {
        let mut recorder = EvidenceRecorder::new();
        let mut filters = FilterSnapshot::new();
        filters.push("color_filter", "Red");
        recorder.on_frame_result(&result(1, 1.0, 30.0), &filters);
        filters.push("color_filter", "Blue");
        recorder.on_frame_result(&result(1, 2.0, 30.0), &filters);
        assert_eq!(recorder.entries()[0].filters_used.get("color_filter"), Some("Red"));
        assert_eq!(recorder.entries()[1].filters_used.get("color_filter"), Some("Blue"));
        assert_eq!(recorder.entries()[1].filters_used.pairs().len(), 1);
        recorder.clear();
        assert_eq!(recorder.len(), 0);
    }

    #[test]
    fn snapshot_from_config_order() {
        let config = AnalysisConfig::builder()
            .target_class_ids([2, 0])
            .confidence_threshold(0.5)
            .frame_skip_factor(3)
            .time_range(5.0, Some(65.0))
            .color_filter(ColorFilter::parse("yellow"))
            .build()
            .unwrap();
        let snapshot = FilterSnapshot::from_config(&config);
        let pairs: Vec<(&str, &str)> = snapshot
            .pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("target_objects", "person, car"),
                ("conf_threshold", "0.50"),
                ("frame_skip", "3"),
                ("start_time", "00:00:05"),
                ("end_time", "00:01:05"),
                ("color_filter", "Yellow"),
            ]
        );
    }
}
