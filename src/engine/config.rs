use std::collections::BTreeSet;

use crate::color::ColorFilter;
use crate::detect::classes::{self, DEFAULT_TARGET_CLASSES};
use crate::error::ConfigError;
use crate::timecode::{format_timecode, parse_timecode};

pub const DEFAULT_CONFIDENCE: f32 = 0.25;

/// Settings for one analysis run. Validated on construction and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    target_class_ids: BTreeSet<u32>,
    confidence_threshold: f32,
    frame_skip_factor: u32,
    start_second: f64,
    end_second: Option<f64>,
    color_filter: ColorFilter,
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    pub fn target_class_ids(&self) -> &BTreeSet<u32> {
        &self.target_class_ids
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn frame_skip_factor(&self) -> u32 {
        self.frame_skip_factor
    }

    pub fn start_second(&self) -> f64 {
        self.start_second
    }

    /// `None` means the run continues to the end of the video.
    pub fn end_second(&self) -> Option<f64> {
        self.end_second
    }

    pub fn color_filter(&self) -> &ColorFilter {
        &self.color_filter
    }

    /// Target classes by name, in class id order.
    pub fn target_class_names(&self) -> String {
        classes::describe_classes(&self.target_class_ids)
    }

    pub fn start_timecode(&self) -> String {
        format_timecode(self.start_second)
    }

    pub fn end_timecode(&self) -> String {
        match self.end_second {
            Some(end) => format_timecode(end),
            None => "unbounded".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfigBuilder::default().into_config()
    }
}

#[derive(Clone, Debug)]
pub struct AnalysisConfigBuilder {
    target_class_ids: BTreeSet<u32>,
    confidence_threshold: f32,
    frame_skip_factor: u32,
    start_second: f64,
    end_second: Option<f64>,
    color_filter: ColorFilter,
}

impl Default for AnalysisConfigBuilder {
    fn default() -> Self {
        let target_class_ids = DEFAULT_TARGET_CLASSES
            .iter()
            .filter_map(|name| classes::class_id_for_name(name))
            .collect();
        Self {
            target_class_ids,
            confidence_threshold: DEFAULT_CONFIDENCE,
            frame_skip_factor: 1,
            start_second: 0.0,
            end_second: None,
            color_filter: ColorFilter::Disabled,
        }
    }
}

impl AnalysisConfigBuilder {
    pub fn target_class_ids<I: IntoIterator<Item = u32>>(mut self, ids: I) -> Self {
        self.target_class_ids = ids.into_iter().collect();
        self
    }

    /// Select targets by name from the investigation class table.
    pub fn target_class_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, ConfigError> {
        self.target_class_ids = classes::resolve_class_names(names)?;
        Ok(self)
    }

    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn frame_skip_factor(mut self, factor: u32) -> Self {
        self.frame_skip_factor = factor;
        self
    }

    pub fn time_range(mut self, start_second: f64, end_second: Option<f64>) -> Self {
        self.start_second = start_second;
        self.end_second = end_second;
        self
    }

    /// Set the time range from `H:MM:SS` text.
    pub fn timecodes(self, start: &str, end: Option<&str>) -> Result<Self, ConfigError> {
        let (start, end) = parse_time_range(start, end)?;
        Ok(self.time_range(start, end))
    }

    pub fn color_filter(mut self, filter: ColorFilter) -> Self {
        self.color_filter = filter;
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        if self.target_class_ids.is_empty() {
            return Err(ConfigError::NoTargetClasses);
        }
        let confidence = self.confidence_threshold;
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(ConfigError::InvalidConfidence(confidence));
        }
        if self.frame_skip_factor == 0 {
            return Err(ConfigError::InvalidFrameSkip);
        }
        if !self.start_second.is_finite() || self.start_second < 0.0 {
            return Err(ConfigError::InvalidTimeRange(format!(
                "start {} must be a non-negative number of seconds",
                self.start_second
            )));
        }
        let end_second = match self.end_second {
            Some(end) if end.is_nan() => {
                return Err(ConfigError::InvalidTimeRange(
                    "end time is not a number".to_string(),
                ))
            }
            Some(end) if end == f64::INFINITY => None,
            other => other,
        };
        if let Some(end) = end_second {
            if self.start_second >= end {
                return Err(ConfigError::InvalidTimeRange(format!(
                    "start {} must be before end {}",
                    format_timecode(self.start_second),
                    format_timecode(end)
                )));
            }
        }
        Ok(AnalysisConfig {
            end_second,
            ..self.into_config()
        })
    }

    fn into_config(self) -> AnalysisConfig {
        AnalysisConfig {
            target_class_ids: self.target_class_ids,
            confidence_threshold: self.confidence_threshold,
            frame_skip_factor: self.frame_skip_factor,
            start_second: self.start_second,
            end_second: self.end_second,
            color_filter: self.color_filter,
        }
    }
}

/// Parse a start timecode and an optional end timecode.
///
/// A missing or blank end means "until the end of the video". The range is
/// rejected when the end is present and not after the start.
pub fn parse_time_range(start: &str, end: Option<&str>) -> Result<(f64, Option<f64>), ConfigError> {
    let start_seconds = parse_timecode(start.trim())? as f64;
    let end_seconds = match end.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => Some(parse_timecode(text)? as f64),
        None => None,
    };
    if let Some(end_seconds) = end_seconds {
        if start_seconds >= end_seconds {
            return Err(ConfigError::InvalidTimeRange(format!(
                "start {} must be before end {}",
                start.trim(),
                end.unwrap_or_default().trim()
            )));
        }
    }
    Ok((start_seconds, end_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::builder().build().unwrap();
        assert_eq!(config.target_class_names(), "person, bicycle, car, bus, truck");
        assert_eq!(config.confidence_threshold(), DEFAULT_CONFIDENCE);
        assert_eq!(config.frame_skip_factor(), 1);
        assert_eq!(config.end_second(), None);
        assert_eq!(config.end_timecode(), "unbounded");
        assert!(config.color_filter().is_disabled());
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            AnalysisConfig::builder().confidence_threshold(0.0).build(),
            Err(ConfigError::InvalidConfidence(0.0))
        );
        assert!(AnalysisConfig::builder().confidence_threshold(1.5).build().is_err());
        assert!(AnalysisConfig::builder().confidence_threshold(f32::NAN).build().is_err());
        assert!(AnalysisConfig::builder().confidence_threshold(1.0).build().is_ok());
        assert_eq!(
            AnalysisConfig::builder().frame_skip_factor(0).build(),
            Err(ConfigError::InvalidFrameSkip)
        );
        assert_eq!(
            AnalysisConfig::builder()
                .target_class_ids(Vec::new())
                .build(),
            Err(ConfigError::NoTargetClasses)
        );
        assert!(AnalysisConfig::builder().time_range(-1.0, None).build().is_err());
    }

    #[test]
    fn range_must_be_ordered() {
        assert!(matches!(
            AnalysisConfig::builder().time_range(10.0, Some(10.0)).build(),
            Err(ConfigError::InvalidTimeRange(_))
        ));
        let config = AnalysisConfig::builder()
            .time_range(10.0, Some(f64::INFINITY))
            .build()
            .unwrap();
        assert_eq!(config.end_second(), None);
    }

    #[test]
    fn parses_timecode_ranges() {
        assert_eq!(parse_time_range("00:00:10", Some("00:01:00")), Ok((10.0, Some(60.0))));
        assert_eq!(parse_time_range("0:0:0", None), Ok((0.0, None)));
        assert_eq!(parse_time_range("0:0:5", Some("  ")), Ok((5.0, None)));
        assert!(matches!(
            parse_time_range("00:02:00", Some("00:01:00")),
            Err(ConfigError::InvalidTimeRange(_))
        ));
        assert!(matches!(
            parse_time_range("25:61:00", None),
            Err(ConfigError::InvalidTimeRange(_))
        ));
        // The legacy "99:99:99" sentinel is not a valid timecode.
        assert!(parse_time_range("00:00:00", Some("99:99:99")).is_err());
    }

    #[test]
    fn builder_accepts_names_and_timecodes() {
        let config = AnalysisConfig::builder()
            .target_class_names(&["truck", "Person"])
            .unwrap()
            .timecodes("00:00:10", Some("00:00:20"))
            .unwrap()
            .color_filter(ColorFilter::parse("red"))
            .build()
            .unwrap();
        assert_eq!(config.target_class_names(), "person, truck");
        assert_eq!(config.start_timecode(), "00:00:10");
        assert_eq!(config.end_timecode(), "00:00:20");
        assert!(AnalysisConfig::builder().target_class_names(&["dragon"]).is_err());
    }
}
