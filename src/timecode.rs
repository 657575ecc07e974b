//! `HH:MM:SS` timecodes and human-readable durations.

use std::sync::OnceLock;

use crate::error::TimecodeError;

/// Parse `H:M:S` into whole seconds.
///
/// Hours are unbounded; minutes and seconds must be below 60. Any other shape
/// (missing fields, signs, whitespace, non-digits) is rejected.
pub fn parse_timecode(text: &str) -> Result<u64, TimecodeError> {
    static TIMECODE_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = TIMECODE_RE.get_or_init(|| {
        regex::Regex::new(r"^(\d+):(\d+):(\d+)$").expect("static timecode pattern")
    });

    let invalid = || TimecodeError::InvalidFormat(text.to_string());
    let caps = re.captures(text).ok_or_else(invalid)?;
    let field = |idx: usize| -> Result<u64, TimecodeError> {
        caps[idx].parse::<u64>().map_err(|_| invalid())
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .ok_or_else(invalid)
}

/// Format seconds as `HH:MM:SS`, truncating fractions.
///
/// The hours field grows past two digits for long recordings instead of
/// wrapping. Negative and non-finite inputs format as `00:00:00`.
pub fn format_timecode(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Format seconds as `"M min S secs"`, or `"S secs"` under a minute.
pub fn format_duration(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    let m = total / 60;
    let s = total % 60;
    if m == 0 {
        format!("{} secs", s)
    } else {
        format!("{} min {} secs", m, s)
    }
}

/// Source time of the frame just read, from the decoder's next-frame position.
///
/// `position` is the index of the next frame to be read, so the frame that was
/// just returned sits at `position - 1`.
pub fn frame_time_seconds(position: f64, fps: f64) -> f64 {
    if fps <= 0.0 || !fps.is_finite() || position < 1.0 {
        return 0.0;
    }
    (position - 1.0) / fps
}

fn whole_seconds(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    seconds.trunc() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_unpadded_and_long_hours() {
        assert_eq!(parse_timecode("0:0:0"), Ok(0));
        assert_eq!(parse_timecode("00:01:05"), Ok(65));
        assert_eq!(parse_timecode("1:2:3"), Ok(3723));
        assert_eq!(parse_timecode("125:00:01"), Ok(450_001));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for bad in [
            "25:61:00", "1:2", "ab:cd:ef", "", "1:2:3:4", "00:00:60", "-1:00:00", " 1:00:00",
            "1:00:00 ", "1::00", "99:99:99",
        ] {
            assert_eq!(
                parse_timecode(bad),
                Err(TimecodeError::InvalidFormat(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_hour_overflow() {
        assert!(parse_timecode("99999999999999999999:00:00").is_err());
    }

    #[test]
    fn format_round_trips_through_parse() {
        for s in (0..4000u64).chain([86_399, 86_400, 360_000, 3_600_000]) {
            assert_eq!(parse_timecode(&format_timecode(s as f64)), Ok(s));
        }
    }

    #[test]
    fn format_truncates_and_pads() {
        assert_eq!(format_timecode(9.999), "00:00:09");
        assert_eq!(format_timecode(3723.0), "01:02:03");
        assert_eq!(format_timecode(360_000.0), "100:00:00");
        assert_eq!(format_timecode(-3.0), "00:00:00");
        assert_eq!(format_timecode(f64::NAN), "00:00:00");
    }

    #[test]
    fn duration_omits_zero_minutes() {
        assert_eq!(format_duration(45.0), "45 secs");
        assert_eq!(format_duration(71.0), "1 min 11 secs");
        assert_eq!(format_duration(0.0), "0 secs");
        assert_eq!(format_duration(600.9), "10 min 0 secs");
    }

    #[test]
    fn frame_time_uses_previous_position() {
        assert_eq!(frame_time_seconds(301.0, 30.0), 10.0);
        assert_eq!(frame_time_seconds(1.0, 25.0), 0.0);
        assert_eq!(frame_time_seconds(0.0, 25.0), 0.0);
        assert_eq!(frame_time_seconds(10.0, 0.0), 0.0);
    }
}
