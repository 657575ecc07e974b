//! Dominant colour matching for detection regions.
//!
//! Regions are converted to 8-bit HSV with the usual vision-library scaling
//! (H: 0..=180, S: 0..=255, V: 0..=255). A region matches a named colour when
//! the share of pixels falling inside any of that colour's ranges exceeds a
//! threshold. Red wraps around the hue circle and therefore has two ranges.

use std::fmt;
use std::str::FromStr;

use image::RgbImage;

/// Share of matching pixels a region must exceed.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.20;

/// Inclusive HSV bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }
}

const WHITE: &[HsvRange] = &[HsvRange::new([0, 0, 180], [180, 50, 255])];
// Loose saturation bound keeps dark footage from missing black objects.
const BLACK: &[HsvRange] = &[HsvRange::new([0, 0, 0], [180, 150, 80])];
const RED: &[HsvRange] = &[
    HsvRange::new([0, 50, 50], [10, 255, 255]),
    HsvRange::new([170, 50, 50], [180, 255, 255]),
];
const BLUE: &[HsvRange] = &[HsvRange::new([100, 50, 50], [140, 255, 255])];
const GREEN: &[HsvRange] = &[HsvRange::new([40, 50, 50], [80, 255, 255])];
const YELLOW: &[HsvRange] = &[HsvRange::new([20, 50, 50], [40, 255, 255])];

/// Colours with a fixed range table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorName {
    White,
    Black,
    Red,
    Blue,
    Green,
    Yellow,
}

impl ColorName {
    pub const ALL: [ColorName; 6] = [
        ColorName::White,
        ColorName::Black,
        ColorName::Red,
        ColorName::Blue,
        ColorName::Green,
        ColorName::Yellow,
    ];

    pub fn ranges(self) -> &'static [HsvRange] {
        match self {
            ColorName::White => WHITE,
            ColorName::Black => BLACK,
            ColorName::Red => RED,
            ColorName::Blue => BLUE,
            ColorName::Green => GREEN,
            ColorName::Yellow => YELLOW,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorName::White => "White",
            ColorName::Black => "Black",
            ColorName::Red => "Red",
            ColorName::Blue => "Blue",
            ColorName::Green => "Green",
            ColorName::Yellow => "Yellow",
        }
    }

    fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        ColorName::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(name))
    }
}

/// Range table lookup. Unknown names carry no constraint.
pub fn hsv_ranges(color_name: &str) -> Option<&'static [HsvRange]> {
    ColorName::lookup(color_name).map(ColorName::ranges)
}

/// Colour filter selected for a run.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ColorFilter {
    /// The "none" sentinel: the colour stage is skipped entirely.
    #[default]
    Disabled,
    Named(ColorName),
    /// A name outside the table. Evaluated, but always matches.
    Unrecognized(String),
}

impl ColorFilter {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return ColorFilter::Disabled;
        }
        match ColorName::lookup(trimmed) {
            Some(name) => ColorFilter::Named(name),
            None => ColorFilter::Unrecognized(trimmed.to_string()),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, ColorFilter::Disabled)
    }

    /// Test a cropped region against this filter.
    pub fn matches(&self, region: &RgbImage, threshold: f32) -> bool {
        match self {
            ColorFilter::Disabled | ColorFilter::Unrecognized(_) => true,
            ColorFilter::Named(name) => region_matches(region, name.ranges(), threshold),
        }
    }
}

impl FromStr for ColorFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ColorFilter::parse(s))
    }
}

impl fmt::Display for ColorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorFilter::Disabled => f.write_str("None"),
            ColorFilter::Named(name) => f.write_str(name.label()),
            ColorFilter::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// True when `color_name` is "none", the region is empty, the name is not in
/// the range table, or more than `threshold` of the pixels fall in range.
pub fn is_match(region: &RgbImage, color_name: &str, threshold: f32) -> bool {
    if color_name.trim().eq_ignore_ascii_case("none") {
        return true;
    }
    match hsv_ranges(color_name) {
        Some(ranges) => region_matches(region, ranges, threshold),
        None => true,
    }
}

fn region_matches(region: &RgbImage, ranges: &[HsvRange], threshold: f32) -> bool {
    let total = region.width() as u64 * region.height() as u64;
    if total == 0 {
        return true;
    }
    let matching = region
        .pixels()
        .filter(|px| {
            let hsv = rgb_to_hsv(px.0);
            ranges.iter().any(|range| range.contains(hsv))
        })
        .count() as u64;
    (matching as f64 / total as f64) > threshold as f64
}

/// 8-bit RGB to HSV with hue halved into 0..=180.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().clamp(0.0, 180.0) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        v as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(rgb))
    }

    #[test]
    fn hsv_conversion_matches_reference_points() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 255, 0]), [30, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        // Magenta-ish red lands on the high end of the hue circle.
        assert_eq!(rgb_to_hsv([255, 0, 40])[0], 175);
    }

    #[test]
    fn none_always_matches() {
        assert!(is_match(&solid(4, 4, [0, 0, 255]), "none", 0.2));
        assert!(is_match(&solid(4, 4, [0, 0, 255]), "None", 0.2));
        assert!(is_match(&RgbImage::new(0, 0), "none", 0.2));
    }

    #[test]
    fn empty_region_always_matches() {
        assert!(is_match(&RgbImage::new(0, 5), "red", 0.2));
    }

    #[test]
    fn pure_red_matches_red_not_blue() {
        let red = solid(8, 8, [255, 0, 0]);
        let blue = solid(8, 8, [0, 0, 255]);
        assert!(is_match(&red, "red", DEFAULT_MATCH_THRESHOLD));
        assert!(!is_match(&blue, "red", DEFAULT_MATCH_THRESHOLD));
        assert!(is_match(&blue, "Blue", DEFAULT_MATCH_THRESHOLD));
    }

    #[test]
    fn red_matches_across_hue_wrap() {
        let wrapped = solid(3, 3, [255, 0, 40]);
        assert!(is_match(&wrapped, "red", DEFAULT_MATCH_THRESHOLD));
    }

    #[test]
    fn threshold_is_strict() {
        // 1 of 5 pixels red: exactly 0.20, which does not exceed the threshold.
        let mut region = solid(5, 1, [0, 0, 255]);
        region.put_pixel(0, 0, Rgb([255, 0, 0]));
        assert!(!is_match(&region, "red", 0.20));
        region.put_pixel(1, 0, Rgb([255, 0, 0]));
        assert!(is_match(&region, "red", 0.20));
    }

    #[test]
    fn unknown_colour_is_unconstrained() {
        assert!(hsv_ranges("purple").is_none());
        assert!(is_match(&solid(2, 2, [0, 0, 0]), "purple", 0.2));
        assert_eq!(hsv_ranges("red").map(|r| r.len()), Some(2));
    }

    #[test]
    fn filter_parsing_and_display() {
        assert_eq!(ColorFilter::parse("None"), ColorFilter::Disabled);
        assert_eq!(ColorFilter::parse(""), ColorFilter::Disabled);
        assert_eq!(ColorFilter::parse("yellow"), ColorFilter::Named(ColorName::Yellow));
        assert_eq!(
            ColorFilter::parse("teal"),
            ColorFilter::Unrecognized("teal".to_string())
        );
        assert_eq!(ColorFilter::parse("GREEN").to_string(), "Green");
        assert_eq!(ColorFilter::Disabled.to_string(), "None");
    }

    #[test]
    fn white_and_black_ranges() {
        assert!(is_match(&solid(2, 2, [250, 250, 250]), "white", 0.2));
        assert!(is_match(&solid(2, 2, [10, 10, 10]), "black", 0.2));
        assert!(!is_match(&solid(2, 2, [10, 10, 10]), "white", 0.2));
    }
}
