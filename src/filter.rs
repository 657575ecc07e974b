//! Detection validation and frame annotation.
//!
//! `DetectionFilterPipeline` takes raw detector output for one frame, clamps
//! every box to the frame, applies the colour filter to the clamped region
//! and draws the survivors onto a copy of the frame. The input frame is never
//! modified.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::color::{ColorFilter, DEFAULT_MATCH_THRESHOLD};
use crate::detect::RawDetection;
use crate::frame::{Frame, PixelRect};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 14.0;
const LABEL_OFFSET: i32 = 10;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A detection that survived the colour filter.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedDetection {
    pub detection: RawDetection,
    /// Bounding box clipped to the frame.
    pub region: PixelRect,
    pub class_name: String,
}

impl ValidatedDetection {
    /// `"<class> <confidence>"` with two decimals, as drawn on the frame.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class_name, self.detection.confidence)
    }
}

/// Result of filtering one frame.
#[derive(Clone, Debug)]
pub struct FilterOutput {
    pub detections: Vec<ValidatedDetection>,
    pub annotated: Frame,
}

#[derive(Clone)]
pub struct DetectionFilterPipeline {
    color_filter: ColorFilter,
    match_threshold: f32,
    annotator: Annotator,
}

impl DetectionFilterPipeline {
    pub fn new(color_filter: ColorFilter) -> Self {
        Self {
            color_filter,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            annotator: Annotator::new(),
        }
    }

    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn color_filter(&self) -> &ColorFilter {
        &self.color_filter
    }

    /// Clamp and colour-check raw detections without drawing anything.
    pub fn validate<F>(
        &self,
        frame: &Frame,
        raw: Vec<RawDetection>,
        class_name: F,
    ) -> Vec<ValidatedDetection>
    where
        F: Fn(u32) -> String,
    {
        let (width, height) = (frame.width(), frame.height());
        raw.into_iter()
            .filter_map(|detection| {
                let region = detection.bounding_box.clamp_to(width, height);
                if !self.color_filter.is_disabled()
                    && !self
                        .color_filter
                        .matches(&frame.crop(region), self.match_threshold)
                {
                    return None;
                }
                let class_name = class_name(detection.class_id);
                Some(ValidatedDetection {
                    detection,
                    region,
                    class_name,
                })
            })
            .collect()
    }

    /// Validate detections and draw them onto a copy of `frame`.
    pub fn filter<F>(&self, frame: &Frame, raw: Vec<RawDetection>, class_name: F) -> FilterOutput
    where
        F: Fn(u32) -> String,
    {
        let detections = self.validate(frame, raw, class_name);
        let mut annotated = frame.clone();
        self.annotator.annotate(annotated.image_mut(), &detections);
        FilterOutput {
            detections,
            annotated,
        }
    }
}

/// Draws detection boxes and their `"<class> <conf>"` labels.
///
/// Label text needs a TrueType font. Without one only the box is drawn and
/// the label is kept on the detection.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    scale: f32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Annotator without a font.
    pub fn new() -> Self {
        Self {
            font: None,
            scale: LABEL_SCALE,
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read label font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|err| anyhow!("invalid label font {}: {}", path.display(), err))?;
        Ok(Self::new().with_font(font))
    }

    /// Use the configured font when given, otherwise the first loadable
    /// common system font, otherwise none.
    pub fn discover(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::from_font_file(path) {
                Ok(annotator) => return annotator,
                Err(err) => log::warn!("{:#}; falling back to system fonts", err),
            }
        }
        for candidate in FONT_CANDIDATES {
            let path = Path::new(candidate);
            if !path.is_file() {
                continue;
            }
            if let Ok(annotator) = Self::from_font_file(path) {
                log::debug!("label font: {}", candidate);
                return annotator;
            }
        }
        log::debug!("no label font found; labels will not be rendered as text");
        Self::new()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(&self, image: &mut RgbImage, detections: &[ValidatedDetection]) {
        for detection in detections {
            let region = detection.region;
            if region.is_empty() {
                continue;
            }
            draw_box(image, region);
            self.draw_label(image, region, &detection.label());
        }
    }

    fn draw_label(&self, image: &mut RgbImage, region: PixelRect, label: &str) {
        let Some(font) = &self.font else {
            log::debug!("label '{}' at ({}, {})", label, region.x, region.y);
            return;
        };
        let scale = PxScale::from(self.scale);
        let (_, text_h) = text_size(scale, font, label);
        let (x, y) = label_origin(region, text_h);
        draw_text_mut(image, BOX_COLOR, x, y, scale, font, label);
    }
}

/// Top-left corner for label text whose baseline sits `LABEL_OFFSET` pixels
/// above the box. Clamped to the top of the frame.
fn label_origin(region: PixelRect, text_height: u32) -> (i32, i32) {
    let top = region.y as i32 - LABEL_OFFSET - text_height as i32;
    (region.x as i32, top.max(0))
}

fn draw_box(image: &mut RgbImage, region: PixelRect) {
    for inset in 0..BOX_THICKNESS {
        let width = region.width.saturating_sub(2 * inset);
        let height = region.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorName;
    use crate::detect::BoundingBox;

    fn frame_with_block(rgb: [u8; 3]) -> Frame {
        let mut frame = Frame::filled(60, 60, [128, 128, 128]);
        for y in 30..50 {
            for x in 10..30 {
                frame.image_mut().put_pixel(x, y, Rgb(rgb));
            }
        }
        frame
    }

    fn block_detection() -> RawDetection {
        RawDetection::new(BoundingBox::new(10.0, 30.0, 30.0, 50.0), 0.876, 0)
    }

    fn names(id: u32) -> String {
        format!("class{}", id)
    }

    #[test]
    fn disabled_filter_keeps_everything() {
        let pipeline = DetectionFilterPipeline::new(ColorFilter::Disabled);
        let frame = frame_with_block([0, 0, 255]);
        let out = pipeline.filter(&frame, vec![block_detection(), block_detection()], names);
        assert_eq!(out.detections.len(), 2);
        assert_eq!(out.detections[0].label(), "class0 0.88");
    }

    #[test]
    fn colour_filter_drops_mismatched_regions() {
        let frame = frame_with_block([0, 0, 255]);
        let red = DetectionFilterPipeline::new(ColorFilter::Named(ColorName::Red));
        assert!(red.filter(&frame, vec![block_detection()], names).detections.is_empty());

        let blue = DetectionFilterPipeline::new(ColorFilter::Named(ColorName::Blue));
        assert_eq!(blue.filter(&frame, vec![block_detection()], names).detections.len(), 1);
    }

    #[test]
    fn unrecognized_colour_passes() {
        let frame = frame_with_block([0, 0, 255]);
        let pipeline = DetectionFilterPipeline::new(ColorFilter::parse("teal"));
        assert_eq!(pipeline.filter(&frame, vec![block_detection()], names).detections.len(), 1);
    }

    #[test]
    fn edge_boxes_are_clamped() {
        let frame = Frame::filled(40, 30, [255, 0, 0]);
        let pipeline = DetectionFilterPipeline::new(ColorFilter::Named(ColorName::Red));
        let raw = vec![
            RawDetection::new(BoundingBox::new(-5.0, -5.0, 50.0, 50.0), 0.9, 0),
            RawDetection::new(BoundingBox::new(39.0, 29.0, 45.0, 35.0), 0.9, 0),
            RawDetection::new(BoundingBox::new(60.0, 60.0, 80.0, 80.0), 0.9, 0),
        ];
        let out = pipeline.filter(&frame, raw, names);
        assert_eq!(out.detections.len(), 3);
        assert_eq!(out.detections[0].region, PixelRect::new(0, 0, 40, 30));
        assert_eq!(out.detections[1].region, PixelRect::new(39, 29, 1, 1));
        assert!(out.detections[2].region.is_empty());
    }

    #[test]
    fn annotation_works_on_a_copy() {
        let frame = frame_with_block([0, 0, 255]);
        let before = frame.clone();
        let pipeline = DetectionFilterPipeline::new(ColorFilter::Disabled);
        let out = pipeline.filter(&frame, vec![block_detection()], names);
        assert_eq!(frame, before);
        assert_ne!(out.annotated, frame);
        // Two-pixel outline at the bottom-right corner, interior untouched.
        assert_eq!(out.annotated.image().get_pixel(29, 49), &BOX_COLOR);
        assert_eq!(out.annotated.image().get_pixel(28, 48), &BOX_COLOR);
        assert_eq!(out.annotated.image().get_pixel(20, 40).0, [0, 0, 255]);
        // Without a font nothing is drawn above the box.
        assert_eq!(out.annotated.image().get_pixel(12, 20).0, [128, 128, 128]);
        assert_eq!(out.annotated.image().get_pixel(12, 5).0, [128, 128, 128]);
    }

    #[test]
    fn label_baseline_sits_above_the_box() {
        assert_eq!(label_origin(PixelRect::new(10, 30, 20, 20), 11), (10, 9));
        assert_eq!(label_origin(PixelRect::new(4, 5, 20, 20), 11), (4, 0));
    }

    #[test]
    fn no_detections_leaves_frame_untouched() {
        let frame = frame_with_block([0, 0, 255]);
        let pipeline = DetectionFilterPipeline::new(ColorFilter::Disabled);
        let out = pipeline.filter(&frame, Vec::new(), names);
        assert!(out.detections.is_empty());
        assert_eq!(out.annotated, frame);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(Annotator::from_font_file(Path::new("/no/such/font.ttf")).is_err());
        assert!(!Annotator::new().has_font());
    }
}
