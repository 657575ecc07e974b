//! Decoded video frames.
//!
//! - `Frame`: owned RGB24 pixel buffer produced by an ingest source.
//! - `PixelRect`: an in-bounds integer rectangle used to crop regions.
//!
//! Frames are handed to the detector by reference and are never mutated by
//! the filter stage; annotation always works on a copy.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};

/// Owned RGB24 frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap tightly packed RGB24 bytes (`width * height * 3`).
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Solid-colour frame, mostly for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Raw RGB24 bytes, row-major.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Copy out a region. The rectangle is clipped to the frame first; an
    /// empty intersection yields an empty image.
    pub fn crop(&self, rect: PixelRect) -> RgbImage {
        let rect = rect.clip_to(self.width(), self.height());
        if rect.is_empty() {
            return RgbImage::new(0, 0);
        }
        imageops::crop_imm(&self.image, rect.x, rect.y, rect.width, rect.height).to_image()
    }
}

/// Integer rectangle in pixel space (`x..x+width`, `y..y+height`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn clip_to(self, frame_width: u32, frame_height: u32) -> Self {
        let x = self.x.min(frame_width);
        let y = self.y.min(frame_height);
        let x2 = self.x.saturating_add(self.width).min(frame_width);
        let y2 = self.y.saturating_add(self.height).min(frame_height);
        Self {
            x,
            y,
            width: x2 - x,
            height: y2 - y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_validates_length() {
        assert!(Frame::from_rgb(2, 2, vec![0u8; 12]).is_ok());
        assert!(Frame::from_rgb(2, 2, vec![0u8; 11]).is_err());
    }

    #[test]
    fn crop_clips_to_frame() {
        let frame = Frame::filled(10, 8, [1, 2, 3]);
        let region = frame.crop(PixelRect::new(6, 4, 20, 20));
        assert_eq!(region.dimensions(), (4, 4));
        assert_eq!(region.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn crop_outside_frame_is_empty() {
        let frame = Frame::filled(10, 8, [0, 0, 0]);
        let region = frame.crop(PixelRect::new(12, 0, 5, 5));
        assert_eq!(region.dimensions(), (0, 0));
    }
}
