//! Local video file decoding using FFmpeg.
//!
//! Frames are decoded in presentation order and converted to RGB24 in
//! memory. Seeking jumps to the nearest preceding keyframe and decodes
//! forward, discarding frames until the requested index is reached.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    time_base: f64,
    start_pts: i64,
    fps: f64,
    frame_count: u64,
    next_index: u64,
    pending: Option<ffmpeg::frame::Video>,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video file '{}' with ffmpeg", path))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = stream.index();

        let fps = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .map(f64::from)
            .find(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or_else(|| anyhow!("video stream reports no usable frame rate"))?;
        let time_base = f64::from(stream.time_base());
        let start_pts = match stream.start_time() {
            ts if ts == ffmpeg::ffi::AV_NOPTS_VALUE => 0,
            ts => ts,
        };
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if input.duration() > 0 {
            let seconds = input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
            (seconds * fps).round() as u64
        } else {
            0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!("FileSource: opened {} (ffmpeg)", path);
        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            time_base,
            start_pts,
            fps,
            frame_count,
            next_index: 0,
            pending: None,
            eof_sent: false,
        })
    }

    pub(crate) fn fps(&self) -> f64 {
        self.fps
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    pub(crate) fn codec(&self) -> String {
        format!("{:?}", self.decoder.id()).to_lowercase()
    }

    pub(crate) fn position(&self) -> f64 {
        self.next_index as f64
    }

    pub(crate) fn seek_to_frame(&mut self, index: u64) -> Result<()> {
        let seconds = index as f64 / self.fps;
        let target = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(target, ..target)
            .with_context(|| format!("failed to seek '{}' to frame {}", self.path, index))?;
        self.decoder.flush();
        self.pending = None;
        self.eof_sent = false;
        self.next_index = index;

        // Decode forward from the keyframe until the requested frame is next.
        loop {
            let Some(decoded) = self.decode_next()? else {
                return Ok(());
            };
            let decoded_index = self.index_of(&decoded);
            if decoded_index >= index {
                self.pending = Some(decoded);
                return Ok(());
            }
        }
    }

    pub(crate) fn read_frame(&mut self) -> Result<Option<Frame>> {
        let decoded = match self.pending.take() {
            Some(decoded) => decoded,
            None => match self.decode_next()? {
                Some(decoded) => decoded,
                None => return Ok(None),
            },
        };
        let index = self.index_of(&decoded);
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.next_index = index + 1;
        Ok(Some(Frame::from_rgb(width, height, pixels)?))
    }

    fn decode_next(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .context("send packet to ffmpeg decoder")?;
                }
                None => {
                    self.decoder
                        .send_eof()
                        .context("flush ffmpeg decoder at end of file")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    /// Frame index from the presentation timestamp, falling back to the
    /// running counter when the container carries no timestamps.
    fn index_of(&self, decoded: &ffmpeg::frame::Video) -> u64 {
        match decoded.timestamp().or_else(|| decoded.pts()) {
            Some(pts) => {
                let seconds = (pts - self.start_pts) as f64 * self.time_base;
                (seconds * self.fps).round().max(0.0) as u64
            }
            None => self.next_index,
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let packed = data
            .get(..len)
            .context("ffmpeg frame buffer is shorter than expected")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
