use std::path::Path;

use anyhow::{bail, Context as AnyhowContext, Result};
use cv2::prelude::*;
use opencv as cv2;

use crate::image::Image;

/// A sequence of grayscale frames.
pub trait FrameSource {
    /// The next frame, `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<&Image>>;

    /// Number of frames if the container reports it.
    fn frame_count(&self) -> Option<u64> {
        None
    }
}

/// Decodes a video file with OpenCV and converts each frame to grayscale.
pub struct VideoInput {
    capture: cv2::videoio::VideoCapture,
    color: cv2::core::Mat,
    gray: cv2::core::Mat,
    image: Image,
}

impl VideoInput {
    pub fn open(path: &Path) -> Result<VideoInput> {
        let path_str = path
            .to_str()
            .with_context(|| format!("non UTF-8 video path {}", path.display()))?;
        let capture = cv2::videoio::VideoCapture::from_file(path_str, cv2::videoio::CAP_ANY)
            .with_context(|| format!("cannot open {}", path.display()))?;
        if !capture.is_opened()? {
            bail!("cannot open {}", path.display());
        }
        Ok(VideoInput {
            capture,
            color: cv2::core::Mat::default(),
            gray: cv2::core::Mat::default(),
            image: Image::empty(),
        })
    }

    /// Frames per second, 30 when the container does not say.
    pub fn fps(&self) -> f64 {
        match self.capture.get(cv2::videoio::CAP_PROP_FPS) {
            Ok(fps) if fps > 0. => fps,
            _ => 30.,
        }
    }

    /// Colour version of the last decoded frame.
    pub fn color_frame(&self) -> &cv2::core::Mat {
        &self.color
    }
}

impl FrameSource for VideoInput {
    fn next_frame(&mut self) -> Result<Option<&Image>> {
        if !self.capture.read(&mut self.color)? || self.color.rows() == 0 {
            return Ok(None);
        }
        cv2::imgproc::cvt_color(&self.color, &mut self.gray, cv2::imgproc::COLOR_BGR2GRAY, 0)?;

        let bytes = self.gray.data_bytes()?;
        self.image.data.clear();
        self.image.data.extend_from_slice(bytes);
        self.image.width = self.gray.cols() as usize;
        self.image.height = self.gray.rows() as usize;
        Ok(Some(&self.image))
    }

    fn frame_count(&self) -> Option<u64> {
        match self.capture.get(cv2::videoio::CAP_PROP_FRAME_COUNT) {
            Ok(count) if count > 0. => Some(count as u64),
            _ => None,
        }
    }
}

/// Frames held in memory.
pub struct MemoryFrames {
    frames: Vec<Image>,
    next: usize,
}

impl MemoryFrames {
    pub fn new(frames: Vec<Image>) -> Self {
        MemoryFrames { frames, next: 0 }
    }
}

impl FrameSource for MemoryFrames {
    fn next_frame(&mut self) -> Result<Option<&Image>> {
        let frame = self.frames.get(self.next);
        if frame.is_some() {
            self.next += 1;
        }
        Ok(frame)
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }
}
