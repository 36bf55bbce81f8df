//! Capture configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::traits::{FieldOrder, FourCC, Format, FrameInterval};

/// Fixed parameters of a capture run.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device node to open.
    pub device_path: PathBuf,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Requested pixel encoding.
    pub fourcc: FourCC,
    /// Requested field order.
    pub field_order: FieldOrder,
    /// Requested frame interval, applied only if the driver allows it.
    pub frame_interval: FrameInterval,
    /// Number of buffers requested from the driver.
    pub buffer_count: u32,
    /// Fewest granted buffers the pipeline accepts.
    pub min_buffers: usize,
    /// Deadline for each readiness wait.
    pub wait_timeout: Duration,
    /// Number of frames processed before the run ends.
    pub max_frames: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video0"),
            width: 1920,
            height: 1080,
            fourcc: FourCC::YUYV,
            field_order: FieldOrder::Interlaced,
            frame_interval: FrameInterval::from_fps(60),
            buffer_count: 4,
            min_buffers: 2,
            wait_timeout: Duration::from_secs(2),
            max_frames: 100,
        }
    }
}

impl CaptureConfig {
    /// Set the device node.
    #[must_use]
    pub fn with_device_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.device_path = path.into();
        self
    }

    /// Set the requested resolution.
    #[must_use]
    pub const fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the readiness deadline.
    #[must_use]
    pub const fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Set the number of frames to process.
    #[must_use]
    pub const fn with_max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Format requested during negotiation.
    #[must_use]
    pub const fn requested_format(&self) -> Format {
        Format::new(self.width, self.height, self.fourcc).with_field_order(self.field_order)
    }
}
