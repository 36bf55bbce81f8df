//! Core traits and types for V4L2 camera abstraction.

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Pixel format representation (e.g., YUYV, MJPG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Field order of the captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    /// Driver picks.
    Any,
    /// Progressive scan.
    Progressive,
    /// Both fields interleaved line by line.
    Interlaced,
    /// Any other layout (sequential, alternate, single field).
    Other,
}

impl From<v4l::format::FieldOrder> for FieldOrder {
    fn from(order: v4l::format::FieldOrder) -> Self {
        use v4l::format::FieldOrder as V4l;
        match order {
            V4l::Any => Self::Any,
            V4l::Progressive => Self::Progressive,
            V4l::Interlaced => Self::Interlaced,
            _ => Self::Other,
        }
    }
}

impl From<FieldOrder> for v4l::format::FieldOrder {
    fn from(order: FieldOrder) -> Self {
        match order {
            FieldOrder::Progressive => Self::Progressive,
            FieldOrder::Interlaced => Self::Interlaced,
            FieldOrder::Any | FieldOrder::Other => Self::Any,
        }
    }
}

/// Video capture format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Field order.
    pub field_order: FieldOrder,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// Bytes per pixel of the packed 4:2:2 layout.
    pub const BYTES_PER_PIXEL: u32 = 2;

    /// Create a format with the packed 4:2:2 stride and size.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let stride = width.saturating_mul(Self::BYTES_PER_PIXEL);
        let size = stride.saturating_mul(height);
        Self {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            stride,
            size,
        }
    }

    /// Set the requested field order.
    #[must_use]
    pub const fn with_field_order(mut self, field_order: FieldOrder) -> Self {
        self.field_order = field_order;
        self
    }
}

impl From<v4l::Format> for Format {
    fn from(fmt: v4l::Format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
            field_order: FieldOrder::from(fmt.field_order),
            stride: fmt.stride,
            size: fmt.size,
        }
    }
}

/// Time between two frames, as a fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInterval {
    /// Numerator.
    pub numerator: u32,
    /// Denominator.
    pub denominator: u32,
}

impl FrameInterval {
    /// Interval of one frame at `fps` frames per second.
    #[must_use]
    pub const fn from_fps(fps: u32) -> Self {
        Self {
            numerator: 1,
            denominator: fps,
        }
    }
}

impl fmt::Display for FrameInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<v4l::Fraction> for FrameInterval {
    fn from(frac: v4l::Fraction) -> Self {
        Self {
            numerator: frac.numerator,
            denominator: frac.denominator,
        }
    }
}

impl From<FrameInterval> for v4l::Fraction {
    fn from(interval: FrameInterval) -> Self {
        Self::new(interval.numerator, interval.denominator)
    }
}

/// Streaming parameters reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Current frame interval.
    pub interval: FrameInterval,
    /// Whether the driver accepts a custom frame interval.
    pub interval_adjustable: bool,
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// Per-dequeue description of a filled buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor {
    /// Slot index of the filled buffer.
    pub index: usize,
    /// Frame metadata reported by the driver.
    pub metadata: FrameMetadata,
}

/// Outcome of a bounded wait for frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The device signals readable.
    Ready,
    /// The deadline passed without data.
    TimedOut,
    /// The wait was interrupted by a signal and may be retried.
    Interrupted,
}

/// Abstraction over camera device operations.
pub trait CameraDevice {
    /// The stream type returned by `create_stream`.
    type Stream<'a>: CaptureStream
    where
        Self: 'a;

    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Get current format.
    fn format(&self) -> Result<Format>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Reset the cropping rectangle to the driver default.
    fn reset_crop(&mut self) -> Result<()>;

    /// Get current streaming parameters.
    fn params(&self) -> Result<StreamParams>;

    /// Set the frame interval. Returns the interval the driver applied.
    fn set_frame_interval(&mut self, interval: FrameInterval) -> Result<FrameInterval>;

    /// Request `buffer_count` memory-mapped buffers and map them.
    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>>;
}

/// Abstraction over a stream of kernel-owned, memory-mapped buffers.
///
/// Implementations only forward calls to the driver. Slot ownership is
/// tracked one level up, by [`crate::pool::BufferPool`].
pub trait CaptureStream {
    /// Number of buffers the driver granted.
    fn buffer_count(&self) -> usize;

    /// Mapped bytes of the buffer at `index`, including driver padding.
    fn buffer(&self, index: usize) -> Option<&[u8]>;

    /// Hand the buffer at `index` to the driver for filling.
    fn queue(&mut self, index: usize) -> Result<()>;

    /// Start streaming.
    fn start(&mut self) -> Result<()>;

    /// Stop streaming. The driver gives back every queued buffer.
    fn stop(&mut self) -> Result<()>;

    /// Block until a filled buffer is available or `timeout` elapses.
    fn wait_readable(&mut self, timeout: Duration) -> Result<Readiness>;

    /// Take the next filled buffer from the driver.
    ///
    /// Returns `Ok(None)` when no buffer is ready yet.
    fn dequeue(&mut self) -> Result<Option<FrameDescriptor>>;
}
