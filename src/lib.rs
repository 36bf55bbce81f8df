//! Uniform-Capture: frame acquisition and pixel uniformity checking over V4L2
//!
//! This library negotiates a packed 4:2:2 format with a capture device, streams
//! frames through a small ring of memory-mapped buffers and checks every frame
//! for whole-frame pixel uniformity. Device access sits behind traits, so the
//! pipeline runs against real hardware and against mock devices alike.

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod negotiate;
pub mod pool;
mod raw;
pub mod streaming;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use analyzer::{check_uniform, decode_pixel, Pixel, Uniformity};
pub use capture::{CaptureLoop, CaptureState, CaptureSummary};
pub use config::CaptureConfig;
pub use device::V4L2Device;
pub use error::{CameraError, Result, Warning};
pub use streaming::{Dequeued, FrameLease, Streaming};
pub use traits::{
    CameraDevice, CaptureStream, DeviceCapabilities, FieldOrder, Format, FourCC, FrameDescriptor,
    FrameInterval, FrameMetadata, Readiness,
};
