//! Error and warning types for capture operations.
//!
//! Fatal conditions are reported as [`CameraError`] and end the capture run.
//! Tolerated conditions are reported as [`Warning`] values and only logged.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::traits::FourCC;

/// Fatal error for camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device node does not exist.
    #[error("Cannot open '{}': no such device", .0.display())]
    NotFound(PathBuf),
    /// The device node exists but cannot be opened read/write.
    #[error("Cannot open '{}': permission denied", .0.display())]
    PermissionDenied(PathBuf),
    /// The device lacks video capture or streaming I/O support.
    #[error("Not a video capture device: {0}")]
    NotACaptureDevice(String),
    /// The device refused a mode the pipeline depends on.
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),
    /// The driver granted fewer buffers than double-buffering needs.
    #[error("Insufficient buffer memory: device granted {granted} buffers, need at least {required}")]
    InsufficientBuffers {
        /// Number of buffers the driver granted.
        granted: usize,
        /// Minimum number of buffers required.
        required: usize,
    },
    /// A granted buffer could not be mapped into process memory.
    #[error("Failed to map buffer {index}")]
    MapFailed {
        /// Slot index of the buffer.
        index: usize,
    },
    /// The driver reported a format the pipeline cannot work with.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// A buffer changed hands out of protocol order.
    #[error("Buffer ownership violation: {0}")]
    Protocol(String),
    /// No frame became ready within the readiness deadline.
    #[error("No frame ready within {0:?}")]
    Timeout(Duration),
    /// A device call failed with an OS error.
    #[error("{op} error {}, {source}", .source.raw_os_error().unwrap_or(0))]
    Io {
        /// Name of the failing operation (e.g. `VIDIOC_STREAMON`).
        op: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl CameraError {
    /// Wrap an OS error with the name of the operation that produced it.
    pub const fn io(op: &'static str, source: io::Error) -> Self {
        Self::Io { op, source }
    }

    /// Raw OS error code, if this error came from a device call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Tolerated condition: logged, execution continues.
#[derive(Debug, Error)]
pub enum Warning {
    /// Cropping could not be queried or reset to the default rectangle.
    #[error("crop reset unavailable: {0}")]
    CropUnavailable(#[source] CameraError),
    /// The requested frame interval could not be queried or applied.
    #[error("unable to set frame interval: {0}")]
    FrameIntervalUnavailable(#[source] CameraError),
    /// The driver substituted a different pixel encoding.
    #[error("camera doesn't support {requested}, using format: {applied}")]
    EncodingSubstituted {
        /// Encoding that was requested.
        requested: FourCC,
        /// Encoding the driver applied.
        applied: FourCC,
    },
}
