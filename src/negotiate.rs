//! Capability check and format negotiation.
//!
//! The driver may silently change the requested resolution or encoding. The
//! format read back from the driver is authoritative for everything
//! downstream: buffer sizing and pixel decoding.

use tracing::{debug, info};

use crate::config::CaptureConfig;
use crate::error::{CameraError, Result, Warning};
use crate::traits::{CameraDevice, Format, FrameInterval};

/// Outcome of a successful negotiation.
#[derive(Debug)]
pub struct Negotiated {
    /// Format applied by the driver, with stride and size floors applied.
    pub format: Format,
    /// Frame interval in effect, if the driver reported one.
    pub frame_interval: Option<FrameInterval>,
    /// Tolerated problems met along the way.
    pub warnings: Vec<Warning>,
}

/// Configure `device` for capture as described by `config`.
pub fn negotiate<D: CameraDevice>(device: &mut D, config: &CaptureConfig) -> Result<Negotiated> {
    let mut warnings = Vec::new();

    let caps = device.capabilities();
    if !caps.can_capture {
        return Err(CameraError::NotACaptureDevice(format!(
            "{} has no video capture support",
            caps.card
        )));
    }
    if !caps.can_stream {
        return Err(CameraError::NotACaptureDevice(format!(
            "{} does not support streaming i/o",
            caps.card
        )));
    }

    if let Err(err) = device.reset_crop() {
        debug!(error = %err, "crop reset skipped");
        warnings.push(Warning::CropUnavailable(err));
    }

    let requested = config.requested_format();
    let applied = device.set_format(&requested)?;
    if applied.width == 0 || applied.height == 0 {
        return Err(CameraError::InvalidFormat(format!(
            "driver applied {}x{}",
            applied.width, applied.height
        )));
    }
    if applied.fourcc != requested.fourcc {
        warnings.push(Warning::EncodingSubstituted {
            requested: requested.fourcc,
            applied: applied.fourcc,
        });
    }
    info!(
        width = applied.width,
        height = applied.height,
        fourcc = %applied.fourcc,
        "Format set"
    );

    let frame_interval = match apply_frame_interval(device, config.frame_interval) {
        Ok(interval) => interval,
        Err(err) => {
            warnings.push(Warning::FrameIntervalUnavailable(err));
            None
        }
    };

    Ok(Negotiated {
        format: with_layout_floors(applied),
        frame_interval,
        warnings,
    })
}

/// Set the frame interval if the driver allows it. Returns the interval in effect.
fn apply_frame_interval<D: CameraDevice>(
    device: &mut D,
    interval: FrameInterval,
) -> Result<Option<FrameInterval>> {
    let params = device.params()?;
    if !params.interval_adjustable {
        debug!(current = %params.interval, "driver has a fixed frame interval");
        return Ok(Some(params.interval));
    }

    let applied = device.set_frame_interval(interval)?;
    info!(interval = %applied, "Frame interval set");
    Ok(Some(applied))
}

/// Widen stride and size to what the 2-bytes-per-pixel layout needs.
fn with_layout_floors(mut format: Format) -> Format {
    let min_stride = format.width.saturating_mul(Format::BYTES_PER_PIXEL);
    format.stride = format.stride.max(min_stride);
    let min_size = format.stride.saturating_mul(format.height);
    format.size = format.size.max(min_size);
    format
}
