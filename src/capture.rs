//! Top-level capture loop.
//!
//! Drives one device through negotiation, buffer mapping and streaming, runs
//! the uniformity check on every frame and tears everything down in reverse
//! order of acquisition on every exit path.

use tracing::{debug, info, warn};

use crate::analyzer::{check_uniform, Uniformity};
use crate::config::CaptureConfig;
use crate::error::{CameraError, Result, Warning};
use crate::negotiate::negotiate;
use crate::pool;
use crate::streaming::{Dequeued, Streaming};
use crate::traits::{CameraDevice, Readiness};

/// Lifecycle state of a capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Device open, nothing configured.
    Idle,
    /// Format applied.
    Negotiated,
    /// Buffer pool allocated and mapped.
    BuffersMapped,
    /// Stream on, all slots queued.
    Streaming,
    /// Blocked in the readiness wait.
    WaitingForData,
    /// A frame has been dequeued.
    FrameReady,
    /// The frame has been checked and requeued.
    Analyzed,
    /// Stream off and buffers unmapped.
    Stopped,
    /// Device closed.
    Closed,
}

/// Totals of a capture run.
#[derive(Debug, Default)]
pub struct CaptureSummary {
    /// Frames processed.
    pub frames: u32,
    /// Frames found uniform.
    pub uniform: u32,
    /// Frames with at least one differing pixel.
    pub mismatched: u32,
    /// Frames whose buffer was shorter than the negotiated geometry.
    pub truncated: u32,
    /// Frames the driver dropped between two dequeues.
    pub dropped: u32,
    /// Tolerated problems met during setup.
    pub warnings: Vec<Warning>,
}

impl CaptureSummary {
    fn record(&mut self, outcome: &Uniformity) {
        self.frames += 1;
        match outcome {
            Uniformity::Uniform { .. } => self.uniform += 1,
            Uniformity::Mismatch { .. } => self.mismatched += 1,
            Uniformity::Truncated { .. } => self.truncated += 1,
        }
    }
}

/// Detects gaps in the driver's frame sequence numbers.
#[derive(Debug, Default)]
struct SequenceTracker {
    last: Option<u32>,
}

impl SequenceTracker {
    /// Record `sequence`. Returns the number of frames skipped since the last one.
    fn observe(&mut self, sequence: u32) -> u32 {
        let gap = self
            .last
            .map_or(0, |last| sequence.wrapping_sub(last).saturating_sub(1));
        self.last = Some(sequence);
        gap
    }
}

/// Owns one device for the whole capture run.
pub struct CaptureLoop<D: CameraDevice> {
    device: D,
    config: CaptureConfig,
    state: CaptureState,
}

impl<D: CameraDevice> CaptureLoop<D> {
    /// Take ownership of an open device.
    pub const fn new(device: D, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            state: CaptureState::Idle,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// The owned device.
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Capture and check `config.max_frames` frames.
    ///
    /// Streaming is stopped and buffers are unmapped before this returns,
    /// whether it succeeds or not.
    pub fn run(&mut self) -> Result<CaptureSummary> {
        let Self {
            device,
            config,
            state,
        } = self;

        let result = run_stream(device, config, state);
        transition(state, CaptureState::Stopped);
        result
    }

    /// Close the device.
    pub fn close(mut self) {
        transition(&mut self.state, CaptureState::Closed);
        drop(self.device);
        info!("Device closed");
    }
}

fn run_stream<D: CameraDevice>(
    device: &mut D,
    config: &CaptureConfig,
    state: &mut CaptureState,
) -> Result<CaptureSummary> {
    let negotiated = negotiate(device, config)?;
    for warning in &negotiated.warnings {
        warn!("{warning}");
    }
    let format = negotiated.format;
    transition(state, CaptureState::Negotiated);

    let buffers = pool::allocate(device, config.buffer_count, config.min_buffers)?;
    transition(state, CaptureState::BuffersMapped);

    let mut streaming = Streaming::start(buffers)?;
    transition(state, CaptureState::Streaming);

    info!(frames = config.max_frames, "Starting capture loop");

    let mut summary = CaptureSummary {
        warnings: negotiated.warnings,
        ..CaptureSummary::default()
    };
    let mut sequence = SequenceTracker::default();

    while summary.frames < config.max_frames {
        transition(state, CaptureState::WaitingForData);
        match streaming.wait_readable(config.wait_timeout)? {
            Readiness::Ready => {}
            Readiness::Interrupted => {
                debug!("readiness wait interrupted, retrying");
                continue;
            }
            Readiness::TimedOut => return Err(CameraError::Timeout(config.wait_timeout)),
        }

        let lease = match streaming.dequeue()? {
            Dequeued::Frame(lease) => lease,
            Dequeued::NoDataYet => {
                debug!("no frame ready yet");
                continue;
            }
        };
        transition(state, CaptureState::FrameReady);

        let metadata = lease.descriptor().metadata;
        info!(
            sequence = metadata.sequence,
            bytes = metadata.bytes_used,
            timestamp = ?metadata.timestamp,
            "Frame captured"
        );
        let skipped = sequence.observe(metadata.sequence);
        if skipped > 0 {
            warn!(skipped, sequence = metadata.sequence, "frames dropped by driver");
            summary.dropped += skipped;
        }

        let outcome = check_uniform(streaming.frame(&lease)?, format.width, format.height);
        streaming.requeue(lease)?;
        report(&outcome);
        summary.record(&outcome);
        transition(state, CaptureState::Analyzed);

        info!("Processed frame {}/{}", summary.frames, config.max_frames);
    }

    streaming.stop()?;
    drop(streaming);

    debug!(
        frames = summary.frames,
        uniform = summary.uniform,
        mismatched = summary.mismatched,
        truncated = summary.truncated,
        dropped = summary.dropped,
        "capture loop finished"
    );
    Ok(summary)
}

fn report(outcome: &Uniformity) {
    match outcome {
        Uniformity::Uniform {
            reference: Some(reference),
        } => {
            debug!(%reference, "reference pixel");
            info!("All pixels are uniform");
        }
        Uniformity::Uniform { reference: None } => info!("Empty frame"),
        Uniformity::Mismatch {
            x,
            y,
            observed,
            expected,
        } => {
            debug!(reference = %expected, "reference pixel");
            info!("PIXEL MISMATCH at ({x}, {y}): {observed} (expected {expected})");
        }
        Uniformity::Truncated {
            required,
            available,
        } => warn!(required, available, "frame buffer shorter than the negotiated format"),
    }
}

fn transition(state: &mut CaptureState, next: CaptureState) {
    let from = *state;
    debug!(?from, to = ?next, "capture state");
    *state = next;
}
