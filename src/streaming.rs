//! Start/stop and enqueue/dequeue protocol over a [`BufferPool`].
//!
//! A dequeued slot is represented by a [`FrameLease`]. The lease cannot be
//! cloned and is consumed by [`Streaming::requeue`], so a slot can neither be
//! queued twice nor read after it went back to the driver.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::Result;
use crate::pool::BufferPool;
use crate::traits::{CaptureStream, FrameDescriptor, Readiness};

/// Process-side ownership of one dequeued slot.
#[derive(Debug)]
#[must_use = "a dequeued slot must be handed back with `Streaming::requeue`"]
pub struct FrameLease {
    descriptor: FrameDescriptor,
}

impl FrameLease {
    /// Metadata of the leased frame.
    pub const fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    /// Slot index of the leased frame.
    pub const fn index(&self) -> usize {
        self.descriptor.index
    }
}

/// Result of a dequeue attempt.
#[derive(Debug)]
pub enum Dequeued {
    /// A filled buffer now owned by the process.
    Frame(FrameLease),
    /// Nothing ready yet; wait again.
    NoDataYet,
}

/// An active stream over a buffer pool.
///
/// Dropping an active stream issues stream-off before the pool unmaps.
pub struct Streaming<S: CaptureStream> {
    pool: BufferPool<S>,
    active: bool,
}

impl<S: CaptureStream> Streaming<S> {
    /// Queue every slot with the driver, then turn the stream on.
    pub fn start(pool: BufferPool<S>) -> Result<Self> {
        let mut streaming = Self {
            pool,
            active: false,
        };

        for index in 0..streaming.pool.len() {
            streaming.pool.enqueue(index)?;
        }
        streaming.pool.stream_mut().start()?;
        streaming.active = true;

        info!("Started streaming");
        Ok(streaming)
    }

    /// Whether the stream is on.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &BufferPool<S> {
        &self.pool
    }

    /// Block until a frame is ready or `timeout` elapses.
    pub fn wait_readable(&mut self, timeout: Duration) -> Result<Readiness> {
        self.pool.stream_mut().wait_readable(timeout)
    }

    /// Take the next filled slot from the driver.
    pub fn dequeue(&mut self) -> Result<Dequeued> {
        let descriptor = match self.pool.stream_mut().dequeue() {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return Ok(Dequeued::NoDataYet),
            Err(err) => {
                if err.raw_os_error() == Some(libc::EIO) {
                    warn!(error = %err, "I/O error on dequeue, the driver may recover from it");
                }
                return Err(err);
            }
        };

        self.pool.reclaim(descriptor.index)?;
        Ok(Dequeued::Frame(FrameLease { descriptor }))
    }

    /// Mapped bytes of a leased frame, including driver padding.
    pub fn frame(&self, lease: &FrameLease) -> Result<&[u8]> {
        self.pool.bytes(lease.index())
    }

    /// Hand a leased slot back to the driver for refilling.
    pub fn requeue(&mut self, lease: FrameLease) -> Result<()> {
        self.pool.enqueue(lease.index())
    }

    /// Turn the stream off. All slots return to the process.
    pub fn stop(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.pool.stream_mut().stop()?;
        self.pool.reclaim_all();

        info!("Stopped streaming");
        Ok(())
    }
}

impl<S: CaptureStream> Drop for Streaming<S> {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = self.stop() {
                warn!(error = %err, "stream-off during teardown failed");
            }
        }
    }
}
