//! Fixed-size pool of memory-mapped frame buffers.
//!
//! Every slot carries an explicit owner tag. A slot is either held by the
//! driver (queued for capture) or by the process (free to read). Only
//! [`crate::streaming::Streaming`] moves slots between the two.

use tracing::info;

use crate::error::{CameraError, Result};
use crate::traits::{CameraDevice, CaptureStream};

/// Current holder of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOwner {
    /// The process may read the slot.
    Process,
    /// The slot is queued with the driver.
    Kernel,
}

/// Slot counts per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    /// Slots queued with the driver.
    pub kernel: usize,
    /// Slots held by the process.
    pub process: usize,
}

/// Ordered collection of mapped buffers, indexed `0..len()`.
///
/// Buffers are unmapped when the pool is dropped.
pub struct BufferPool<S> {
    stream: S,
    slots: Vec<SlotOwner>,
}

/// Request `count` mapped buffers from `device`.
///
/// Fails if the driver grants fewer than `min_buffers`.
pub fn allocate<D: CameraDevice>(
    device: &mut D,
    count: u32,
    min_buffers: usize,
) -> Result<BufferPool<D::Stream<'_>>> {
    let stream = device.create_stream(count)?;
    let pool = BufferPool::from_stream(stream, min_buffers)?;
    info!(buffers = pool.len(), "Initialized memory mapped buffers");
    Ok(pool)
}

impl<S: CaptureStream> BufferPool<S> {
    /// Wrap a freshly mapped stream. All slots start process-owned.
    pub fn from_stream(stream: S, min_buffers: usize) -> Result<Self> {
        let granted = stream.buffer_count();
        if granted < min_buffers {
            return Err(CameraError::InsufficientBuffers {
                granted,
                required: min_buffers,
            });
        }

        if let Some(index) = (0..granted).find(|&index| stream.buffer(index).is_none()) {
            return Err(CameraError::MapFailed { index });
        }

        Ok(Self {
            stream,
            slots: vec![SlotOwner::Process; granted],
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool has no slots. Never true for an allocated pool.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Owner of the slot at `index`.
    pub fn owner(&self, index: usize) -> Option<SlotOwner> {
        self.slots.get(index).copied()
    }

    /// Count slots per owner.
    pub fn ownership(&self) -> Ownership {
        let kernel = self
            .slots
            .iter()
            .filter(|owner| **owner == SlotOwner::Kernel)
            .count();
        Ownership {
            kernel,
            process: self.slots.len() - kernel,
        }
    }

    /// Mapped length of the slot at `index`, including driver padding.
    pub fn slot_len(&self, index: usize) -> Option<usize> {
        self.stream.buffer(index).map(<[u8]>::len)
    }

    /// Bytes of a process-owned slot.
    pub(crate) fn bytes(&self, index: usize) -> Result<&[u8]> {
        self.expect_owner(index, SlotOwner::Process)?;
        self.stream
            .buffer(index)
            .ok_or(CameraError::MapFailed { index })
    }

    /// Queue a process-owned slot with the driver.
    pub(crate) fn enqueue(&mut self, index: usize) -> Result<()> {
        self.expect_owner(index, SlotOwner::Process)?;
        self.stream.queue(index)?;
        self.set_owner(index, SlotOwner::Kernel);
        Ok(())
    }

    /// Record that the driver handed back a kernel-owned slot.
    pub(crate) fn reclaim(&mut self, index: usize) -> Result<()> {
        self.expect_owner(index, SlotOwner::Kernel)?;
        self.set_owner(index, SlotOwner::Process);
        Ok(())
    }

    /// Record that stream-off returned every queued slot.
    pub(crate) fn reclaim_all(&mut self) {
        self.slots.fill(SlotOwner::Process);
    }

    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    fn expect_owner(&self, index: usize, expected: SlotOwner) -> Result<()> {
        match self.owner(index) {
            Some(owner) if owner == expected => Ok(()),
            Some(owner) => Err(CameraError::Protocol(format!(
                "slot {index} is {owner:?}-owned, expected {expected:?}"
            ))),
            None => Err(CameraError::Protocol(format!(
                "slot {index} out of range for pool of {}",
                self.slots.len()
            ))),
        }
    }

    fn set_owner(&mut self, index: usize, owner: SlotOwner) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = owner;
        }
    }
}
