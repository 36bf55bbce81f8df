//! Raw V4L2 calls the v4l crate does not expose: memory-mapped buffer
//! management and cropping.
//!
//! Every function takes the device file descriptor. Callers keep the
//! descriptor open for as long as any mapping made from it is alive.

#![allow(unsafe_code)]

use std::os::raw::{c_int, c_void};
use std::ptr::{self, NonNull};
use std::time::Duration;
use std::{io, mem, slice};

use tracing::warn;
use v4l::buffer::Type;
use v4l::memory::Memory;
use v4l::v4l2;
use v4l::v4l_sys::{v4l2_buffer, v4l2_crop, v4l2_cropcap, v4l2_requestbuffers};

const CAPTURE: u32 = Type::VideoCapture as u32;
const MMAP: u32 = Memory::Mmap as u32;

/// What `VIDIOC_DQBUF` reports about a filled buffer.
#[derive(Debug, Clone, Copy)]
pub struct FilledBuffer {
    /// Slot index.
    pub index: usize,
    /// Driver sequence number.
    pub sequence: u32,
    /// Bytes of payload written by the driver.
    pub bytes_used: u32,
    /// Capture time.
    pub timestamp: Duration,
}

fn capture_buffer(index: u32) -> v4l2_buffer {
    // SAFETY: v4l2_buffer is plain C data; all-zero is a valid value.
    let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
    buf.type_ = CAPTURE;
    buf.memory = MMAP;
    buf.index = index;
    buf
}

/// Ask the driver for `count` mapped buffers. Returns how many it granted.
///
/// A `count` of zero frees all buffers.
pub fn request_buffers(fd: c_int, count: u32) -> io::Result<u32> {
    // SAFETY: v4l2_requestbuffers is plain C data; all-zero is a valid value.
    let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
    req.type_ = CAPTURE;
    req.memory = MMAP;
    req.count = count;

    // SAFETY: the pointer refers to a live local of the type REQBUFS expects.
    unsafe {
        v4l2::ioctl(
            fd,
            v4l2::vidioc::VIDIOC_REQBUFS,
            ptr::addr_of_mut!(req).cast(),
        )?;
    }
    Ok(req.count)
}

/// Put the buffer at `index` on the driver's incoming queue.
pub fn queue_buffer(fd: c_int, index: usize) -> io::Result<()> {
    let index = u32::try_from(index)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    let mut buf = capture_buffer(index);

    // SAFETY: the pointer refers to a live local of the type QBUF expects.
    unsafe {
        v4l2::ioctl(fd, v4l2::vidioc::VIDIOC_QBUF, ptr::addr_of_mut!(buf).cast())
    }
}

/// Take the next filled buffer off the driver's outgoing queue.
///
/// On a non-blocking descriptor this fails with `WouldBlock` when nothing
/// is ready.
pub fn dequeue_buffer(fd: c_int) -> io::Result<FilledBuffer> {
    let mut buf = capture_buffer(0);

    // SAFETY: the pointer refers to a live local of the type DQBUF expects.
    unsafe {
        v4l2::ioctl(fd, v4l2::vidioc::VIDIOC_DQBUF, ptr::addr_of_mut!(buf).cast())?;
    }

    // V4L2 timestamps are never negative
    let secs = u64::try_from(buf.timestamp.tv_sec).unwrap_or(0);
    let micros = u64::try_from(buf.timestamp.tv_usec).unwrap_or(0);

    Ok(FilledBuffer {
        index: buf.index as usize,
        sequence: buf.sequence,
        bytes_used: buf.bytesused,
        timestamp: Duration::from_secs(secs).saturating_add(Duration::from_micros(micros)),
    })
}

fn stream_ioctl(fd: c_int, request: v4l2::vidioc::_IOC_TYPE) -> io::Result<()> {
    let mut typ = CAPTURE;
    // SAFETY: STREAMON/STREAMOFF take a pointer to the buffer type.
    unsafe { v4l2::ioctl(fd, request, ptr::addr_of_mut!(typ).cast()) }
}

/// Start capturing into queued buffers.
pub fn stream_on(fd: c_int) -> io::Result<()> {
    stream_ioctl(fd, v4l2::vidioc::VIDIOC_STREAMON)
}

/// Stop capturing. The driver drops every queued buffer.
pub fn stream_off(fd: c_int) -> io::Result<()> {
    stream_ioctl(fd, v4l2::vidioc::VIDIOC_STREAMOFF)
}

/// Reset the cropping rectangle to the driver default.
///
/// Fails with the error of whichever of `VIDIOC_CROPCAP` or `VIDIOC_S_CROP`
/// was refused, named by the first tuple element.
pub fn reset_crop(fd: c_int) -> Result<(), (&'static str, io::Error)> {
    // SAFETY: both structs are plain C data for which all-zero is valid, and
    // each pointer refers to a live local of the type the request expects.
    unsafe {
        let mut cropcap: v4l2_cropcap = mem::zeroed();
        cropcap.type_ = CAPTURE;
        v4l2::ioctl(
            fd,
            v4l2::vidioc::VIDIOC_CROPCAP,
            ptr::addr_of_mut!(cropcap).cast(),
        )
        .map_err(|err| ("VIDIOC_CROPCAP", err))?;

        let mut crop: v4l2_crop = mem::zeroed();
        crop.type_ = CAPTURE;
        crop.c = cropcap.defrect;
        v4l2::ioctl(fd, v4l2::vidioc::VIDIOC_S_CROP, ptr::addr_of_mut!(crop).cast())
            .map_err(|err| ("VIDIOC_S_CROP", err))?;
    }
    Ok(())
}

/// One driver buffer mapped shared and read/write into this process.
///
/// Unmapped on drop.
pub struct MappedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedBuffer {
    /// Query the buffer at `index` and map it.
    pub fn map(fd: c_int, index: u32) -> io::Result<Self> {
        let mut buf = capture_buffer(index);

        // SAFETY: the pointer refers to a live local of the type QUERYBUF expects.
        // For MMAP memory the driver fills `m.offset`, so reading that union
        // member is sound.
        let offset = unsafe {
            v4l2::ioctl(
                fd,
                v4l2::vidioc::VIDIOC_QUERYBUF,
                ptr::addr_of_mut!(buf).cast(),
            )?;
            buf.m.offset
        };
        let len = buf.length as usize;

        // SAFETY: a fresh shared mapping of a driver-provided region; nothing
        // else aliases it in this process.
        #[allow(clippy::cast_possible_wrap, clippy::cast_lossless)]
        let mapping = unsafe {
            v4l2::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )?
        };

        let ptr = NonNull::new(mapping.cast::<u8>())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))?;
        Ok(Self { ptr, len })
    }

    /// The mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points at `len` mapped bytes that stay valid until
        // drop. The driver only writes while the slot is queued, which the
        // buffer pool keeps apart from reads.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe a mapping created by `map` and not yet
        // released.
        let result = unsafe { v4l2::munmap(self.ptr.as_ptr().cast::<c_void>(), self.len) };
        if let Err(err) = result {
            warn!(error = %err, len = self.len, "munmap failed");
        }
    }
}
