//! V4L2 device implementation using the v4l crate.

use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use v4l::device::Handle;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Device;

use crate::error::{CameraError, Result};
use crate::raw::{self, MappedBuffer};
use crate::traits::{
    CameraDevice, CaptureStream, DeviceCapabilities, Format, FrameDescriptor, FrameInterval,
    FrameMetadata, Readiness, StreamParams,
};

/// V4L2 device implementation wrapping the v4l crate.
///
/// The node is opened read/write and non-blocking. It is closed when the
/// value is dropped.
pub struct V4L2Device {
    device: Device,
    capabilities: DeviceCapabilities,
}

impl V4L2Device {
    /// Open a V4L2 device node (e.g. `/dev/video0`).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path).map_err(|err| open_error(path, err))?;

        let caps = device.query_caps().map_err(|err| {
            match err.raw_os_error() {
                Some(libc::EINVAL | libc::ENOTTY) => CameraError::NotACaptureDevice(format!(
                    "{} is no V4L2 device",
                    path.display()
                )),
                _ => CameraError::io("VIDIOC_QUERYCAP", err),
            }
        })?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        Ok(Self {
            device,
            capabilities,
        })
    }
}

fn open_error(path: &Path, err: io::Error) -> CameraError {
    match err.kind() {
        io::ErrorKind::NotFound => CameraError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(path.to_path_buf()),
        _ => CameraError::io("open", err),
    }
}

impl CameraDevice for V4L2Device {
    type Stream<'a> = V4L2Stream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        let fmt = self
            .device
            .format()
            .map_err(|err| CameraError::io("VIDIOC_G_FMT", err))?;

        Ok(Format::from(fmt))
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::io("VIDIOC_G_FMT", err))?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();
        fmt.field_order = format.field_order.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|err| CameraError::io("VIDIOC_S_FMT", err))?;

        Ok(Format::from(fmt))
    }

    fn reset_crop(&mut self) -> Result<()> {
        raw::reset_crop(self.device.handle().fd()).map_err(|(op, err)| CameraError::io(op, err))
    }

    fn params(&self) -> Result<StreamParams> {
        let params = self
            .device
            .params()
            .map_err(|err| CameraError::io("VIDIOC_G_PARM", err))?;

        Ok(StreamParams {
            interval: params.interval.into(),
            interval_adjustable: params
                .capabilities
                .contains(v4l::parameters::Capabilities::TIME_PER_FRAME),
        })
    }

    fn set_frame_interval(&mut self, interval: FrameInterval) -> Result<FrameInterval> {
        let params = self
            .device
            .set_params(&Parameters::new(interval.into()))
            .map_err(|err| CameraError::io("VIDIOC_S_PARM", err))?;

        Ok(params.interval.into())
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        let handle = self.device.handle();
        let fd = handle.fd();

        let granted = raw::request_buffers(fd, buffer_count).map_err(|err| {
            match err.raw_os_error() {
                Some(libc::EINVAL) => {
                    CameraError::UnsupportedDevice("memory mapping not supported".to_owned())
                }
                _ => CameraError::io("VIDIOC_REQBUFS", err),
            }
        })?;
        debug!(requested = buffer_count, granted, "buffers requested");

        // From here on, dropping the stream unmaps and frees whatever was granted.
        let mut stream = V4L2Stream {
            handle,
            buffers: Vec::with_capacity(granted as usize),
            active: false,
            _device: PhantomData,
        };
        for index in 0..granted {
            let buffer = MappedBuffer::map(fd, index).map_err(|err| {
                warn!(index, error = %err, "mapping buffer failed");
                CameraError::MapFailed {
                    index: index as usize,
                }
            })?;
            stream.buffers.push(buffer);
        }

        Ok(stream)
    }
}

/// Memory-mapped capture buffers of one [`V4L2Device`].
///
/// Dropping the stream turns streaming off, unmaps every buffer and frees
/// them in the driver.
pub struct V4L2Stream<'a> {
    handle: Arc<Handle>,
    buffers: Vec<MappedBuffer>,
    active: bool,
    _device: PhantomData<&'a mut Device>,
}

impl V4L2Stream<'_> {
    fn fd(&self) -> i32 {
        self.handle.fd()
    }
}

impl CaptureStream for V4L2Stream<'_> {
    fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn buffer(&self, index: usize) -> Option<&[u8]> {
        self.buffers.get(index).map(MappedBuffer::as_slice)
    }

    fn queue(&mut self, index: usize) -> Result<()> {
        raw::queue_buffer(self.fd(), index).map_err(|err| CameraError::io("VIDIOC_QBUF", err))
    }

    fn start(&mut self) -> Result<()> {
        raw::stream_on(self.fd()).map_err(|err| CameraError::io("VIDIOC_STREAMON", err))?;
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        raw::stream_off(self.fd()).map_err(|err| CameraError::io("VIDIOC_STREAMOFF", err))?;
        self.active = false;
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<Readiness> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        match self.handle.poll(libc::POLLIN, millis) {
            Ok(0) => Ok(Readiness::TimedOut),
            Ok(_) => Ok(Readiness::Ready),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(Readiness::Interrupted),
            Err(err) => Err(CameraError::io("poll", err)),
        }
    }

    fn dequeue(&mut self) -> Result<Option<FrameDescriptor>> {
        let filled = match raw::dequeue_buffer(self.fd()) {
            Ok(filled) => filled,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(err) => return Err(CameraError::io("VIDIOC_DQBUF", err)),
        };

        if filled.index >= self.buffers.len() {
            return Err(CameraError::Protocol(format!(
                "driver returned slot {} of {}",
                filled.index,
                self.buffers.len()
            )));
        }

        Ok(Some(FrameDescriptor {
            index: filled.index,
            metadata: FrameMetadata {
                sequence: filled.sequence,
                timestamp: filled.timestamp,
                bytes_used: filled.bytes_used,
            },
        }))
    }
}

impl Drop for V4L2Stream<'_> {
    fn drop(&mut self) {
        let fd = self.fd();
        if self.active {
            if let Err(err) = raw::stream_off(fd) {
                warn!(error = %err, "VIDIOC_STREAMOFF during teardown failed");
            }
        }

        // Mappings must be gone before the driver frees the buffers.
        self.buffers.clear();
        if let Err(err) = raw::request_buffers(fd, 0) {
            warn!(error = %err, "releasing driver buffers failed");
        }
    }
}
