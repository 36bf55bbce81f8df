//! Mock device implementation for testing without hardware.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::error::{CameraError, Result};
use crate::traits::{
    CameraDevice, CaptureStream, DeviceCapabilities, FieldOrder, FourCC, Format, FrameDescriptor,
    FrameInterval, FrameMetadata, Readiness, StreamParams,
};

/// Bytes appended to every mock buffer, like driver page padding.
const BUFFER_PADDING: usize = 64;

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
    /// Solid color with the luma of one pixel raised by one.
    SolidWithDefect {
        /// Y, U, V of the background.
        yuv: (u8, u8, u8),
        /// Column of the defective pixel.
        x: u32,
        /// Row of the defective pixel.
        y: u32,
    },
}

/// One scripted readiness event, consumed before the default behaviour.
#[derive(Debug, Clone, Copy)]
pub enum ScriptedWait {
    /// The wait is interrupted by a signal.
    Interrupted,
    /// The wait reports ready but the following dequeue finds nothing.
    NoData,
    /// The wait runs into its deadline.
    TimedOut,
}

/// Calls observed by the mock driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStats {
    /// Stream-on calls.
    pub stream_on: u32,
    /// Stream-off calls.
    pub stream_off: u32,
    /// Successful buffer queue calls.
    pub queued: u32,
    /// Successful buffer dequeue calls.
    pub dequeued: u32,
    /// Buffer sets released (unmapped).
    pub released: u32,
    /// Successful crop resets.
    pub crop_resets: u32,
    /// Applied frame intervals.
    pub interval_sets: u32,
}

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    substitute_fourcc: Option<FourCC>,
    misreport_layout: bool,
    crop_supported: bool,
    params: Option<StreamParams>,
    granted_buffers: Option<u32>,
    unmapped_slot: Option<usize>,
    pattern: TestPattern,
    wait_script: VecDeque<ScriptedWait>,
    never_ready: bool,
    dequeue_error: Option<i32>,
    stream_on_error: Option<i32>,
    frame_count: u32,
    stats: MockStats,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(64, 48, FourCC::YUYV),
            substitute_fourcc: None,
            misreport_layout: false,
            crop_supported: true,
            params: Some(StreamParams {
                interval: FrameInterval::from_fps(30),
                interval_adjustable: true,
            }),
            granted_buffers: None,
            unmapped_slot: None,
            pattern: TestPattern::Solid(16, 128, 128),
            wait_script: VecDeque::new(),
            never_ready: false,
            dequeue_error: None,
            stream_on_error: None,
            frame_count: 0,
            stats: MockStats::default(),
        }
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Apply `fourcc` instead of whatever encoding is requested.
    #[must_use]
    pub const fn with_substituted_fourcc(mut self, fourcc: FourCC) -> Self {
        self.substitute_fourcc = Some(fourcc);
        self
    }

    /// Report zero stride and size from `set_format`.
    #[must_use]
    pub const fn with_misreported_layout(mut self) -> Self {
        self.misreport_layout = true;
        self
    }

    /// Fail crop queries.
    #[must_use]
    pub const fn without_crop(mut self) -> Self {
        self.crop_supported = false;
        self
    }

    /// Set the streaming parameters; `None` makes the query fail.
    #[must_use]
    pub const fn with_params(mut self, params: Option<StreamParams>) -> Self {
        self.params = params;
        self
    }

    /// Grant `count` buffers regardless of the request.
    #[must_use]
    pub const fn with_granted_buffers(mut self, count: u32) -> Self {
        self.granted_buffers = Some(count);
        self
    }

    /// Leave the slot at `index` unmapped.
    #[must_use]
    pub const fn with_unmapped_slot(mut self, index: usize) -> Self {
        self.unmapped_slot = Some(index);
        self
    }

    /// Set the pattern written into every captured frame.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Queue scripted readiness events.
    #[must_use]
    pub fn with_wait_script<I>(mut self, script: I) -> Self
    where
        I: IntoIterator<Item = ScriptedWait>,
    {
        self.wait_script.extend(script);
        self
    }

    /// Never report readiness.
    #[must_use]
    pub const fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Fail every dequeue with OS error `code`.
    #[must_use]
    pub const fn with_dequeue_error(mut self, code: i32) -> Self {
        self.dequeue_error = Some(code);
        self
    }

    /// Fail stream-on with OS error `code`.
    #[must_use]
    pub const fn with_stream_on_error(mut self, code: i32) -> Self {
        self.stream_on_error = Some(code);
        self
    }

    /// Calls observed so far.
    #[must_use]
    pub const fn stats(&self) -> MockStats {
        self.stats
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let fourcc = self.substitute_fourcc.unwrap_or(format.fourcc);
        let mut applied = Format::new(format.width, format.height, fourcc);
        applied.field_order = match format.field_order {
            FieldOrder::Any => FieldOrder::Progressive,
            order => order,
        };
        self.format = applied.clone();

        if self.misreport_layout {
            applied.stride = 0;
            applied.size = 0;
        }
        Ok(applied)
    }

    fn reset_crop(&mut self) -> Result<()> {
        if !self.crop_supported {
            return Err(CameraError::io(
                "VIDIOC_CROPCAP",
                io::Error::from_raw_os_error(libc::ENODATA),
            ));
        }
        self.stats.crop_resets += 1;
        Ok(())
    }

    fn params(&self) -> Result<StreamParams> {
        self.params.ok_or_else(|| {
            CameraError::io("VIDIOC_G_PARM", io::Error::from_raw_os_error(libc::ENOTTY))
        })
    }

    fn set_frame_interval(&mut self, interval: FrameInterval) -> Result<FrameInterval> {
        match self.params.as_mut() {
            Some(params) if params.interval_adjustable => {
                params.interval = interval;
                self.stats.interval_sets += 1;
                Ok(interval)
            }
            _ => Err(CameraError::io(
                "VIDIOC_S_PARM",
                io::Error::from_raw_os_error(libc::EINVAL),
            )),
        }
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        let granted = self.granted_buffers.unwrap_or(buffer_count) as usize;
        let len = self.format.size as usize + BUFFER_PADDING;
        let buffers = (0..granted)
            .map(|index| (Some(index) != self.unmapped_slot).then(|| vec![0u8; len]))
            .collect();

        Ok(MockStream {
            device: self,
            buffers,
            queue: VecDeque::new(),
            streaming: false,
            no_data_pending: false,
        })
    }
}

/// Mock capture stream for testing.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
    buffers: Vec<Option<Vec<u8>>>,
    queue: VecDeque<usize>,
    streaming: bool,
    no_data_pending: bool,
}

impl MockStream<'_> {
    fn os_error(op: &'static str, code: i32) -> CameraError {
        CameraError::io(op, io::Error::from_raw_os_error(code))
    }
}

impl CaptureStream for MockStream<'_> {
    fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn buffer(&self, index: usize) -> Option<&[u8]> {
        self.buffers.get(index)?.as_deref()
    }

    fn queue(&mut self, index: usize) -> Result<()> {
        if index >= self.buffers.len() || self.queue.contains(&index) {
            return Err(Self::os_error("VIDIOC_QBUF", libc::EINVAL));
        }
        self.queue.push_back(index);
        self.device.stats.queued += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if let Some(code) = self.device.stream_on_error {
            return Err(Self::os_error("VIDIOC_STREAMON", code));
        }
        self.streaming = true;
        self.device.stats.stream_on += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.streaming = false;
        self.queue.clear();
        self.device.stats.stream_off += 1;
        Ok(())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> Result<Readiness> {
        match self.device.wait_script.pop_front() {
            Some(ScriptedWait::Interrupted) => return Ok(Readiness::Interrupted),
            Some(ScriptedWait::TimedOut) => return Ok(Readiness::TimedOut),
            Some(ScriptedWait::NoData) => {
                self.no_data_pending = true;
                return Ok(Readiness::Ready);
            }
            None => {}
        }

        if self.device.never_ready || !self.streaming || self.queue.is_empty() {
            Ok(Readiness::TimedOut)
        } else {
            Ok(Readiness::Ready)
        }
    }

    fn dequeue(&mut self) -> Result<Option<FrameDescriptor>> {
        if let Some(code) = self.device.dequeue_error {
            return Err(Self::os_error("VIDIOC_DQBUF", code));
        }
        if !self.streaming {
            return Err(Self::os_error("VIDIOC_DQBUF", libc::EINVAL));
        }
        if std::mem::take(&mut self.no_data_pending) {
            return Ok(None);
        }
        let Some(index) = self.queue.pop_front() else {
            return Ok(None);
        };

        let format = self.device.format.clone();
        if let Some(Some(buffer)) = self.buffers.get_mut(index) {
            fill_test_frame(buffer, &format, self.device.pattern);
        }

        let sequence = self.device.frame_count;
        self.device.frame_count += 1;
        self.device.stats.dequeued += 1;

        Ok(Some(FrameDescriptor {
            index,
            metadata: FrameMetadata {
                sequence,
                timestamp: Duration::from_millis(u64::from(sequence) * 16), // ~60fps
                bytes_used: format.size,
            },
        }))
    }
}

impl Drop for MockStream<'_> {
    fn drop(&mut self) {
        self.device.stats.released += 1;
    }
}

/// Fill the image part of `data` with `pattern`. Padding is left untouched.
fn fill_test_frame(data: &mut [u8], format: &Format, pattern: TestPattern) {
    let size = (format.width * format.height * 2) as usize; // YUYV = 2 bytes/pixel
    let end = size.min(data.len());
    let data = &mut data[..end];

    match pattern {
        TestPattern::ColorBars => {
            generate_color_bars(data, format.width, format.height);
        }
        TestPattern::Solid(y, u, v) => {
            generate_solid(data, y, u, v);
        }
        TestPattern::SolidWithDefect { yuv: (y, u, v), x, y: row } => {
            generate_solid(data, y, u, v);
            let offset = ((row * format.width + x) * 2) as usize;
            if let Some(luma) = data.get_mut(offset) {
                *luma = luma.wrapping_add(1);
            }
        }
    }
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128), // White
        (210, 16, 146),  // Yellow
        (170, 166, 16),  // Cyan
        (145, 54, 34),   // Green
        (106, 202, 222), // Magenta
        (81, 90, 240),   // Red
        (41, 240, 110),  // Blue
        (16, 128, 128),  // Black
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars[bar_idx];

            let offset = ((y * width + x) * 2) as usize;
            if offset + 3 < data.len() {
                data[offset] = y_val;     // Y0
                data[offset + 1] = u_val; // U
                data[offset + 2] = y_val; // Y1
                data[offset + 3] = v_val; // V
            }
        }
    }
}

/// Generate solid color YUYV frame.
fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.copy_from_slice(&[y, u, y, v]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{check_uniform, Uniformity};

    fn frame_for(pattern: TestPattern) -> Vec<u8> {
        let format = Format::new(64, 48, FourCC::YUYV);
        let mut data = vec![0u8; format.size as usize + BUFFER_PADDING];
        fill_test_frame(&mut data, &format, pattern);
        data
    }

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        let format = device.format().expect("format should succeed");
        assert_eq!(format.width, 64);
        assert_eq!(format.height, 48);

        let new_format = Format::new(1280, 720, FourCC::YUYV);
        let actual = device
            .set_format(&new_format)
            .expect("set_format should succeed");
        assert_eq!(actual.width, 1280);
        assert_eq!(actual.height, 720);
    }

    #[test]
    fn test_mock_stream_requires_queued_buffers() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(4).expect("create_stream should succeed");
        stream.start().expect("start should succeed");

        assert_eq!(
            stream
                .wait_readable(Duration::from_millis(1))
                .expect("wait should succeed"),
            Readiness::TimedOut
        );
        assert!(stream.dequeue().expect("dequeue should succeed").is_none());

        stream.queue(0).expect("queue should succeed");
        let frame = stream
            .dequeue()
            .expect("dequeue should succeed")
            .expect("frame should be ready");
        assert_eq!(frame.index, 0);
        assert_eq!(frame.metadata.sequence, 0);
    }

    #[test]
    fn test_mock_stream_rejects_double_queue() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(4).expect("create_stream should succeed");
        stream.queue(1).expect("queue should succeed");
        assert!(stream.queue(1).is_err());
    }

    #[test]
    fn test_color_bars_pattern_is_not_uniform() {
        let data = frame_for(TestPattern::ColorBars);
        assert_eq!(data[0], 235);
        assert!(matches!(
            check_uniform(&data, 64, 48),
            Uniformity::Mismatch { x: 8, y: 0, .. }
        ));
    }

    #[test]
    fn test_solid_pattern_leaves_padding() {
        let data = frame_for(TestPattern::Solid(128, 64, 192));
        assert_eq!(&data[..4], &[128, 64, 128, 192]);
        assert!(data[64 * 48 * 2..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_defect_pattern() {
        let data = frame_for(TestPattern::SolidWithDefect {
            yuv: (100, 128, 128),
            x: 5,
            y: 3,
        });
        assert_eq!(data[(3 * 64 + 5) * 2], 101);
    }
}
