//! Uniform-capture binary: stream frames from `/dev/video0` and check each
//! one for pixel uniformity.

use std::process::ExitCode;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use uniform_capture::{CameraDevice, CaptureConfig, CaptureLoop, V4L2Device};

fn main() -> ExitCode {
    init_tracing();
    ExitCode::from(exit_status(&run()))
}

/// Process exit status for the outcome of a run: 0 on success, 1 on a fatal error.
fn exit_status(result: &uniform_capture::Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            1
        }
    }
}

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {err}");
    }
}

fn run() -> uniform_capture::Result<()> {
    let config = CaptureConfig::default();
    let device = V4L2Device::open(&config.device_path)?;

    let caps = device.capabilities();
    info!(
        path = %config.device_path.display(),
        card = %caps.card,
        driver = %caps.driver,
        bus = %caps.bus_info,
        "Opened camera device"
    );

    let mut capture = CaptureLoop::new(device, config);
    let result = capture.run();
    capture.close();

    let summary = result?;
    info!(
        "Capture complete. Processed {} frames ({} uniform, {} mismatched)",
        summary.frames, summary.uniform, summary.mismatched
    );
    Ok(())
}
