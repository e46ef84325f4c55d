mod gphoto;
#[cfg(test)]
pub(crate) mod mock;
mod picamera;
mod raspistill;

pub use gphoto::{parse_serial_number, parse_usb_ports, GphotoCamera};
pub use picamera::PiCamera;
pub use raspistill::{Encoding, RaspistillArgs};

use crate::capture::OverlayStyle;
use crate::error::{EyepiError, Result};
use chrono::{DateTime, Local};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Process-wide lock serialising every external capture invocation
pub type CaptureLock = Arc<tokio::sync::Mutex<()>>;

pub fn new_capture_lock() -> CaptureLock {
    Arc::new(tokio::sync::Mutex::new(()))
}

/// Capability the scheduler drives; implemented once per camera family
#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    /// Filename prefix, also used as the metric tag
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    fn interval(&self) -> Duration;

    /// Capture one image stamped with `timestamp`. Callers hold the
    /// [`CaptureLock`] for the duration of the call.
    async fn capture(&self, timestamp: SystemTime) -> Result<()>;
}

/// Settings shared by every camera family
#[derive(Debug)]
pub struct CameraSettings {
    pub prefix: String,
    pub output_dir: PathBuf,
    pub interval: Duration,
    pub timestamp_format: String,
    pub overlay: OverlayStyle,
    enabled: AtomicBool,
}

impl CameraSettings {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(
        prefix: S,
        output_dir: P,
        interval: Duration,
        timestamp_format: S,
        overlay: OverlayStyle,
        enabled: bool,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            output_dir: output_dir.into(),
            interval,
            timestamp_format: timestamp_format.into(),
            overlay,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Render `timestamp` in local time with the configured layout
    pub fn format_timestamp(&self, timestamp: SystemTime) -> Result<String> {
        let datetime = DateTime::<Local>::from(timestamp);
        let mut out = String::new();
        write!(out, "{}", datetime.format(&self.timestamp_format)).map_err(|_| {
            EyepiError::capture(
                self.prefix.as_str(),
                format!("invalid timestamp format '{}'", self.timestamp_format),
            )
        })?;
        Ok(out)
    }

    /// `<output_dir>/<prefix>_<stamp>.<extension>`
    pub fn image_path(&self, stamp: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.prefix, stamp, extension))
    }

    /// `<output_dir>/last_image.<extension>`
    pub fn last_image_path(&self, extension: &str) -> PathBuf {
        self.output_dir.join(format!("last_image.{}", extension))
    }
}
