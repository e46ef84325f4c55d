use super::{Camera, CameraSettings};
use crate::capture::update_last_image;
use crate::config::ImageType;
use crate::error::{EyepiError, Result};
use parking_lot::Mutex;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

fn serial_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Current: (\w+)").expect("serial number pattern is valid"))
}

fn usb_port_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"usb:\d+,\d+").expect("usb port pattern is valid"))
}

/// Every `usb:BUS,DEV` address listed by `gphoto2 --auto-detect`
pub fn parse_usb_ports(output: &str) -> Vec<String> {
    usb_port_regex()
        .find_iter(output)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The value of the `Current:` line of `gphoto2 --get-config=serialnumber`
pub fn parse_serial_number(output: &str) -> Option<String> {
    serial_regex()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// A camera driven through the gphoto2 command-line tool, identified by its
/// serial number. The USB address is re-resolved before every capture.
pub struct GphotoCamera {
    settings: CameraSettings,
    serial_number: String,
    port: Mutex<Option<String>>,
    program: PathBuf,
    leading_args: Vec<String>,
}

impl GphotoCamera {
    pub fn new<S: Into<String>>(settings: CameraSettings, serial_number: S) -> Self {
        Self {
            settings,
            serial_number: serial_number.into(),
            port: Mutex::new(None),
            program: PathBuf::from("gphoto2"),
            leading_args: Vec::new(),
        }
    }

    /// Run gphoto2 through another program, e.g. a wrapper script
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P, leading_args: Vec<String>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Last address the camera was found at
    pub fn port(&self) -> Option<String> {
        self.port.lock().clone()
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Find the USB address of the attached camera whose serial number
    /// matches. The stored address is only updated on success.
    pub async fn locate(&self) -> Result<String> {
        for port in self.list_ports().await? {
            match self.port_has_serial(&port).await {
                Ok(true) => {
                    debug!("{} found on {}", self.settings.prefix, port);
                    *self.port.lock() = Some(port.clone());
                    return Ok(port);
                }
                Ok(false) => {}
                Err(e) => error!("Error reading serial number on {}: {}", port, e),
            }
        }

        Err(EyepiError::DeviceNotFound {
            serial: self.serial_number.clone(),
        })
    }

    async fn list_ports(&self) -> Result<Vec<String>> {
        let output = self.run(&["--auto-detect".to_string()]).await?;
        Ok(parse_usb_ports(&output))
    }

    async fn port_has_serial(&self, port: &str) -> Result<bool> {
        let output = self
            .run(&[
                "--debug-loglevel=error".to_string(),
                format!("--port={}", port),
                "--get-config=serialnumber".to_string(),
            ])
            .await?;

        Ok(parse_serial_number(&output)
            .map(|serial| serial.contains(&self.serial_number))
            .unwrap_or(false))
    }

    fn capture_args(port: &str, target: &Path) -> Vec<String> {
        vec![
            "--port".to_string(),
            port.to_string(),
            "--set-config=capturetarget=0".to_string(),
            "--force-overwrite".to_string(),
            "--capture-image-and-download".to_string(),
            format!("--filename={}", target.display()),
        ]
    }

    /// Run gphoto2 and return its stdout; a non-zero exit is an error
    async fn run(&self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                EyepiError::capture(
                    self.settings.prefix.as_str(),
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(EyepiError::capture(
                self.settings.prefix.as_str(),
                format!(
                    "gphoto2 {} exited with {}: {}",
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(stdout)
    }
}

#[async_trait::async_trait]
impl Camera for GphotoCamera {
    fn name(&self) -> &str {
        &self.settings.prefix
    }

    fn is_enabled(&self) -> bool {
        self.settings.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.settings.set_enabled(enabled)
    }

    fn interval(&self) -> Duration {
        self.settings.interval
    }

    async fn capture(&self, timestamp: SystemTime) -> Result<()> {
        let stamp = self.settings.format_timestamp(timestamp)?;
        // %C lets gphoto2 pick the extension, cameras may return jpg+raw pairs
        let target = self.settings.image_path(&stamp, "%C");
        let jpeg = self.settings.image_path(&stamp, ImageType::Jpg.extension());
        let last = self.settings.last_image_path(ImageType::Jpg.extension());

        let port = self.locate().await?;
        info!(
            "Capturing {} on {} to {}",
            self.settings.prefix,
            port,
            target.display()
        );

        self.run(&Self::capture_args(&port, &target)).await?;

        if tokio::fs::try_exists(&jpeg).await.unwrap_or(false) {
            if let Err(e) =
                update_last_image(&jpeg, &last, ImageType::Jpg, &self.settings.overlay).await
            {
                warn!("Failed to update {}: {}", last.display(), e);
            }
        }

        Ok(())
    }
}
