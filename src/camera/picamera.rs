use super::raspistill::{Encoding, RaspistillArgs};
use super::{Camera, CameraSettings};
use crate::capture::{convert_to_tiff, update_last_image};
use crate::config::ImageType;
use crate::error::{EyepiError, Result};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::process::Command;
use tracing::{debug, info, warn};

const RASPISTILL: &str = "/opt/vc/bin/raspistill";

/// The Raspberry Pi board camera, captured through raspistill once per
/// configured image type.
pub struct PiCamera {
    settings: CameraSettings,
    image_types: Vec<ImageType>,
    base_args: RaspistillArgs,
    program: PathBuf,
    leading_args: Vec<String>,
}

impl PiCamera {
    pub fn new(settings: CameraSettings, image_types: Vec<ImageType>) -> Self {
        Self {
            settings,
            image_types,
            base_args: RaspistillArgs::default(),
            program: PathBuf::from(RASPISTILL),
            leading_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: RaspistillArgs) -> Self {
        self.base_args = args;
        self
    }

    /// Run raspistill through another program, e.g. a wrapper script
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P, leading_args: Vec<String>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Capture one still in the given encoding and return its bytes
    async fn grab(&self, args: RaspistillArgs) -> Result<Vec<u8>> {
        let args = args.to_args();
        debug!("raspistill args: {:?}", args);

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                EyepiError::capture(
                    self.settings.prefix.as_str(),
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        if !output.status.success() {
            return Err(EyepiError::capture(
                self.settings.prefix.as_str(),
                format!(
                    "raspistill exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        if output.stdout.is_empty() {
            return Err(EyepiError::capture(
                self.settings.prefix.as_str(),
                "raspistill produced no image data",
            ));
        }

        Ok(output.stdout)
    }

    async fn image_for(&self, image_type: ImageType) -> Result<Vec<u8>> {
        let base = self.base_args.clone();
        match image_type {
            ImageType::Jpg => {
                self.grab(base.with_encoding(Encoding::Jpg).with_quality(100))
                    .await
            }
            ImageType::Tiff => {
                let bmp = self.grab(base.with_encoding(Encoding::Bmp)).await?;
                tokio::task::spawn_blocking(move || convert_to_tiff(&bmp))
                    .await
                    .map_err(|e| EyepiError::system(format!("TIFF conversion task failed: {}", e)))?
            }
            ImageType::Bmp => self.grab(base.with_encoding(Encoding::Bmp)).await,
            ImageType::Png => self.grab(base.with_encoding(Encoding::Png)).await,
            ImageType::Gif => self.grab(base.with_encoding(Encoding::Gif)).await,
        }
    }
}

#[async_trait::async_trait]
impl Camera for PiCamera {
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

        for image_type in &self.image_types {
            let extension = image_type.extension();
            let path = self.settings.image_path(&stamp, extension);
            let last = self.settings.last_image_path(extension);

            let image = self.image_for(*image_type).await?;
            tokio::fs::write(&path, &image).await?;
            info!("{} wrote {} ({} bytes)", self.settings.prefix, path.display(), image.len());

            if let Err(e) =
                update_last_image(&path, &last, *image_type, &self.settings.overlay).await
            {
                warn!("Failed to update {}: {}", last.display(), e);
            }
        }

        Ok(())
    }
}
