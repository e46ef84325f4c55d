use crate::camera::{Camera, CameraSettings, CaptureLock, GphotoCamera, PiCamera};
use crate::capture::OverlayStyle;
use crate::config::EyepiConfig;
use crate::error::{EyepiError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Produces the camera set for each scheduling generation
#[async_trait::async_trait]
pub trait CameraSource: Send + Sync {
    async fn load(&self, lock: &CaptureLock) -> Result<Vec<Arc<dyn Camera>>>;
}

/// Reads the TOML configuration file on every load
#[derive(Debug, Clone)]
pub struct FileCameraSource {
    path: PathBuf,
}

impl FileCameraSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl CameraSource for FileCameraSource {
    async fn load(&self, lock: &CaptureLock) -> Result<Vec<Arc<dyn Camera>>> {
        let path = self.path.clone();
        let config = tokio::task::spawn_blocking(move || EyepiConfig::load_from_file(path))
            .await
            .map_err(|e| EyepiError::system(format!("Config load task failed: {}", e)))??;

        Ok(build_cameras(&config, lock).await)
    }
}

/// Build every configured camera. Gphoto cameras that cannot be found on
/// the USB bus are disabled for this generation.
pub async fn build_cameras(config: &EyepiConfig, lock: &CaptureLock) -> Vec<Arc<dyn Camera>> {
    let overlay = OverlayStyle::from_config(config);
    let mut cameras: Vec<Arc<dyn Camera>> = Vec::with_capacity(config.gphoto.len() + 1);

    for (name, gphoto) in &config.gphoto {
        let settings = CameraSettings::new(
            gphoto.filename_prefix.clone(),
            gphoto.output_dir.clone(),
            gphoto.interval.as_duration(),
            config.timestamp_format.clone(),
            overlay.clone(),
            gphoto.enable,
        );
        let camera = GphotoCamera::new(settings, gphoto.serial_number.clone());

        if camera.is_enabled() {
            let _guard = lock.lock().await;
            if let Err(e) = camera.locate().await {
                error!("Disabling gphoto camera {}: {}", name, e);
                camera.set_enabled(false);
            }
        }

        log_camera(&camera, camera.port().as_deref());
        cameras.push(Arc::new(camera));
    }

    let picamera = &config.picamera;
    let settings = CameraSettings::new(
        picamera.filename_prefix.clone(),
        picamera.output_dir.clone(),
        picamera.interval.as_duration(),
        config.timestamp_format.clone(),
        overlay,
        picamera.enable,
    );
    let camera = PiCamera::new(settings, picamera.image_types.clone());
    log_camera(&camera, None);
    cameras.push(Arc::new(camera));

    cameras
}

fn log_camera(camera: &dyn Camera, port: Option<&str>) {
    info!(
        camera = camera.name(),
        enabled = camera.is_enabled(),
        interval = ?camera.interval(),
        port = port.unwrap_or("-"),
        "Camera ready"
    );
}
