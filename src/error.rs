use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EyepiError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Capture failed for camera {camera}: {message}")]
    Capture { camera: String, message: String },

    #[error("Gphoto2 camera with serial number {serial} not detected")]
    DeviceNotFound { serial: String },

    #[error("Device scan failed at {}: {source}", path.display())]
    DeviceScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metrics error: {message}")]
    Metrics { message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl EyepiError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn metrics<S: Into<String>>(message: S) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }

    pub fn capture<C: Into<String>, M: Into<String>>(camera: C, message: M) -> Self {
        Self::Capture {
            camera: camera.into(),
            message: message.into(),
        }
    }

    pub fn device_scan<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::DeviceScan {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EyepiError>;
