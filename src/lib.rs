pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod devices;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod signal;

pub use app::{
    build_cameras, ConfigWatcher, EyepiOrchestrator, FileCameraSource, RestartReport,
    RestartTrigger, ShutdownReason,
};
pub use camera::{Camera, CameraSettings, CaptureLock, GphotoCamera, PiCamera};
pub use config::EyepiConfig;
pub use devices::{Device, DeviceWatcher};
pub use error::{EyepiError, Result};
pub use metrics::{MetricsSink, TelegrafSink};
pub use scheduler::{CameraScheduler, Measurement};
pub use signal::ChangeSignal;
