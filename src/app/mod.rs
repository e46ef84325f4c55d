mod config_watch;
mod orchestrator;
mod runtime;
mod source;
mod types;

#[cfg(test)]
mod tests;

pub use config_watch::{is_write_event, ConfigWatcher};
pub use orchestrator::EyepiOrchestrator;
pub use runtime::{shutdown_signal, spawn_signal_handlers};
pub use source::{build_cameras, CameraSource, FileCameraSource};
pub use types::{RestartReport, RestartTrigger, ShutdownReason};
