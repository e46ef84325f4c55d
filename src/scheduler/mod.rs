mod alignment;
mod clock;
mod measurement;
mod runner;

pub use alignment::{next_alignment, truncate};
pub use clock::{AnchoredClock, Clock, SystemClock};
pub use measurement::{Measurement, CAPTURE_FIELD, CAPTURE_MEASUREMENT, CAMERA_TAG};
pub use runner::{CameraScheduler, SchedulerReport};
