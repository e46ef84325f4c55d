//! USB topology change detection by polling the sysfs device tree.

mod scan;
mod uevent;
mod watcher;

pub use scan::{scan_devices, Device, DEFAULT_DEVICE_ROOT};
pub use uevent::{parse_uevent, read_uevent_file};
pub use watcher::{DeviceChange, DeviceWatcher};
