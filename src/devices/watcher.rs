use super::scan::{scan_devices, Device, DEFAULT_DEVICE_ROOT};
use crate::error::{EyepiError, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Difference in device count between two unequal snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChange {
    pub previous: usize,
    pub current: usize,
}

impl DeviceChange {
    /// Positive when devices were removed, negative when added
    pub fn delta(&self) -> isize {
        self.previous as isize - self.current as isize
    }
}

/// Polls the device tree and reports when the filtered device set changes
pub struct DeviceWatcher {
    root: PathBuf,
    subsystem: String,
    driver: String,
    interval: Duration,
    snapshot: Option<Vec<Device>>,
}

impl DeviceWatcher {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(
        root: P,
        subsystem: S,
        driver: S,
        interval: Duration,
    ) -> Self {
        Self {
            root: root.into(),
            subsystem: subsystem.into(),
            driver: driver.into(),
            interval,
            snapshot: None,
        }
    }

    /// Watcher for USB devices bound to the generic `usb` driver
    pub fn usb(interval: Duration) -> Self {
        Self::new(DEFAULT_DEVICE_ROOT, "usb", "usb", interval)
    }

    pub fn snapshot(&self) -> Option<&[Device]> {
        self.snapshot.as_deref()
    }

    /// Scan the device tree once on the blocking pool
    pub async fn poll(&self) -> Result<Vec<Device>> {
        let root = self.root.clone();
        let subsystem = self.subsystem.clone();
        let driver = self.driver.clone();

        tokio::task::spawn_blocking(move || scan_devices(&root, &subsystem, &driver))
            .await
            .map_err(|e| EyepiError::system(format!("Device scan task failed: {}", e)))?
    }

    /// Record a new snapshot. The first snapshot is the baseline; afterwards
    /// a change is reported only when the sets differ structurally.
    pub fn observe(&mut self, devices: Vec<Device>) -> Option<DeviceChange> {
        let change = match &self.snapshot {
            None => None,
            Some(previous) if *previous == devices => return None,
            Some(previous) => Some(DeviceChange {
                previous: previous.len(),
                current: devices.len(),
            }),
        };
        self.snapshot = Some(devices);
        change
    }

    /// Poll until cancelled, invoking `on_change` after every poll whose
    /// result differs from the previous one. Failed polls leave the previous
    /// snapshot in place.
    pub async fn watch<F>(mut self, mut on_change: F, cancel: CancellationToken)
    where
        F: FnMut(DeviceChange) + Send,
    {
        info!(
            "Watching {} for {} devices every {:?}",
            self.root.display(),
            self.subsystem,
            self.interval
        );
        self.refresh().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            if let Some(change) = self.refresh().await {
                match change.delta() {
                    removed if removed > 0 => warn!("{} devices removed", removed),
                    added if added < 0 => warn!("{} devices added", -added),
                    _ => warn!("Device set changed ({} present)", change.current),
                }
                on_change(change);
            }
        }

        debug!("Device watcher stopped");
    }

    async fn refresh(&mut self) -> Option<DeviceChange> {
        match self.poll().await {
            Ok(devices) => self.observe(devices),
            Err(e) => {
                warn!("Device scan failed, keeping previous snapshot: {}", e);
                None
            }
        }
    }
}
