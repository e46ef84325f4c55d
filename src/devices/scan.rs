use super::uevent::read_uevent_file;
use crate::error::{EyepiError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root of the sysfs device hierarchy
pub const DEFAULT_DEVICE_ROOT: &str = "/sys/devices";

/// One enumerated device: its kernel object directory and uevent attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub kobj: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Device {
    pub fn product_name(&self) -> Option<&str> {
        self.env.get("PRODUCTNAME").map(String::as_str)
    }

    pub fn devname(&self) -> Option<&str> {
        self.env.get("DEVNAME").map(String::as_str)
    }
}

/// Walk `root` and return every device whose subsystem link contains
/// `subsystem` and whose `DRIVER` attribute equals `driver`, ordered by
/// kernel object path, descending.
///
/// Any IO error aborts the walk.
pub fn scan_devices(root: &Path, subsystem: &str, driver: &str) -> Result<Vec<Device>> {
    let mut devices = Vec::new();
    walk(root, &mut |uevent| {
        if let Some(device) = inspect(uevent, subsystem, driver)? {
            devices.push(device);
        }
        Ok(())
    })?;

    devices.sort_by(|a, b| b.kobj.cmp(&a.kobj));
    Ok(devices)
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(|e| EyepiError::device_scan(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        // DirEntry::file_type does not follow symlinks, so linked
        // directories (subsystem, driver, port) are never descended into
        let file_type = entry
            .file_type()
            .map_err(|e| EyepiError::device_scan(&path, e))?;

        if file_type.is_dir() {
            walk(&path, visit)?;
        } else if entry.file_name() == "uevent" {
            visit(&path)?;
        }
    }

    Ok(())
}

fn inspect(uevent: &Path, subsystem: &str, driver: &str) -> Result<Option<Device>> {
    let mut env = read_uevent_file(uevent).map_err(|e| EyepiError::device_scan(uevent, e))?;
    let kobj = match uevent.parent() {
        Some(parent) => parent.to_path_buf(),
        None => return Ok(None),
    };

    let link = match std::fs::read_link(kobj.join("subsystem")) {
        Ok(link) => link,
        Err(_) => return Ok(None),
    };
    let subsystem_name = link
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !subsystem_name.contains(subsystem) {
        return Ok(None);
    }
    env.insert("SUBSYSTEM".to_string(), subsystem_name);

    let product = kobj.join("product");
    if product.exists() {
        let name =
            std::fs::read_to_string(&product).map_err(|e| EyepiError::device_scan(&product, e))?;
        env.insert("PRODUCTNAME".to_string(), name.trim_end().to_string());
    }

    if env.get("DRIVER").map(String::as_str) != Some(driver) {
        return Ok(None);
    }

    Ok(Some(Device { kobj, env }))
}
