use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

pub const CAPTURE_MEASUREMENT: &str = "camera";
pub const CAPTURE_FIELD: &str = "timing_capture_s";
pub const CAMERA_TAG: &str = "camera_name";

/// A named metric point with tags and numeric fields
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp: SystemTime,
}

impl Measurement {
    pub fn new<S: Into<String>>(name: S, timestamp: SystemTime) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field<K: Into<String>>(mut self, key: K, value: f64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Duration of one successful capture, tagged with the camera prefix
    pub fn capture_timing(camera: &str, elapsed: Duration, timestamp: SystemTime) -> Self {
        Self::new(CAPTURE_MEASUREMENT, timestamp)
            .with_tag(CAMERA_TAG, camera)
            .with_field(CAPTURE_FIELD, elapsed.as_secs_f64())
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).copied()
    }
}
