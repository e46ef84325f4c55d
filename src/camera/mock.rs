use super::Camera;
use crate::error::{EyepiError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

/// Mock camera for exercising schedulers without capture hardware
#[derive(Debug)]
pub struct MockCamera {
    name: String,
    interval: Duration,
    enabled: AtomicBool,
    failing: AtomicBool,
    capture_time: Duration,
    captures: Mutex<Vec<SystemTime>>,
}

impl MockCamera {
    pub fn new<S: Into<String>>(name: S, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            enabled: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            capture_time: Duration::ZERO,
            captures: Mutex::new(Vec::new()),
        }
    }

    /// Every capture fails after being recorded
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Each capture takes this long to complete
    pub fn with_capture_time(mut self, capture_time: Duration) -> Self {
        self.capture_time = capture_time;
        self
    }

    /// Timestamps of every capture attempt, in order
    pub fn captures(&self) -> Vec<SystemTime> {
        self.captures.lock().clone()
    }

    pub fn capture_count(&self) -> usize {
        self.captures.lock().len()
    }
}

#[async_trait::async_trait]
impl Camera for MockCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn capture(&self, timestamp: SystemTime) -> Result<()> {
        self.captures.lock().push(timestamp);
        if !self.capture_time.is_zero() {
            tokio::time::sleep(self.capture_time).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(EyepiError::capture(self.name.as_str(), "mock capture failure"));
        }
        Ok(())
    }
}
