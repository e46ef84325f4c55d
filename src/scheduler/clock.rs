use std::fmt::Debug;
use std::time::SystemTime;
use tokio::time::Instant;

/// Source of wall-clock time for alignment
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Wall clock pinned to a start time and advanced by the tokio timer, so it
/// follows paused and auto-advanced runtime time.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    wall: SystemTime,
    origin: Instant,
}

impl AnchoredClock {
    pub fn new(wall: SystemTime) -> Self {
        Self {
            wall,
            origin: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> SystemTime {
        self.wall + self.origin.elapsed()
    }
}
