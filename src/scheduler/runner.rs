use super::alignment::{next_alignment, truncate};
use super::clock::{Clock, SystemClock};
use super::measurement::Measurement;
use crate::camera::{Camera, CaptureLock};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// What one scheduler instance did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub camera: String,
    pub attempts: u64,
    pub captures: u64,
}

/// Periodic capture loop for a single camera.
///
/// Waits for the next wall-clock boundary of the camera's interval, captures
/// once, then captures on every interval tick while the camera is enabled.
/// Stops at the next suspension point after `stop` is cancelled.
pub struct CameraScheduler {
    camera: Arc<dyn Camera>,
    lock: CaptureLock,
    clock: Arc<dyn Clock>,
    measurements: mpsc::Sender<Measurement>,
    stop: CancellationToken,
}

impl CameraScheduler {
    pub fn new(
        camera: Arc<dyn Camera>,
        lock: CaptureLock,
        measurements: mpsc::Sender<Measurement>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            camera,
            lock,
            clock: Arc::new(SystemClock),
            measurements,
            stop,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(self) -> SchedulerReport {
        let interval = self.camera.interval();
        let mut report = SchedulerReport {
            camera: self.camera.name().to_string(),
            ..SchedulerReport::default()
        };

        let now = self.clock.now();
        let aligned = next_alignment(now, interval);
        let wait = aligned.duration_since(now).unwrap_or(Duration::ZERO);
        debug!(
            "{} waiting {:?} for first aligned capture (interval {:?})",
            report.camera, wait, interval
        );

        tokio::select! {
            biased;
            _ = self.stop.cancelled() => {
                info!("{} stopped before first capture", report.camera);
                return report;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let started = Instant::now();
        if self.camera.is_enabled() && !self.capture_once(aligned, &mut report).await {
            return report;
        }

        let mut ticker = tokio::time::interval_at(started + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let tick = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                tick = ticker.tick() => tick,
            };

            if !self.camera.is_enabled() {
                trace!("{} disabled, skipping tick", report.camera);
                continue;
            }

            let timestamp = truncate(aligned + tick.duration_since(started), interval);
            if !self.capture_once(timestamp, &mut report).await {
                break;
            }
        }

        info!(
            "{} scheduler stopped after {} captures ({} attempts)",
            report.camera, report.captures, report.attempts
        );
        report
    }

    /// Run one capture under the shared lock. Returns `false` once the
    /// measurement relay is gone.
    async fn capture_once(&self, timestamp: SystemTime, report: &mut SchedulerReport) -> bool {
        report.attempts += 1;
        let started = Instant::now();

        let result = {
            let _guard = self.lock.lock().await;
            self.camera.capture(timestamp).await
        };

        match result {
            Ok(()) => {
                let elapsed = started.elapsed();
                report.captures += 1;
                info!("{} capture took {:?}", report.camera, elapsed);

                let measurement =
                    Measurement::capture_timing(&report.camera, elapsed, self.clock.now());
                if self.measurements.send(measurement).await.is_err() {
                    warn!("Measurement relay closed, stopping {}", report.camera);
                    return false;
                }
            }
            Err(e) => error!("Error capturing {}: {}", report.camera, e),
        }

        true
    }
}
