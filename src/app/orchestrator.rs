use super::source::CameraSource;
use super::types::{RestartReport, RestartTrigger, ShutdownReason};
use crate::camera::{new_capture_lock, Camera, CaptureLock};
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::scheduler::{CameraScheduler, Clock, Measurement, SchedulerReport, SystemClock};
use crate::signal::ChangeSignal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the channel between schedulers and the relay loop
const MEASUREMENT_BUFFER: usize = 8;

/// How long shutdown waits for in-flight captures before aborting them
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Owns every live camera scheduler and restarts them as a group.
///
/// Each scheduler is launched together with its own stop token, so the
/// number of tokens cancelled on restart always equals the number of live
/// instances. Restart cycles run on the caller's task and never overlap.
pub struct EyepiOrchestrator {
    source: Arc<dyn CameraSource>,
    lock: CaptureLock,
    clock: Arc<dyn Clock>,
    sink: Option<Box<dyn MetricsSink>>,
    device_signal: Arc<ChangeSignal>,

    measurement_tx: mpsc::Sender<Measurement>,
    measurement_rx: mpsc::Receiver<Measurement>,

    generation: u64,
    cameras: Vec<Arc<dyn Camera>>,
    stop_tokens: Vec<CancellationToken>,
    schedulers: JoinSet<SchedulerReport>,
}

impl EyepiOrchestrator {
    pub fn new(source: Arc<dyn CameraSource>, sink: Option<Box<dyn MetricsSink>>) -> Self {
        let (measurement_tx, measurement_rx) = mpsc::channel(MEASUREMENT_BUFFER);

        Self {
            source,
            lock: new_capture_lock(),
            clock: Arc::new(SystemClock),
            sink,
            device_signal: Arc::new(ChangeSignal::new()),
            measurement_tx,
            measurement_rx,
            generation: 0,
            cameras: Vec::new(),
            stop_tokens: Vec::new(),
            schedulers: JoinSet::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Signal raised by the device watcher
    pub fn device_signal(&self) -> Arc<ChangeSignal> {
        Arc::clone(&self.device_signal)
    }

    pub fn capture_lock(&self) -> CaptureLock {
        Arc::clone(&self.lock)
    }

    /// Number of scheduler instances currently running
    pub fn live_instances(&self) -> usize {
        self.stop_tokens.len()
    }

    pub fn cameras(&self) -> &[Arc<dyn Camera>] {
        &self.cameras
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Load the first generation and launch its schedulers
    pub async fn start(&mut self) -> Result<usize> {
        let cameras = self.source.load(&self.lock).await?;
        Ok(self.launch(cameras))
    }

    /// Launch the first generation from cameras the caller already built
    pub fn start_with(&mut self, cameras: Vec<Arc<dyn Camera>>) -> usize {
        self.launch(cameras)
    }

    fn launch(&mut self, cameras: Vec<Arc<dyn Camera>>) -> usize {
        self.generation += 1;

        for camera in &cameras {
            let stop = CancellationToken::new();
            let scheduler = CameraScheduler::new(
                Arc::clone(camera),
                Arc::clone(&self.lock),
                self.measurement_tx.clone(),
                stop.clone(),
            )
            .with_clock(Arc::clone(&self.clock));

            self.schedulers.spawn(scheduler.run());
            self.stop_tokens.push(stop);
        }
        self.cameras = cameras;

        info!(
            "Generation {} running {} camera scheduler(s)",
            self.generation,
            self.stop_tokens.len()
        );
        self.stop_tokens.len()
    }

    /// Stop every live scheduler and wait for each to acknowledge by
    /// returning. Measurements produced meanwhile are relayed, and a pending
    /// device-change token is discarded.
    async fn stop_all(&mut self) -> (Vec<SchedulerReport>, usize) {
        let tokens = std::mem::take(&mut self.stop_tokens);
        for token in &tokens {
            token.cancel();
        }
        debug!("Delivered {} stop token(s)", tokens.len());

        let mut reports = Vec::with_capacity(tokens.len());
        let mut relayed = 0;

        loop {
            tokio::select! {
                joined = self.schedulers.join_next() => match joined {
                    Some(Ok(report)) => {
                        debug!("{} acknowledged stop", report.camera);
                        reports.push(report);
                    }
                    Some(Err(e)) => error!("Camera scheduler task failed: {}", e),
                    None => break,
                },
                Some(measurement) = self.measurement_rx.recv() => {
                    Self::relay_to(&mut self.sink, measurement).await;
                    relayed += 1;
                }
            }
        }

        while let Ok(measurement) = self.measurement_rx.try_recv() {
            Self::relay_to(&mut self.sink, measurement).await;
            relayed += 1;
        }
        if self.device_signal.take() {
            debug!("Discarded pending device change");
        }
        self.cameras.clear();

        (reports, relayed)
    }

    /// Stop, drain, reload and relaunch. A reload failure is returned to the
    /// caller with no schedulers running.
    pub async fn restart(&mut self, trigger: RestartTrigger) -> Result<RestartReport> {
        info!(
            "Restarting {} camera scheduler(s) after {:?}",
            self.live_instances(),
            trigger
        );

        let (reports, relayed) = self.stop_all().await;
        let stopped = reports.len();

        let cameras = self.source.load(&self.lock).await.map_err(|e| {
            error!("Reloading configuration failed: {}", e);
            e
        })?;
        let started = self.launch(cameras);

        Ok(RestartReport {
            trigger,
            stopped,
            relayed,
            started,
            reports,
        })
    }

    /// Relay measurements and serve restart triggers until `shutdown`
    /// resolves. Each config write restarts once; device changes coalesce.
    pub async fn run<F>(
        &mut self,
        mut config_writes: mpsc::UnboundedReceiver<()>,
        shutdown: F,
    ) -> Result<ShutdownReason>
    where
        F: Future<Output = ShutdownReason>,
    {
        tokio::pin!(shutdown);
        let device_signal = self.device_signal();
        let mut watching_config = true;

        info!("Eyepi is running");
        loop {
            tokio::select! {
                reason = &mut shutdown => {
                    info!("Shutdown initiated: {:?}", reason);
                    self.shutdown().await;
                    return Ok(reason);
                }
                Some(measurement) = self.measurement_rx.recv() => {
                    Self::relay_to(&mut self.sink, measurement).await;
                }
                _ = device_signal.wait() => {
                    self.restart(RestartTrigger::DeviceChange).await?;
                }
                write = config_writes.recv(), if watching_config => match write {
                    Some(()) => {
                        self.restart(RestartTrigger::ConfigWrite).await?;
                    }
                    None => {
                        warn!("Configuration watcher closed, config changes will be ignored");
                        watching_config = false;
                    }
                },
            }
        }
    }

    /// Stop all schedulers, aborting any that are still capturing after the
    /// shutdown timeout. Returns the number that stopped cleanly.
    pub async fn shutdown(&mut self) -> usize {
        info!("Stopping {} camera scheduler(s)", self.live_instances());

        match timeout(SHUTDOWN_TIMEOUT, self.stop_all()).await {
            Ok((reports, relayed)) => {
                info!(
                    "All camera schedulers stopped ({} measurements relayed)",
                    relayed
                );
                reports.len()
            }
            Err(_) => {
                warn!(
                    "Camera schedulers did not stop within {:?}, aborting",
                    SHUTDOWN_TIMEOUT
                );
                self.schedulers.abort_all();
                self.stop_tokens.clear();
                0
            }
        }
    }

    async fn relay_to(sink: &mut Option<Box<dyn MetricsSink>>, measurement: Measurement) {
        let Some(active) = sink.as_mut() else {
            return;
        };

        if let Err(e) = active.record(&measurement).await {
            error!("Metrics sink failed, dropping further measurements: {}", e);
            *sink = None;
        }
    }
}
