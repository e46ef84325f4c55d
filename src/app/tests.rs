use super::*;
use crate::camera::mock::MockCamera;
use crate::camera::{Camera, CaptureLock};
use crate::error::{EyepiError, Result};
use crate::metrics::MetricsSink;
use crate::scheduler::{AnchoredClock, Measurement};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

/// Serves a scripted sequence of camera generations; `None` fails the load
#[derive(Default)]
struct MockSource {
    plans: Mutex<VecDeque<Option<Vec<Arc<MockCamera>>>>>,
    loads: AtomicUsize,
}

impl MockSource {
    fn with_plans(plans: Vec<Option<Vec<Arc<MockCamera>>>>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into()),
            loads: AtomicUsize::new(0),
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CameraSource for MockSource {
    async fn load(&self, _lock: &CaptureLock) -> Result<Vec<Arc<dyn Camera>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.plans.lock().pop_front().flatten() {
            Some(cameras) => Ok(cameras
                .into_iter()
                .map(|camera| camera as Arc<dyn Camera>)
                .collect()),
            None => Err(EyepiError::system("configuration unreadable")),
        }
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    received: Arc<Mutex<Vec<Measurement>>>,
}

#[async_trait::async_trait]
impl MetricsSink for RecordingSink {
    async fn record(&mut self, measurement: &Measurement) -> Result<()> {
        self.received.lock().push(measurement.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct BrokenSink {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl MetricsSink for BrokenSink {
    async fn record(&mut self, _measurement: &Measurement) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EyepiError::metrics("connection reset"))
    }
}

fn cameras(names: &[&str], interval: Duration) -> Vec<Arc<MockCamera>> {
    names
        .iter()
        .map(|name| Arc::new(MockCamera::new(*name, interval)))
        .collect()
}

fn orchestrator(source: Arc<MockSource>, sink: Option<Box<dyn MetricsSink>>) -> EyepiOrchestrator {
    let clock = Arc::new(AnchoredClock::new(
        UNIX_EPOCH + Duration::from_secs(1_700_000_000),
    ));
    EyepiOrchestrator::new(source, sink).with_clock(clock)
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_generation() {
    let first = cameras(&["a", "b"], Duration::from_secs(1));
    let second = cameras(&["a", "b", "c"], Duration::from_secs(1));
    let source = MockSource::with_plans(vec![Some(first.clone()), Some(second.clone())]);
    let mut orchestrator = orchestrator(source.clone(), None);

    assert_eq!(orchestrator.start().await.unwrap(), 2);
    assert_eq!(orchestrator.live_instances(), 2);
    assert_eq!(orchestrator.generation(), 1);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let report = orchestrator.restart(RestartTrigger::DeviceChange).await.unwrap();

    assert_eq!(report.trigger, RestartTrigger::DeviceChange);
    assert_eq!(report.stopped, 2);
    assert_eq!(report.started, 3);
    assert_eq!(orchestrator.live_instances(), 3);
    assert_eq!(orchestrator.cameras().len(), 3);
    assert_eq!(orchestrator.generation(), 2);
    assert_eq!(source.loads(), 2);

    // The old generation never captures again
    let old_counts: Vec<usize> = first.iter().map(|c| c.capture_count()).collect();
    assert_eq!(old_counts, vec![2, 2]);

    // Relay measurements for 5s so the new schedulers never block on send
    let (_writes_tx, writes) = mpsc::unbounded_channel();
    let reason = orchestrator
        .run(writes, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ShutdownReason::Signal("SIGTERM".to_string())
        })
        .await
        .unwrap();
    assert_eq!(reason, ShutdownReason::Signal("SIGTERM".to_string()));

    assert_eq!(
        first.iter().map(|c| c.capture_count()).collect::<Vec<_>>(),
        old_counts
    );
    // Restarted at 2.5s: captures at 3s, 4s, 5s, 6s and 7s
    for camera in &second {
        assert_eq!(camera.capture_count(), 5, "{}", camera.name());
    }
    assert_eq!(orchestrator.live_instances(), 0);
    assert_eq!(source.loads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_with_prebuilt_cameras_skips_load() {
    let prebuilt = cameras(&["a"], Duration::from_secs(1));
    let source = MockSource::with_plans(vec![Some(Vec::new())]);
    let mut orchestrator = orchestrator(source.clone(), None);

    let launched = orchestrator.start_with(
        prebuilt
            .iter()
            .map(|camera| Arc::clone(camera) as Arc<dyn Camera>)
            .collect(),
    );
    assert_eq!(launched, 1);
    assert_eq!(orchestrator.generation(), 1);
    assert_eq!(source.loads(), 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(prebuilt[0].capture_count(), 1);

    // Later restarts go through the source
    let report = orchestrator.restart(RestartTrigger::ConfigWrite).await.unwrap();
    assert_eq!((report.stopped, report.started), (1, 0));
    assert_eq!(source.loads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_from_and_to_empty_generation() {
    let only = cameras(&["solo"], Duration::from_secs(60));
    let source = MockSource::with_plans(vec![Some(Vec::new()), Some(only), Some(Vec::new())]);
    let mut orchestrator = orchestrator(source, None);

    assert_eq!(orchestrator.start().await.unwrap(), 0);

    let report = orchestrator.restart(RestartTrigger::ConfigWrite).await.unwrap();
    assert_eq!((report.stopped, report.started), (0, 1));
    assert_eq!(orchestrator.live_instances(), 1);

    let report = orchestrator.restart(RestartTrigger::ConfigWrite).await.unwrap();
    assert_eq!((report.stopped, report.started), (1, 0));
    assert_eq!(orchestrator.live_instances(), 0);
    assert_eq!(report.reports[0].camera, "solo");
    assert_eq!(report.reports[0].attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reload_failure_is_fatal() {
    let source = MockSource::with_plans(vec![Some(cameras(&["a"], Duration::from_secs(1))), None]);
    let mut orchestrator = orchestrator(source, None);
    orchestrator.start().await.unwrap();

    let result = orchestrator.restart(RestartTrigger::ConfigWrite).await;
    assert!(result.is_err());
    assert_eq!(orchestrator.live_instances(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_measurement_survives_restart() {
    let slow = vec![Arc::new(
        MockCamera::new("slow", Duration::from_secs(1)).with_capture_time(Duration::from_millis(500)),
    )];
    let sink = RecordingSink::default();
    let source = MockSource::with_plans(vec![Some(slow.clone()), Some(Vec::new())]);
    let mut orchestrator = orchestrator(source, Some(Box::new(sink.clone())));
    orchestrator.start().await.unwrap();

    // The first capture starts at 1s and is still running at 1.2s
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(slow[0].capture_count(), 1);

    let report = orchestrator.restart(RestartTrigger::DeviceChange).await.unwrap();
    assert_eq!(report.relayed, 1);
    assert_eq!(report.reports[0].captures, 1);

    let received = sink.received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].tag("camera_name"), Some("slow"));
}

#[tokio::test(start_paused = true)]
async fn test_restart_discards_pending_device_change() {
    let source = MockSource::with_plans(vec![Some(Vec::new()), Some(Vec::new())]);
    let mut orchestrator = orchestrator(source, None);
    orchestrator.start().await.unwrap();

    let signal = orchestrator.device_signal();
    assert!(signal.notify());
    orchestrator.restart(RestartTrigger::ConfigWrite).await.unwrap();
    assert!(!signal.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_failing_sink_is_dropped_after_first_error() {
    let sink = BrokenSink::default();
    let source = MockSource::with_plans(vec![
        Some(cameras(&["a"], Duration::from_secs(1))),
        Some(Vec::new()),
    ]);
    let mut orchestrator = orchestrator(source, Some(Box::new(sink.clone())));
    orchestrator.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let report = orchestrator.restart(RestartTrigger::DeviceChange).await.unwrap();

    assert_eq!(report.relayed, 3);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_serves_triggers_until_shutdown() {
    let interval = Duration::from_secs(1);
    let source = MockSource::with_plans(vec![
        Some(cameras(&["g1"], interval)),
        Some(cameras(&["g2"], interval)),
        Some(cameras(&["g3"], interval)),
        Some(cameras(&["g4"], interval)),
    ]);
    let sink = RecordingSink::default();
    let mut orchestrator = orchestrator(source.clone(), Some(Box::new(sink.clone())));
    orchestrator.start().await.unwrap();

    // Two device changes before the loop runs coalesce into one restart
    let signal = orchestrator.device_signal();
    assert!(signal.notify());
    assert!(!signal.notify());

    let (write_tx, write_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let shutdown = async {
            shutdown_rx
                .await
                .unwrap_or_else(|_| ShutdownReason::Error("dropped".to_string()))
        };
        let result = orchestrator.run(write_rx, shutdown).await;
        (orchestrator, result)
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.loads(), 2);

    // Every write restarts; nothing is coalesced
    write_tx.send(()).unwrap();
    write_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.loads(), 4);

    // Measurements from the live generation flow to the sink
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(sink
        .received
        .lock()
        .iter()
        .any(|m| m.tag("camera_name") == Some("g4")));

    shutdown_tx
        .send(ShutdownReason::Signal("SIGTERM".to_string()))
        .unwrap();
    let (orchestrator, result) = task.await.unwrap();
    assert_eq!(result.unwrap(), ShutdownReason::Signal("SIGTERM".to_string()));
    assert_eq!(orchestrator.live_instances(), 0);
    assert_eq!(orchestrator.generation(), 4);
}

#[tokio::test]
async fn test_file_source_builds_cameras() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("eyepi.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
base_dir = "{}"

[picamera]
interval = "2m"
image_types = ["png"]

[gphoto.canon]
enable = false
serial_number = "cd6acfa090894f9bbe7b21037a49389b"
"#,
        dir.path().join("images").display()
    )
    .unwrap();

    let source = FileCameraSource::new(&config_path);
    let cameras = source.load(&crate::camera::new_capture_lock()).await.unwrap();

    assert_eq!(cameras.len(), 2);
    assert!(cameras[0].name().ends_with("-canon"));
    assert!(!cameras[0].is_enabled());
    assert_eq!(cameras[0].interval(), crate::config::DEFAULT_INTERVAL);
    assert!(cameras[1].name().ends_with("-Picam"));
    assert!(cameras[1].is_enabled());
    assert_eq!(cameras[1].interval(), Duration::from_secs(120));
}

#[tokio::test]
async fn test_file_source_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileCameraSource::new(dir.path().join("missing.toml"));
    assert!(matches!(
        source.load(&crate::camera::new_capture_lock()).await,
        Err(EyepiError::Config(_))
    ));
}

#[test]
fn test_write_event_filter() {
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use notify::EventKind;

    assert!(is_write_event(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
    assert!(is_write_event(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
    assert!(is_write_event(&EventKind::Modify(ModifyKind::Any)));
    assert!(!is_write_event(&EventKind::Create(CreateKind::File)));
    assert!(!is_write_event(&EventKind::Remove(RemoveKind::File)));
    assert!(!is_write_event(&EventKind::Modify(ModifyKind::Name(
        notify::event::RenameMode::Any
    ))));
}

#[tokio::test]
async fn test_config_watcher_reports_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("eyepi.toml");
    std::fs::write(&config_path, "base_dir = \"/tmp\"\n").unwrap();

    let (watcher, mut writes) = ConfigWatcher::new(&config_path).unwrap();
    assert_eq!(watcher.path(), config_path.as_path());

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&config_path)
        .unwrap();
    writeln!(file, "# edited").unwrap();
    file.sync_all().unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), writes.recv()).await;
    assert_eq!(received.unwrap(), Some(()));
}
