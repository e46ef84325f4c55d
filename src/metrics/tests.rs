use super::*;
use crate::scheduler::Measurement;
use std::time::{Duration, UNIX_EPOCH};
use tokio::io::AsyncBufReadExt;
use tokio::net::UnixListener;

fn timing(camera: &str, secs: f64) -> Measurement {
    Measurement::capture_timing(
        camera,
        Duration::from_secs_f64(secs),
        UNIX_EPOCH + Duration::from_secs(1_700_000_000),
    )
}

#[test]
fn test_encode_capture_timing() {
    let line = encode_line(&timing("pi01-Picam", 2.5)).unwrap();
    assert_eq!(
        line,
        "camera,camera_name=pi01-Picam timing_capture_s=2.5 1700000000000000000\n"
    );
}

#[test]
fn test_escaping() {
    assert_eq!(escape_measurement("my camera,1"), "my\\ camera\\,1");
    assert_eq!(escape_tag("a=b c,d"), "a\\=b\\ c\\,d");

    let line = encode_line(&timing("front door", 1.0)).unwrap();
    assert!(line.starts_with("camera,camera_name=front\\ door timing_capture_s=1 "));
}

#[test]
fn test_encode_rejects_measurement_without_fields() {
    let empty = Measurement::new("camera", UNIX_EPOCH);
    assert!(encode_line(&empty).is_err());

    let nan = Measurement::new("camera", UNIX_EPOCH).with_field("timing_capture_s", f64::NAN);
    assert!(encode_line(&nan).is_err());
}

#[test]
fn test_encode_skips_empty_tags() {
    let m = Measurement::new("camera", UNIX_EPOCH + Duration::from_nanos(42))
        .with_tag("camera_name", "")
        .with_tag("host", "pi01")
        .with_field("a", 1.5)
        .with_field("b", 2.0);
    assert_eq!(encode_line(&m).unwrap(), "camera,host=pi01 a=1.5,b=2 42\n");
}

#[tokio::test]
async fn test_telegraf_sink_writes_lines() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("telegraf.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let reader = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = tokio::io::BufReader::new(stream).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(line);
        }
        received
    });

    let mut sink = TelegrafSink::connect(&socket).await.unwrap();
    assert_eq!(sink.path(), socket.as_path());
    sink.record(&timing("a", 0.5)).await.unwrap();
    sink.record(&timing("b", 1.25)).await.unwrap();
    drop(sink);

    let received = reader.await.unwrap();
    assert_eq!(
        received,
        vec![
            "camera,camera_name=a timing_capture_s=0.5 1700000000000000000",
            "camera,camera_name=b timing_capture_s=1.25 1700000000000000000",
        ]
    );
}

#[tokio::test]
async fn test_telegraf_sink_missing_socket() {
    let dir = tempfile::tempdir().unwrap();
    let result = TelegrafSink::connect(dir.path().join("absent.sock")).await;
    assert!(matches!(result, Err(crate::error::EyepiError::Metrics { .. })));
}
