use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Round `time` down to a multiple of `interval` since the Unix epoch.
/// A zero interval, or a time before the epoch, is returned unchanged.
pub fn truncate(time: SystemTime, interval: Duration) -> SystemTime {
    let step = interval.as_nanos();
    if step == 0 {
        return time;
    }
    let Ok(since_epoch) = time.duration_since(UNIX_EPOCH) else {
        return time;
    };

    let excess = since_epoch.as_nanos() % step;
    let excess = Duration::new(
        (excess / NANOS_PER_SEC) as u64,
        (excess % NANOS_PER_SEC) as u32,
    );
    time - excess
}

/// First interval boundary strictly after `now`
pub fn next_alignment(now: SystemTime, interval: Duration) -> SystemTime {
    truncate(now + interval, interval)
}
