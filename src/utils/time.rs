use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return microsecond
pub(crate) fn get_now_as_micros() -> u64 {
    let now = SystemTime::now();
    // A clock before the epoch only happens on badly misconfigured hosts; fall back to zero
    // and let the caller's monotonic sequence take over.
    now.duration_since(UNIX_EPOCH).map(|d| d.as_micros() as u64).unwrap_or(0)
}

/// Returns a timestamp strictly greater than `last`, preferring wall-clock time.
pub(crate) fn next_timestamp(last: u64) -> u64 {
    get_now_as_micros().max(last + 1)
}
