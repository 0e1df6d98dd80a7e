use super::time::get_now_as_micros;
use super::time::next_timestamp;

#[test]
fn test_next_timestamp_is_strictly_increasing() {
    let mut last = 0;
    for _ in 0..1000 {
        let ts = next_timestamp(last);
        assert!(ts > last);
        last = ts;
    }
}

/// Passed: a timestamp far in the future
/// Expected: wall clock ignored, last + 1 returned
#[test]
fn test_next_timestamp_with_future_last() {
    let future = get_now_as_micros() + 60_000_000;
    assert_eq!(next_timestamp(future), future + 1);
}
