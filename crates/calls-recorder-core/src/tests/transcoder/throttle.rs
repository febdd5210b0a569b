use crate::transcoder::LogThrottle;

use std::time::Duration;

/// WHAT: The first event passes and repeats inside the interval are dropped
/// WHY: Progress arrives every second but is logged far less often
#[tokio::test]
async fn given_throttle_when_events_arrive_then_one_per_interval() {
    // Given: A short throttle
    let mut throttle = LogThrottle::new(Duration::from_millis(100));

    // When / Then: First passes, immediate repeat does not
    assert!(throttle.allow());
    assert!(!throttle.allow());

    // When / Then: Interval elapsed
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(throttle.allow());
    assert!(!throttle.allow());
}
