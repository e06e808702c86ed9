use super::*;

#[test]
fn test_default_config() {
    let config = RetryConfig::default();
    assert_eq!(config.base_delay, Duration::from_secs(1));
    assert_eq!(config.max_delay, Duration::from_secs(30));
    assert!((config.jitter - 0.25).abs() < f64::EPSILON);
}

#[test]
fn test_exponential_backoff() {
    let config = RetryConfig {
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(60),
        jitter: 0.0,
    };

    assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
    assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
    assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
    assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
}

#[test]
fn test_delay_capped_at_max() {
    let config = RetryConfig {
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        jitter: 0.0,
    };

    // 1s * 2^5 = 32s, capped at 30s
    assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    assert_eq!(config.delay_for_attempt(40), Duration::from_secs(30));
}

#[test]
fn test_jitter_applies() {
    let config = RetryConfig {
        base_delay: Duration::from_millis(1000),
        max_delay: Duration::from_secs(10),
        jitter: 0.25,
    };

    let ms = config.delay_for_attempt(0).as_millis() as f64;
    assert!(ms >= 750.0, "Delay {} too low", ms);
    assert!(ms <= 1250.0, "Delay {} too high", ms);
}

#[test]
fn test_for_reconnect_never_inverts_bounds() {
    let config = RetryConfig::for_reconnect(Duration::from_secs(10), Duration::from_secs(1));
    assert_eq!(config.max_delay, Duration::from_secs(10));
}
