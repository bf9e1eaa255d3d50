//! Sliding-window behavior of the persistent rate limiter.

use faucet_core::config::RateLimitPolicy;
use faucet_core::ratelimit::{Decision, RateLimiter};

fn policy(addr_limit: u32, ip_limit: u32) -> RateLimitPolicy {
    RateLimitPolicy {
        addr_window: 3600,
        addr_limit,
        ip_window: 3600,
        ip_limit,
    }
}

#[tokio::test]
async fn back_to_back_dispenses_within_window_are_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let limiter = RateLimiter::open(dir.path(), policy(1, 10)).unwrap();
    let addr = [0xAB; 20];
    let t0: i64 = 1_700_000_000_000;

    assert_eq!(
        limiter.check_at(&addr, "198.51.100.7", t0).unwrap(),
        Decision::Allowed
    );
    limiter.record_at(&addr, "198.51.100.7", t0).await.unwrap();

    // Second request anywhere inside the window is refused with the instant
    // the first hit expires
    let Decision::Blocked { retry_at } =
        limiter.check_at(&addr, "198.51.100.7", t0 + 120_000).unwrap()
    else {
        panic!("expected block inside window");
    };
    assert_eq!(retry_at.timestamp_millis(), t0 + 3_600_000);

    assert_eq!(
        limiter.check_at(&addr, "198.51.100.7", t0 + 3_600_001).unwrap(),
        Decision::Allowed
    );
}

#[tokio::test]
async fn failed_attempts_consume_no_quota() {
    let dir = tempfile::tempdir().unwrap();
    let limiter = RateLimiter::open(dir.path(), policy(1, 1)).unwrap();
    let addr = [0xCD; 20];
    let t0: i64 = 1_700_000_000_000;

    // check does not mutate: any number of checks leaves the caller allowed
    for offset in 0..5 {
        assert_eq!(
            limiter.check_at(&addr, "198.51.100.8", t0 + offset).unwrap(),
            Decision::Allowed
        );
    }
}

#[tokio::test]
async fn address_and_ip_windows_bind_independently() {
    let dir = tempfile::tempdir().unwrap();
    let limiter = RateLimiter::open(dir.path(), policy(5, 1)).unwrap();
    let t0: i64 = 1_700_000_000_000;

    limiter.record_at(&[1u8; 20], "203.0.113.1", t0).await.unwrap();

    // Same ip, different recipient: the ip family blocks
    assert!(matches!(
        limiter.check_at(&[2u8; 20], "203.0.113.1", t0 + 1).unwrap(),
        Decision::Blocked { .. }
    ));
    // Same recipient, different ip: the addr family (limit 5) still allows
    assert_eq!(
        limiter.check_at(&[1u8; 20], "203.0.113.2", t0 + 1).unwrap(),
        Decision::Allowed
    );
}

#[tokio::test]
async fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let addr = [0xEF; 20];
    let t0: i64 = 1_700_000_000_000;

    {
        let limiter = RateLimiter::open(dir.path(), policy(1, 10)).unwrap();
        limiter.record_at(&addr, "192.0.2.1", t0).await.unwrap();
        limiter.flush().unwrap();
    }

    let reopened = RateLimiter::open(dir.path(), policy(1, 10)).unwrap();
    assert!(matches!(
        reopened.check_at(&addr, "192.0.2.1", t0 + 1).unwrap(),
        Decision::Blocked { .. }
    ));
}
