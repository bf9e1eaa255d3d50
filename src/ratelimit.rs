//! Persistent sliding-window rate limiting.
//!
//! Two key families are tracked independently: `addr:<hex20>` and
//! `ip:<client-ip>`. Values are sorted, deduplicated JSON arrays of unix
//! millisecond timestamps, trimmed to the window on every write. The store
//! survives restarts; losing it costs tokens, not correctness.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::RateLimitPolicy;
use crate::error::Error;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Earliest instant at which the client may retry
    Blocked { retry_at: DateTime<Utc> },
}

/// Sliding-window limiter backed by an embedded ordered KV store.
/// Reads may run concurrently; all mutations pass through one writer gate.
pub struct RateLimiter {
    db: sled::Db,
    policy: RateLimitPolicy,
    write_gate: Mutex<()>,
}

impl RateLimiter {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path, policy: RateLimitPolicy) -> Result<Self, Error> {
        let db = sled::open(path)
            .map_err(|e| Error::Store(format!("Failed to open rate-limit store: {}", e)))?;
        Ok(Self {
            db,
            policy,
            write_gate: Mutex::new(()),
        })
    }

    /// Check both families for the caller. Does not mutate the store.
    pub fn check(&self, recipient_hex20: &[u8; 20], client_ip: &str) -> Result<Decision, Error> {
        self.check_at(recipient_hex20, client_ip, Utc::now().timestamp_millis())
    }

    /// Record a successful dispense against both families.
    /// Called only after an end-to-end success; failures never consume quota.
    pub async fn record(&self, recipient_hex20: &[u8; 20], client_ip: &str) -> Result<(), Error> {
        self.record_at(recipient_hex20, client_ip, Utc::now().timestamp_millis())
            .await
    }

    /// Deterministic-clock variant of `check`.
    pub fn check_at(
        &self,
        recipient_hex20: &[u8; 20],
        client_ip: &str,
        now_ms: i64,
    ) -> Result<Decision, Error> {
        let families = [
            (
                Self::addr_key(recipient_hex20),
                self.policy.addr_window as i64 * 1000,
                self.policy.addr_limit as usize,
            ),
            (
                Self::ip_key(client_ip),
                self.policy.ip_window as i64 * 1000,
                self.policy.ip_limit as usize,
            ),
        ];

        let mut retry_at_ms: Option<i64> = None;
        for (key, window_ms, limit) in families {
            let hits = self.hits(&key)?;
            let in_window: Vec<i64> = hits
                .into_iter()
                .filter(|t| *t > now_ms - window_ms)
                .collect();
            if in_window.len() >= limit {
                // The family frees up when its oldest in-window hit expires
                let oldest = in_window[0];
                let family_retry = oldest + window_ms;
                retry_at_ms = Some(retry_at_ms.map_or(family_retry, |r| r.max(family_retry)));
            }
        }

        match retry_at_ms {
            None => Ok(Decision::Allowed),
            Some(ms) => Ok(Decision::Blocked {
                retry_at: Utc
                    .timestamp_millis_opt(ms)
                    .single()
                    .unwrap_or_else(Utc::now),
            }),
        }
    }

    /// Deterministic-clock variant of `record`.
    pub async fn record_at(
        &self,
        recipient_hex20: &[u8; 20],
        client_ip: &str,
        now_ms: i64,
    ) -> Result<(), Error> {
        let _writer = self.write_gate.lock().await;

        self.append(
            &Self::addr_key(recipient_hex20),
            now_ms,
            self.policy.addr_window as i64 * 1000,
        )?;
        self.append(
            &Self::ip_key(client_ip),
            now_ms,
            self.policy.ip_window as i64 * 1000,
        )?;

        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Store(format!("Failed to flush rate-limit store: {}", e)))?;
        Ok(())
    }

    /// Flush the store; used by the shutdown path.
    pub fn flush(&self) -> Result<(), Error> {
        self.db
            .flush()
            .map_err(|e| Error::Store(format!("Failed to flush rate-limit store: {}", e)))?;
        Ok(())
    }

    fn addr_key(hex20: &[u8; 20]) -> String {
        format!("addr:{}", hex::encode(hex20))
    }

    fn ip_key(ip: &str) -> String {
        format!("ip:{}", ip)
    }

    fn hits(&self, key: &str) -> Result<Vec<i64>, Error> {
        match self
            .db
            .get(key)
            .map_err(|e| Error::Store(format!("Failed to read '{}': {}", key, e)))?
        {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| Error::Store(format!("Corrupt entry '{}': {}", key, e))),
        }
    }

    /// Append one hit and compact: sort, dedup, drop everything outside the
    /// window. Re-recording an identical timestamp is a no-op after this.
    fn append(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<(), Error> {
        let mut hits = self.hits(key)?;
        hits.push(now_ms);
        hits.sort_unstable();
        hits.dedup();
        hits.retain(|t| *t > now_ms - window_ms);
        debug!(key, hits = hits.len(), "rate-limit hit recorded");

        let encoded = serde_json::to_vec(&hits)
            .map_err(|e| Error::Store(format!("Failed to encode hits: {}", e)))?;
        self.db
            .insert(key, encoded)
            .map_err(|e| Error::Store(format!("Failed to write '{}': {}", key, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy {
            addr_window: 60,
            addr_limit: 1,
            ip_window: 60,
            ip_limit: 2,
        }
    }

    fn limiter(dir: &Path) -> RateLimiter {
        RateLimiter::open(dir, policy()).unwrap()
    }

    #[tokio::test]
    async fn blocks_address_after_limit_and_reports_retry_at() {
        let dir = tempfile::tempdir().unwrap();
        let rl = limiter(dir.path());
        let addr = [1u8; 20];
        let t0 = 1_000_000;

        assert_eq!(rl.check_at(&addr, "10.0.0.1", t0).unwrap(), Decision::Allowed);
        rl.record_at(&addr, "10.0.0.1", t0).await.unwrap();

        match rl.check_at(&addr, "10.0.0.1", t0 + 1).unwrap() {
            Decision::Blocked { retry_at } => {
                assert_eq!(retry_at.timestamp_millis(), t0 + 60_000);
            }
            Decision::Allowed => panic!("expected block within window"),
        }

        // Outside the window the same address is allowed again
        assert_eq!(
            rl.check_at(&addr, "10.0.0.1", t0 + 60_001).unwrap(),
            Decision::Allowed
        );
    }

    #[tokio::test]
    async fn ip_family_is_independent_of_address() {
        let dir = tempfile::tempdir().unwrap();
        let rl = limiter(dir.path());
        let t0 = 1_000_000;

        rl.record_at(&[1u8; 20], "10.0.0.1", t0).await.unwrap();
        rl.record_at(&[2u8; 20], "10.0.0.1", t0 + 1).await.unwrap();

        // Third distinct address, same ip: ip limit (2) is exhausted
        match rl.check_at(&[3u8; 20], "10.0.0.1", t0 + 2).unwrap() {
            Decision::Blocked { retry_at } => {
                assert_eq!(retry_at.timestamp_millis(), t0 + 60_000);
            }
            Decision::Allowed => panic!("expected ip block"),
        }

        // Different ip is unaffected
        assert_eq!(
            rl.check_at(&[3u8; 20], "10.0.0.2", t0 + 2).unwrap(),
            Decision::Allowed
        );
    }

    #[tokio::test]
    async fn identical_timestamp_recorded_twice_counts_once() {
        let dir = tempfile::tempdir().unwrap();
        let rl = RateLimiter::open(
            dir.path(),
            RateLimitPolicy {
                addr_window: 60,
                addr_limit: 2,
                ip_window: 60,
                ip_limit: 10,
            },
        )
        .unwrap();
        let addr = [7u8; 20];
        let t0 = 5_000_000;

        rl.record_at(&addr, "10.0.0.1", t0).await.unwrap();
        rl.record_at(&addr, "10.0.0.1", t0).await.unwrap();

        // One slot of the addr limit (2) is still free
        assert_eq!(
            rl.check_at(&addr, "10.0.0.1", t0 + 1).unwrap(),
            Decision::Allowed
        );
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let addr = [9u8; 20];
        let t0 = 9_000_000;

        {
            let rl = limiter(dir.path());
            rl.record_at(&addr, "10.0.0.9", t0).await.unwrap();
            rl.flush().unwrap();
        }

        let rl = limiter(dir.path());
        assert!(matches!(
            rl.check_at(&addr, "10.0.0.9", t0 + 1).unwrap(),
            Decision::Blocked { .. }
        ));
    }
}
