//! Fingerprint-keyed login throttle.
//!
//! Failed attempts are counted over the trailing hour and day. Crossing
//! either threshold writes a block record; below them an escalating delay
//! is suggested. Storage errors during a check fail open.
//!
//! The fingerprint is reported by the client and can be spoofed, so this is
//! a speed bump in front of the password check, not an access control.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use board_types::api::RateLimitDecision;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub fingerprint: String,
    pub blocked_until: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub fingerprint: String,
    pub attempted_at: DateTime<Utc>,
    pub was_successful: bool,
    pub ip_address: Option<String>,
}

/// Rows removed by a maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub expired_blocks: usize,
    pub old_attempts: usize,
}

/// Storage the limiter needs. Implemented by the SQLite layer and by
/// in-memory fakes in tests.
pub trait AttemptStore {
    fn find_block(&self, fingerprint: &str) -> Result<Option<BlockRecord>>;

    fn upsert_block(&self, block: &BlockRecord) -> Result<()>;

    fn clear_block(&self, fingerprint: &str) -> Result<()>;

    fn insert_attempt(&self, attempt: &LoginAttempt) -> Result<()>;

    /// Timestamps of failed attempts at or after `since`, newest first.
    fn failed_attempts_since(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>>;

    /// Drop blocks that ended before `now` and attempts older than `attempts_before`.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
        attempts_before: DateTime<Utc>,
    ) -> Result<PurgeReport>;
}

impl<T: AttemptStore + ?Sized> AttemptStore for Arc<T> {
    fn find_block(&self, fingerprint: &str) -> Result<Option<BlockRecord>> {
        (**self).find_block(fingerprint)
    }

    fn upsert_block(&self, block: &BlockRecord) -> Result<()> {
        (**self).upsert_block(block)
    }

    fn clear_block(&self, fingerprint: &str) -> Result<()> {
        (**self).clear_block(fingerprint)
    }

    fn insert_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
        (**self).insert_attempt(attempt)
    }

    fn failed_attempts_since(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        (**self).failed_attempts_since(fingerprint, since)
    }

    fn purge_expired(
        &self,
        now: DateTime<Utc>,
        attempts_before: DateTime<Utc>,
    ) -> Result<PurgeReport> {
        (**self).purge_expired(now, attempts_before)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub max_per_hour: u32,
    pub max_per_day: u32,
    pub hourly_block: chrono::Duration,
    pub daily_block: chrono::Duration,
    /// Suggested delay indexed by failures in the last hour; the last entry caps it.
    pub delays: Vec<Duration>,
    /// Login attempts older than this are purged by maintenance. Values
    /// under 24 hours are treated as 24 hours.
    pub attempt_retention: chrono::Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_per_hour: 5,
            max_per_day: 15,
            hourly_block: chrono::Duration::minutes(60),
            daily_block: chrono::Duration::hours(24),
            delays: [0, 2, 5, 10, 30].into_iter().map(Duration::from_secs).collect(),
            attempt_retention: chrono::Duration::days(7),
        }
    }
}

impl RateLimitPolicy {
    pub fn delay_for(&self, failures_last_hour: u32) -> Duration {
        let Some(last) = self.delays.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        self.delays[(failures_last_hour as usize).min(last)]
    }
}

pub struct RateLimiter<S> {
    store: S,
    policy: RateLimitPolicy,
}

impl<S: AttemptStore> RateLimiter<S> {
    pub fn new(store: S, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn check(&self, fingerprint: &Fingerprint) -> RateLimitDecision {
        self.check_at(fingerprint, Utc::now())
    }

    /// Decide whether a login attempt may proceed.
    pub fn check_at(&self, fingerprint: &Fingerprint, now: DateTime<Utc>) -> RateLimitDecision {
        self.run_maintenance(now);

        match self.evaluate(fingerprint.as_str(), now) {
            Ok(decision) => {
                debug!(
                    fingerprint = %fingerprint,
                    allowed = decision.allowed,
                    remaining = ?decision.remaining_attempts,
                    "Rate limit decision"
                );
                decision
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, "Rate limit check failed, allowing: {}", e);
                RateLimitDecision {
                    allowed: true,
                    remaining_attempts: Some(self.policy.max_per_hour),
                    ..Default::default()
                }
            }
        }
    }

    pub fn record(&self, fingerprint: &Fingerprint, success: bool, ip_address: Option<String>) {
        self.record_at(fingerprint, success, ip_address, Utc::now());
    }

    /// Append an attempt; a success also lifts any block on the fingerprint.
    pub fn record_at(
        &self,
        fingerprint: &Fingerprint,
        success: bool,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) {
        let attempt = LoginAttempt {
            fingerprint: fingerprint.to_string(),
            attempted_at: now,
            was_successful: success,
            ip_address,
        };
        if let Err(e) = self.store.insert_attempt(&attempt) {
            error!(fingerprint = %fingerprint, "Error recording login attempt: {}", e);
        }

        if success {
            if let Err(e) = self.store.clear_block(fingerprint.as_str()) {
                error!(fingerprint = %fingerprint, "Error clearing block: {}", e);
            }
        }
    }

    /// Expire old blocks and attempts. Failures are not fatal to the caller.
    ///
    /// Retention never drops below the daily counting window, so attempts
    /// still counted by the day and hour rules are never purged.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> Option<PurgeReport> {
        let retention = self.policy.attempt_retention.max(chrono::Duration::hours(24));
        let attempts_before = now
            .checked_sub_signed(retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        match self.store.purge_expired(now, attempts_before) {
            Ok(report) => Some(report),
            Err(e) => {
                debug!("Cleanup error (non-critical): {}", e);
                None
            }
        }
    }

    fn evaluate(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<RateLimitDecision> {
        if let Some(block) = self.store.find_block(fingerprint)? {
            if block.blocked_until > now {
                return Ok(RateLimitDecision {
                    allowed: false,
                    reason: Some(format!(
                        "Too many failed attempts. Try again after {}",
                        block.blocked_until.format("%Y-%m-%d %H:%M:%S UTC")
                    )),
                    blocked_until: Some(block.blocked_until),
                    ..Default::default()
                });
            }
        }

        let hour_ago = now - chrono::Duration::hours(1);
        let day_ago = now - chrono::Duration::hours(24);
        let failures = self.store.failed_attempts_since(fingerprint, day_ago)?;

        let last_hour = failures.iter().filter(|t| **t > hour_ago).count() as u32;
        let last_day = failures.iter().filter(|t| **t > day_ago).count() as u32;

        if last_day >= self.policy.max_per_day {
            let until = now + self.policy.daily_block;
            self.block(fingerprint, until, "Exceeded daily limit");
            return Ok(RateLimitDecision {
                allowed: false,
                reason: Some("Too many failed attempts today. Try again tomorrow.".into()),
                blocked_until: Some(until),
                ..Default::default()
            });
        }

        if last_hour >= self.policy.max_per_hour {
            let until = now + self.policy.hourly_block;
            self.block(fingerprint, until, "Exceeded hourly limit");
            return Ok(RateLimitDecision {
                allowed: false,
                reason: Some("Too many failed attempts. Try again in 1 hour.".into()),
                blocked_until: Some(until),
                ..Default::default()
            });
        }

        Ok(RateLimitDecision {
            allowed: true,
            remaining_attempts: Some(self.policy.max_per_hour - last_hour),
            wait_time_ms: Some(self.policy.delay_for(last_hour).as_millis() as u64),
            ..Default::default()
        })
    }

    fn block(&self, fingerprint: &str, until: DateTime<Utc>, reason: &str) {
        let record = BlockRecord {
            fingerprint: fingerprint.to_string(),
            blocked_until: until,
            reason: reason.to_string(),
        };
        match self.store.upsert_block(&record) {
            Ok(()) => info!(fingerprint = %fingerprint, until = %until, "Fingerprint blocked: {}", reason),
            Err(e) => error!(fingerprint = %fingerprint, "Error blocking fingerprint: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        blocks: Mutex<HashMap<String, BlockRecord>>,
        attempts: Mutex<Vec<LoginAttempt>>,
    }

    impl AttemptStore for MemoryStore {
        fn find_block(&self, fingerprint: &str) -> Result<Option<BlockRecord>> {
            Ok(self.blocks.lock().unwrap().get(fingerprint).cloned())
        }

        fn upsert_block(&self, block: &BlockRecord) -> Result<()> {
            self.blocks
                .lock()
                .unwrap()
                .insert(block.fingerprint.clone(), block.clone());
            Ok(())
        }

        fn clear_block(&self, fingerprint: &str) -> Result<()> {
            self.blocks.lock().unwrap().remove(fingerprint);
            Ok(())
        }

        fn insert_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
            self.attempts.lock().unwrap().push(attempt.clone());
            Ok(())
        }

        fn failed_attempts_since(
            &self,
            fingerprint: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<DateTime<Utc>>> {
            let mut out: Vec<_> = self
                .attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.fingerprint == fingerprint && !a.was_successful && a.attempted_at >= since)
                .map(|a| a.attempted_at)
                .collect();
            out.sort_by(|a, b| b.cmp(a));
            Ok(out)
        }

        fn purge_expired(
            &self,
            now: DateTime<Utc>,
            attempts_before: DateTime<Utc>,
        ) -> Result<PurgeReport> {
            let mut blocks = self.blocks.lock().unwrap();
            let before = blocks.len();
            blocks.retain(|_, b| b.blocked_until > now);
            let mut attempts = self.attempts.lock().unwrap();
            let before_attempts = attempts.len();
            attempts.retain(|a| a.attempted_at >= attempts_before);
            Ok(PurgeReport {
                expired_blocks: before - blocks.len(),
                old_attempts: before_attempts - attempts.len(),
            })
        }
    }

    struct BrokenStore;

    impl AttemptStore for BrokenStore {
        fn find_block(&self, _: &str) -> Result<Option<BlockRecord>> {
            anyhow::bail!("connection refused")
        }
        fn upsert_block(&self, _: &BlockRecord) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        fn clear_block(&self, _: &str) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        fn insert_attempt(&self, _: &LoginAttempt) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        fn failed_attempts_since(&self, _: &str, _: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
            anyhow::bail!("connection refused")
        }
        fn purge_expired(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<PurgeReport> {
            anyhow::bail!("connection refused")
        }
    }

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::parse(s).unwrap()
    }

    fn limiter() -> RateLimiter<MemoryStore> {
        RateLimiter::new(MemoryStore::default(), RateLimitPolicy::default())
    }

    fn fail_n(limiter: &RateLimiter<MemoryStore>, id: &Fingerprint, n: u32, start: DateTime<Utc>, step: chrono::Duration) {
        for i in 0..n {
            limiter.record_at(id, false, None, start + step * i as i32);
        }
    }

    #[test]
    fn fresh_fingerprint_is_allowed_without_delay() {
        let limiter = limiter();
        let d = limiter.check_at(&fp("abc"), Utc::now());
        assert!(d.allowed);
        assert_eq!(d.remaining_attempts, Some(5));
        assert_eq!(d.wait_time_ms, Some(0));
        assert!(d.reason.is_none());
    }

    #[test]
    fn delays_escalate_with_failures() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();

        limiter.record_at(&id, false, None, now - chrono::Duration::minutes(10));
        let d = limiter.check_at(&id, now);
        assert_eq!(d.wait_time_ms, Some(2_000));
        assert_eq!(d.remaining_attempts, Some(4));

        fail_n(&limiter, &id, 3, now - chrono::Duration::minutes(9), chrono::Duration::minutes(1));
        let d = limiter.check_at(&id, now);
        assert!(d.allowed);
        assert_eq!(d.wait_time_ms, Some(30_000));
        assert_eq!(d.remaining_attempts, Some(1));
    }

    #[test]
    fn delay_table_caps_at_last_entry() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(4), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
        let empty = RateLimitPolicy { delays: vec![], ..Default::default() };
        assert_eq!(empty.delay_for(3), Duration::ZERO);
    }

    #[test]
    fn sixth_attempt_in_an_hour_is_blocked_for_an_hour() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();

        fail_n(&limiter, &id, 5, now - chrono::Duration::minutes(30), chrono::Duration::minutes(5));

        let d = limiter.check_at(&id, now);
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some("Too many failed attempts. Try again in 1 hour."));

        let block = limiter.store().find_block("abc").unwrap().unwrap();
        assert_eq!(block.blocked_until, now + chrono::Duration::minutes(60));
        assert_eq!(block.reason, "Exceeded hourly limit");

        // The block now answers on its own.
        let again = limiter.check_at(&id, now + chrono::Duration::minutes(1));
        assert!(!again.allowed);
        assert_eq!(again.blocked_until, Some(block.blocked_until));
        assert!(again.reason.unwrap().starts_with("Too many failed attempts. Try again after"));
    }

    #[test]
    fn fifteen_failures_in_a_day_block_for_a_day() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();

        // Spread out so no single hour holds five failures.
        fail_n(&limiter, &id, 15, now - chrono::Duration::hours(23), chrono::Duration::minutes(90));

        let d = limiter.check_at(&id, now);
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some("Too many failed attempts today. Try again tomorrow."));

        let block = limiter.store().find_block("abc").unwrap().unwrap();
        assert_eq!(block.blocked_until, now + chrono::Duration::hours(24));
        assert_eq!(block.reason, "Exceeded daily limit");
    }

    #[test]
    fn daily_rule_wins_over_hourly_rule() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();

        fail_n(&limiter, &id, 10, now - chrono::Duration::hours(20), chrono::Duration::minutes(20));
        fail_n(&limiter, &id, 5, now - chrono::Duration::minutes(30), chrono::Duration::minutes(5));

        let d = limiter.check_at(&id, now);
        assert!(!d.allowed);
        let block = limiter.store().find_block("abc").unwrap().unwrap();
        assert_eq!(block.reason, "Exceeded daily limit");
    }

    #[test]
    fn old_failures_do_not_count() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();

        fail_n(&limiter, &id, 5, now - chrono::Duration::hours(3), chrono::Duration::minutes(1));
        let d = limiter.check_at(&id, now);
        assert!(d.allowed);
        assert_eq!(d.remaining_attempts, Some(5));
    }

    #[test]
    fn success_clears_block() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();

        fail_n(&limiter, &id, 5, now - chrono::Duration::minutes(30), chrono::Duration::minutes(5));
        assert!(!limiter.check_at(&id, now).allowed);

        limiter.record_at(&id, true, None, now);
        assert!(limiter.store().find_block("abc").unwrap().is_none());
    }

    #[test]
    fn expired_block_is_ignored() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();
        limiter
            .store()
            .upsert_block(&BlockRecord {
                fingerprint: "abc".into(),
                blocked_until: now - chrono::Duration::minutes(1),
                reason: "Exceeded hourly limit".into(),
            })
            .unwrap();

        assert!(limiter.check_at(&id, now).allowed);
    }

    #[test]
    fn fingerprints_are_independent() {
        let limiter = limiter();
        let now = Utc::now();
        fail_n(&limiter, &fp("abc"), 5, now - chrono::Duration::minutes(30), chrono::Duration::minutes(5));

        assert!(!limiter.check_at(&fp("abc"), now).allowed);
        assert!(limiter.check_at(&fp("xyz"), now).allowed);
    }

    #[test]
    fn store_errors_fail_open() {
        let limiter = RateLimiter::new(BrokenStore, RateLimitPolicy::default());
        let d = limiter.check(&fp("abc"));
        assert!(d.allowed);
        assert_eq!(d.remaining_attempts, Some(5));
        assert!(d.wait_time_ms.is_none());

        // Recording swallows the error as well.
        limiter.record(&fp("abc"), false, None);
    }

    #[test]
    fn maintenance_purges_old_rows() {
        let limiter = limiter();
        let id = fp("abc");
        let now = Utc::now();
        limiter.record_at(&id, false, None, now - chrono::Duration::days(8));
        limiter.record_at(&id, false, None, now - chrono::Duration::days(1));

        let report = limiter.run_maintenance(now).unwrap();
        assert_eq!(report.old_attempts, 1);
        assert_eq!(limiter.store().attempts.lock().unwrap().len(), 1);
    }

    #[test]
    fn short_retention_keeps_the_daily_window() {
        let limiter = RateLimiter::new(
            MemoryStore::default(),
            RateLimitPolicy {
                attempt_retention: chrono::Duration::hours(2),
                ..Default::default()
            },
        );
        let id = fp("abc");
        let now = Utc::now();

        fail_n(&limiter, &id, 15, now - chrono::Duration::hours(23), chrono::Duration::minutes(90));

        let d = limiter.check_at(&id, now);
        assert!(!d.allowed);
        assert_eq!(d.blocked_until, Some(now + chrono::Duration::hours(24)));
        assert_eq!(limiter.store().attempts.lock().unwrap().len(), 15);
    }

    #[test]
    fn negative_retention_keeps_the_hourly_window() {
        let limiter = RateLimiter::new(
            MemoryStore::default(),
            RateLimitPolicy {
                attempt_retention: chrono::Duration::hours(-1),
                ..Default::default()
            },
        );
        let id = fp("abc");
        let now = Utc::now();

        fail_n(&limiter, &id, 5, now - chrono::Duration::minutes(30), chrono::Duration::minutes(5));

        let d = limiter.check_at(&id, now);
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some("Too many failed attempts. Try again in 1 hour."));
    }

    #[test]
    fn huge_retention_does_not_overflow() {
        let limiter = RateLimiter::new(
            MemoryStore::default(),
            RateLimitPolicy {
                attempt_retention: chrono::Duration::MAX,
                ..Default::default()
            },
        );
        let id = fp("abc");
        let now = Utc::now();
        limiter.record_at(&id, false, None, now - chrono::Duration::days(400));

        let report = limiter.run_maintenance(now).unwrap();
        assert_eq!(report.old_attempts, 0);
        assert!(limiter.check_at(&id, now).allowed);
    }
}
