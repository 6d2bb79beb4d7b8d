use anyhow::Result;
use board_guard::rate_limit::{AttemptStore, BlockRecord, LoginAttempt, PurgeReport};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tracing::debug;

use crate::Database;
use crate::models::{format_timestamp, parse_timestamp};

impl Database {
    /// Maintenance: drop block records whose `blocked_until` has passed.
    pub fn cleanup_expired_blocks(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM blocked_fingerprints WHERE blocked_until <= ?1",
                [format_timestamp(now)],
            )?;
            Ok(removed)
        })
    }

    /// Maintenance: drop login attempts recorded before `before`.
    pub fn cleanup_old_login_attempts(&self, before: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM login_attempts WHERE attempted_at < ?1",
                [format_timestamp(before)],
            )?;
            Ok(removed)
        })
    }
}

impl AttemptStore for Database {
    fn find_block(&self, fingerprint: &str) -> Result<Option<BlockRecord>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT fingerprint, blocked_until, reason FROM blocked_fingerprints
                     WHERE fingerprint = ?1",
                    [fingerprint],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        row.map(|(fingerprint, blocked_until, reason)| {
            Ok(BlockRecord {
                fingerprint,
                blocked_until: parse_timestamp(&blocked_until)?,
                reason,
            })
        })
        .transpose()
    }

    fn upsert_block(&self, block: &BlockRecord) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO blocked_fingerprints (fingerprint, blocked_until, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(fingerprint) DO UPDATE
                 SET blocked_until = excluded.blocked_until, reason = excluded.reason",
                rusqlite::params![
                    block.fingerprint,
                    format_timestamp(block.blocked_until),
                    block.reason,
                    format_timestamp(Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    fn clear_block(&self, fingerprint: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM blocked_fingerprints WHERE fingerprint = ?1",
                [fingerprint],
            )?;
            Ok(())
        })
    }

    fn insert_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO login_attempts (fingerprint, ip_address, was_successful, attempted_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    attempt.fingerprint,
                    attempt.ip_address,
                    attempt.was_successful,
                    format_timestamp(attempt.attempted_at),
                ],
            )?;
            Ok(())
        })
    }

    fn failed_attempts_since(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let raw = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT attempted_at FROM login_attempts
                 WHERE fingerprint = ?1 AND was_successful = 0 AND attempted_at >= ?2
                 ORDER BY attempted_at DESC",
            )?;
            let rows = stmt
                .query_map([fingerprint, format_timestamp(since).as_str()], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        raw.iter().map(|ts| parse_timestamp(ts)).collect()
    }

    fn purge_expired(
        &self,
        now: DateTime<Utc>,
        attempts_before: DateTime<Utc>,
    ) -> Result<PurgeReport> {
        let report = PurgeReport {
            expired_blocks: self.cleanup_expired_blocks(now)?,
            old_attempts: self.cleanup_old_login_attempts(attempts_before)?,
        };
        if report.expired_blocks > 0 || report.old_attempts > 0 {
            debug!(
                "Purged {} expired blocks and {} old login attempts",
                report.expired_blocks, report.old_attempts
            );
        }
        Ok(report)
    }
}
