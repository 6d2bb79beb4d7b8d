use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::state::{AppState, blocking};

/// Background task that expires block records and prunes old login attempts.
///
/// The limiter also runs this before every check; the loop keeps the tables
/// small when nobody is signing in.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match blocking(&state, |s| Ok(s.limiter.run_maintenance(Utc::now()))).await {
            Ok(Some(report)) => {
                if report.expired_blocks > 0 || report.old_attempts > 0 {
                    info!(
                        "Cleanup: removed {} expired blocks, {} old login attempts",
                        report.expired_blocks, report.old_attempts
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
