//! Daily trigger for periodic trend runs
//!
//! The pipeline itself never retries. The trigger simply runs the job once a
//! day at a fixed UTC time; a failed run is logged and the next day's run
//! proceeds as usual.
//!
//! # Example
//!
//! ```rust,ignore
//! use chrono::NaiveTime;
//! use trendwatch::scheduler::run_daily;
//!
//! let at = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
//! run_daily(at, |scheduled| async move {
//!     println!("running for {scheduled}");
//!     Ok(())
//! })
//! .await;
//! ```

use std::future::Future;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tracing::{error, info, warn};

use crate::error::Result;

/// First instant strictly after `now` whose time of day is `at` (UTC)
#[must_use]
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run `job` every day at `at` until Ctrl-C
pub async fn run_daily<F, Fut>(at: NaiveTime, job: F)
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    run_daily_until(at, job, shutdown).await;
}

/// Run `job` every day at `at` until `shutdown` completes.
///
/// The job receives its scheduled time. Errors are logged, never propagated.
pub async fn run_daily_until<F, Fut, S>(at: NaiveTime, mut job: F, shutdown: S)
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<()>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let now = Utc::now();
        let next = next_run_after(now, at);
        let wait = (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        info!(next_run = %next, "waiting for next scheduled run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                match job(next).await {
                    Ok(()) => info!(scheduled = %next, "scheduled run finished"),
                    Err(e) if e.is_recoverable() => {
                        warn!(error = %e, "scheduled run failed, next run may recover")
                    }
                    Err(e) => error!(error = %e, category = e.category().as_str(), "scheduled run failed"),
                }
            }
            _ = &mut shutdown => {
                info!("scheduler stopped");
                break;
            }
        }
    }
}
