use anyhow::{Context, Result};
use chrono::NaiveTime;

use trendwatch::config::Config;
use trendwatch::error::Error;
use trendwatch::scheduler::run_daily;

use super::compute::compute_and_publish;

pub async fn schedule(config: &Config, at: Option<String>) -> Result<()> {
    let at = match at {
        Some(at) => NaiveTime::parse_from_str(&at, "%H:%M")
            .with_context(|| format!("Invalid schedule time '{at}', expected HH:MM"))?,
        None => config.trends.schedule_time()?,
    };

    println!("Computing trends daily at {} UTC (Ctrl-C to stop)", at.format("%H:%M"));
    println!("================================");

    let granularity = config.trends.granularity;
    run_daily(at, |scheduled| async move {
        let reference = granularity.truncate(scheduled);
        compute_and_publish(config, reference)
            .await
            .map(|result| tracing::info!(terms = ?result.terms, "scheduled trends published"))
            .map_err(|e| e.downcast::<Error>().unwrap_or_else(Error::from))
    })
    .await;

    Ok(())
}
