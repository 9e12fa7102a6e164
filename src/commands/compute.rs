use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use trendwatch::analysis::{publish_trends, TrendsDetector};
use trendwatch::cache::{RedisTrendStore, TrendResult};
use trendwatch::config::Config;
use trendwatch::corpus::OpenSearchCorpus;
use trendwatch::metrics;
use trendwatch::utils::parse_iso_date;

pub struct ComputeArgs {
    /// Reference date; defaults to now truncated to the granularity
    pub date: Option<String>,
    /// Print the trends without publishing them
    pub dry_run: bool,
    /// Write Prometheus metrics to this file after the run
    pub metrics_out: Option<PathBuf>,
}

pub async fn compute(config: &Config, args: ComputeArgs) -> Result<()> {
    let params = config.trends.pipeline_params();
    let reference = match &args.date {
        Some(date) => parse_iso_date(date)?,
        None => params.granularity.truncate(Utc::now()),
    };

    if args.metrics_out.is_some() {
        metrics::init_metrics().map_err(|e| anyhow!("Failed to initialize metrics: {e}"))?;
    }

    println!("Computing trends for {reference} ({})", params.granularity);
    println!("================================");

    let outcome = if args.dry_run {
        dry_run(config, reference).await
    } else {
        compute_and_publish(config, reference).await.map(|result| {
            print_terms(&result.terms);
            println!();
            println!(
                "Published to '{}' (window {} .. {})",
                config.cache.key, result.start, result.end
            );
        })
    };

    if let Some(path) = &args.metrics_out {
        let encoded = metrics::encode_metrics().map_err(|e| anyhow!("Failed to encode metrics: {e}"))?;
        tokio::fs::write(path, encoded)
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        tracing::info!(path = %path.display(), "metrics written");
    }

    outcome
}

/// Run the pipeline once and publish the result to the Redis cache
pub async fn compute_and_publish(config: &Config, reference: DateTime<Utc>) -> Result<TrendResult> {
    let corpus = OpenSearchCorpus::new(&config.opensearch, &config.fields)
        .context("Failed to connect to OpenSearch")?;
    let store = RedisTrendStore::new(&config.cache)
        .await
        .context("Failed to connect to Redis")?;

    let detector = TrendsDetector::new(corpus);
    let result = publish_trends(&detector, &store, &config.trends.pipeline_params(), reference).await?;
    Ok(result)
}

async fn dry_run(config: &Config, reference: DateTime<Utc>) -> Result<()> {
    let corpus = OpenSearchCorpus::new(&config.opensearch, &config.fields)
        .context("Failed to connect to OpenSearch")?;
    let detector = TrendsDetector::new(corpus);
    let trends = detector
        .run_pipeline(reference, &config.trends.pipeline_params())
        .await?;

    if trends.is_empty() {
        println!("No trending terms.");
        return Ok(());
    }
    for (i, trend) in trends.iter().enumerate() {
        println!(
            "{:>2}. {} (docs {}/{}, last score {:.2})",
            i + 1,
            trend.term,
            trend.stats.doc_freq,
            trend.stats.doc_total,
            trend.score.scores.last().copied().unwrap_or_default()
        );
    }
    println!();
    println!("Dry run: nothing published.");
    Ok(())
}

fn print_terms(terms: &[String]) {
    if terms.is_empty() {
        println!("No trending terms.");
        return;
    }
    for (i, term) in terms.iter().enumerate() {
        println!("{:>2}. {term}", i + 1);
    }
}
