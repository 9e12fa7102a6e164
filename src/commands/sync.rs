use anyhow::{Context, Result};

use trendwatch::config::Config;
use trendwatch::sync::IndexSynchronizer;

pub async fn sync(config: &Config) -> Result<()> {
    println!(
        "Synchronizing '{}' from '{}'",
        config.opensearch.index_name, config.opensearch.source_index
    );
    println!("================================");

    let synchronizer =
        IndexSynchronizer::new(config).context("Failed to connect to OpenSearch")?;
    let summary = synchronizer
        .run()
        .await
        .context("Index synchronization failed")?;

    println!();
    println!("Reindex complete:");
    println!("  Total:   {}", summary.total);
    println!("  Created: {}", summary.created);
    println!("  Updated: {}", summary.updated);
    println!("  Took:    {} ms", summary.took);
    Ok(())
}
