use anyhow::{Context, Result};

use trendwatch::cache::{RedisTrendStore, TrendStore};
use trendwatch::config::Config;
use trendwatch::related::{related_or_empty, MagpieClient};

pub async fn show(config: &Config, with_related: bool) -> Result<()> {
    let store = RedisTrendStore::new(&config.cache)
        .await
        .context("Failed to connect to Redis")?;

    let Some(latest) = store.latest().await? else {
        println!("No trend result published yet.");
        println!("Run 'trendwatch compute' first.");
        return Ok(());
    };

    println!(
        "Trends {} .. {} ({})",
        latest.start, latest.end, latest.granularity
    );
    println!("================================");

    if latest.terms.is_empty() {
        println!("No trending terms.");
        return Ok(());
    }

    let lookup = if with_related || config.related.enabled {
        Some(MagpieClient::new(&config.related).context("Failed to build related-term client")?)
    } else {
        None
    };

    for (i, term) in latest.terms.iter().enumerate() {
        println!("{:>2}. {term}", i + 1);
        if let Some(lookup) = &lookup {
            let related = related_or_empty(lookup, term).await;
            if !related.is_empty() {
                println!("    related: {}", related.join(", "));
            }
        }
    }
    Ok(())
}
