use anyhow::Context;
use chrono::Utc;
use rental_scout::analysis::analyze;
use rental_scout::{export, AppConfig, ListingStore, Pipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🏠 Rental Scout");
    info!("==========================================");
    info!(
        "Searching '{}' in {} ({} page(s))",
        config.search.search_term, config.search.city, config.search.pages
    );

    let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;
    let store = ListingStore::open(&config.db_path)
        .with_context(|| format!("Failed to open store at {}", config.db_path.display()))?
        .with_policy(config.duplicate_policy);

    let summary = pipeline.run(&config.search, &store).await;

    println!("\n{}\n", summary);
    for failure in &summary.failures {
        println!("   {}", failure);
    }
    if let Some(path) = &summary.export_path {
        println!("   CSV: {}", path.display());
    }

    if config.analysis {
        let listings = store.all().context("Failed to read stored listings")?;
        let report = analyze(&listings, 10);

        if let Some(price) = &report.price {
            println!(
                "\n{} stored listings, price {:.0}-{:.0} (median {:.0})",
                report.listings, price.min, price.max, price.median
            );
        }
        for city in &report.cities {
            println!("   {}: {} listings, mean {:.0}", city.city, city.listings, city.mean_price);
        }
        let terms: Vec<&str> = report.top_terms.iter().map(|t| t.term.as_str()).collect();
        println!("   Top terms: {}", terms.join(", "));

        let path = export::dated_path(
            &config.output_dir,
            &config.search,
            Utc::now().date_naive(),
            "analysis.json",
        );
        export::write_json(&path, &report).context("Failed to save analysis report")?;
    }

    Ok(())
}
