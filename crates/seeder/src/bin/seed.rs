//! Seed a MongoDB database from a JSON seed file.
//!
//! Run with:
//! ```
//! DATABASE_URL=mongodb://localhost:27017/dev cargo run -p seeder --bin seed -- fixtures.json
//! ```

use anyhow::Context;
use seeder::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: seed <seed-file.json>")?;

    let seed_file = SeedFile::load(&path)?;
    let config = SeederConfig::for_seed_file(&seed_file)?;

    let registry = SchemaRegistry::new();
    for schema in seed_file.models.iter().cloned() {
        registry.register(schema)?;
    }

    let mut seeder = Seeder::from_config(MongoDriver::new(registry), config);

    if !seed_file.clear.is_empty() {
        let cleared = seeder.clear_models(&seed_file.clear).await?;
        tracing::info!("Cleared {} documents", cleared.deleted());
    }

    let report = seeder.populate_models(&seed_file.data).await?;

    // Summary output
    tracing::info!("Seed completed!");
    for tally in &report.models {
        tracing::info!(
            "  {}: {} created, {} failed",
            tally.model,
            tally.created,
            tally.failed
        );
    }
    if !report.is_clean() {
        tracing::warn!(
            "{} of {} documents failed:",
            report.failed(),
            report.attempted()
        );
        for failure in &report.failures {
            tracing::warn!("  {}[{}]: {}", failure.model, failure.index, failure.error);
        }
    }

    seeder.disconnect().await?;

    Ok(())
}
