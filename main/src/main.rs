use std::path::Path;
use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::get_config, regions::load_region_queries},
};
use ingestion_pipeline::IngestionPipeline;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // An unreachable store here is fatal to the whole run.
    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    let regions = load_region_queries(Path::new(&config.region_query_file))?;
    let pipeline = IngestionPipeline::new(db, config);

    // Regions run sequentially; one failed region never stops the next.
    for region in &regions {
        match pipeline.ingest_region(region).await {
            Ok(report) => info!(
                region = %region.region_name,
                records = report.records_seen,
                matched = report.records_matched,
                rows = report.rows_committed,
                failed_files = report.files_failed,
                "region done"
            ),
            Err(err) => error!(
                region = %region.region_name,
                error = %err,
                "region ingestion failed"
            ),
        }
    }

    Ok(())
}
