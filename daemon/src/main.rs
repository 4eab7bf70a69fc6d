use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tally_config::Config;
use tally_db::PostgresDB;
use tally_indexer::{LogObserver, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tally_logger::init_logger(tracing::Level::INFO);

    let config = Config::load("./config.yml".into())?;
    let db = PostgresDB::connect(&config.postgres).await?;
    db.ensure_schema().await?;

    let orchestrator = Orchestrator::new(config, db, Arc::new(LogObserver));
    if let Err(e) = orchestrator.start().await {
        tracing::error!("{e:?}");
    }

    Ok(())
}
