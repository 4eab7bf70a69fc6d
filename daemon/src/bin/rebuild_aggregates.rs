use anyhow::Result;
use dotenv::dotenv;
use tally_config::Config;
use tally_db::{tables::PoolRecord, PostgresDB, Store};
use tally_indexer::volume::apply_volume;

// Rebuilds every derived aggregate by replaying the swap ledger. Aggregates
// are disposable; the ledger rows are the source of truth.

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tally_logger::init_logger(tracing::Level::INFO);

    let config = Config::load("./config.yml".into())?;
    let db = PostgresDB::connect(&config.postgres).await?;
    db.ensure_schema().await?;

    db.reset_aggregates().await?;

    for (key, chain) in config.chains.iter() {
        let tokens = match chain.load_tokens() {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!("chain {key} skipped: {err:#}");
                continue;
            }
        };
        let swaps = db.select_swaps(chain.chain_id).await?;
        tracing::info!("↻ replaying {} swaps for chain {key}", swaps.len());

        for swap in &swaps {
            if let Err(err) = apply_volume(&db, swap, &tokens).await {
                tracing::error!("swap {} skipped: {err:#}", swap.transaction_hash);
            }
        }

        // pool volumes follow the ledger too
        for pool in db.select_pools(chain.chain_id).await? {
            let volume = db.pool_volume(chain.chain_id, &pool.address).await?;
            db.upsert_pool(&PoolRecord { volume, ..pool }).await?;
        }
    }

    tracing::info!("All aggregates rebuilt!");
    Ok(())
}
