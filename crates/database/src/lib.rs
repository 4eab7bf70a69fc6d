use alloy::primitives::{Address, U256};
use anyhow::Result;

use crate::tables::{PoolRecord, SwapRecord};

pub mod mem;
pub mod postgres;
pub mod tables;

pub use mem::MemStore;
pub use postgres::PostgresDB;

/// The persistence contract the indexing engine is written against.
/// Production uses [`PostgresDB`]; tests use [`MemStore`].
///
/// Aggregate methods are atomic per-row increments, so correctness does not
/// depend on any cross-statement read-modify-write.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn read_checkpoint(&self, chain_id: u64) -> Result<Option<u64>>;

    async fn write_checkpoint(&self, chain_id: u64, from_block: u64) -> Result<()>;

    /// Records a block range intentionally skipped by a catch-up fast-forward.
    async fn record_gap(&self, chain_id: u64, from_block: u64, to_block: u64) -> Result<()>;

    async fn upsert_pool(&self, pool: &PoolRecord) -> Result<()>;

    /// Total |amount0| + |amount1| over the ledger rows of one pool.
    async fn pool_volume(&self, chain_id: u64, pool: &Address) -> Result<U256>;

    /// Returns true when a new ledger row was written. An already-known
    /// (transaction_hash, chain_id) key is left untouched and returns false.
    async fn insert_swap(&self, swap: &SwapRecord) -> Result<bool>;

    async fn add_user_volume(&self, chain_id: u64, user: &Address, volume: U256) -> Result<()>;

    async fn add_token_volume(
        &self,
        chain_id: u64,
        token: &Address,
        symbol: &str,
        volume: U256,
    ) -> Result<()>;

    async fn add_user_token_pool_volume(
        &self,
        chain_id: u64,
        user: &Address,
        token: &Address,
        pool: &Address,
        volume: U256,
    ) -> Result<()>;

    /// Seeds the checkpoint on first run and returns the cursor to index from.
    async fn ensure_checkpoint(&self, chain_id: u64, seed: u64) -> Result<u64> {
        match self.read_checkpoint(chain_id).await? {
            Some(from_block) => Ok(from_block),
            None => {
                self.write_checkpoint(chain_id, seed).await?;
                Ok(seed)
            }
        }
    }
}
