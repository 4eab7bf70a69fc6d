use crate::{
    tables::{
        PoolRaw, PoolRecord, SwapRaw, SwapRecord, CHECKPOINTS_TABLE, CHECKPOINT_GAPS_TABLE,
        POOLS_TABLE, SWAPS_TABLE, TOKENS_TABLE, TOKEN_VOLUMES_TABLE, USERS_TABLE,
    },
    Store,
};
use alloy::primitives::{Address, U256};
use anyhow::Result;
use sqlx::{Pool, Postgres};
use tally_config::PostgresConfig;

#[derive(Clone)]
pub struct PostgresDB {
    pool: Pool<Postgres>,
}

impl PostgresDB {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = sqlx::PgPool::connect(&config.into_connection()).await?;
        tracing::info!("📦 Connected to Postgres at {}:{}", config.host, config.port);

        Ok(Self { pool })
    }

    /// Applies the idempotent DDL from `schema.sql`.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn select_pools(&self, chain_id: u64) -> Result<Vec<PoolRecord>> {
        let query = format!(
            "SELECT chain_id, pool_address, token0, token1, fee, volume::text AS volume \
             FROM {POOLS_TABLE} WHERE chain_id = $1"
        );
        let rows: Vec<PoolRaw> = sqlx::query_as(&query)
            .bind(chain_id as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PoolRecord::try_from).collect()
    }

    /// The full ledger of one chain in block order, for aggregate replay.
    pub async fn select_swaps(&self, chain_id: u64) -> Result<Vec<SwapRecord>> {
        let query = format!(
            "SELECT chain_id, pool_address, user_address, token0, token1, \
                    amount0::text AS amount0, amount1::text AS amount1, block_number, \
                    transaction_hash, extract(epoch FROM timestamp)::bigint AS timestamp \
             FROM {SWAPS_TABLE} WHERE chain_id = $1 ORDER BY block_number"
        );
        let rows: Vec<SwapRaw> = sqlx::query_as(&query)
            .bind(chain_id as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SwapRecord::try_from).collect()
    }

    /// Drops every derived aggregate row. The swap ledger is untouched.
    pub async fn reset_aggregates(&self) -> Result<()> {
        let query = format!("TRUNCATE {USERS_TABLE}, {TOKENS_TABLE}, {TOKEN_VOLUMES_TABLE}");
        sqlx::query(&query).execute(&self.pool).await?;
        tracing::info!("🧹 Aggregate tables truncated");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for PostgresDB {
    async fn read_checkpoint(&self, chain_id: u64) -> Result<Option<u64>> {
        let query = format!("SELECT from_block FROM {CHECKPOINTS_TABLE} WHERE chain_id = $1");
        let from_block: Option<i64> = sqlx::query_scalar(&query)
            .bind(chain_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(from_block.map(|block| block as u64))
    }

    async fn write_checkpoint(&self, chain_id: u64, from_block: u64) -> Result<()> {
        let query = format!(
            "INSERT INTO {CHECKPOINTS_TABLE} (chain_id, from_block) VALUES ($1, $2) \
             ON CONFLICT (chain_id) DO UPDATE SET from_block = EXCLUDED.from_block"
        );
        sqlx::query(&query)
            .bind(chain_id as i64)
            .bind(from_block as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_gap(&self, chain_id: u64, from_block: u64, to_block: u64) -> Result<()> {
        let query = format!(
            "INSERT INTO {CHECKPOINT_GAPS_TABLE} (chain_id, from_block, to_block) \
             VALUES ($1, $2, $3)"
        );
        sqlx::query(&query)
            .bind(chain_id as i64)
            .bind(from_block as i64)
            .bind(to_block as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_pool(&self, pool: &PoolRecord) -> Result<()> {
        let query = format!(
            "INSERT INTO {POOLS_TABLE} (chain_id, pool_address, token0, token1, fee, volume) \
             VALUES ($1, $2, $3, $4, $5, $6::numeric) \
             ON CONFLICT (pool_address, chain_id) DO UPDATE SET \
                 token0 = EXCLUDED.token0, token1 = EXCLUDED.token1, \
                 fee = EXCLUDED.fee, volume = EXCLUDED.volume"
        );
        sqlx::query(&query)
            .bind(pool.chain_id as i64)
            .bind(pool.address.as_slice())
            .bind(pool.token0.as_slice())
            .bind(pool.token1.as_slice())
            .bind(pool.fee as i32)
            .bind(pool.volume.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pool_volume(&self, chain_id: u64, pool: &Address) -> Result<U256> {
        let query = format!(
            "SELECT COALESCE(SUM(ABS(amount0) + ABS(amount1)), 0)::text \
             FROM {SWAPS_TABLE} WHERE pool_address = $1 AND chain_id = $2"
        );
        let total: String = sqlx::query_scalar(&query)
            .bind(pool.as_slice())
            .bind(chain_id as i64)
            .fetch_one(&self.pool)
            .await?;

        Ok(total.parse::<U256>()?)
    }

    async fn insert_swap(&self, swap: &SwapRecord) -> Result<bool> {
        let query = format!(
            "INSERT INTO {SWAPS_TABLE} (chain_id, pool_address, user_address, token0, token1, \
                 amount0, amount1, block_number, transaction_hash, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6::numeric, $7::numeric, $8, $9, to_timestamp($10)) \
             ON CONFLICT (transaction_hash, chain_id) DO NOTHING"
        );
        let rows_affected = sqlx::query(&query)
            .bind(swap.chain_id as i64)
            .bind(swap.pool_address.as_slice())
            .bind(swap.user_address.as_slice())
            .bind(swap.token0.as_slice())
            .bind(swap.token1.as_slice())
            .bind(swap.amount0.to_string())
            .bind(swap.amount1.to_string())
            .bind(swap.block_number as i64)
            .bind(swap.transaction_hash.as_slice())
            .bind(swap.timestamp)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn add_user_volume(&self, chain_id: u64, user: &Address, volume: U256) -> Result<()> {
        let query = format!(
            "INSERT INTO {USERS_TABLE} (address, chain_id, total_volume, total_swaps) \
             VALUES ($1, $2, $3::numeric, 1) \
             ON CONFLICT (address, chain_id) DO UPDATE SET \
                 total_volume = {USERS_TABLE}.total_volume + EXCLUDED.total_volume, \
                 total_swaps = {USERS_TABLE}.total_swaps + 1"
        );
        sqlx::query(&query)
            .bind(user.as_slice())
            .bind(chain_id as i64)
            .bind(volume.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_token_volume(
        &self,
        chain_id: u64,
        token: &Address,
        symbol: &str,
        volume: U256,
    ) -> Result<()> {
        let query = format!(
            "INSERT INTO {TOKENS_TABLE} (address, chain_id, symbol, total_volume, total_swaps) \
             VALUES ($1, $2, $3, $4::numeric, 1) \
             ON CONFLICT (address, chain_id) DO UPDATE SET \
                 symbol = EXCLUDED.symbol, \
                 total_volume = {TOKENS_TABLE}.total_volume + EXCLUDED.total_volume, \
                 total_swaps = {TOKENS_TABLE}.total_swaps + 1"
        );
        sqlx::query(&query)
            .bind(token.as_slice())
            .bind(chain_id as i64)
            .bind(symbol)
            .bind(volume.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_user_token_pool_volume(
        &self,
        chain_id: u64,
        user: &Address,
        token: &Address,
        pool: &Address,
        volume: U256,
    ) -> Result<()> {
        let query = format!(
            "INSERT INTO {TOKEN_VOLUMES_TABLE} \
                 (user_address, token_address, pool_address, chain_id, volume, swaps) \
             VALUES ($1, $2, $3, $4, $5::numeric, 1) \
             ON CONFLICT (user_address, token_address, pool_address, chain_id) DO UPDATE SET \
                 volume = {TOKEN_VOLUMES_TABLE}.volume + EXCLUDED.volume, \
                 swaps = {TOKEN_VOLUMES_TABLE}.swaps + 1"
        );
        sqlx::query(&query)
            .bind(user.as_slice())
            .bind(token.as_slice())
            .bind(pool.as_slice())
            .bind(chain_id as i64)
            .bind(volume.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
