use alloy::primitives::{Address, B256, I256, U256};
use anyhow::Result;

pub const POOLS_TABLE: &str = "pools";
pub const SWAPS_TABLE: &str = "swaps";
pub const USERS_TABLE: &str = "users";
pub const TOKENS_TABLE: &str = "tokens";
pub const TOKEN_VOLUMES_TABLE: &str = "token_volumes";
pub const CHECKPOINTS_TABLE: &str = "checkpoints";
pub const CHECKPOINT_GAPS_TABLE: &str = "checkpoint_gaps";

/// `PoolRecord` is one discovered pool: a token pair at a fee tier.
#[derive(Debug, Clone)]
pub struct PoolRecord {
    pub chain_id: u64,
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub volume: U256,
}

/// One row of the append-only swap ledger, keyed (transaction_hash, chain_id).
/// Every aggregate is re-derivable from these rows.
#[derive(Debug, Clone)]
pub struct SwapRecord {
    pub chain_id: u64,
    pub pool_address: Address,
    pub user_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub amount0: I256,
    pub amount1: I256,
    pub block_number: u64,
    pub transaction_hash: B256,
    /// Unix seconds of the containing block.
    pub timestamp: i64,
}

// These structs are needed for sqlx::query_as
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PoolRaw {
    pub chain_id: i64,
    pub pool_address: [u8; 20],
    pub token0: [u8; 20],
    pub token1: [u8; 20],
    pub fee: i32,
    pub volume: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SwapRaw {
    pub chain_id: i64,
    pub pool_address: [u8; 20],
    pub user_address: [u8; 20],
    pub token0: [u8; 20],
    pub token1: [u8; 20],
    pub amount0: String,
    pub amount1: String,
    pub block_number: i64,
    pub transaction_hash: [u8; 32],
    pub timestamp: i64,
}

impl TryFrom<PoolRaw> for PoolRecord {
    type Error = anyhow::Error;

    fn try_from(raw: PoolRaw) -> Result<Self> {
        Ok(PoolRecord {
            chain_id: raw.chain_id as u64,
            address: Address::from_slice(&raw.pool_address),
            token0: Address::from_slice(&raw.token0),
            token1: Address::from_slice(&raw.token1),
            fee: raw.fee as u32,
            volume: raw.volume.parse::<U256>()?,
        })
    }
}

impl TryFrom<SwapRaw> for SwapRecord {
    type Error = anyhow::Error;

    fn try_from(raw: SwapRaw) -> Result<Self> {
        Ok(SwapRecord {
            chain_id: raw.chain_id as u64,
            pool_address: Address::from_slice(&raw.pool_address),
            user_address: Address::from_slice(&raw.user_address),
            token0: Address::from_slice(&raw.token0),
            token1: Address::from_slice(&raw.token1),
            amount0: raw.amount0.parse::<I256>()?,
            amount1: raw.amount1.parse::<I256>()?,
            block_number: raw.block_number as u64,
            transaction_hash: B256::from_slice(&raw.transaction_hash),
            timestamp: raw.timestamp,
        })
    }
}
