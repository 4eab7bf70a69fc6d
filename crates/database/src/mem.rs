use crate::{
    tables::{PoolRecord, SwapRecord},
    Store,
};
use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use hashbrown::HashMap;
use std::sync::Mutex;

/// In-memory [`Store`]. Backs unit tests and keeps the engine honest about
/// depending on the trait instead of Postgres.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    checkpoints: HashMap<u64, u64>,
    gaps: Vec<(u64, u64, u64)>,
    pools: HashMap<(Address, u64), PoolRecord>,
    swaps: HashMap<(B256, u64), SwapRecord>,
    // (volume, swaps) running totals
    users: HashMap<(Address, u64), (U256, u64)>,
    tokens: HashMap<(Address, u64), (String, U256, u64)>,
    token_volumes: HashMap<(Address, Address, Address, u64), (U256, u64)>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(&self, chain_id: u64) -> Option<u64> {
        self.inner.lock().unwrap().checkpoints.get(&chain_id).copied()
    }

    pub fn gaps(&self) -> Vec<(u64, u64, u64)> {
        self.inner.lock().unwrap().gaps.clone()
    }

    pub fn pool(&self, chain_id: u64, pool: &Address) -> Option<PoolRecord> {
        self.inner.lock().unwrap().pools.get(&(*pool, chain_id)).cloned()
    }

    pub fn swap_count(&self) -> usize {
        self.inner.lock().unwrap().swaps.len()
    }

    pub fn user_total(&self, chain_id: u64, user: &Address) -> Option<(U256, u64)> {
        self.inner.lock().unwrap().users.get(&(*user, chain_id)).copied()
    }

    pub fn token_total(&self, chain_id: u64, token: &Address) -> Option<(String, U256, u64)> {
        self.inner.lock().unwrap().tokens.get(&(*token, chain_id)).cloned()
    }

    pub fn user_token_pool_total(
        &self,
        chain_id: u64,
        user: &Address,
        token: &Address,
        pool: &Address,
    ) -> Option<(U256, u64)> {
        self.inner
            .lock()
            .unwrap()
            .token_volumes
            .get(&(*user, *token, *pool, chain_id))
            .copied()
    }
}

#[async_trait::async_trait]
impl Store for MemStore {
    async fn read_checkpoint(&self, chain_id: u64) -> Result<Option<u64>> {
        Ok(self.checkpoint(chain_id))
    }

    async fn write_checkpoint(&self, chain_id: u64, from_block: u64) -> Result<()> {
        self.inner.lock().unwrap().checkpoints.insert(chain_id, from_block);
        Ok(())
    }

    async fn record_gap(&self, chain_id: u64, from_block: u64, to_block: u64) -> Result<()> {
        self.inner.lock().unwrap().gaps.push((chain_id, from_block, to_block));
        Ok(())
    }

    async fn upsert_pool(&self, pool: &PoolRecord) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .pools
            .insert((pool.address, pool.chain_id), pool.clone());
        Ok(())
    }

    async fn pool_volume(&self, chain_id: u64, pool: &Address) -> Result<U256> {
        let inner = self.inner.lock().unwrap();
        let mut total = U256::ZERO;
        for swap in inner.swaps.values() {
            if swap.chain_id == chain_id && swap.pool_address == *pool {
                total += swap.amount0.unsigned_abs() + swap.amount1.unsigned_abs();
            }
        }
        Ok(total)
    }

    async fn insert_swap(&self, swap: &SwapRecord) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let key = (swap.transaction_hash, swap.chain_id);
        if inner.swaps.contains_key(&key) {
            return Ok(false);
        }
        inner.swaps.insert(key, swap.clone());
        Ok(true)
    }

    async fn add_user_volume(&self, chain_id: u64, user: &Address, volume: U256) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.users.entry((*user, chain_id)).or_default();
        entry.0 += volume;
        entry.1 += 1;
        Ok(())
    }

    async fn add_token_volume(
        &self,
        chain_id: u64,
        token: &Address,
        symbol: &str,
        volume: U256,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .tokens
            .entry((*token, chain_id))
            .or_insert_with(|| (symbol.to_string(), U256::ZERO, 0));
        entry.0 = symbol.to_string();
        entry.1 += volume;
        entry.2 += 1;
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
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .token_volumes
            .entry((*user, *token, *pool, chain_id))
            .or_default();
        entry.0 += volume;
        entry.1 += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, I256};

    fn swap(hash: B256) -> SwapRecord {
        SwapRecord {
            chain_id: 1,
            pool_address: address!("0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8"),
            user_address: address!("0x1111111111111111111111111111111111111111"),
            token0: address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            token1: address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            amount0: I256::try_from(-100).unwrap(),
            amount1: I256::try_from(250).unwrap(),
            block_number: 42,
            transaction_hash: hash,
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn ensure_checkpoint_seeds_once() {
        let store = MemStore::new();

        assert_eq!(store.ensure_checkpoint(1, 500).await.unwrap(), 500);
        store.write_checkpoint(1, 510).await.unwrap();
        assert_eq!(store.ensure_checkpoint(1, 500).await.unwrap(), 510);
    }

    #[tokio::test]
    async fn insert_swap_is_idempotent() {
        let store = MemStore::new();
        let record = swap(B256::repeat_byte(7));

        assert!(store.insert_swap(&record).await.unwrap());
        assert!(!store.insert_swap(&record).await.unwrap());
        assert_eq!(store.swap_count(), 1);
    }

    #[tokio::test]
    async fn records_pools_and_gaps() {
        let store = MemStore::new();

        let record = PoolRecord {
            chain_id: 1,
            address: address!("0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8"),
            token0: address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            token1: address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            fee: 3_000,
            volume: U256::ZERO,
        };
        store.upsert_pool(&record).await.unwrap();
        store.record_gap(1, 100, 19_099).await.unwrap();

        assert_eq!(store.pool(1, &record.address).unwrap().fee, 3_000);
        assert!(store.pool(5, &record.address).is_none());
        assert_eq!(store.gaps(), vec![(1, 100, 19_099)]);
    }

    #[tokio::test]
    async fn pool_volume_sums_absolute_legs() {
        let store = MemStore::new();
        store.insert_swap(&swap(B256::repeat_byte(1))).await.unwrap();
        store.insert_swap(&swap(B256::repeat_byte(2))).await.unwrap();

        let pool = address!("0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8");
        assert_eq!(store.pool_volume(1, &pool).await.unwrap(), U256::from(700));
        assert_eq!(store.pool_volume(5, &pool).await.unwrap(), U256::ZERO);
    }
}
