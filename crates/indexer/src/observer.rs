use alloy::primitives::Address;

/// Hooks the embedding application can attach to the engine. Every method has
/// a no-op default, so implementors pick only what they care about.
pub trait IndexerObserver: Send + Sync {
    fn on_pool_found(
        &self,
        _chain_id: u64,
        _pool: &Address,
        _token0: &Address,
        _token1: &Address,
        _fee: u32,
    ) {
    }

    fn on_indexing_swaps(&self, _chain_id: u64, _pool: &Address, _from_block: u64, _to_block: u64) {
    }

    fn on_failed_update_volumes(&self, _target: &str, _error: &str) {}

    fn on_failed_process_swap(&self, _pool: &Address, _error: &str) {}

    fn on_checkpoint_fast_forward(&self, _chain_id: u64, _old_from: u64, _new_from: u64) {}
}

/// Default observer: mirrors every event into the log stream.
pub struct LogObserver;

impl IndexerObserver for LogObserver {
    fn on_pool_found(
        &self,
        chain_id: u64,
        pool: &Address,
        token0: &Address,
        token1: &Address,
        fee: u32,
    ) {
        tracing::info!("pool found on chain {chain_id}: {pool} ({token0} / {token1}, fee {fee})");
    }

    fn on_indexing_swaps(&self, chain_id: u64, pool: &Address, from_block: u64, to_block: u64) {
        tracing::debug!(
            "indexing swaps on chain {chain_id}: pool {pool}, blocks [{from_block}, {to_block}]"
        );
    }

    fn on_failed_update_volumes(&self, target: &str, error: &str) {
        tracing::error!("volume update failed for {target}: {error}");
    }

    fn on_failed_process_swap(&self, pool: &Address, error: &str) {
        tracing::error!("swap processing failed for pool {pool}: {error}");
    }

    fn on_checkpoint_fast_forward(&self, chain_id: u64, old_from: u64, new_from: u64) {
        tracing::warn!("chain {chain_id} checkpoint fast-forwarded: {old_from} -> {new_from}");
    }
}
