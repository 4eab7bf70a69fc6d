use crate::{
    decimals::token_decimals, observer::IndexerObserver, resolve::resolve_user,
    volume::apply_volume, RETRY_BASE_DELAY,
};
use alloy::{
    primitives::utils::format_units,
    providers::{Provider, RootProvider},
    rpc::types::Filter,
    sol_types::SolEvent,
};
use anyhow::{Context, Result};
use ethereum_abi::IUniswapV3Pool;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tally_common::with_retry;
use tally_config::{ChainConfig, TokenUniverse};
use tally_db::{
    tables::{PoolRecord, SwapRecord},
    Store,
};

pub const LOG_FETCH_RETRIES: u32 = 5;

/// Harvests one pool's `Swap` events over the closed window
/// [`from_block`, `to_block`], in emission order. A failing log fetch aborts
/// the pool's batch and propagates; everything per-event is non-fatal.
#[allow(clippy::too_many_arguments)]
pub async fn harvest_swaps<S: Store + ?Sized>(
    pool: &PoolRecord,
    provider: &Arc<RootProvider>,
    store: &S,
    chain: &ChainConfig,
    tokens: &TokenUniverse,
    from_block: u64,
    to_block: u64,
    observer: &dyn IndexerObserver,
) -> Result<()> {
    if !tokens.contains(&pool.token0) && !tokens.contains(&pool.token1) {
        tracing::debug!("pool {} has no listed token, skipping", pool.address);
        return Ok(());
    }

    observer.on_indexing_swaps(chain.chain_id, &pool.address, from_block, to_block);

    let filter = Filter::new()
        .address(pool.address)
        .event_signature(IUniswapV3Pool::Swap::SIGNATURE_HASH)
        .from_block(from_block)
        .to_block(to_block);

    let logs = with_retry(
        || {
            let provider = provider.clone();
            let filter = filter.clone();
            async move { provider.get_logs(&filter).await.map_err(Into::into) }
        },
        LOG_FETCH_RETRIES,
        RETRY_BASE_DELAY,
    )
    .await
    .with_context(|| {
        format!(
            "fetch Swap logs for pool {} in [{from_block}, {to_block}]",
            pool.address
        )
    })?;

    tracing::debug!(
        "{} Swap events for pool {} in [{from_block}, {to_block}]",
        logs.len(),
        pool.address
    );

    for log in logs {
        let Some(tx_hash) = log.transaction_hash else {
            tracing::warn!("Swap log without transaction hash in pool {}", pool.address);
            continue;
        };
        let Some(block_number) = log.block_number else {
            tracing::warn!("Swap log without block number in tx {tx_hash}");
            continue;
        };

        // Malformed events are data noise, not a reason to stop the batch.
        let swap = match IUniswapV3Pool::Swap::decode_log(&log.inner, false) {
            Ok(swap) => swap,
            Err(err) => {
                tracing::warn!("undecodable Swap event in tx {tx_hash}: {err}");
                continue;
            }
        };

        let timestamp = block_timestamp(provider, block_number).await;
        let user_address =
            resolve_user(provider, tx_hash, swap.sender, &chain.known_routers).await;

        let decimals0 = token_decimals(provider, tokens, &pool.token0).await;
        let decimals1 = token_decimals(provider, tokens, &pool.token1).await;
        tracing::info!(
            "swap in pool {} at block {block_number}: {} {} / {} {} by {user_address} (tx {tx_hash})",
            pool.address,
            format_units(swap.amount0, decimals0).unwrap_or_default(),
            tokens.symbol(&pool.token0),
            format_units(swap.amount1, decimals1).unwrap_or_default(),
            tokens.symbol(&pool.token1),
        );

        let record = SwapRecord {
            chain_id: chain.chain_id,
            pool_address: pool.address,
            user_address,
            token0: pool.token0,
            token1: pool.token1,
            amount0: swap.amount0,
            amount1: swap.amount1,
            block_number,
            transaction_hash: tx_hash,
            timestamp,
        };

        if let Err(err) = record_swap(store, &record, tokens, observer).await {
            observer.on_failed_process_swap(
                &pool.address,
                &format!("swap upsert failed: {err:#}"),
            );
        }
    }

    Ok(())
}

/// Persists one swap and, only when the row is new, feeds the aggregates.
/// Re-recording a known (transaction_hash, chain_id) is a no-op, so
/// re-harvesting a processed range cannot double-count.
pub async fn record_swap<S: Store + ?Sized>(
    store: &S,
    record: &SwapRecord,
    tokens: &TokenUniverse,
    observer: &dyn IndexerObserver,
) -> Result<bool> {
    if !store.insert_swap(record).await? {
        tracing::debug!(
            "swap {} already indexed on chain {}",
            record.transaction_hash,
            record.chain_id
        );
        return Ok(false);
    }

    // the ledger row stays authoritative even when aggregation fails
    if let Err(err) = apply_volume(store, record, tokens).await {
        observer.on_failed_update_volumes(
            &record.pool_address.to_string(),
            &format!("{err:#}"),
        );
    }

    Ok(true)
}

async fn block_timestamp(provider: &Arc<RootProvider>, block_number: u64) -> i64 {
    match provider.get_block_by_number(block_number.into()).await {
        Ok(Some(block)) => block.header.timestamp as i64,
        Ok(None) => {
            tracing::warn!("block {block_number} not found, falling back to current time");
            unix_now()
        }
        Err(err) => {
            tracing::warn!(
                "fetching block {block_number} failed: {err:#}, falling back to current time"
            );
            unix_now()
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LogObserver;
    use alloy::primitives::{address, aliases::I24, Address, Log, LogData, B256, I256, U160, U256};
    use tally_config::TokenListEntry;
    use tally_db::MemStore;

    const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const POOL: Address = address!("0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8");
    const USER: Address = address!("0x1111111111111111111111111111111111111111");

    fn universe() -> TokenUniverse {
        TokenUniverse::new(vec![
            TokenListEntry {
                address: USDC,
                symbol: "USDC".into(),
                decimals: Some(6),
            },
            TokenListEntry {
                address: WETH,
                symbol: "WETH".into(),
                decimals: Some(18),
            },
        ])
    }

    fn record(hash: B256) -> SwapRecord {
        SwapRecord {
            chain_id: 1,
            pool_address: POOL,
            user_address: USER,
            token0: USDC,
            token1: WETH,
            amount0: I256::try_from(-100).unwrap(),
            amount1: I256::try_from(250).unwrap(),
            block_number: 42,
            transaction_hash: hash,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn swap_event_roundtrips_through_log_decoding() {
        let event = IUniswapV3Pool::Swap {
            sender: USER,
            recipient: USER,
            amount0: I256::try_from(-100).unwrap(),
            amount1: I256::try_from(250).unwrap(),
            sqrtPriceX96: U160::from(1u64),
            liquidity: 1_000u128,
            tick: I24::ZERO,
        };
        let log = Log {
            address: POOL,
            data: event.encode_log_data(),
        };

        let decoded = IUniswapV3Pool::Swap::decode_log(&log, true).unwrap();
        assert_eq!(decoded.address, POOL);
        assert_eq!(decoded.sender, USER);
        assert_eq!(decoded.amount0, I256::try_from(-100).unwrap());
        assert_eq!(decoded.amount1, I256::try_from(250).unwrap());
    }

    #[test]
    fn truncated_swap_event_fails_decoding() {
        let event = IUniswapV3Pool::Swap {
            sender: USER,
            recipient: USER,
            amount0: I256::ZERO,
            amount1: I256::ZERO,
            sqrtPriceX96: U160::from(1u64),
            liquidity: 0u128,
            tick: I24::ZERO,
        };
        let data = event.encode_log_data();
        let truncated = LogData::new_unchecked(
            data.topics().to_vec(),
            data.data.slice(0..data.data.len() / 2),
        );
        let log = Log {
            address: POOL,
            data: truncated,
        };

        assert!(IUniswapV3Pool::Swap::decode_log(&log, true).is_err());
    }

    #[tokio::test]
    async fn re_recording_a_swap_does_not_double_count() {
        let store = MemStore::new();
        let tokens = universe();
        let swap = record(B256::repeat_byte(3));

        assert!(record_swap(&store, &swap, &tokens, &LogObserver).await.unwrap());
        assert!(!record_swap(&store, &swap, &tokens, &LogObserver).await.unwrap());

        assert_eq!(store.swap_count(), 1);
        let (user_volume, user_swaps) = store.user_total(1, &USER).unwrap();
        assert_eq!(user_volume, U256::from(350));
        assert_eq!(user_swaps, 1);
        assert_eq!(store.token_total(1, &USDC).unwrap().1, U256::from(100));
    }

    #[tokio::test]
    async fn aggregation_failure_keeps_the_ledger_row() {
        let store = MemStore::new();
        let tokens = universe();

        let mut defective = record(B256::repeat_byte(4));
        defective.user_address = Address::ZERO; // aggregator rejects this

        let inserted = record_swap(&store, &defective, &tokens, &LogObserver)
            .await
            .unwrap();

        assert!(inserted);
        assert_eq!(store.swap_count(), 1);
        assert!(store.user_total(1, &Address::ZERO).is_none());
    }
}
