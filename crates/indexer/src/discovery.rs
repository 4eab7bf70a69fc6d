use crate::{
    observer::IndexerObserver,
    pairs::{canonical_pair, pair_key, token_pairs_with_fees, PoolCandidate, FEE_TIERS},
};
use alloy::{
    primitives::{Uint, U256},
    providers::RootProvider,
};
use anyhow::{bail, Result};
use ethereum_abi::IUniswapV3Factory;
use std::sync::Arc;
use tally_common::IndexerError;
use tally_config::{ChainConfig, TokenUniverse};
use tally_db::{tables::PoolRecord, Store};

/// Probes the factory for every candidate pair × fee tier and upserts what
/// exists. Pool existence is not block-windowed, so this runs over the full
/// universe each cycle. Returns the pools to harvest.
///
/// A zero factory address is a configuration defect and fails the whole
/// chain; everything per-candidate is caught and reported.
pub async fn discover_pools<S: Store + ?Sized>(
    chain: &ChainConfig,
    provider: &Arc<RootProvider>,
    store: &S,
    tokens: &TokenUniverse,
    observer: &dyn IndexerObserver,
) -> Result<Vec<PoolRecord>> {
    if chain.factory_address.is_zero() {
        bail!(IndexerError::InvalidFactory {
            chain_id: chain.chain_id,
            factory: chain.factory_address,
        });
    }

    let candidates = token_pairs_with_fees(tokens, &FEE_TIERS);
    tracing::debug!(
        "discovering pools on {}: {} candidates",
        chain.name,
        candidates.len()
    );

    let mut pools = Vec::new();

    for candidate in candidates {
        if candidate.token_a.is_zero() || candidate.token_b.is_zero() {
            tracing::warn!(
                "candidate {} has a zero token address",
                pair_key(candidate.token_a, candidate.token_b, candidate.fee)
            );
            continue;
        }
        // never send an unlisted pair to the factory
        if !tokens.contains(&candidate.token_a) && !tokens.contains(&candidate.token_b) {
            continue;
        }

        match probe_candidate(chain, provider, store, tokens, &candidate, observer).await {
            Ok(Some(pool)) => pools.push(pool),
            Ok(None) => {}
            Err(err) => {
                let key = pair_key(candidate.token_a, candidate.token_b, candidate.fee);
                tracing::error!("candidate {key} on chain {} failed: {err:#}", chain.chain_id);
                observer.on_failed_update_volumes(&key, &format!("{err:#}"));
            }
        }
    }

    tracing::info!("💧 {} pools live on {}", pools.len(), chain.name);
    Ok(pools)
}

async fn probe_candidate<S: Store + ?Sized>(
    chain: &ChainConfig,
    provider: &Arc<RootProvider>,
    store: &S,
    tokens: &TokenUniverse,
    candidate: &PoolCandidate,
    observer: &dyn IndexerObserver,
) -> Result<Option<PoolRecord>> {
    let (token0, token1) = canonical_pair(candidate.token_a, candidate.token_b);

    let factory = IUniswapV3Factory::new(chain.factory_address, provider.clone());
    let pool_address = factory
        .getPool(token0, token1, Uint::from(candidate.fee))
        .call()
        .await?
        ._0;

    if pool_address.is_zero() {
        // "no such pool" is an answer, not an error
        return Ok(None);
    }

    observer.on_pool_found(chain.chain_id, &pool_address, &token0, &token1, candidate.fee);
    tracing::info!(
        "Found pool {pool_address} ({} / {}, fee {})",
        tokens.symbol(&token0),
        tokens.symbol(&token1),
        candidate.fee
    );

    // running volume is re-derived from the ledger, not trusted from before
    let volume = match store.pool_volume(chain.chain_id, &pool_address).await {
        Ok(volume) => volume,
        Err(err) => {
            tracing::warn!("volume re-derivation failed for pool {pool_address}: {err:#}");
            U256::ZERO
        }
    };

    let record = PoolRecord {
        chain_id: chain.chain_id,
        address: pool_address,
        token0,
        token1,
        fee: candidate.fee,
        volume,
    };
    store.upsert_pool(&record).await?;

    Ok(Some(record))
}
