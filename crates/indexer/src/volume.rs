use alloy::primitives::U256;
use anyhow::Result;
use tally_common::VolumeError;
use tally_config::TokenUniverse;
use tally_db::{tables::SwapRecord, Store};

/// User-level volume contribution of one swap: |amount0| + |amount1|.
pub fn swap_volume(swap: &SwapRecord) -> U256 {
    swap.amount0
        .unsigned_abs()
        .saturating_add(swap.amount1.unsigned_abs())
}

/// Structurally invalid rows are data defects, never retried.
fn validate(swap: &SwapRecord) -> Result<(), VolumeError> {
    if swap.user_address.is_zero() {
        return Err(VolumeError::InvalidAddress("user", swap.user_address));
    }
    if swap.pool_address.is_zero() {
        return Err(VolumeError::InvalidAddress("pool", swap.pool_address));
    }
    if swap.token0.is_zero() {
        return Err(VolumeError::InvalidAddress("token0", swap.token0));
    }
    if swap.token1.is_zero() {
        return Err(VolumeError::InvalidAddress("token1", swap.token1));
    }
    if swap.chain_id == 0 {
        return Err(VolumeError::MissingChainId);
    }
    Ok(())
}

/// Applies one freshly persisted swap to the running aggregates: the user
/// total always, and per token leg only when the token is in the universe and
/// the leg is non-zero.
pub async fn apply_volume<S: Store + ?Sized>(
    store: &S,
    swap: &SwapRecord,
    tokens: &TokenUniverse,
) -> Result<()> {
    validate(swap)?;

    store
        .add_user_volume(swap.chain_id, &swap.user_address, swap_volume(swap))
        .await?;

    let legs = [
        (swap.token0, swap.amount0.unsigned_abs()),
        (swap.token1, swap.amount1.unsigned_abs()),
    ];
    for (token, leg) in legs {
        if !tokens.contains(&token) || leg.is_zero() {
            continue;
        }
        store
            .add_token_volume(swap.chain_id, &token, tokens.symbol(&token), leg)
            .await?;
        store
            .add_user_token_pool_volume(swap.chain_id, &swap.user_address, &token, &swap.pool_address, leg)
            .await?;
    }

    Ok(())
}
