use alloy::{primitives::Address, providers::RootProvider};
use ethereum_abi::IERC20;
use std::sync::Arc;
use tally_config::TokenUniverse;

pub const DEFAULT_DECIMALS: u8 = 18;

/// Token-list decimals first, then an on-chain `decimals()` read, then 18.
pub async fn token_decimals(
    provider: &Arc<RootProvider>,
    tokens: &TokenUniverse,
    token: &Address,
) -> u8 {
    if let Some(decimals) = tokens.decimals(token) {
        return decimals;
    }

    match IERC20::new(*token, provider.clone()).decimals().call().await {
        Ok(decimals) => decimals._0,
        Err(err) => {
            tracing::warn!(
                "decimals() failed for token {token}, defaulting to {DEFAULT_DECIMALS}: {err}"
            );
            DEFAULT_DECIMALS
        }
    }
}
