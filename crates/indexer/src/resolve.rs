use crate::RETRY_BASE_DELAY;
use alloy::{
    consensus::Transaction as _,
    network::TransactionResponse as _,
    primitives::{Address, B256},
    providers::{ext::DebugApi, Provider, RootProvider},
    rpc::types::trace::geth::{
        GethDebugBuiltInTracerType, GethDebugTracerType, GethDebugTracingOptions, GethTrace,
    },
    sol_types::SolInterface,
};
use ethereum_abi::IUniversalRouter::IUniversalRouterCalls;
use std::{collections::HashSet, sync::Arc};
use tally_common::with_retry;

pub const TX_FETCH_RETRIES: u32 = 5;
pub const TRACE_RETRIES: u32 = 3;

/// True when the calldata is one of the Universal Router `execute` overloads.
pub fn is_execute_call(input: &[u8]) -> bool {
    matches!(
        IUniversalRouterCalls::abi_decode(input, false),
        Ok(IUniversalRouterCalls::execute_0(_)) | Ok(IUniversalRouterCalls::execute_1(_))
    )
}

/// De-aliases a router `sender` to the account that initiated the swap.
/// Ordered decision procedure, first match wins; any failure degrades to the
/// closest known address instead of erroring. Worst case the router address
/// itself stands in as the user.
pub async fn resolve_user(
    provider: &Arc<RootProvider>,
    tx_hash: B256,
    sender: Address,
    known_routers: &HashSet<Address>,
) -> Address {
    if !known_routers.contains(&sender) {
        return sender;
    }
    tracing::debug!("sender {sender} is a known router, resolving originator of {tx_hash}");

    let tx = match with_retry(
        || {
            let provider = provider.clone();
            async move {
                provider
                    .get_transaction_by_hash(tx_hash)
                    .await
                    .map_err(Into::into)
            }
        },
        TX_FETCH_RETRIES,
        RETRY_BASE_DELAY,
    )
    .await
    {
        Ok(Some(tx)) => tx,
        Ok(None) => {
            tracing::warn!("transaction {tx_hash} not found, attributing to sender {sender}");
            return sender;
        }
        Err(err) => {
            tracing::warn!("fetching transaction {tx_hash} failed: {err:#}, attributing to sender {sender}");
            return sender;
        }
    };
    let from = tx.from();

    match provider.get_code_at(from).await {
        // externally-owned account, the common case
        Ok(code) if code.is_empty() => return from,
        Ok(_) => {}
        Err(err) => {
            tracing::warn!("code lookup for {from} failed: {err:#}, attributing to {from}");
            return from;
        }
    }

    if !is_execute_call(tx.input()) {
        tracing::debug!("tx {tx_hash} is not an `execute` call, attributing to {from}");
        return from;
    }

    // A contract called `execute`; a call trace may reveal the account behind it.
    let options = GethDebugTracingOptions::default().with_tracer(
        GethDebugTracerType::BuiltInTracer(GethDebugBuiltInTracerType::CallTracer),
    );
    let frame = match with_retry(
        || {
            let provider = provider.clone();
            let options = options.clone();
            async move {
                provider
                    .debug_trace_transaction(tx_hash, options)
                    .await
                    .map_err(Into::into)
            }
        },
        TRACE_RETRIES,
        RETRY_BASE_DELAY,
    )
    .await
    {
        Ok(GethTrace::CallTracer(frame)) => frame,
        Ok(trace) => {
            tracing::warn!("unexpected trace shape for {tx_hash}: {trace:?}, attributing to {from}");
            return from;
        }
        Err(err) => {
            tracing::warn!("tracing unsupported or failed for {tx_hash}: {err:#}, attributing to {from}");
            return from;
        }
    };

    match provider.get_code_at(frame.from).await {
        Ok(code) if code.is_empty() => {
            tracing::debug!("traced originator {} for tx {tx_hash}", frame.from);
            frame.from
        }
        Ok(_) => {
            tracing::warn!("traced address {} is a contract, attributing to {from}", frame.from);
            from
        }
        Err(err) => {
            tracing::warn!("code lookup for traced {} failed: {err:#}, attributing to {from}", frame.from);
            from
        }
    }
}
