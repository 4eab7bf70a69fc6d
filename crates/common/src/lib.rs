use alloy::primitives::Address;
use anyhow::Result;
use std::{future::Future, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("invalid factory address {factory} for chain {chain_id}")]
    InvalidFactory { chain_id: u64, factory: Address },
    #[error("no checkpoint for chain {0}")]
    MissingCheckpoint(u64),
}

/// Data defects caught by the volume aggregator. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("invalid {0} address: {1}")]
    InvalidAddress(&'static str, Address),
    #[error("missing chain id")]
    MissingChainId,
}

/// Retries `op` up to `retries` attempts with exponential backoff:
/// `delay = base * 2^(attempt - 1)`. The last error is returned as-is.
pub async fn with_retry<T, F, Fut>(mut op: F, retries: u32, base: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries => {
                let delay = base * 2u32.saturating_pow(attempt - 1);
                tracing::warn!("attempt {attempt} failed, retrying in {delay:?}: {err:#}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    if n < 2 {
                        Err(anyhow!("flaky"))
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn retry_surfaces_last_error_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(
            || {
                calls.fetch_add(1, Ordering::Relaxed);
                async { Err(anyhow!("still down")) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}
