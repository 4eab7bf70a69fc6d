use crate::{discovery::discover_pools, harvest::harvest_swaps, observer::IndexerObserver};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tally_common::IndexerError;
use tally_config::{ChainConfig, Config};
use tally_db::Store;

/// Blocks harvested per chain per cycle.
pub const BLOCK_BATCH_SIZE: u64 = 10;
/// Fixed delay between chains, bounding the request rate.
pub const CHAIN_DELAY: Duration = Duration::from_millis(1_000);
/// Fast-forward once the head runs further ahead than this.
pub const MAX_CHECKPOINT_DRIFT: u64 = 10_000;
/// Where the cursor lands after a fast-forward: head minus this rewind.
pub const CATCHUP_REWIND: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchupDecision {
    /// Cursor is ahead of the head; nothing to do this cycle.
    Idle,
    /// Too far behind; jump the cursor and accept the gap in history.
    FastForward { new_from: u64 },
    /// Harvest the closed window [from, to].
    Window { from: u64, to: u64 },
}

/// CATCHUP_CHECK: bounds indexing latency at the cost of skipped history.
pub fn plan_window(from_block: u64, head: u64) -> CatchupDecision {
    if head.saturating_sub(from_block) > MAX_CHECKPOINT_DRIFT {
        return CatchupDecision::FastForward {
            new_from: head - CATCHUP_REWIND,
        };
    }
    if from_block > head {
        return CatchupDecision::Idle;
    }
    CatchupDecision::Window {
        from: from_block,
        to: (from_block + BLOCK_BATCH_SIZE - 1).min(head),
    }
}

/// Drives every enabled chain through the indexing cycle, round-robin,
/// forever: CONNECT → CATCHUP_CHECK → DISCOVER → HARVEST →
/// CHECKPOINT_ADVANCE → PACE.
pub struct Orchestrator<S> {
    config: Config,
    store: S,
    observer: Arc<dyn IndexerObserver>,
}

impl<S: Store> Orchestrator<S> {
    pub fn new(config: Config, store: S, observer: Arc<dyn IndexerObserver>) -> Self {
        Self {
            config,
            store,
            observer,
        }
    }

    /// Runs forever. Only orchestration-level errors escape; chain- and
    /// pool-level failures are logged and the round-robin continues.
    pub async fn start(&self) -> Result<()> {
        self.init_checkpoints().await?;

        loop {
            for (key, chain) in &self.config.chains {
                if !chain.is_enabled() {
                    continue;
                }
                if let Err(err) = self.run_cycle(key, chain).await {
                    tracing::error!("chain {key} deferred: {err:#}");
                }
                // PACE
                tokio::time::sleep(CHAIN_DELAY).await;
            }
        }
    }

    /// INIT: every enabled chain gets a checkpoint seeded at its start block.
    pub async fn init_checkpoints(&self) -> Result<()> {
        for (key, chain) in &self.config.chains {
            if !chain.is_enabled() {
                tracing::debug!("chain {key} disabled (missing rpc url or factory)");
                continue;
            }
            let from_block = self
                .store
                .ensure_checkpoint(chain.chain_id, chain.from_block)
                .await?;
            tracing::info!("⛓️ chain {key} resumes at block {from_block}");
        }
        Ok(())
    }

    async fn run_cycle(&self, key: &str, chain: &ChainConfig) -> Result<()> {
        // CONNECT
        let provider: Arc<RootProvider> =
            match ProviderBuilder::default().connect(&chain.rpc_url).await {
                Ok(provider) => Arc::new(provider),
                Err(err) => {
                    tracing::error!("provider init failed for chain {key}: {err:#}");
                    // defer one pacing interval, checkpoint untouched
                    return Ok(());
                }
            };
        provider
            .get_chain_id()
            .await
            .context("liveness check failed")?;

        let tokens = chain.load_tokens()?;

        let mut from_block = self
            .store
            .read_checkpoint(chain.chain_id)
            .await?
            .ok_or(IndexerError::MissingCheckpoint(chain.chain_id))?;
        let head = provider
            .get_block_number()
            .await
            .context("fetch head block failed")?;

        // CATCHUP_CHECK
        if let CatchupDecision::FastForward { new_from } = plan_window(from_block, head) {
            self.store
                .record_gap(chain.chain_id, from_block, new_from - 1)
                .await?;
            self.store.write_checkpoint(chain.chain_id, new_from).await?;
            self.observer
                .on_checkpoint_fast_forward(chain.chain_id, from_block, new_from);
            tracing::warn!(
                "chain {key} fast-forwarded from {from_block} to {new_from} (head {head})"
            );
            from_block = new_from;
        }
        let (from_block, to_block) = match plan_window(from_block, head) {
            CatchupDecision::Window { from, to } => (from, to),
            _ => {
                tracing::debug!("chain {key} cursor {from_block} is ahead of head {head}");
                return Ok(());
            }
        };

        // DISCOVER
        let pools = discover_pools(
            chain,
            &provider,
            &self.store,
            &tokens,
            self.observer.as_ref(),
        )
        .await?;

        // HARVEST
        let mut failed_pools = 0usize;
        for pool in &pools {
            if let Err(err) = harvest_swaps(
                pool,
                &provider,
                &self.store,
                chain,
                &tokens,
                from_block,
                to_block,
                self.observer.as_ref(),
            )
            .await
            {
                tracing::error!(
                    "harvest failed for pool {} on chain {key}: {err:#}",
                    pool.address
                );
                self.observer
                    .on_failed_process_swap(&pool.address, &format!("{err:#}"));
                failed_pools += 1;
            }
        }

        // CHECKPOINT_ADVANCE
        if failed_pools > 0 && self.config.indexer.strict_checkpointing {
            tracing::warn!(
                "chain {key}: {failed_pools} pools failed, holding checkpoint at {from_block}"
            );
        } else {
            self.store
                .write_checkpoint(chain.chain_id, to_block + 1)
                .await?;
            tracing::debug!("chain {key} processed [{from_block}, {to_block}]");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LogObserver;
    use alloy::primitives::address;
    use std::collections::{BTreeMap, HashSet};
    use tally_config::{IndexerConfig, PostgresConfig};
    use tally_db::MemStore;

    #[test]
    fn fast_forwards_only_past_the_drift_bound() {
        // drift 20_000 > 10_000: jump to head - 1_000
        assert_eq!(
            plan_window(100, 20_100),
            CatchupDecision::FastForward { new_from: 19_100 }
        );
        // drift exactly at the bound stays a window
        assert_eq!(
            plan_window(100, 10_100),
            CatchupDecision::Window { from: 100, to: 109 }
        );
    }

    #[test]
    fn window_is_clamped_to_head() {
        assert_eq!(
            plan_window(100, 1_000),
            CatchupDecision::Window { from: 100, to: 109 }
        );
        assert_eq!(
            plan_window(100, 104),
            CatchupDecision::Window { from: 100, to: 104 }
        );
        assert_eq!(
            plan_window(100, 100),
            CatchupDecision::Window { from: 100, to: 100 }
        );
    }

    #[test]
    fn cursor_ahead_of_head_is_idle() {
        assert_eq!(plan_window(101, 100), CatchupDecision::Idle);
    }

    #[test]
    fn fast_forward_window_follows_immediately() {
        // the recomputed window after a fast-forward can never fast-forward again
        let CatchupDecision::FastForward { new_from } = plan_window(100, 20_100) else {
            panic!("expected fast-forward");
        };
        assert_eq!(
            plan_window(new_from, 20_100),
            CatchupDecision::Window {
                from: 19_100,
                to: 19_109
            }
        );
    }

    #[tokio::test]
    async fn init_seeds_checkpoints_for_enabled_chains_only() {
        let mut chains = BTreeMap::new();
        chains.insert(
            "eth".to_string(),
            ChainConfig {
                chain_id: 1,
                name: "Ethereum".into(),
                rpc_url: "http://127.0.0.1:8545".into(),
                factory_address: address!("0x1F98431c8aD98523631AE4a59f267346ea31F984"),
                token_list_path: "config/tokens/eth.json".into(),
                known_routers: HashSet::new(),
                from_block: 22_605_800,
            },
        );
        chains.insert(
            "stub".to_string(),
            ChainConfig {
                chain_id: 7070,
                name: "Stub".into(),
                rpc_url: String::new(),
                factory_address: address!("0x1F98431c8aD98523631AE4a59f267346ea31F984"),
                token_list_path: "config/tokens/stub.json".into(),
                known_routers: HashSet::new(),
                from_block: 5,
            },
        );
        let config = Config {
            chains,
            postgres: PostgresConfig {
                user: "tally".into(),
                password: "tally".into(),
                db_name: "tally".into(),
                host: "localhost".into(),
                port: 5432,
            },
            indexer: IndexerConfig::default(),
        };

        let orchestrator = Orchestrator::new(config, MemStore::new(), Arc::new(LogObserver));
        orchestrator.init_checkpoints().await.unwrap();

        assert_eq!(orchestrator.store.checkpoint(1), Some(22_605_800));
        assert_eq!(orchestrator.store.checkpoint(7070), None);
    }
}
