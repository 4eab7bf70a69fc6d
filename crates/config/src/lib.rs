use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    env,
    path::PathBuf,
};

pub mod tokens;

pub use tokens::{TokenList, TokenListEntry, TokenUniverse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub user: String,
    pub password: String,
    pub db_name: String,
    pub host: String,
    pub port: u16,
}

/// Converts config into connection string
impl PostgresConfig {
    pub fn into_connection(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.host, self.port, self.user, self.password, self.db_name
        )
    }
}

/// One chain of the registry. Immutable after `Config::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    #[serde(default)]
    pub rpc_url: String,
    pub factory_address: Address,
    pub token_list_path: PathBuf,
    #[serde(default)]
    pub known_routers: HashSet<Address>,
    pub from_block: u64,
}

impl ChainConfig {
    /// A chain takes part in indexing only with an RPC endpoint and a real factory.
    pub fn is_enabled(&self) -> bool {
        !self.rpc_url.is_empty() && !self.factory_address.is_zero()
    }

    pub fn load_tokens(&self) -> Result<TokenUniverse> {
        let data = std::fs::read(&self.token_list_path)
            .with_context(|| format!("read token list {:?}", self.token_list_path))?;
        let list: TokenList = serde_json::from_slice(&data)
            .with_context(|| format!("parse token list {:?}", self.token_list_path))?;
        Ok(TokenUniverse::new(list.tokens))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// When true, a cycle with failed pools holds the checkpoint so the same
    /// window is retried; when false the checkpoint always advances.
    #[serde(default)]
    pub strict_checkpointing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chains: BTreeMap<String, ChainConfig>,
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
}

impl Config {
    pub fn load(path: PathBuf) -> Result<Self> {
        let data = std::fs::read(&path).with_context(|| format!("read config {path:?}"))?;
        let mut config: Config = serde_yaml::from_slice(&data)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// `{KEY}_RPC_URL` and `{KEY}_FACTORY_ADDRESS` override the file values,
    /// so endpoints and secrets can stay out of the committed config.
    fn apply_env_overrides(&mut self) -> Result<()> {
        for (key, chain) in self.chains.iter_mut() {
            let key = key.to_uppercase();

            if let Ok(rpc_url) = env::var(format!("{key}_RPC_URL")) {
                chain.rpc_url = rpc_url;
            }
            if let Ok(factory) = env::var(format!("{key}_FACTORY_ADDRESS")) {
                chain.factory_address = factory
                    .parse()
                    .with_context(|| format!("{key}_FACTORY_ADDRESS is not an address"))?;
            }
        }
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const CONFIG_YML: &str = r#"
chains:
  eth:
    chain_id: 1
    name: Ethereum
    rpc_url: "http://localhost:8545"
    factory_address: "0x1F98431c8aD98523631AE4a59f267346ea31F984"
    token_list_path: "config/tokens/eth.json"
    known_routers:
      - "0x66a9893cc07d91d95644aedd05d03f95e1dba8af"
    from_block: 22605800
  stub:
    chain_id: 7070
    name: Stub
    factory_address: "0x0000000000000000000000000000000000000000"
    token_list_path: "config/tokens/stub.json"
    from_block: 0
postgres:
  user: tally
  password: tally
  db_name: tally
  host: localhost
  port: 5432
"#;

    #[test]
    fn parses_chain_registry() {
        let config: Config = serde_yaml::from_str(CONFIG_YML).unwrap();
        let eth = &config.chains["eth"];

        assert_eq!(eth.chain_id, 1);
        assert_eq!(
            eth.factory_address,
            address!("0x1F98431c8aD98523631AE4a59f267346ea31F984")
        );
        assert!(eth
            .known_routers
            .contains(&address!("0x66a9893cc07d91d95644aedd05d03f95e1dba8af")));
        assert!(eth.is_enabled());
        assert!(!config.indexer.strict_checkpointing);
    }

    #[test]
    fn chain_without_rpc_or_factory_is_disabled() {
        let config: Config = serde_yaml::from_str(CONFIG_YML).unwrap();
        assert!(!config.chains["stub"].is_enabled());
    }

    #[test]
    fn postgres_connection_string() {
        let config: Config = serde_yaml::from_str(CONFIG_YML).unwrap();
        assert_eq!(
            config.postgres.into_connection(),
            "host=localhost port=5432 user=tally password=tally dbname=tally sslmode=disable"
        );
    }
}
