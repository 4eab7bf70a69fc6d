use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// On-disk shape of a token list document: `{"tokens": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenList {
    pub tokens: Vec<TokenListEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenListEntry {
    pub address: Address,
    pub symbol: String,
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// The valid-token universe of one chain. Pools and swap legs outside of it
/// are ignored by discovery and aggregation.
#[derive(Debug, Clone, Default)]
pub struct TokenUniverse {
    entries: Vec<TokenListEntry>,
    by_address: HashMap<Address, usize>,
}

impl TokenUniverse {
    pub fn new(entries: Vec<TokenListEntry>) -> Self {
        let by_address = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.address, index))
            .collect();
        Self { entries, by_address }
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.by_address.contains_key(token)
    }

    pub fn symbol(&self, token: &Address) -> &str {
        self.by_address
            .get(token)
            .map(|index| self.entries[*index].symbol.as_str())
            .unwrap_or(UNKNOWN_SYMBOL)
    }

    pub fn decimals(&self, token: &Address) -> Option<u8> {
        self.by_address
            .get(token)
            .and_then(|index| self.entries[*index].decimals)
    }

    pub fn entries(&self) -> &[TokenListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const TOKEN_LIST: &str = r#"{
        "tokens": [
            {"address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "symbol": "USDC", "decimals": 6},
            {"address": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "symbol": "WETH"}
        ]
    }"#;

    #[test]
    fn parses_token_list_document() {
        let list: TokenList = serde_json::from_str(TOKEN_LIST).unwrap();
        let universe = TokenUniverse::new(list.tokens);

        let usdc = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let weth = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let dai = address!("0x6B175474E89094C44Da98b954EedeAC495271d0F");

        assert_eq!(universe.len(), 2);
        assert!(universe.contains(&usdc));
        assert_eq!(universe.symbol(&usdc), "USDC");
        assert_eq!(universe.decimals(&usdc), Some(6));
        assert_eq!(universe.decimals(&weth), None);
        assert!(!universe.contains(&dai));
        assert_eq!(universe.symbol(&dai), UNKNOWN_SYMBOL);
    }
}
