use alloy::primitives::Address;
use tally_config::TokenUniverse;

/// Fee tiers the factory is probed with, in basis points of a hundredth.
pub const FEE_TIERS: [u32; 3] = [500, 3_000, 10_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCandidate {
    pub token_a: Address,
    pub token_b: Address,
    pub fee: u32,
}

/// All unordered token pairs of the universe (n·(n−1)/2) crossed with the
/// fee tiers, in token-list order.
pub fn token_pairs_with_fees(tokens: &TokenUniverse, fee_tiers: &[u32]) -> Vec<PoolCandidate> {
    let entries = tokens.entries();
    let mut candidates = Vec::new();

    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            for fee in fee_tiers {
                candidates.push(PoolCandidate {
                    token_a: entries[i].address,
                    token_b: entries[j].address,
                    fee: *fee,
                });
            }
        }
    }
    candidates
}

/// Factory order: token0 is the lexicographically smaller address. The
/// factory deduplicates pools by this order, so queries must use it too.
pub fn canonical_pair(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

/// Order-independent candidate identifier, used in failure reports.
pub fn pair_key(token_a: Address, token_b: Address, fee: u32) -> String {
    let (token0, token1) = canonical_pair(token_a, token_b);
    format!("{token0}-{token1}-{fee}")
}
