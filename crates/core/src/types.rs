//! Common types

use rollup_smt::{CircomPoseidon, MerkleTree, SparseMerkleTree};
use serde::{Deserialize, Serialize};

/// Hash oracle used for every leaf and node
pub type Hasher = CircomPoseidon;

/// Account accumulator
pub type AccountTree = SparseMerkleTree<Hasher>;

/// Dense batch tree
pub type BatchTree = MerkleTree<Hasher>;

/// Leaf position in the account tree
pub type AccountIndex = u64;

/// Token amount
pub type Amount = u128;

/// Serde for [`Amount`] as a decimal string, so balances above `u64::MAX`
/// survive JSON. Plain integers are still accepted on input.
pub mod decimal_amount {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    use super::Amount;

    /// Write `amount` as a decimal string
    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    /// Read a decimal string or an unsigned integer
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Amount::from(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
                Ok(v)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Per-account transaction counter
pub type Nonce = u64;

/// Token identifier; 0 is reserved for the operator and means "unset"
pub type TokenType = u32;

/// What to do when a transfer targets an index with no registered account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverPolicy {
    /// Reject with `UnknownAccount`
    #[default]
    RequireRegistered,
    /// Create the account from the transaction's receiver key
    RegisterOnTransfer,
}

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Depth of the account tree
    pub tree_depth: usize,
    /// Depth of each transaction batch tree (`2^depth` transactions)
    pub tx_batch_depth: usize,
    /// Receiver registration policy
    pub receiver_policy: ReceiverPolicy,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            tree_depth: 16,
            tx_batch_depth: 2,
            receiver_policy: ReceiverPolicy::RequireRegistered,
        }
    }
}
