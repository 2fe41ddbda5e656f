//! Chain identities and the registry of known networks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

/// Display name used for chains that are not in the registry
pub const CUSTOM_CHAIN_NAME: &str = "Custom Chain";

/// Hex-encoded blockchain root identifier
///
/// Stored lowercase so that equality and hashing are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockchainRid(String);

impl BlockchainRid {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes of the identifier
    pub fn to_bytes(&self) -> Vec<u8> {
        // validated on construction
        hex::decode(&self.0).unwrap_or_default()
    }

    /// Shortened form for status lines, e.g. `a1b2c3..d4e5`
    pub fn short(&self) -> String {
        if self.0.len() <= 12 {
            return self.0.clone();
        }
        format!("{}..{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for BlockchainRid {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let payload = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if payload.is_empty() || hex::decode(payload).is_err() {
            return Err(ExplorerError::InvalidBlockchainRid(s.to_string()));
        }
        Ok(Self(payload.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for BlockchainRid {
    type Error = ExplorerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockchainRid> for String {
    fn from(rid: BlockchainRid) -> Self {
        rid.0
    }
}

impl fmt::Display for BlockchainRid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A network the explorer can target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIdentity {
    pub name: String,
    pub blockchain_rid: BlockchainRid,
    #[serde(default)]
    pub dapp_url: Option<String>,
}

impl ChainIdentity {
    /// Placeholder identity for a chain missing from the registry
    pub fn custom(blockchain_rid: BlockchainRid) -> Self {
        Self {
            name: CUSTOM_CHAIN_NAME.to_string(),
            blockchain_rid,
            dapp_url: None,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_CHAIN_NAME && self.dapp_url.is_none()
    }
}

/// Ordered registry of known chains
///
/// The first entry is the default selection.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<ChainIdentity>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainIdentity>) -> Self {
        let mut registry = Self::default();
        for chain in chains {
            registry.insert(chain);
        }
        registry
    }

    /// Insert a chain
    ///
    /// Note: First entry for a given RID wins (no overwrite)
    pub fn insert(&mut self, chain: ChainIdentity) {
        if self.lookup(&chain.blockchain_rid).is_none() {
            self.chains.push(chain);
        }
    }

    pub fn lookup(&self, rid: &BlockchainRid) -> Option<&ChainIdentity> {
        self.chains.iter().find(|chain| &chain.blockchain_rid == rid)
    }

    /// Resolve an RID to its registry entry, or a "Custom Chain" placeholder
    pub fn resolve(&self, rid: &BlockchainRid) -> ChainIdentity {
        self.lookup(rid)
            .cloned()
            .unwrap_or_else(|| ChainIdentity::custom(rid.clone()))
    }

    pub fn default_chain(&self) -> Option<&ChainIdentity> {
        self.chains.first()
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainIdentity> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
