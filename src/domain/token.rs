//! Token and account records returned by chain queries

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::domain::BlockchainRid;

/// FT4 account identifier (hex-encoded bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let payload = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        hex::decode(payload)?;
        Ok(Self(payload.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for AccountId {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token id; chains encode big integers either as JSON numbers or strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u128);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(self.0) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.serialize_str(&self.0.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => s.trim().parse::<u128>().map(TokenId).map_err(de::Error::custom),
            Value::Number(n) => n
                .as_u64()
                .map(|v| TokenId(u128::from(v)))
                .ok_or_else(|| de::Error::custom("token id must be a non-negative integer")),
            _ => Err(de::Error::custom("expected string or number")),
        }
    }
}

/// Project a token collection belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub blockchain_rid: BlockchainRid,
}

/// A token, looked up by its unique id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub project: Project,
    pub collection: String,
    #[serde(alias = "id")]
    pub token_id: TokenId,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// One token held by an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Holder; present when listing the owners of a token
    #[serde(default)]
    pub account_id: Option<AccountId>,
    pub project: Project,
    pub collection: String,
    pub token_id: TokenId,
    pub amount: u64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Sent,
    Received,
    Mint,
    Burn,
    #[serde(other)]
    Other,
}

/// One entry of an account's (or chain's) transfer history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferHistory {
    #[serde(default)]
    pub account_id: Option<AccountId>,
    pub project: Project,
    pub collection: String,
    pub token_id: TokenId,
    pub amount: u64,
    #[serde(rename = "type")]
    pub kind: TransferKind,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Counterpart chain for cross-chain transfers
    #[serde(default)]
    pub blockchain_rid: Option<BlockchainRid>,
}

/// Token metadata; the property bag is kept opaque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    #[serde(default)]
    pub properties: Value,
}

/// Token balance joined with its (possibly missing) metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithMetadata {
    pub balance: TokenBalance,
    pub metadata: Option<TokenMetadata>,
}
