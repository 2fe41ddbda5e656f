//! Query identities used to key paged views

use std::fmt;

use crate::domain::{AccountId, BlockchainRid, Token};

/// Ordered key identifying one remote cursor sequence
///
/// A part set to `None` marks a dependency that is not available yet
/// (e.g. an account that has not been resolved); such an identity is not
/// ready and must not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryIdentity {
    parts: Vec<Option<String>>,
}

impl QueryIdentity {
    pub fn new(scope: &str) -> Self {
        Self {
            parts: vec![Some(scope.to_string())],
        }
    }

    pub fn with(mut self, part: impl ToString) -> Self {
        self.parts.push(Some(part.to_string()));
        self
    }

    pub fn with_opt<P: ToString>(mut self, part: Option<P>) -> Self {
        self.parts.push(part.map(|p| p.to_string()));
        self
    }

    /// True when every dependent part is present
    pub fn is_ready(&self) -> bool {
        self.parts.iter().all(Option::is_some)
    }

    pub fn parts(&self) -> &[Option<String>] {
        &self.parts
    }

    /// `["tokens", "balances", rid, account]`
    pub fn token_balances(rid: &BlockchainRid, account: Option<&AccountId>) -> Self {
        Self::new("tokens").with("balances").with(rid).with_opt(account)
    }

    /// `["transfers", "history", rid, account]`
    pub fn transfer_history(rid: &BlockchainRid, account: Option<&AccountId>) -> Self {
        Self::new("transfers").with("history").with(rid).with_opt(account)
    }

    /// `["transfers", "all-history", rid]`
    pub fn all_transfer_history(rid: &BlockchainRid) -> Self {
        Self::new("transfers").with("all-history").with(rid)
    }

    /// `["nft", "list", rid, uid]`
    pub fn token(rid: &BlockchainRid, uid: &str) -> Self {
        Self::new("nft").with("list").with(rid).with(uid.to_ascii_lowercase())
    }

    /// `["ownerships", "list", rid, project rid, project name, collection, token id]`
    ///
    /// Not ready until the token is known.
    pub fn ownerships(rid: &BlockchainRid, token: Option<&Token>) -> Self {
        let base = Self::new("ownerships").with("list").with(rid);
        match token {
            Some(token) => base
                .with(&token.project.blockchain_rid)
                .with(&token.project.name)
                .with(&token.collection)
                .with(token.token_id),
            None => base.with_opt(None::<String>),
        }
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .parts
            .iter()
            .map(|part| part.as_deref().unwrap_or("-"))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
