//! Typed queries over a chain client

use std::marker::PhantomData;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{
    AccountId, Project, Token, TokenBalance, TokenId, TokenMetadata, TransferHistory,
};
use crate::infrastructure::postchain::client::ChainClient;
use crate::pagination::{Page, PageCursor};

pub const ACCOUNTS_BY_SIGNER: &str = "ft4.get_accounts_by_signer";
pub const TOKEN_BALANCES: &str = "yours.get_token_balances";
pub const TOKEN_BY_UID: &str = "yours.get_token_by_uid";
pub const TRANSFER_HISTORY: &str = "yours.get_transfer_history";
pub const METADATA: &str = "yours.metadata";
pub const SUPPORTED_MODULES: &str = "yours.get_supported_modules";

/// Wire format of an FT4 paged query result
#[derive(Debug, Deserialize)]
struct PagedResult {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountRow {
    id: AccountId,
}

/// Query helpers bound to one chain client
#[derive(Clone)]
pub struct QueryClient {
    client: Arc<dyn ChainClient>,
}

impl QueryClient {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// FT4 account controlled by an EVM signer, if registered
    pub async fn account_by_signer(&self, signer: &Address) -> Result<Option<AccountId>> {
        let args = json!({
            "id": hex::encode(signer.as_slice()),
            "page_size": 1,
            "page_cursor": Value::Null,
        });
        let value = self.client.query(ACCOUNTS_BY_SIGNER, args).await?;
        let result: PagedResult =
            serde_json::from_value(value).context("decode accounts by signer")?;
        let Some(first) = result.data.into_iter().next() else {
            return Ok(None);
        };
        let row: AccountRow = serde_json::from_value(first).context("decode account row")?;
        Ok(Some(row.id))
    }

    pub async fn token_balances(&self, account: &AccountId, page_size: usize) -> Result<Page<TokenBalance>> {
        self.paged(TOKEN_BALANCES, json!({ "account_id": account.as_str() }), page_size)
            .await
    }

    /// Accounts holding `token`, as balances carrying the holder's account id
    pub async fn token_owners(&self, token: &Token, page_size: usize) -> Result<Page<TokenBalance>> {
        let args = json!({
            "project_name": token.project.name,
            "project_blockchain_rid": token.project.blockchain_rid.as_str(),
            "collection": token.collection,
            "token_id": token.token_id,
        });
        self.paged(TOKEN_BALANCES, args, page_size).await
    }

    /// Token with the given unique id, if the chain knows it
    pub async fn token_by_uid(&self, uid: &[u8]) -> Result<Option<Token>> {
        let value = self
            .client
            .query(TOKEN_BY_UID, json!({ "uid": hex::encode(uid) }))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).context("decode token").map(Some)
    }

    /// Transfer history of one account, or of the whole chain when `None`
    pub async fn transfer_history(
        &self,
        account: Option<&AccountId>,
        page_size: usize,
    ) -> Result<Page<TransferHistory>> {
        let account = account.map(|id| id.as_str().to_string());
        self.paged(TRANSFER_HISTORY, json!({ "account_id": account }), page_size)
            .await
    }

    pub async fn metadata(
        &self,
        project: &Project,
        collection: &str,
        token_id: TokenId,
    ) -> Result<Option<TokenMetadata>> {
        let args = json!({
            "project_name": project.name,
            "project_blockchain_rid": project.blockchain_rid.as_str(),
            "collection": collection,
            "token_id": token_id,
        });
        let value = self.client.query(METADATA, args).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).context("decode token metadata").map(Some)
    }

    pub async fn supported_modules(&self) -> Result<Vec<String>> {
        let value = self.client.query(SUPPORTED_MODULES, Value::Null).await?;
        serde_json::from_value(value).context("decode supported modules")
    }

    async fn paged<T>(&self, name: &str, args: Value, page_size: usize) -> Result<Page<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        fetch_page(Arc::clone(&self.client), name.to_string(), args, page_size, None).await
    }
}

/// Continuation that re-issues a paged query with the returned cursor
struct QueryCursor<T> {
    client: Arc<dyn ChainClient>,
    name: String,
    args: Value,
    page_size: usize,
    cursor: String,
    _marker: PhantomData<fn() -> T>,
}

#[async_trait::async_trait]
impl<T> PageCursor<T> for QueryCursor<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn fetch_next(&self) -> Result<Option<Page<T>>> {
        let page = fetch_page(
            Arc::clone(&self.client),
            self.name.clone(),
            self.args.clone(),
            self.page_size,
            Some(self.cursor.clone()),
        )
        .await?;
        Ok(Some(page))
    }
}

async fn fetch_page<T>(
    client: Arc<dyn ChainClient>,
    name: String,
    args: Value,
    page_size: usize,
    cursor: Option<String>,
) -> Result<Page<T>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let mut request = args.clone();
    if let Value::Object(map) = &mut request {
        map.insert("page_size".to_string(), json!(page_size));
        map.insert("page_cursor".to_string(), json!(cursor));
    }

    let value = client
        .query(&name, request)
        .await
        .with_context(|| format!("query {}", name))?;
    let result: PagedResult =
        serde_json::from_value(value).with_context(|| format!("decode {} page", name))?;
    let data = result
        .data
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<T>, _>>()
        .with_context(|| format!("decode {} items", name))?;

    let next = result.next_cursor.map(|cursor| {
        Arc::new(QueryCursor {
            client,
            name,
            args,
            page_size,
            cursor,
            _marker: PhantomData,
        }) as Arc<dyn PageCursor<T>>
    });
    Ok(Page::new(data, next))
}
