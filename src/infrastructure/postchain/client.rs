//! Chain client abstraction and the REST implementation
//!
//! Queries go to `POST {node}/query/{blockchainRid}` with a JSON body whose
//! `type` field names the query and whose other fields are the arguments.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::domain::BlockchainRid;
use crate::infrastructure::postchain::failover::{with_failover, FailoverPolicy};

/// Client bound to exactly one blockchain
///
/// A client must never serve requests for an RID other than the one it
/// was created for.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// RID this client is bound to
    fn blockchain_rid(&self) -> &BlockchainRid;

    /// Run a read-only query
    async fn query(&self, name: &str, args: Value) -> Result<Value>;

    /// Endpoint display name
    fn endpoint_name(&self) -> String;
}

/// REST client over a pool of node URLs
pub struct HttpChainClient {
    http: reqwest::Client,
    blockchain_rid: BlockchainRid,
    node_urls: Vec<String>,
    policy: FailoverPolicy,
}

impl HttpChainClient {
    pub fn new(
        http: reqwest::Client,
        blockchain_rid: BlockchainRid,
        node_urls: Vec<String>,
        policy: FailoverPolicy,
    ) -> Self {
        let node_urls = node_urls
            .into_iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .collect();
        Self {
            http,
            blockchain_rid,
            node_urls,
            policy,
        }
    }

    pub fn node_urls(&self) -> &[String] {
        &self.node_urls
    }
}

#[async_trait::async_trait]
impl ChainClient for HttpChainClient {
    fn blockchain_rid(&self) -> &BlockchainRid {
        &self.blockchain_rid
    }

    async fn query(&self, name: &str, args: Value) -> Result<Value> {
        let body = query_body(name, args)?;
        let rid = self.blockchain_rid.to_string();
        let value = with_failover(&self.node_urls, &self.policy, |node| {
            let http = self.http.clone();
            let body = body.clone();
            let rid = rid.clone();
            async move { post_query(&http, &node, &rid, &body).await }
        })
        .await?;
        Ok(value)
    }

    fn endpoint_name(&self) -> String {
        self.node_urls.first().cloned().unwrap_or_default()
    }
}

/// POST a query to one node
pub(crate) async fn post_query(
    http: &reqwest::Client,
    node: &str,
    rid: &str,
    body: &Value,
) -> Result<Value> {
    let url = format!("{}/query/{}", node.trim_end_matches('/'), rid);
    let response = http
        .post(&url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("{} returned {}: {}", url, status, text.trim());
    }

    response
        .json::<Value>()
        .await
        .with_context(|| format!("decode response from {}", url))
}

/// Build the query envelope: arguments plus `type`
pub(crate) fn query_body(name: &str, args: Value) -> Result<Value> {
    let mut object = match args {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => anyhow::bail!("query arguments must be an object, got {}", other),
    };
    object.insert("type".to_string(), Value::String(name.to_string()));
    Ok(Value::Object(object))
}
