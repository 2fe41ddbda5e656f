//! Chain client construction
//!
//! Node URLs come either from a static pool or from the directory chain,
//! which knows which cluster serves a given blockchain.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::config::Config;
use crate::domain::BlockchainRid;
use crate::infrastructure::postchain::client::{post_query, ChainClient, HttpChainClient};
use crate::infrastructure::postchain::failover::{with_failover, FailoverPolicy};

/// Directory query returning the API URLs of a blockchain's nodes
pub const BLOCKCHAIN_API_URLS_QUERY: &str = "cm_get_blockchain_api_urls";

/// Creates clients bound to a blockchain RID
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    async fn create_client(&self, rid: &BlockchainRid) -> Result<Arc<dyn ChainClient>>;
}

/// Where node URLs come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeDiscovery {
    /// Ask the directory chain through these nodes
    Directory(Vec<String>),
    /// Use these nodes directly
    Static(Vec<String>),
}

impl NodeDiscovery {
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.directory_node_url_pool.is_empty() {
            Some(Self::Directory(config.directory_node_url_pool.clone()))
        } else if !config.node_url_pool.is_empty() {
            Some(Self::Static(config.node_url_pool.clone()))
        } else {
            None
        }
    }
}

/// Factory producing [`HttpChainClient`]s
pub struct HttpClientFactory {
    http: reqwest::Client,
    discovery: NodeDiscovery,
    policy: FailoverPolicy,
}

impl HttpClientFactory {
    pub fn new(discovery: NodeDiscovery, policy: FailoverPolicy, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            discovery,
            policy,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let discovery = NodeDiscovery::from_config(config)
            .context("No directory or node URL pool configured")?;
        Self::new(
            discovery,
            config.failover.policy(),
            config.failover.request_timeout(),
        )
    }

    async fn resolve_node_urls(&self, pool: &[String], rid: &BlockchainRid) -> Result<Vec<String>> {
        let urls = with_failover(pool, &self.policy, |node| {
            let http = self.http.clone();
            let rid = rid.clone();
            async move {
                let directory_rid = directory_rid(&http, &node).await?;
                let args = json!({
                    "type": BLOCKCHAIN_API_URLS_QUERY,
                    "blockchain_rid": rid.as_str(),
                });
                let value = post_query(&http, &node, &directory_rid, &args).await?;
                parse_url_list(value)
            }
        })
        .await?;

        if urls.is_empty() {
            anyhow::bail!("directory knows no nodes for chain {}", rid);
        }
        Ok(urls)
    }
}

#[async_trait::async_trait]
impl ClientFactory for HttpClientFactory {
    async fn create_client(&self, rid: &BlockchainRid) -> Result<Arc<dyn ChainClient>> {
        let node_urls = match &self.discovery {
            NodeDiscovery::Static(urls) => urls.clone(),
            NodeDiscovery::Directory(pool) => self.resolve_node_urls(pool, rid).await?,
        };
        log::info!("chain client for {} using {} node(s)", rid.short(), node_urls.len());
        Ok(Arc::new(HttpChainClient::new(
            self.http.clone(),
            rid.clone(),
            node_urls,
            self.policy,
        )))
    }
}

/// RID of the directory chain (chain iid 0) as reported by a node
async fn directory_rid(http: &reqwest::Client, node: &str) -> Result<String> {
    let url = format!("{}/brid/iid_0", node.trim_end_matches('/'));
    let response = http
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{} returned {}", url, status);
    }
    let text = response.text().await.context("read directory RID")?;
    let rid: BlockchainRid = text.trim().parse()?;
    Ok(rid.to_string())
}

fn parse_url_list(value: Value) -> Result<Vec<String>> {
    let urls: Vec<String> =
        serde_json::from_value(value).context("directory returned a non-list of URLs")?;
    Ok(urls
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect())
}
