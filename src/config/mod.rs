use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{ChainIdentity, ChainRegistry};
use crate::infrastructure::postchain::FailoverPolicy;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    pub attempts_per_endpoint: usize,
    pub retry_delay_ms: u64,
    pub client_retries: usize,
    pub client_wait_timeout_ms: u64,
    pub logout_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: 20,
            retry_delay_ms: 250,
            client_retries: 2,
            client_wait_timeout_ms: 5_000,
            logout_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl FailoverConfig {
    pub fn policy(&self) -> FailoverPolicy {
        FailoverPolicy {
            attempts_per_endpoint: self.attempts_per_endpoint.max(1),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn client_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.client_wait_timeout_ms)
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_millis(self.logout_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub directory_node_url_pool: Vec<String>,
    pub node_url_pool: Vec<String>,
    pub wallet_connect_project_id: Option<String>,
    pub dashboard_url: Option<String>,
    pub page_size: usize,
    pub failover: FailoverConfig,
    pub chains: Vec<ChainIdentity>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory_node_url_pool: Vec::new(),
            node_url_pool: Vec::new(),
            wallet_connect_project_id: None,
            dashboard_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            failover: FailoverConfig::default(),
            chains: Vec::new(),
        }
    }
}

impl Config {
    pub fn registry(&self) -> ChainRegistry {
        ChainRegistry::new(self.chains.clone())
    }

    pub fn page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Apply `EXPLORER_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(pool) = var("EXPLORER_DIRECTORY_NODE_URL_POOL") {
            self.directory_node_url_pool = split_pool(&pool);
        }
        if let Some(pool) = var("EXPLORER_NODE_URL_POOL") {
            self.node_url_pool = split_pool(&pool);
        }
        if let Some(id) = var("EXPLORER_WALLETCONNECT_PROJECT_ID").filter(|s| !s.trim().is_empty()) {
            self.wallet_connect_project_id = Some(id);
        }
        if let Some(url) = var("EXPLORER_DASHBOARD_URL").filter(|s| !s.trim().is_empty()) {
            self.dashboard_url = Some(url);
        }
    }
}

pub fn load() -> Config {
    let mut config = config_path()
        .map(|path| load_from(&path))
        .unwrap_or_default();
    config.apply_env();
    config
}

pub fn load_from(path: &Path) -> Config {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("ignoring invalid config {}: {}", path.display(), err);
            Config::default()
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("EXPLORER_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("chain-explorer").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("chain-explorer").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "chain-explorer", "chain-explorer")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn split_pool(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}
