use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use chain_explorer::config::{self, Config};
use chain_explorer::core::{parse_command, Command};
use chain_explorer::domain::{
    AccountId, BlockchainRid, ChainRegistry, QueryIdentity, Token, TokenBalance,
    TokenWithMetadata, TransferHistory,
};
use chain_explorer::infrastructure::postchain::{ClientFactory, HttpClientFactory, QueryClient};
use chain_explorer::infrastructure::runtime::{
    ChainSessionCoordinator, CoordinatorSettings, SwitchOptions, SwitchOutcome,
};
use chain_explorer::pagination::{Direction, PaginatedData};
use chain_explorer::session::{AccountLookupAuthenticator, Navigator, RouteHistory, WalletConnection};
use chain_explorer::store::MetadataCache;

#[derive(Debug, Parser)]
#[command(
    name = "chain-explorer",
    version,
    about = "Browse tokens and transfer history across chains"
)]
struct Args {
    /// Blockchain RID to select at startup
    #[arg(long)]
    chain: Option<String>,

    /// Initial route, e.g. /<rid>/tokens. Takes precedence over --chain
    #[arg(long)]
    route: Option<String>,

    /// Items per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Config file (default: ~/.config/chain-explorer/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = load_config(&args);
    let route = args
        .route
        .clone()
        .or_else(|| args.chain.as_ref().map(|rid| format!("/{}", rid.trim())));

    let factory: Arc<dyn ClientFactory> = Arc::new(HttpClientFactory::from_config(&config)?);
    let navigator = Arc::new(RouteHistory::new());
    let registry = config.registry();
    let settings = CoordinatorSettings::from_failover(registry.clone(), &config.failover);
    let coordinator = ChainSessionCoordinator::spawn(
        settings,
        factory,
        Arc::new(AccountLookupAuthenticator),
        Arc::clone(&navigator) as Arc<dyn Navigator>,
        route.as_deref(),
    )?;
    if let Some(route) = &route {
        navigator.navigate(route);
    }

    let mut explorer = Explorer {
        coordinator,
        navigator,
        registry,
        page_size: config.page_size(),
        metadata: Arc::new(MetadataCache::default()),
        listing: None,
    };

    let selected = explorer.coordinator.selected_chain();
    println!(
        "chain-explorer: {} ({}), type `help` for commands",
        selected.name, selected.blockchain_rid
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match explorer.run(parse_command(&line)).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("error: {:#}", err),
        }
    }

    explorer.coordinator.shutdown();
    Ok(())
}

fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = config::load_from(path);
            config.apply_env();
            config
        }
        None => config::load(),
    };
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    config
}

enum Listing {
    Tokens(PaginatedData<TokenBalance, TokenWithMetadata>),
    History(PaginatedData<TransferHistory, TransferHistory>),
    Owners(PaginatedData<TokenBalance, TokenBalance>),
}

struct Explorer {
    coordinator: ChainSessionCoordinator,
    navigator: Arc<RouteHistory>,
    registry: ChainRegistry,
    page_size: usize,
    metadata: Arc<MetadataCache>,
    listing: Option<Listing>,
}

impl Explorer {
    /// Run one command; `false` ends the session
    async fn run(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Chains => self.print_chains(),
            Command::Chain(rid) => {
                let rid: BlockchainRid = rid.parse()?;
                let outcome = self.coordinator.switch_chain(rid, SwitchOptions::default()).await?;
                self.after_switch(outcome).await;
            }
            Command::Open(path) => {
                self.navigator.navigate(&path);
                let outcome = self.coordinator.sync_from_route(&path).await?;
                self.after_switch(outcome).await;
            }
            Command::Tokens(account) => {
                let account: AccountId = account.parse().context("invalid account id")?;
                self.open_tokens(account).await?;
            }
            Command::History(account) => {
                let account = account
                    .map(|account| account.parse::<AccountId>())
                    .transpose()
                    .context("invalid account id")?;
                self.open_history(account).await?;
            }
            Command::Token(uid) => {
                let queries = QueryClient::new(self.coordinator.wait_for_client().await?);
                match lookup_token(&queries, &uid).await? {
                    Some(token) => {
                        println!("  project:    {} ({})", token.project.name, token.project.blockchain_rid.short());
                        println!("  collection: {}", token.collection);
                        println!("  token id:   {}", token.token_id);
                        if let Some(kind) = &token.kind {
                            println!("  type:       {}", kind);
                        }
                    }
                    None => println!("no token with uid {}", uid),
                }
            }
            Command::Owners(uid) => self.open_owners(&uid).await?,
            Command::Next => self.turn_page(Direction::Next).await?,
            Command::Prev => self.turn_page(Direction::Previous).await?,
            Command::Modules => {
                let client = self.coordinator.wait_for_client().await?;
                let modules = QueryClient::new(client).supported_modules().await?;
                if modules.is_empty() {
                    println!("no modules reported");
                }
                for module in modules {
                    println!("  {}", module);
                }
            }
            Command::Connect(address) => {
                let address: Address = address.parse().context("invalid wallet address")?;
                let status = self
                    .coordinator
                    .connect_session(WalletConnection::new(address, "cli"))
                    .await?;
                println!("wallet {}", status.label());
            }
            Command::Disconnect => {
                self.coordinator.disconnect_session().await?;
                println!("wallet disconnected");
            }
            Command::Status => self.print_status(),
            Command::Help => print_help(),
            Command::Quit => return Ok(false),
            Command::Unknown(input) => println!("unknown command: {} (try `help`)", input),
        }
        Ok(true)
    }

    async fn after_switch(&mut self, outcome: SwitchOutcome) {
        match outcome {
            SwitchOutcome::Switched => {
                self.listing = None;
                let chain = self.coordinator.selected_chain();
                println!("switched to {} ({})", chain.name, chain.blockchain_rid);
                if let Err(err) = self.coordinator.wait_for_client().await {
                    println!("chain not ready: {}", err);
                }
            }
            SwitchOutcome::Unchanged => println!("already selected"),
            SwitchOutcome::Deferred => println!("switch queued behind the running transfer or teardown"),
        }
    }

    async fn open_tokens(&mut self, account: AccountId) -> Result<()> {
        let queries = QueryClient::new(self.coordinator.wait_for_client().await?);
        let identity = QueryIdentity::token_balances(queries.client().blockchain_rid(), Some(&account));
        let loader = queries.clone();
        let metadata = Arc::clone(&self.metadata);

        let view = PaginatedData::new(
            identity,
            self.page_size,
            move |page_size| {
                let queries = loader.clone();
                let account = account.clone();
                async move { queries.token_balances(&account, page_size).await }
            },
            move |balance| {
                let queries = queries.clone();
                let metadata = Arc::clone(&metadata);
                async move { metadata.resolve(&queries, balance).await }
            },
        );
        view.load_initial_page().await?;
        self.listing = Some(Listing::Tokens(view));
        self.print_listing().await;
        Ok(())
    }

    async fn open_history(&mut self, account: Option<AccountId>) -> Result<()> {
        let queries = QueryClient::new(self.coordinator.wait_for_client().await?);
        let rid = queries.client().blockchain_rid().clone();
        let identity = match &account {
            Some(account) => QueryIdentity::transfer_history(&rid, Some(account)),
            None => QueryIdentity::all_transfer_history(&rid),
        };

        let view = PaginatedData::new(
            identity,
            self.page_size,
            move |page_size| {
                let queries = queries.clone();
                let account = account.clone();
                async move { queries.transfer_history(account.as_ref(), page_size).await }
            },
            |entry| async move { entry },
        );
        view.load_initial_page().await?;
        self.listing = Some(Listing::History(view));
        self.print_listing().await;
        Ok(())
    }

    async fn open_owners(&mut self, uid: &str) -> Result<()> {
        let queries = QueryClient::new(self.coordinator.wait_for_client().await?);
        let Some(token) = lookup_token(&queries, uid).await? else {
            println!("no token with uid {}", uid);
            return Ok(());
        };
        let identity = QueryIdentity::ownerships(queries.client().blockchain_rid(), Some(&token));

        let view = PaginatedData::new(
            identity,
            self.page_size,
            move |page_size| {
                let queries = queries.clone();
                let token = token.clone();
                async move { queries.token_owners(&token, page_size).await }
            },
            |owner| async move { owner },
        );
        view.load_initial_page().await?;
        self.listing = Some(Listing::Owners(view));
        self.print_listing().await;
        Ok(())
    }

    async fn turn_page(&mut self, direction: Direction) -> Result<()> {
        match &self.listing {
            Some(Listing::Tokens(view)) => view.load_page(direction).await?,
            Some(Listing::History(view)) => view.load_page(direction).await?,
            Some(Listing::Owners(view)) => view.load_page(direction).await?,
            None => {
                println!("nothing to page through; run `tokens`, `history` or `owners` first");
                return Ok(());
            }
        }
        self.print_listing().await;
        Ok(())
    }

    async fn print_listing(&self) {
        let (page, has_more, error) = match &self.listing {
            Some(Listing::Tokens(view)) => {
                let items = view.items().await;
                if items.is_empty() {
                    println!("  (no tokens)");
                }
                for item in &items {
                    let name = item
                        .metadata
                        .as_ref()
                        .map(|m| m.name.as_str())
                        .unwrap_or("-");
                    println!(
                        "  {:<24} #{:<8} x{:<6} {}",
                        item.balance.collection, item.balance.token_id, item.balance.amount, name
                    );
                }
                (view.page().await, view.has_more().await, view.error().await)
            }
            Some(Listing::History(view)) => {
                let items = view.items().await;
                if items.is_empty() {
                    println!("  (no transfers)");
                }
                for entry in &items {
                    println!(
                        "  {:<17} {:<9} {:<24} #{:<8} x{}",
                        format_timestamp(entry.timestamp),
                        format!("{:?}", entry.kind).to_lowercase(),
                        entry.collection,
                        entry.token_id,
                        entry.amount
                    );
                }
                (view.page().await, view.has_more().await, view.error().await)
            }
            Some(Listing::Owners(view)) => {
                let items = view.items().await;
                if items.is_empty() {
                    println!("  (no owners)");
                }
                for owner in &items {
                    let account = owner
                        .account_id
                        .as_ref()
                        .map(|id| id.as_str())
                        .unwrap_or("-");
                    println!("  {:<66} x{}", account, owner.amount);
                }
                (view.page().await, view.has_more().await, view.error().await)
            }
            None => return,
        };

        let more = if has_more { ", `next` for more" } else { "" };
        println!("page {}{}", page, more);
        if let Some(error) = error {
            println!("last fetch failed: {}", error);
        }
    }

    fn print_chains(&self) {
        let selected = self.coordinator.selected_chain();
        for chain in self.registry.chains() {
            let marker = if chain.blockchain_rid == selected.blockchain_rid { "*" } else { " " };
            println!("{} {:<20} {}", marker, chain.name, chain.blockchain_rid);
        }
        if selected.is_custom() {
            println!("* {:<20} {}", selected.name, selected.blockchain_rid);
        }
    }

    fn print_status(&self) {
        let snapshot = self.coordinator.snapshot();
        println!(
            "chain:   {} ({})",
            snapshot.selected_chain.name,
            snapshot.selected_chain.blockchain_rid.short()
        );
        println!("state:   {}", snapshot.state.label());
        if let Some(client) = &snapshot.chain_client {
            println!("node:    {}", client.endpoint_name());
        }
        println!("wallet:  {}", snapshot.auth_status.label());
        if let Some(session) = &snapshot.session {
            println!("account: {}", session.account_id());
        }
        if let Some(route) = self.navigator.current() {
            println!("route:   {}", route);
        }
        if let Some(error) = &snapshot.error {
            println!("error:   {}", error);
        }
    }
}

fn format_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn lookup_token(queries: &QueryClient, uid: &str) -> Result<Option<Token>> {
    let trimmed = uid.trim();
    let payload = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let uid = hex::decode(payload).context("invalid token uid")?;
    queries.token_by_uid(&uid).await
}

fn print_help() {
    println!("  chains              list known chains");
    println!("  chain <rid>         switch chain");
    println!("  open <path>         follow a route, e.g. /<rid>/tokens");
    println!("  tokens <account>    token balances of an account");
    println!("  history [account]   transfer history (whole chain without account)");
    println!("  token <uid>         look up a token by its unique id");
    println!("  owners <uid>        accounts holding a token");
    println!("  next | prev         page through the current listing");
    println!("  modules             modules supported by the chain");
    println!("  connect <address>   log in with a wallet address");
    println!("  disconnect          log out");
    println!("  status              coordinator state");
    println!("  quit");
}
