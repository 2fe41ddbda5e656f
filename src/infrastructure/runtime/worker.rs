//! Coordinator worker - owns the selected chain, its client and the session
//!
//! Commands are processed one at a time. Client construction, login and
//! logout run as spawned tasks whose results come back as events tagged
//! with the version (or login ticket) they were started under; anything
//! older than the current value is discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::domain::{BlockchainRid, ChainIdentity};
use crate::error::{ExplorerError, Result};
use crate::infrastructure::postchain::{ChainClient, ClientFactory};
use crate::infrastructure::runtime::bridge::{Command, CoordinatorSettings};
use crate::infrastructure::runtime::state::{
    CoordinatorSnapshot, SessionState, SwitchOptions, SwitchOutcome,
};
use crate::session::{
    chain_route, AuthStatus, Authenticator, LoginOutcome, Navigator, Session, WalletConnection,
};

pub(crate) struct Collaborators {
    pub factory: Arc<dyn ClientFactory>,
    pub authenticator: Arc<dyn Authenticator>,
    pub navigator: Arc<dyn Navigator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Ready,
    /// Tearing down the session of the previous chain
    Switching,
}

enum Event {
    ClientBuilt {
        version: u64,
        rid: BlockchainRid,
        result: anyhow::Result<Arc<dyn ChainClient>>,
    },
    LoginFinished {
        ticket: u64,
        rid: BlockchainRid,
        result: anyhow::Result<LoginOutcome>,
    },
    TeardownFinished {
        version: u64,
    },
}

type SessionReply = oneshot::Sender<Result<Arc<dyn Session>>>;

/// Run the coordinator until shutdown or until every handle is dropped
pub(crate) async fn run_coordinator(
    settings: CoordinatorSettings,
    collaborators: Collaborators,
    initial: ChainIdentity,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshot: watch::Sender<CoordinatorSnapshot>,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut worker = Worker::new(settings, collaborators, initial, event_tx, snapshot);

    log::info!(
        "coordinator starting on {} ({})",
        worker.selected.name,
        worker.selected.blockchain_rid.short()
    );
    worker.start_connect();
    worker.publish();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => break,
                Some(command) => worker.handle_command(command),
            },
            Some(event) = event_rx.recv() => worker.handle_event(event),
        }
        worker.publish();
    }

    worker.stop();
    log::info!("coordinator stopped");
}

struct Worker {
    settings: CoordinatorSettings,
    collaborators: Collaborators,
    selected: ChainIdentity,
    version: u64,
    phase: Phase,
    error: Option<String>,
    clients: HashMap<BlockchainRid, Arc<dyn ChainClient>>,
    connect_task: Option<JoinHandle<()>>,
    wallet: Option<WalletConnection>,
    session: Option<Arc<dyn Session>>,
    auth_status: AuthStatus,
    login_task: Option<JoinHandle<()>>,
    login_ticket: u64,
    session_waiters: Vec<SessionReply>,
    /// Log in again once the new client is ready
    reauthenticate: bool,
    transfer_locks: usize,
    /// Switch held back by a transfer lock or a session teardown
    deferred: Option<(BlockchainRid, SwitchOptions)>,
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Sender<CoordinatorSnapshot>,
}

impl Worker {
    fn new(
        settings: CoordinatorSettings,
        collaborators: Collaborators,
        selected: ChainIdentity,
        events: mpsc::UnboundedSender<Event>,
        snapshot: watch::Sender<CoordinatorSnapshot>,
    ) -> Self {
        Self {
            settings,
            collaborators,
            selected,
            version: 0,
            phase: Phase::Connecting,
            error: None,
            clients: HashMap::new(),
            connect_task: None,
            wallet: None,
            session: None,
            auth_status: AuthStatus::Disconnected,
            login_task: None,
            login_ticket: 0,
            session_waiters: Vec::new(),
            reauthenticate: false,
            transfer_locks: 0,
            deferred: None,
            events,
            snapshot,
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Switch {
                rid,
                options,
                reply,
            } => {
                let outcome = self.request_switch(rid, options);
                self.respond(reply, outcome);
            }
            Command::Reconnect { reply } => {
                if self.phase == Phase::Idle {
                    self.start_connect();
                }
                self.respond(reply, ());
            }
            Command::Connect { wallet, reply } => {
                self.connect_wallet(wallet);
                self.respond(reply, ());
            }
            Command::Disconnect { reply } => {
                self.disconnect_wallet();
                self.respond(reply, ());
            }
            Command::EnsureSession { reply } => self.ensure_session(reply),
            Command::BeginTransfer { reply } => {
                self.transfer_locks += 1;
                log::debug!("transfer lock acquired ({} held)", self.transfer_locks);
                self.respond(reply, ());
            }
            Command::EndTransfer => self.end_transfer(),
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ClientBuilt {
                version,
                rid,
                result,
            } => self.client_built(version, rid, result),
            Event::LoginFinished { ticket, rid, result } => self.login_finished(ticket, rid, result),
            Event::TeardownFinished { version } => {
                if version == self.version && self.phase == Phase::Switching {
                    self.teardown_finished();
                }
            }
        }
    }

    // ---- chain selection ----

    fn request_switch(&mut self, rid: BlockchainRid, options: SwitchOptions) -> SwitchOutcome {
        if self.transfer_locks > 0 {
            if rid == self.selected.blockchain_rid {
                self.deferred = None;
                return SwitchOutcome::Unchanged;
            }
            log::info!("transfer in progress, deferring switch to {}", rid.short());
            self.deferred = Some((rid, options));
            return SwitchOutcome::Deferred;
        }
        if rid == self.selected.blockchain_rid {
            if self.deferred.take().is_some() {
                log::debug!("queued switch dropped, {} selected again", rid.short());
            }
            return SwitchOutcome::Unchanged;
        }
        if self.phase == Phase::Switching {
            log::info!("session teardown in progress, queueing switch to {}", rid.short());
            self.deferred = Some((rid, options));
            return SwitchOutcome::Deferred;
        }
        self.apply_switch(rid, options, false);
        SwitchOutcome::Switched
    }

    fn apply_switch(&mut self, rid: BlockchainRid, options: SwitchOptions, reauthenticate: bool) {
        let previous = self.selected.blockchain_rid.clone();
        self.phase = Phase::Switching;
        self.abort_connect();
        self.abort_login();
        self.version += 1;
        self.clients.remove(&previous);
        self.selected = self.settings.registry.resolve(&rid);
        self.error = None;

        log::info!(
            "switching chain {} -> {} ({})",
            previous.short(),
            rid.short(),
            self.selected.name
        );
        if !options.skip_navigation {
            self.collaborators.navigator.navigate(&chain_route(&rid));
        }

        match self.session.take() {
            Some(session) if session.blockchain_rid() != &rid => {
                self.auth_status = AuthStatus::Disconnected;
                self.reauthenticate = reauthenticate && self.wallet.is_some();
                self.spawn_logout(session, Some(self.version));
            }
            session => {
                self.session = session;
                self.start_connect();
            }
        }
    }

    /// Old session is gone; apply a queued switch or connect the selection
    fn teardown_finished(&mut self) {
        if self.transfer_locks == 0 {
            if let Some((rid, options)) = self.deferred.take() {
                log::info!("teardown finished, applying queued switch to {}", rid.short());
                let reauthenticate = self.reauthenticate;
                self.apply_switch(rid, options, reauthenticate);
                return;
            }
        }
        self.start_connect();
    }

    fn end_transfer(&mut self) {
        self.transfer_locks = self.transfer_locks.saturating_sub(1);
        log::debug!("transfer lock released ({} held)", self.transfer_locks);
        if self.transfer_locks > 0 {
            return;
        }
        let Some((rid, options)) = self.deferred.take() else {
            return;
        };
        if rid == self.selected.blockchain_rid {
            return;
        }
        log::info!("transfer finished, applying deferred switch to {}", rid.short());
        self.apply_switch(rid, options, true);
    }

    // ---- client construction ----

    fn start_connect(&mut self) {
        self.abort_connect();
        let rid = self.selected.blockchain_rid.clone();

        if self.clients.contains_key(&rid) {
            self.phase = Phase::Ready;
            self.on_client_ready();
            return;
        }

        self.phase = Phase::Connecting;
        let factory = Arc::clone(&self.collaborators.factory);
        let events = self.events.clone();
        let version = self.version;
        let attempts = self.settings.client_retries + 1;
        let delay = self.settings.retry_delay;

        self.connect_task = Some(tokio::spawn(async move {
            let result = build_client(factory.as_ref(), &rid, attempts, delay).await;
            let _ = events.send(Event::ClientBuilt {
                version,
                rid,
                result,
            });
        }));
    }

    fn client_built(
        &mut self,
        version: u64,
        rid: BlockchainRid,
        result: anyhow::Result<Arc<dyn ChainClient>>,
    ) {
        if version != self.version || rid != self.selected.blockchain_rid {
            log::debug!(
                "discarding client for {} (version {}, current {})",
                rid.short(),
                version,
                self.version
            );
            return;
        }
        self.connect_task = None;

        let result = result.and_then(|client| {
            if client.blockchain_rid() == &rid {
                Ok(client)
            } else {
                Err(anyhow::anyhow!(
                    "factory returned a client bound to {}",
                    client.blockchain_rid()
                ))
            }
        });

        match result {
            Ok(client) => {
                log::info!("chain client ready for {} via {}", rid.short(), client.endpoint_name());
                self.clients.insert(rid, client);
                self.phase = Phase::Ready;
                self.error = None;
                self.on_client_ready();
            }
            Err(err) => {
                let message = format!("{:#}", err);
                log::error!("chain client for {} unavailable: {}", rid.short(), message);
                self.phase = Phase::Idle;
                self.error = Some(message.clone());
                self.reauthenticate = false;
                self.publish();
                for waiter in self.session_waiters.drain(..) {
                    let _ = waiter.send(Err(ExplorerError::ClientConstruction {
                        rid: rid.clone(),
                        source: anyhow::anyhow!("{}", message),
                    }));
                }
            }
        }
    }

    fn on_client_ready(&mut self) {
        if self.session.is_some() {
            return;
        }
        if self.wallet.is_none() {
            self.reauthenticate = false;
            for waiter in self.session_waiters.drain(..) {
                let _ = waiter.send(Err(ExplorerError::WalletNotConnected));
            }
            return;
        }
        if self.reauthenticate || !self.session_waiters.is_empty() {
            self.start_login();
        }
    }

    fn ready_client(&self) -> Option<Arc<dyn ChainClient>> {
        if self.phase != Phase::Ready {
            return None;
        }
        self.clients.get(&self.selected.blockchain_rid).cloned()
    }

    // ---- wallet session ----

    fn connect_wallet(&mut self, wallet: WalletConnection) {
        if self.wallet.as_ref() == Some(&wallet) {
            return;
        }
        log::info!("wallet {} connected via {}", wallet.address, wallet.connector_id);
        self.abort_login();
        if let Some(session) = self.session.take() {
            self.spawn_logout(session, None);
        }
        self.wallet = Some(wallet);
        self.auth_status = AuthStatus::Disconnected;
    }

    fn disconnect_wallet(&mut self) {
        self.abort_login();
        self.wallet = None;
        self.reauthenticate = false;
        self.auth_status = AuthStatus::Disconnected;
        if let Some(session) = self.session.take() {
            self.spawn_logout(session, None);
        }
        self.publish();
        for waiter in self.session_waiters.drain(..) {
            let _ = waiter.send(Err(ExplorerError::WalletNotConnected));
        }
    }

    fn ensure_session(&mut self, reply: SessionReply) {
        if self.wallet.is_none() {
            self.respond(reply, Err(ExplorerError::WalletNotConnected));
            return;
        }
        if let Some(session) = &self.session {
            if session.blockchain_rid() == &self.selected.blockchain_rid {
                let session = Arc::clone(session);
                self.respond(reply, Ok(session));
                return;
            }
        }
        if let Some(stale) = self.session.take() {
            log::warn!(
                "session bound to {} but {} is selected, logging out",
                stale.blockchain_rid().short(),
                self.selected.blockchain_rid.short()
            );
            self.auth_status = AuthStatus::Disconnected;
            self.spawn_logout(stale, None);
        }

        self.session_waiters.push(reply);
        match self.phase {
            Phase::Ready => self.start_login(),
            Phase::Idle => self.start_connect(),
            Phase::Connecting | Phase::Switching => {}
        }
    }

    fn start_login(&mut self) {
        if self.login_task.is_some() {
            return;
        }
        let (Some(wallet), Some(client)) = (self.wallet.clone(), self.ready_client()) else {
            return;
        };

        self.login_ticket += 1;
        let ticket = self.login_ticket;
        let rid = self.selected.blockchain_rid.clone();
        let authenticator = Arc::clone(&self.collaborators.authenticator);
        let events = self.events.clone();

        log::debug!("logging in {} on {}", wallet.address, rid.short());
        self.login_task = Some(tokio::spawn(async move {
            let result = authenticator.login(client, &wallet).await;
            let _ = events.send(Event::LoginFinished { ticket, rid, result });
        }));
    }

    fn login_finished(&mut self, ticket: u64, rid: BlockchainRid, result: anyhow::Result<LoginOutcome>) {
        if ticket != self.login_ticket || rid != self.selected.blockchain_rid {
            log::debug!("discarding login result for {}", rid.short());
            if let Ok(LoginOutcome::Connected(session)) = result {
                self.spawn_logout(session, None);
            }
            return;
        }
        self.login_task = None;
        self.reauthenticate = false;

        let result = match result {
            Ok(LoginOutcome::Connected(session)) if session.blockchain_rid() != &rid => {
                let bound = session.blockchain_rid().clone();
                self.spawn_logout(session, None);
                Err(ExplorerError::SessionMismatch {
                    session: bound,
                    selected: rid,
                })
            }
            Ok(LoginOutcome::Connected(session)) => Ok(session),
            Ok(LoginOutcome::NotRegistered) => Err(ExplorerError::NotRegistered(rid)),
            Err(err) => Err(ExplorerError::Authentication(format!("{:#}", err))),
        };

        match &result {
            Ok(session) => {
                log::info!("session ready for account {}", session.account_id());
                self.auth_status = AuthStatus::Connected;
                self.session = Some(Arc::clone(session));
            }
            Err(ExplorerError::NotRegistered(rid)) => {
                log::info!("wallet has no account on {}", rid.short());
                self.auth_status = AuthStatus::NotRegistered;
            }
            Err(err) => {
                log::warn!("{}", err);
                self.auth_status = AuthStatus::Disconnected;
            }
        }

        self.publish();
        for waiter in self.session_waiters.drain(..) {
            let reply = match &result {
                Ok(session) => Ok(Arc::clone(session)),
                Err(err) => Err(replicate(err)),
            };
            let _ = waiter.send(reply);
        }
    }

    /// Log out in the background; `notify` reports completion for a switch
    ///
    /// Bounded by `logout_timeout`; completion is reported either way.
    fn spawn_logout(&self, session: Arc<dyn Session>, notify: Option<u64>) {
        let events = self.events.clone();
        let limit = self.settings.logout_timeout;
        tokio::spawn(async move {
            log::info!(
                "logging out session of {} on {}",
                session.account_id(),
                session.blockchain_rid().short()
            );
            match tokio::time::timeout(limit, session.logout()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::warn!("logout failed: {:#}", err),
                Err(_) => log::warn!(
                    "logout on {} still running after {:?}, abandoning it",
                    session.blockchain_rid().short(),
                    limit
                ),
            }
            if let Some(version) = notify {
                let _ = events.send(Event::TeardownFinished { version });
            }
        });
    }

    // ---- bookkeeping ----

    fn abort_connect(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
    }

    fn abort_login(&mut self) {
        if let Some(task) = self.login_task.take() {
            task.abort();
        }
        self.login_ticket += 1;
    }

    fn stop(&mut self) {
        self.abort_connect();
        self.abort_login();
        for waiter in self.session_waiters.drain(..) {
            let _ = waiter.send(Err(ExplorerError::CoordinatorClosed));
        }
    }

    /// Publish the current state, then answer
    fn respond<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    fn publish(&self) {
        let state = if self.transfer_locks > 0 {
            SessionState::TransferLocked
        } else {
            match self.phase {
                Phase::Idle => SessionState::Idle,
                Phase::Connecting => SessionState::Connecting,
                Phase::Ready => SessionState::Ready,
                Phase::Switching => SessionState::Switching,
            }
        };

        self.snapshot.send_replace(CoordinatorSnapshot {
            selected_chain: self.selected.clone(),
            chain_client: self.ready_client(),
            state,
            error: self.error.clone(),
            auth_status: self.auth_status,
            session: self.session.clone(),
            version: self.version,
            transfer_locks: self.transfer_locks,
            deferred_chain: self.deferred.as_ref().map(|(rid, _)| rid.clone()),
        });
    }
}

async fn build_client(
    factory: &dyn ClientFactory,
    rid: &BlockchainRid,
    attempts: usize,
    delay: Duration,
) -> anyhow::Result<Arc<dyn ChainClient>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match factory.create_client(rid).await {
            Ok(client) => return Ok(client),
            Err(err) if attempt < attempts => {
                log::warn!(
                    "client construction for {} failed (attempt {}/{}): {:#}",
                    rid.short(),
                    attempt,
                    attempts,
                    err
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Copy of a login error for each waiting caller
fn replicate(err: &ExplorerError) -> ExplorerError {
    match err {
        ExplorerError::NotRegistered(rid) => ExplorerError::NotRegistered(rid.clone()),
        ExplorerError::SessionMismatch { session, selected } => ExplorerError::SessionMismatch {
            session: session.clone(),
            selected: selected.clone(),
        },
        ExplorerError::Authentication(message) => ExplorerError::Authentication(message.clone()),
        other => ExplorerError::Authentication(other.to_string()),
    }
}
