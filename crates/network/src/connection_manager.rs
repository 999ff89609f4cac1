// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Address lifecycle and dial/retry policy (spec §4.4).
//!
//! All mutation of the pending/connected maps happens inside one worker
//! task that drains a single action channel; retry timers simply post a
//! later action back onto the same channel instead of mutating state from
//! their own task.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::NetworkError;
use crate::peer::Direction;
use neo_config::NetworkConfig;

/// A dial intent tracked by the connection manager.
#[derive(Debug, Clone)]
pub struct Request {
    pub address: SocketAddr,
    pub direction: Direction,
    pub permanent: bool,
    pub retries: u8,
}

impl Request {
    fn seed(address: SocketAddr) -> Self {
        Self {
            address,
            direction: Direction::Outbound,
            permanent: true,
            retries: 0,
        }
    }

    fn discovered(address: SocketAddr) -> Self {
        Self {
            address,
            direction: Direction::Outbound,
            permanent: false,
            retries: 0,
        }
    }

    fn bump_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }
}

/// Outcome of a single dial attempt, reported back through the action
/// channel by whichever task performed the dial.
enum Action {
    /// Attempt a dial. `Some(request)` re-dials a known request (preserving
    /// its retry count and permanence); `None` fetches a fresh address.
    NewRequest(Option<Request>),
    /// A dial (or accept) succeeded.
    Connected(SocketAddr, Request),
    /// A dial failed; apply the retry policy.
    DialFailed(SocketAddr),
    /// An established connection was torn down.
    Disconnected(SocketAddr),
}

/// Address categories (spec §3): exactly one applies at a time in steady
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressState {
    Seed,
    Pending,
    Connected,
    Bad,
}

/// Callbacks the connection manager drives into on each lifecycle event.
#[async_trait::async_trait]
pub trait ConnectionHost: Send + Sync + 'static {
    /// A new TCP stream is ready, either accepted or freshly dialed.
    async fn on_connection(&self, stream: TcpStream, address: SocketAddr, direction: Direction);
}

/// Supplies fresh candidate addresses once the seed list is exhausted
/// (spec §6's `GetAddress() (string, err)`). `exclude` holds every address
/// already pending, connected, or marked bad, so an implementation backed
/// by a live address book can skip them without the manager needing to
/// know its internal layout.
pub trait AddressSource: Send + Sync + 'static {
    fn next_address(&self, exclude: &HashSet<SocketAddr>) -> Option<SocketAddr>;
}

/// Default source: offers addresses straight out of `NetworkConfig`'s seed
/// list. Real address-book discovery (Addr-message-learned peers) is a
/// separate concern layered on top via a different `AddressSource`.
pub struct SeedListSource {
    seeds: Vec<SocketAddr>,
}

impl SeedListSource {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            seeds: config.seed_list.iter().filter_map(|s| s.parse().ok()).collect(),
        }
    }
}

impl AddressSource for SeedListSource {
    fn next_address(&self, exclude: &HashSet<SocketAddr>) -> Option<SocketAddr> {
        self.seeds.iter().copied().find(|a| !exclude.contains(a))
    }
}

/// Converts addresses into live connections and maintains the target
/// outbound connection count.
pub struct ConnectionManager {
    config: NetworkConfig,
    action_tx: mpsc::Sender<Action>,
    pending: Arc<DashMap<SocketAddr, Request>>,
    connected: Arc<DashMap<SocketAddr, Request>>,
    bad: Arc<DashMap<SocketAddr, ()>>,
    outbound_count: Arc<AtomicU8>,
}

impl ConnectionManager {
    /// Starts the listener (if `listen_address` is set) and the action
    /// worker, and begins dialing towards the target outbound count.
    /// `address_source` supplies a replacement address whenever the
    /// failure policy abandons one (spec §6); pass a [`SeedListSource`] to
    /// fall back to the seed-list-only behaviour.
    pub async fn start(
        config: NetworkConfig,
        address_source: Arc<dyn AddressSource>,
        host: Arc<dyn ConnectionHost>,
    ) -> Result<Self, NetworkError> {
        let (action_tx, action_rx) = mpsc::channel(256);
        let pending = Arc::new(DashMap::new());
        let connected = Arc::new(DashMap::new());
        let bad = Arc::new(DashMap::new());
        let outbound_count = Arc::new(AtomicU8::new(0));

        let manager = Self {
            config: config.clone(),
            action_tx: action_tx.clone(),
            pending: pending.clone(),
            connected: connected.clone(),
            bad: bad.clone(),
            outbound_count: outbound_count.clone(),
        };

        let listen: SocketAddr =
            config
                .listen_address
                .parse()
                .map_err(|_| NetworkError::ConnectionFailed {
                    address: config.listen_address.clone(),
                    reason: "invalid listen address".to_string(),
                })?;
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|e| NetworkError::ConnectionFailed {
                address: listen.to_string(),
                reason: e.to_string(),
            })?;
        let accept_host = host.clone();
        let accept_action_tx = action_tx.clone();
        tokio::spawn(accept_loop(listener, accept_host, accept_action_tx));

        tokio::spawn(worker(
            config.clone(),
            action_rx,
            action_tx.clone(),
            pending,
            connected,
            bad,
            outbound_count,
            address_source,
            host,
        ));

        let seeds: Vec<SocketAddr> = manager
            .config
            .seed_list
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        for seed in seeds {
            let _ = manager
                .action_tx
                .send(Action::NewRequest(Some(Request::seed(seed))))
                .await;
        }
        for _ in manager.connected_count()..manager.config.target_outbound_peers {
            let _ = manager.action_tx.send(Action::NewRequest(None)).await;
        }

        Ok(manager)
    }

    /// Fetches a fresh address and attempts to connect, per spec §4.4.
    pub async fn new_request(&self) {
        let _ = self.action_tx.send(Action::NewRequest(None)).await;
    }

    /// Removes `address` from pending/connected and closes its connection.
    pub async fn disconnect(&self, address: SocketAddr) {
        let _ = self.action_tx.send(Action::Disconnected(address)).await;
    }

    /// Current number of live connected addresses.
    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// The category this address currently falls into, if tracked at all.
    pub fn state_of(&self, address: &SocketAddr) -> Option<AddressState> {
        if self.connected.contains_key(address) {
            Some(AddressState::Connected)
        } else if self.pending.contains_key(address) {
            Some(AddressState::Pending)
        } else if self.bad.contains_key(address) {
            Some(AddressState::Bad)
        } else {
            None
        }
    }
}

async fn accept_loop(listener: TcpListener, host: Arc<dyn ConnectionHost>, action_tx: mpsc::Sender<Action>) {
    loop {
        match listener.accept().await {
            Ok((stream, address)) => {
                info!(%address, "accepted inbound connection");
                let request = Request {
                    address,
                    direction: Direction::Inbound,
                    permanent: false,
                    retries: 0,
                };
                if action_tx.send(Action::Connected(address, request)).await.is_err() {
                    return;
                }
                host.on_connection(stream, address, Direction::Inbound).await;
            }
            Err(error) => warn!(%error, "accept failed"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker(
    config: NetworkConfig,
    mut action_rx: mpsc::Receiver<Action>,
    action_tx: mpsc::Sender<Action>,
    pending: Arc<DashMap<SocketAddr, Request>>,
    connected: Arc<DashMap<SocketAddr, Request>>,
    bad: Arc<DashMap<SocketAddr, ()>>,
    outbound_count: Arc<AtomicU8>,
    address_source: Arc<dyn AddressSource>,
    host: Arc<dyn ConnectionHost>,
) {
    while let Some(action) = action_rx.recv().await {
        match action {
            Action::NewRequest(request) => {
                let request = match request {
                    Some(r) => Some(r),
                    None => pick_address(address_source.as_ref(), &pending, &connected, &bad)
                        .map(Request::discovered),
                };
                let Some(request) = request else {
                    debug!("no address available for a new outbound request");
                    continue;
                };
                pending.insert(request.address, request.clone());
                tokio::spawn(dial(config.clone(), request, action_tx.clone(), host.clone()));
            }
            Action::Connected(address, request) => {
                pending.remove(&address);
                if matches!(request.direction, Direction::Outbound) {
                    outbound_count.fetch_add(1, Ordering::Relaxed);
                }
                connected.insert(address, request);
            }
            Action::DialFailed(address) => {
                let Some((_, mut request)) = pending.remove(&address) else {
                    continue;
                };
                apply_failure_policy(&config, &mut request, &action_tx, &bad, &pending).await;
            }
            Action::Disconnected(address) => {
                let was_connected = connected.remove(&address).is_some();
                let existing_pending = pending.remove(&address);
                if was_connected {
                    outbound_count.fetch_sub(1, Ordering::Relaxed);
                }
                if let Some((_, mut request)) = existing_pending {
                    apply_failure_policy(&config, &mut request, &action_tx, &bad, &pending).await;
                } else if was_connected {
                    let _ = action_tx.send(Action::NewRequest(None)).await;
                }
            }
        }
    }
}

fn pick_address(
    address_source: &dyn AddressSource,
    pending: &DashMap<SocketAddr, Request>,
    connected: &DashMap<SocketAddr, Request>,
    bad: &DashMap<SocketAddr, ()>,
) -> Option<SocketAddr> {
    let taken: HashSet<SocketAddr> = pending
        .iter()
        .map(|e| *e.key())
        .chain(connected.iter().map(|e| *e.key()))
        .chain(bad.iter().map(|e| *e.key()))
        .collect();
    address_source.next_address(&taken)
}

/// Normative failure policy (spec §4.4): permanent-or-inbound retries on a
/// backoff timer; otherwise retry immediately until the retry cap, then
/// abandon the request and fetch a replacement address.
async fn apply_failure_policy(
    config: &NetworkConfig,
    request: &mut Request,
    action_tx: &mpsc::Sender<Action>,
    bad: &Arc<DashMap<SocketAddr, ()>>,
    pending: &Arc<DashMap<SocketAddr, Request>>,
) {
    request.bump_retry();
    let address = request.address;

    if request.permanent || matches!(request.direction, Direction::Inbound) {
        let delay = config.retry_base_delay * request.retries as u32;
        pending.insert(address, request.clone());
        let action_tx = action_tx.clone();
        let request = request.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = action_tx.send(Action::NewRequest(Some(request))).await;
        });
        return;
    }

    if request.retries >= config.max_retries {
        bad.insert(address, ());
        let _ = action_tx.send(Action::NewRequest(None)).await;
        return;
    }

    // Retry immediately: re-enter the dial path for the same request.
    let _ = action_tx.send(Action::NewRequest(Some(request.clone()))).await;
}

async fn dial(
    config: NetworkConfig,
    request: Request,
    action_tx: mpsc::Sender<Action>,
    host: Arc<dyn ConnectionHost>,
) {
    let result = tokio::time::timeout(config.dial_timeout, TcpStream::connect(request.address)).await;
    match result {
        Ok(Ok(stream)) => {
            let _ = action_tx
                .send(Action::Connected(request.address, request.clone()))
                .await;
            host.on_connection(stream, request.address, Direction::Outbound).await;
        }
        _ => {
            let _ = action_tx.send(Action::DialFailed(request.address)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_retry_counter_saturates() {
        let mut request = Request::seed("127.0.0.1:10333".parse().unwrap());
        request.retries = u8::MAX;
        request.bump_retry();
        assert_eq!(request.retries, u8::MAX);
    }

    struct NoopHost;
    #[async_trait::async_trait]
    impl ConnectionHost for NoopHost {
        async fn on_connection(&self, _stream: TcpStream, _address: SocketAddr, _direction: Direction) {}
    }

    /// Cycles through a fixed pool of addresses, skipping whatever the
    /// caller already excludes; lets a test drive the non-permanent
    /// abandon-and-fetch-new-address failure path deterministically.
    struct CyclingSource {
        pool: Vec<SocketAddr>,
    }

    impl AddressSource for CyclingSource {
        fn next_address(&self, exclude: &HashSet<SocketAddr>) -> Option<SocketAddr> {
            self.pool.iter().copied().find(|a| !exclude.contains(a))
        }
    }

    fn unreachable_address(n: u16) -> SocketAddr {
        // TEST-NET-1 (RFC 5737): routed nowhere, dials there just time out.
        format!("192.0.2.{}:{}", n, 10333).parse().unwrap()
    }

    /// Non-permanent, non-inbound requests retry immediately up to
    /// `max_retries`; with the cap at zero the very first dial failure
    /// abandons the address (into `bad`) and immediately fetches a
    /// replacement from the `AddressSource`, cycling through the whole pool.
    #[tokio::test]
    async fn exhausted_retries_abandons_address_and_fetches_a_replacement() {
        let pool = vec![unreachable_address(1), unreachable_address(2)];
        let config = NetworkConfig {
            listen_address: "127.0.0.1:0".to_string(),
            seed_list: Vec::new(),
            target_outbound_peers: 1,
            dial_timeout: std::time::Duration::from_millis(200),
            max_retries: 0,
            ..NetworkConfig::default()
        };
        let manager = ConnectionManager::start(
            config,
            Arc::new(CyclingSource { pool: pool.clone() }),
            Arc::new(NoopHost),
        )
        .await
        .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            loop {
                if pool.iter().all(|a| manager.state_of(a) == Some(AddressState::Bad)) {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("both pool addresses should eventually be marked bad");
    }
}
