//! WebSocket Race Server
//!
//! Async WebSocket server in front of [`RaceService`].
//! Handles identity binding and request routing; each request gets exactly
//! one response, in order.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::network::auth::{authorize, AuthConfig};
use crate::network::protocol::{
    ClientMessage, ServerMessage, ServerError, ErrorCode, IdentifyResult,
    ResultsView, SimulationView,
};
use crate::race::error::RaceError;
use crate::race::model::UserId;
use crate::race::service::RaceService;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close connections silent for this long.
    pub idle_timeout: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Race server errors.
#[derive(Debug, thiserror::Error)]
pub enum RaceServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Bound user (after login or identify).
    user_id: Option<UserId>,
    /// Connection time.
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
}

/// The race server.
pub struct RaceServer {
    config: ServerConfig,
    auth: AuthConfig,
    service: Arc<RaceService>,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RaceServer {
    /// Create a new race server.
    pub fn new(config: ServerConfig, auth: AuthConfig, service: Arc<RaceService>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            auth,
            service,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), RaceServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), RaceServerError> {
        info!("Race server listening on {}", listener.local_addr()?);
        if self.auth.is_configured() {
            info!("Token verification enabled for identify");
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let service = self.service.clone();
        let auth = self.auth.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    user_id: None,
                    connected_at: Instant::now(),
                    last_activity: Instant::now(),
                });
            }

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let mut identity: Option<UserId> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let response = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(
                                            &service,
                                            &auth,
                                            &config.version,
                                            &mut identity,
                                            client_msg,
                                        ).await
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        ServerMessage::error(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        )
                                    }
                                };

                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                        client.user_id = identity;
                                    }
                                }

                                if msg_tx.send(response).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(ServerMessage::error(
                                    ErrorCode::InvalidInput,
                                    "Binary frames are not supported",
                                )).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = tokio::time::sleep(config.idle_timeout) => {
                        info!("Closing idle client {}", addr);
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Idle timeout".to_string(),
                        }).await;
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let the sender flush what is queued, then give up.
            drop(msg_tx);
            if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
                debug!("Sender for {} did not drain in time", addr);
            }

            let removed = clients.write().await.remove(&addr);
            if let Some(client) = removed {
                info!(
                    "Client {} cleaned up (user: {:?}, connected {:?}, last active {:?} ago)",
                    addr,
                    client.user_id.map(|id| id.get()),
                    client.connected_at.elapsed(),
                    client.last_activity.elapsed()
                );
            }
        });
    }

    /// Route one request to the service and build its response.
    ///
    /// `identity` is the user bound to the connection; `login` and
    /// `identify` set it, `register` and `me` require it.
    pub async fn handle_client_message(
        service: &RaceService,
        auth: &AuthConfig,
        version: &str,
        identity: &mut Option<UserId>,
        msg: ClientMessage,
    ) -> ServerMessage {
        let result = match msg {
            ClientMessage::Login(req) => {
                service.login(&req.email, &req.full_name).await.map(|user| {
                    *identity = Some(user.id);
                    ServerMessage::User(user)
                })
            }
            ClientMessage::Identify(req) => {
                let user_id = match authorize(req.user_id, req.token.as_deref(), auth) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("Identify rejected for user {}: {}", req.user_id, e);
                        return ServerMessage::error(ErrorCode::AuthFailed, e.to_string());
                    }
                };
                service.user(user_id).await.map(|user| {
                    *identity = Some(user.id);
                    ServerMessage::Identified(IdentifyResult {
                        user_id: user.id,
                        server_version: version.to_string(),
                    })
                })
            }
            ClientMessage::ListRaces => Ok(ServerMessage::Races {
                races: service.list_races().await,
            }),
            ClientMessage::GetRace { race_id } => {
                service.get_race(race_id).await.map(ServerMessage::Race)
            }
            ClientMessage::GetResults { race_id } => service
                .get_results(race_id)
                .await
                .map(|set| ServerMessage::Results(ResultsView::from(set.as_ref()))),
            ClientMessage::Simulate { race_id } => service
                .simulate(race_id)
                .await
                .map(|outcome| ServerMessage::Simulated(SimulationView::from(&outcome))),
            ClientMessage::Register { race_id } => match *identity {
                Some(user_id) => service
                    .register(race_id, user_id)
                    .await
                    .map(ServerMessage::Registered),
                None => return not_authenticated(),
            },
            ClientMessage::Me => match *identity {
                Some(user_id) => service.profile(user_id).await.map(ServerMessage::Profile),
                None => return not_authenticated(),
            },
            ClientMessage::Ping { timestamp } => Ok(ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
            }),
        };

        result.unwrap_or_else(|err| error_response(&err))
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get the number of connections bound to a user.
    pub async fn identified_count(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.user_id.is_some())
            .count()
    }
}

fn not_authenticated() -> ServerMessage {
    ServerMessage::error(ErrorCode::NotAuthenticated, "Login or identify first")
}

fn error_response(err: &RaceError) -> ServerMessage {
    match err {
        RaceError::Unavailable(_) => warn!("Request failed: {}", err),
        _ => debug!("Request rejected: {}", err),
    }
    ServerMessage::Error(ServerError::from(err))
}
