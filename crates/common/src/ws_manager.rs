//! WebSocket connection manager with ping/pong, reconnection policy, and control commands.

use crate::error::{Error, Result};
use crate::messages::ControlCommand;
use crate::reconnect::ReconnectPolicy;
use crate::ws_handler::WsHandler;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::{
    client_async_tls_with_config,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message},
    Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use url::Url;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for the WebSocket manager.
#[derive(Debug, Clone)]
pub struct WsManagerConfig {
    /// Interval between ping frames.
    pub ping_interval: Duration,
    /// Timeout for each TCP connect attempt.
    pub connect_timeout: Duration,
    /// When and how often to reconnect.
    pub reconnect: ReconnectPolicy,
    /// Label for logs and metrics (e.g., "display").
    pub label: String,
}

impl Default for WsManagerConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
            label: "feed".to_string(),
        }
    }
}

/// WebSocket connection manager.
/// Owns the connection lifecycle and consults its [`ReconnectPolicy`] after every drop.
pub struct WsManager<H: WsHandler> {
    handler: Arc<H>,
    config: WsManagerConfig,
    command_rx: mpsc::Receiver<ControlCommand>,
}

/// How a single connection ended.
enum SessionEnd {
    Shutdown,
    Dropped { error: Error, progressed: bool },
}

impl<H: WsHandler> WsManager<H> {
    /// Create a new WebSocket manager.
    pub fn new(
        handler: Arc<H>,
        config: WsManagerConfig,
        command_rx: mpsc::Receiver<ControlCommand>,
    ) -> Self {
        Self {
            handler,
            config,
            command_rx,
        }
    }

    /// Run until shutdown or until the reconnect policy gives up.
    pub async fn run(mut self) -> Result<()> {
        let mut backoff = self.config.reconnect.backoff();

        loop {
            match self.connect_and_run_loop().await {
                SessionEnd::Shutdown => {
                    info!("[{}] WebSocket closed gracefully", self.config.label);
                    return Ok(());
                }
                SessionEnd::Dropped { error, progressed } => {
                    counter!("feed_client_disconnects_total", "client" => self.config.label.clone())
                        .increment(1);
                    self.handler.on_disconnect().await;

                    if progressed {
                        backoff.reset();
                    }

                    let Some(delay) = backoff.next_delay() else {
                        error!(
                            "[{}] Giving up after {} reconnection attempts: {:?}",
                            self.config.label,
                            backoff.attempts(),
                            error
                        );
                        return Err(Error::ReconnectExhausted(backoff.attempts()));
                    };

                    warn!(
                        "[{}] WebSocket disconnected: {:?}, reconnecting in {:?} (attempt {})",
                        self.config.label,
                        error,
                        delay,
                        backoff.attempts()
                    );

                    if self.wait_before_reconnect(delay).await {
                        info!("[{}] Shutdown while disconnected", self.config.label);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Sleep out the backoff delay. Returns true if shutdown was requested meanwhile.
    async fn wait_before_reconnect(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                cmd = self.command_rx.recv() => match cmd {
                    Some(ControlCommand::Shutdown) | None => return true,
                    Some(cmd) => {
                        // No socket to reply on; the handler still records the intent.
                        if let Err(e) = self.handler.handle_command(cmd).await {
                            warn!("[{}] Command failed while disconnected: {:?}", self.config.label, e);
                        }
                    }
                }
            }
        }
    }

    async fn connect_and_run_loop(&mut self) -> SessionEnd {
        let mut progressed = false;
        match self.run_session(&mut progressed).await {
            Ok(()) => SessionEnd::Shutdown,
            Err(error) => SessionEnd::Dropped { error, progressed },
        }
    }

    async fn open_tcp(&self, url: &Url) -> Result<TcpStream> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::Generic("No host in URL".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::Generic("No port in URL".to_string()))?;
        let addr_str = format!("{}:{}", host, port);

        let addrs: Vec<SocketAddr> = addr_str
            .to_socket_addrs()
            .map_err(|e| Error::Generic(format!("DNS resolution failed: {}", e)))?
            .collect();

        // IPv4 first, then IPv6
        let mut sorted_addrs: Vec<SocketAddr> =
            addrs.iter().filter(|a| a.is_ipv4()).copied().collect();
        sorted_addrs.extend(addrs.iter().filter(|a| a.is_ipv6()).copied());

        for addr in &sorted_addrs {
            debug!("[{}] Trying to connect to {}", self.config.label, addr);
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await
            {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    debug!("[{}] TCP connect to {} failed: {}", self.config.label, addr, e);
                }
                Err(_) => {
                    debug!("[{}] TCP connect to {} timed out", self.config.label, addr);
                }
            }
        }

        Err(Error::Generic("All connection attempts failed".to_string()))
    }

    fn tls_connector() -> Result<Connector> {
        let mut root_store = rustls::RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs();
        for cert in certs.certs {
            let _ = root_store.add(cert);
        }

        Ok(Connector::Rustls(Arc::new(
            rustls::ClientConfig::builder_with_provider(Arc::new(
                rustls::crypto::ring::default_provider(),
            ))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Generic(format!("TLS config error: {}", e)))?
            .with_root_certificates(root_store)
            .with_no_client_auth(),
        )))
    }

    async fn run_session(&mut self, progressed: &mut bool) -> Result<()> {
        let url_str = self.handler.url();
        let url = Url::parse(&url_str)?;
        info!("[{}] Connecting to {}:{}", self.config.label, url.host_str().unwrap_or(""), url.path());

        let tcp_stream = self.open_tcp(&url).await?;
        let connector = if url.scheme() == "wss" {
            Some(Self::tls_connector()?)
        } else {
            Some(Connector::Plain)
        };

        let (ws_stream, response) =
            client_async_tls_with_config(url_str.as_str(), tcp_stream, None, connector).await?;
        debug!(
            "[{}] WebSocket handshake complete, status: {:?}",
            self.config.label,
            response.status()
        );
        let (mut write, mut read) = ws_stream.split();

        gauge!("feed_client_connected", "client" => self.config.label.clone()).set(1.0);
        info!("[{}] WebSocket connected", self.config.label);

        if let Some(init_msg) = self.handler.on_connect_message() {
            debug!("[{}] Sending initial message: {}", self.config.label, init_msg);
            write.send(Message::Text(init_msg)).await?;
        }

        self.handler.on_reconnect().await;

        let outcome = self.pump(&mut write, &mut read, progressed).await;

        gauge!("feed_client_connected", "client" => self.config.label.clone()).set(0.0);
        outcome
    }

    /// Drive one established connection until it drops or shutdown is requested.
    async fn pump(
        &mut self,
        write: &mut SplitSink<FeedStream, Message>,
        read: &mut SplitStream<FeedStream>,
        progressed: &mut bool,
    ) -> Result<()> {
        let mut ping_interval = interval(self.config.ping_interval);
        ping_interval.reset(); // Don't fire immediately

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            *progressed = true;
                            counter!("feed_client_frames_received_total", "client" => self.config.label.clone()).increment(1);
                            match self.handler.on_message(&text).await {
                                Ok(replies) => {
                                    for reply in replies {
                                        write.send(Message::Text(reply)).await?;
                                    }
                                }
                                Err(e) => {
                                    error!("[{}] Error handling message: {:?}", self.config.label, e);
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            debug!("[{}] Ignoring binary frame", self.config.label);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("[{}] Received pong", self.config.label);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("[{}] Received close frame: {:?}", self.config.label, frame);
                            return Err(Error::ConnectionClosed);
                        }
                        Some(Ok(Message::Frame(_))) => {
                            // Raw frame, ignore
                        }
                        Some(Err(e)) => {
                            error!("[{}] WebSocket error: {:?}", self.config.label, e);
                            return Err(Error::WebSocket(e));
                        }
                        None => {
                            info!("[{}] WebSocket stream ended", self.config.label);
                            return Err(Error::ConnectionClosed);
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ControlCommand::Shutdown) | None => {
                            info!("[{}] Shutting down connection", self.config.label);
                            let close_frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "Shutdown".into(),
                            };
                            let _ = write.send(Message::Close(Some(close_frame))).await;
                            return Ok(());
                        }
                        Some(cmd) => {
                            match self.handler.handle_command(cmd).await {
                                Ok(Some(msg)) => {
                                    debug!("[{}] Sending command frame: {}", self.config.label, msg);
                                    write.send(Message::Text(msg)).await?;
                                }
                                Ok(None) => {}
                                Err(e) => warn!("[{}] Command failed: {:?}", self.config.label, e),
                            }
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    debug!("[{}] Sending ping", self.config.label);
                    write.send(Message::Ping(vec![])).await?;
                }
            }
        }
    }
}
