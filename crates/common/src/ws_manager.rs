//! WebSocket connection manager with ping/pong, reconnection, and runtime control commands.

use crate::error::{Error, Result};
use crate::messages::ControlCommand;
use crate::ws_handler::WsHandler;
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
    Connector,
};
use tracing::{debug, error, info, warn};
use url::Url;

/// Configuration for the WebSocket manager.
#[derive(Debug, Clone)]
pub struct WsManagerConfig {
    /// Interval between ping frames.
    pub ping_interval: Duration,
    /// Timeout for each TCP connect attempt.
    pub connect_timeout: Duration,
    /// Initial delay before reconnection attempt.
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay (for exponential backoff).
    pub max_reconnect_delay: Duration,
    /// Label for logs and metrics (e.g., "scoreboard").
    pub label: String,
}

impl Default for WsManagerConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            label: "upstream".to_string(),
        }
    }
}

/// Doubles `current`, capped at `max`.
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Host and port for a `ws://` or `wss://` URL, defaulting the port by scheme.
pub fn socket_target(url: &Url) -> Result<(String, u16)> {
    let default_port = match url.scheme() {
        "ws" => 80,
        "wss" => 443,
        other => return Err(Error::UnsupportedScheme(other.to_string())),
    };
    let host = url
        .host_str()
        .ok_or_else(|| Error::Generic("No host in URL".to_string()))?;
    Ok((host.to_string(), url.port().unwrap_or(default_port)))
}

/// WebSocket connection manager.
/// Handles connection lifecycle, ping/pong, reconnection, and control commands.
pub struct WsManager<H: WsHandler> {
    handler: Arc<H>,
    config: WsManagerConfig,
    command_rx: mpsc::Receiver<ControlCommand>,
}

impl<H: WsHandler> WsManager<H> {
    /// Create a new WebSocket manager around a shared handler.
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

    /// Run the WebSocket manager. Reconnects without limit until shutdown.
    pub async fn run(mut self) -> Result<()> {
        let mut reconnect_delay = self.config.reconnect_delay;
        let mut shutdown = false;

        while !shutdown {
            let mut connected = false;
            match self.connect_and_run_loop(&mut shutdown, &mut connected).await {
                Ok(()) => {
                    info!("[{}] WebSocket closed gracefully", self.config.label);
                    break;
                }
                Err(e) => {
                    counter!("upstream_errors_total", "feed" => self.config.label.clone(), "error_type" => "disconnect").increment(1);
                    if connected {
                        gauge!("upstream_active_connections", "feed" => self.config.label.clone())
                            .decrement(1.0);
                        reconnect_delay = self.config.reconnect_delay;
                    }

                    warn!(
                        "[{}] WebSocket disconnected: {}, reconnecting in {:?}",
                        self.config.label, e, reconnect_delay
                    );
                    self.handler.on_disconnect().await;

                    tokio::time::sleep(reconnect_delay).await;

                    reconnect_delay = next_backoff(reconnect_delay, self.config.max_reconnect_delay);
                }
            }
        }

        Ok(())
    }

    async fn connect_and_run_loop(&mut self, shutdown: &mut bool, connected: &mut bool) -> Result<()> {
        let url_str = self.handler.url().to_string();
        info!("[{}] Connecting to WebSocket: {}", self.config.label, url_str);

        let url = Url::parse(&url_str)?;
        let (host, port) = socket_target(&url)?;
        let addr_str = format!("{}:{}", host, port);

        // Resolve DNS and prefer IPv4 to avoid IPv6 timeout issues
        let addrs: Vec<SocketAddr> = addr_str
            .to_socket_addrs()
            .map_err(|e| Error::Generic(format!("DNS resolution failed: {}", e)))?
            .collect();

        let mut sorted_addrs: Vec<SocketAddr> =
            addrs.iter().filter(|a| a.is_ipv4()).copied().collect();
        sorted_addrs.extend(addrs.iter().filter(|a| a.is_ipv6()).copied());

        debug!(
            "[{}] Resolved addresses (IPv4 first): {:?}",
            self.config.label, sorted_addrs
        );

        let mut tcp_stream = None;
        for addr in &sorted_addrs {
            debug!("[{}] Trying to connect to {}", self.config.label, addr);
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    debug!("[{}] TCP connected to {}", self.config.label, addr);
                    tcp_stream = Some(stream);
                    break;
                }
                Ok(Err(e)) => {
                    debug!("[{}] TCP connect to {} failed: {}", self.config.label, addr, e);
                }
                Err(_) => {
                    debug!("[{}] TCP connect to {} timed out", self.config.label, addr);
                }
            }
        }

        let tcp_stream = tcp_stream
            .ok_or_else(|| Error::Generic("All connection attempts failed".to_string()))?;

        // Plain ws:// URLs ignore the connector; it only applies to wss://
        let connector = if url.scheme() == "wss" {
            Some(Self::tls_connector()?)
        } else {
            None
        };

        let (ws_stream, response) =
            client_async_tls_with_config(url_str.as_str(), tcp_stream, None, connector).await?;

        debug!(
            "[{}] WebSocket handshake complete, status: {:?}",
            self.config.label,
            response.status()
        );
        let (mut write, mut read) = ws_stream.split();

        *connected = true;
        gauge!("upstream_active_connections", "feed" => self.config.label.clone()).increment(1.0);
        info!("[{}] WebSocket connected", self.config.label);

        if let Some(init_msg) = self.handler.on_connect_message() {
            debug!("[{}] Sending registration: {}", self.config.label, init_msg);
            write.send(Message::Text(init_msg)).await?;
        }

        self.handler.on_reconnect().await;

        let mut ping_interval = interval(self.config.ping_interval);
        ping_interval.reset(); // Don't fire immediately

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            counter!("upstream_messages_received_total", "feed" => self.config.label.clone()).increment(1);
                            if let Err(e) = self.handler.on_message(&text).await {
                                error!("[{}] Error handling message: {}", self.config.label, e);
                                counter!("upstream_errors_total", "feed" => self.config.label.clone(), "error_type" => "handler").increment(1);
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if let Err(e) = self.handler.on_binary_message(&data).await {
                                error!("[{}] Error handling binary message: {}", self.config.label, e);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("[{}] Received ping, sending pong", self.config.label);
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("[{}] Received pong", self.config.label);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("[{}] Received close frame: {:?}", self.config.label, frame);
                            return Err(Error::ConnectionClosed);
                        }
                        Some(Ok(Message::Frame(_))) => {}
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
                        Some(ControlCommand::Shutdown) => {
                            info!("[{}] Received shutdown command", self.config.label);
                            *shutdown = true;
                            let close_frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "Shutdown".into(),
                            };
                            let _ = write.send(Message::Close(Some(close_frame))).await;
                            gauge!("upstream_active_connections", "feed" => self.config.label.clone())
                                .decrement(1.0);
                            return Ok(());
                        }
                        Some(cmd) => {
                            if let Some(msg) = self.handler.handle_command(cmd).await {
                                debug!("[{}] Sending registration update: {}", self.config.label, msg);
                                write.send(Message::Text(msg)).await?;
                            }
                        }
                        None => {
                            info!("[{}] Command channel closed", self.config.label);
                            *shutdown = true;
                            gauge!("upstream_active_connections", "feed" => self.config.label.clone())
                                .decrement(1.0);
                            return Ok(());
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let max = Duration::from_secs(30);
        let mut delay = Duration::from_secs(1);
        let mut seen = Vec::new();
        for _ in 0..7 {
            delay = next_backoff(delay, max);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn test_socket_target_defaults_port_by_scheme() {
        let plain = Url::parse("ws://scoreboard.local/WS/").unwrap();
        assert_eq!(socket_target(&plain).unwrap(), ("scoreboard.local".to_string(), 80));

        let tls = Url::parse("wss://scoreboard.example.com/WS/").unwrap();
        assert_eq!(socket_target(&tls).unwrap().1, 443);

        let explicit = Url::parse("ws://192.168.86.33:8000/WS/").unwrap();
        assert_eq!(socket_target(&explicit).unwrap(), ("192.168.86.33".to_string(), 8000));
    }

    #[test]
    fn test_socket_target_rejects_http() {
        let url = Url::parse("http://scoreboard.local/").unwrap();
        assert!(matches!(socket_target(&url), Err(Error::UnsupportedScheme(_))));
    }
}
