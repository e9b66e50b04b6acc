//! NetworkSink - TCP streaming to connected subscribers
//!
//! Each frame on the wire is a 4-byte big-endian length followed by the
//! serialized `DebugMessage`. The listener counts as subscribed for as long
//! as its connection is open.

use contracts::{ContractError, DebugMessage, DebugSink, SubscriberGauge};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Listen address (port 0 picks a free port)
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Frames larger than this are not sent
    pub max_frame_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_frame_size = params
            .get("max_frame_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(64 * 1024 * 1024);

        Ok(Self {
            addr,
            format,
            max_frame_size,
        })
    }
}

type Clients = Arc<Mutex<Vec<(SocketAddr, TcpStream)>>>;

/// Sink that streams debug messages to TCP subscribers
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    local_addr: SocketAddr,
    clients: Clients,
    subscribers: SubscriberGauge,
    accept_task: Option<JoinHandle<()>>,
}

impl NetworkSink {
    /// Bind the listener and start accepting subscribers
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let listener = TcpListener::bind(config.addr).await?;
        let local_addr = listener.local_addr()?;
        let clients: Clients = Arc::default();
        let subscribers = SubscriberGauge::default();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            name.clone(),
            clients.clone(),
            subscribers.clone(),
        ));

        info!(sink = %name, addr = %local_addr, "NetworkSink listening");

        Ok(Self {
            name,
            config,
            local_addr,
            clients,
            subscribers,
            accept_task: Some(accept_task),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn encode(&self, message: &DebugMessage) -> Result<Vec<u8>, ContractError> {
        let payload = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(message)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {}", e)))?,
            NetworkFormat::Bincode => bincode::serialize(message).map_err(|e| {
                ContractError::sink_write(&self.name, format!("bincode error: {}", e))
            })?,
        };

        if payload.len() > self.config.max_frame_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "frame of {} bytes exceeds limit of {}",
                    payload.len(),
                    self.config.max_frame_size
                ),
            ));
        }

        let mut frame = Vec::with_capacity(payload.len() + 4);
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Send to every client, forgetting the ones that went away
    async fn broadcast(&self, frame: &[u8]) -> usize {
        let mut clients = self.clients.lock().await;
        let mut alive = Vec::with_capacity(clients.len());
        for (peer, mut stream) in clients.drain(..) {
            match stream.write_all(frame).await {
                Ok(()) => alive.push((peer, stream)),
                Err(e) => {
                    self.subscribers.unsubscribe();
                    debug!(sink = %self.name, peer = %peer, error = %e, "Subscriber disconnected");
                }
            }
        }
        let delivered = alive.len();
        *clients = alive;
        delivered
    }
}

async fn accept_loop(
    listener: TcpListener,
    name: String,
    clients: Clients,
    subscribers: SubscriberGauge,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let _ = stream.set_nodelay(true);
                clients.lock().await.push((peer, stream));
                subscribers.subscribe();
                info!(sink = %name, peer = %peer, subscribers = subscribers.count(), "Subscriber connected");
            }
            Err(e) => {
                warn!(sink = %name, error = %e, "Accept failed");
            }
        }
    }
}

impl DebugSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribers(&self) -> SubscriberGauge {
        self.subscribers.clone()
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, message),
        fields(sink = %self.name, kind = message.kind(), stamp_ns = message.stamp_ns())
    )]
    async fn write(&mut self, message: &DebugMessage) -> Result<(), ContractError> {
        let frame = self.encode(message)?;
        let delivered = self.broadcast(&frame).await;
        debug!(sink = %self.name, bytes = frame.len(), delivered, "Sent");
        Ok(())
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        let mut clients = self.clients.lock().await;
        for (_, stream) in clients.iter_mut() {
            stream.flush().await?;
        }
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        let mut clients = self.clients.lock().await;
        for _ in clients.drain(..) {
            self.subscribers.unsubscribe();
        }
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

impl Drop for NetworkSink {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}
