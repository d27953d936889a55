//! QUIC client used by the manager to dispatch command batches to node
//! agents.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use quinn::crypto::rustls::QuicClientConfig;
use tracing::{debug, instrument, warn};

use crate::error::BrickError;
use crate::executor::{CommandExecutor, CommandResult};
use crate::message::AgentMessage;

/// A lightweight agent client that sends [`AgentMessage`] requests over a
/// single QUIC connection and returns the agent's response.
pub struct AgentClient {
    connection: quinn::Connection,
}

impl AgentClient {
    /// Establish a new QUIC connection to the node agent at `addr`.
    ///
    /// * `addr` — socket address of the remote agent
    /// * `server_name` — TLS SNI name that must match a SAN in the agent's
    ///   certificate (typically the node's hostname)
    /// * `tls_config` — client TLS configuration built from the deployment's
    ///   certificate authority
    pub async fn connect(
        addr: SocketAddr,
        server_name: &str,
        tls_config: rustls::ClientConfig,
    ) -> Result<Self, BrickError> {
        let quic_client_config = QuicClientConfig::try_from(tls_config)
            .map_err(|e| BrickError::Transport(format!("invalid TLS config: {e}")))?;
        let client_config = quinn::ClientConfig::new(Arc::new(quic_client_config));

        let bind_addr: SocketAddr = "0.0.0.0:0"
            .parse()
            .map_err(BrickError::internal)?;
        let mut endpoint = quinn::Endpoint::client(bind_addr).map_err(BrickError::transport)?;
        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(addr, server_name)
            .map_err(BrickError::transport)?
            .await
            .map_err(BrickError::transport)?;

        debug!(%addr, %server_name, "agent QUIC connection established");
        Ok(Self { connection })
    }

    /// Send a request and wait for the corresponding response.
    ///
    /// Each call opens a new bi-directional QUIC stream, writes the
    /// JSON-serialized request, finishes the send side, then reads the
    /// full response and deserializes it.
    #[instrument(skip(self), fields(msg = %msg))]
    pub async fn request(&self, msg: &AgentMessage) -> Result<AgentMessage, BrickError> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .map_err(BrickError::transport)?;

        let payload = serde_json::to_vec(msg).map_err(BrickError::internal)?;
        send.write_all(&payload)
            .await
            .map_err(BrickError::transport)?;
        send.finish().map_err(BrickError::transport)?;

        let buf = recv
            .read_to_end(16 * 1024 * 1024) // 16 MiB upper bound
            .await
            .map_err(BrickError::transport)?;

        let response: AgentMessage =
            serde_json::from_slice(&buf).map_err(BrickError::transport)?;
        debug!(%response, "agent response received");
        Ok(response)
    }

    /// Close the underlying QUIC connection gracefully.
    pub fn close(&self) {
        self.connection
            .close(quinn::VarInt::from_u32(0), b"client shutdown");
    }
}

/// [`CommandExecutor`] over QUIC: one agent per storage node, connections
/// cached per host and re-dialed once when a cached connection has gone
/// stale.
pub struct QuicExecutor {
    agent_port: u16,
    tls_config: rustls::ClientConfig,
    connections: DashMap<String, Arc<AgentClient>>,
}

impl QuicExecutor {
    /// Create an executor dialing `host:agent_port` for every target host.
    pub fn new(agent_port: u16, tls_config: rustls::ClientConfig) -> Self {
        Self {
            agent_port,
            tls_config,
            connections: DashMap::new(),
        }
    }

    async fn client_for(&self, host: &str) -> Result<Arc<AgentClient>, BrickError> {
        if let Some(client) = self.connections.get(host) {
            return Ok(Arc::clone(&client));
        }

        let addr = tokio::net::lookup_host((host, self.agent_port))
            .await
            .map_err(BrickError::transport)?
            .next()
            .ok_or_else(|| BrickError::Transport(format!("no address found for {host}")))?;

        let client =
            Arc::new(AgentClient::connect(addr, host, self.tls_config.clone()).await?);
        self.connections
            .insert(host.to_owned(), Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl CommandExecutor for QuicExecutor {
    async fn exec_commands(
        &self,
        host: &str,
        commands: &[String],
        timeout_secs: u64,
    ) -> Result<Vec<CommandResult>, BrickError> {
        let msg = AgentMessage::ExecCommands {
            commands: commands.to_vec(),
            timeout_secs,
        };

        let client = self.client_for(host).await?;
        let response = match client.request(&msg).await {
            Ok(response) => response,
            Err(e) => {
                // the cached connection may have idled out; dial once more
                warn!(%host, error = %e, "agent request failed, re-dialing");
                self.connections.remove(host);
                let client = self.client_for(host).await?;
                client.request(&msg).await?
            }
        };

        match response {
            AgentMessage::Results(results) => Ok(results),
            AgentMessage::Error(e) => Err(e),
            other => Err(BrickError::Transport(format!(
                "unexpected agent response: {other}"
            ))),
        }
    }
}
