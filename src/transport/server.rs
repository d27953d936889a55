//! QUIC agent that runs on each storage node and executes incoming command
//! batches.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicServerConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::error::BrickError;
use crate::executor::CommandExecutor;
use crate::message::AgentMessage;

/// A node agent that accepts QUIC connections and runs [`AgentMessage`]
/// command batches through an inner [`CommandExecutor`] — normally
/// [`LocalExecutor`](crate::executor::LocalExecutor).
///
/// Streams are served concurrently; the commands *within* one batch still
/// run strictly in order, which is what the lifecycle engine's step
/// ordering relies on.
pub struct AgentServer<E> {
    endpoint: quinn::Endpoint,
    executor: Arc<E>,
}

impl<E> AgentServer<E>
where
    E: CommandExecutor + 'static,
{
    /// Create a new agent bound to `addr`.
    ///
    /// `tls_config` is built from the node's certificate and key, signed by
    /// the deployment's certificate authority.
    pub fn new(
        addr: SocketAddr,
        tls_config: rustls::ServerConfig,
        executor: Arc<E>,
    ) -> Result<Self, BrickError> {
        let quic_server_config = QuicServerConfig::try_from(tls_config)
            .map_err(|e| BrickError::Transport(format!("invalid TLS config: {e}")))?;
        let server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_server_config));
        let endpoint =
            quinn::Endpoint::server(server_config, addr).map_err(BrickError::transport)?;
        info!(%addr, "brick agent listening");
        Ok(Self { endpoint, executor })
    }

    /// Accept connections in a loop until the endpoint is closed.
    ///
    /// Each accepted connection spawns a Tokio task, and each bi-stream
    /// within a connection is handled concurrently.
    pub async fn serve(&self) -> Result<(), BrickError> {
        while let Some(incoming) = self.endpoint.accept().await {
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(conn) => {
                        let remote = conn.remote_address();
                        debug!(%remote, "agent connection accepted");
                        if let Err(e) = Self::handle_connection(conn, executor).await {
                            warn!(%remote, error = %e, "agent connection error");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "agent incoming connection failed");
                    }
                }
            });
        }
        Ok(())
    }

    /// Handle all bi-streams on a single connection.
    async fn handle_connection(
        conn: quinn::Connection,
        executor: Arc<E>,
    ) -> Result<(), BrickError> {
        loop {
            let (send, recv) = match conn.accept_bi().await {
                Ok(stream) => stream,
                Err(quinn::ConnectionError::ApplicationClosed(_)) => return Ok(()),
                Err(e) => return Err(BrickError::transport(e)),
            };

            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                if let Err(e) = Self::handle_stream(send, recv, &executor).await {
                    error!(error = %e, "agent stream handler error");
                }
            });
        }
    }

    /// Process a single bi-stream: read request → dispatch → write response.
    #[instrument(skip_all)]
    async fn handle_stream(
        mut send: quinn::SendStream,
        mut recv: quinn::RecvStream,
        executor: &E,
    ) -> Result<(), BrickError> {
        let buf = recv
            .read_to_end(16 * 1024 * 1024)
            .await
            .map_err(BrickError::transport)?;

        let request: AgentMessage = serde_json::from_slice(&buf)
            .map_err(|e| BrickError::Transport(format!("malformed request: {e}")))?;

        debug!(%request, "agent request received");

        let response = Self::dispatch(executor, request).await;

        let payload = serde_json::to_vec(&response).map_err(BrickError::internal)?;
        send.write_all(&payload)
            .await
            .map_err(BrickError::transport)?;
        send.finish().map_err(BrickError::transport)?;
        Ok(())
    }

    /// Map an [`AgentMessage`] request to the matching executor call and
    /// wrap the result in a response [`AgentMessage`].
    async fn dispatch(executor: &E, request: AgentMessage) -> AgentMessage {
        match request {
            AgentMessage::ExecCommands {
                commands,
                timeout_secs,
            } => match executor
                .exec_commands("localhost", &commands, timeout_secs)
                .await
            {
                Ok(results) => AgentMessage::Results(results),
                Err(e) => AgentMessage::Error(e),
            },
            AgentMessage::Ping => AgentMessage::Pong,

            // response variants should never arrive as requests
            other => {
                warn!(msg = %other, "unexpected message variant received as request");
                AgentMessage::Error(BrickError::InvalidArgument(format!(
                    "unexpected message: {other}"
                )))
            }
        }
    }

    /// Return a reference to the underlying QUIC endpoint, useful for
    /// obtaining the local address or shutting down.
    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }
}
