//! Protocol messages exchanged with the node agents over QUIC.
//!
//! [`AgentMessage`] is the top-level envelope for all request and response
//! variants exchanged between the manager (client side) and the per-node
//! agent (server side) via QUIC bi-directional streams.

use serde::{Deserialize, Serialize};

use crate::error::BrickError;
use crate::executor::CommandResult;

/// Top-level message envelope for the node-agent protocol.
///
/// Each QUIC bi-stream carries exactly one request followed by one
/// response.  The client sends a *request* variant and the agent replies
/// with the corresponding *response* variant (or [`AgentMessage::Error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentMessage {
    // ----- Requests --------------------------------------------------------
    /// Run an ordered command batch, each command bounded by the timeout.
    ExecCommands {
        commands: Vec<String>,
        timeout_secs: u64,
    },
    /// Health probe.
    Ping,

    // ----- Responses -------------------------------------------------------
    /// Per-command results of a batch, in execution order.
    Results(Vec<CommandResult>),
    /// Probe acknowledgement.
    Pong,
    /// The batch could not be executed.
    Error(BrickError),
}

impl std::fmt::Display for AgentMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExecCommands { commands, .. } => {
                write!(f, "ExecCommands(count={})", commands.len())
            }
            Self::Ping => f.write_str("Ping"),
            Self::Results(results) => write!(f, "Results(count={})", results.len()),
            Self::Pong => f.write_str("Pong"),
            Self::Error(e) => write!(f, "Error({e})"),
        }
    }
}
