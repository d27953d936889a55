//! QUIC transport between the manager and the node agents.
//!
//! This module provides [`AgentClient`] / [`QuicExecutor`] on the manager
//! side and [`AgentServer`] on the storage-node side, exchanging
//! [`AgentMessage`](crate::message::AgentMessage) values over QUIC
//! bi-directional streams using `quinn`.

pub mod client;
pub mod server;

pub use client::{AgentClient, QuicExecutor};
pub use server::AgentServer;
