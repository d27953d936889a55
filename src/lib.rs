//! # libbrick — brick lifecycle engine for distributed-FS storage nodes
//!
//! `libbrick` turns abstract brick requests ("provision N KiB of thin-pool
//! backed, XFS-formatted, mounted storage on that node") into strictly
//! ordered batches of shell-level provisioning commands, dispatches them to
//! per-node agents over QUIC (via [`quinn`]), interprets the results
//! tolerantly of benign drift, and tears partial state back down when a
//! step fails.  It is built on the Tokio async runtime, with `tracing` for
//! observability and `thiserror` for structured errors.
//!
//! The engine preserves two cluster-level invariants:
//!
//! * **Boot safety** — a node's persistent mount table never references a
//!   device whose backing logical volume has been removed, even if the
//!   manager or the node dies mid-operation.
//! * **Thin-pool reference counting** — a shared thin pool is removed only
//!   when its last thin volume is gone, and callers learn (via the
//!   `space_reclaimed` flag) whether the pool's capacity is free again.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: `BrickRequest`, `BrickInfo`, mount status records. |
//! | [`error`] | [`BrickError`] enum covering all failure modes, incl. benign absence. |
//! | [`config`] | [`BrickConfig`] record passed to the backend at construction. |
//! | [`paths`] | Pure identifier → device-node / mount-path derivation. |
//! | [`fstab`] | Persistent mount-table entries: format, add/remove commands, parsing. |
//! | [`executor`] | [`CommandExecutor`] contract, batch results, local execution. |
//! | [`lifecycle`] | [`BrickLifecycle`] trait — create, destroy, mount status. |
//! | [`backend`] | LVM thin-pool + XFS implementation of the lifecycle. |
//! | [`message`] | [`AgentMessage`] protocol envelope for QUIC transport. |
//! | [`transport`] | QUIC client/agent built on `quinn`. |

pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod fstab;
pub mod lifecycle;
pub mod message;
pub mod paths;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::lvm::LvmBackend;
pub use config::BrickConfig;
pub use error::BrickError;
pub use executor::{CommandExecutor, CommandResult, LocalExecutor};
pub use lifecycle::BrickLifecycle;
pub use message::AgentMessage;
pub use types::{BrickFormat, BrickInfo, BrickMountStatus, BrickRequest};
