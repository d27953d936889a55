//! The brick lifecycle trait.
//!
//! Callers such as the volume planner program against this seam, never
//! against a concrete backend.  The operations map one-to-one onto the
//! engine's responsibilities:
//!
//! 1. **Create** — provision, format, mount, and register one brick.
//! 2. **Destroy** — tear one brick down, reporting whether its pool-backed
//!    capacity is free again.
//! 3. **Mount status** — join the persistent mount table against the live
//!    mount list.

use async_trait::async_trait;

use crate::error::BrickError;
use crate::types::{BrickInfo, BrickMountStatus, BrickRequest};

/// Brick provisioning, teardown, and reconciliation on a named host.
#[async_trait]
pub trait BrickLifecycle: Send + Sync {
    /// Provision a brick on `host`: thin volume, file system, persistent
    /// mount-table entry, live mount, data directory, ownership.
    ///
    /// On any step's failure the partial state is torn down best-effort and
    /// the original failure is returned.
    async fn create_brick(
        &self,
        host: &str,
        brick: &BrickRequest,
    ) -> Result<BrickInfo, BrickError>;

    /// Tear a brick down on `host`.
    ///
    /// Idempotent — every step tolerates its object already being gone, so
    /// calling this again for a destroyed brick succeeds.  Returns `true`
    /// when the brick's thin pool was removed (or found already absent) and
    /// its capacity is free for allocation again; `false` when sibling
    /// bricks keep the pool alive.
    async fn destroy_brick(&self, host: &str, brick: &BrickRequest) -> Result<bool, BrickError>;

    /// Report every persistent mount-table entry on `host` together with
    /// whether its device is currently mounted.  Callers decide what to do
    /// with drift.
    async fn brick_mount_status(&self, host: &str) -> Result<Vec<BrickMountStatus>, BrickError>;
}
