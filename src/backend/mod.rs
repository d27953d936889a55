//! Concrete brick lifecycle backends.
//!
//! Each backend module provides a type implementing
//! [`BrickLifecycle`](crate::lifecycle::BrickLifecycle) on top of the
//! [`CommandExecutor`](crate::executor::CommandExecutor) contract.

pub mod lvm;
