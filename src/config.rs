//! Engine configuration.
//!
//! [`BrickConfig`] is an explicit record handed to the backend at
//! construction.  Nothing in this crate reads process-global state; two
//! engines with different configurations can coexist in one process.

use serde::{Deserialize, Serialize};

/// Configuration consumed by the LVM brick backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickConfig {
    /// Path of the persistent mount table on every storage node.
    /// Must be non-empty; creation requests are rejected otherwise.
    pub fstab_path: String,
    /// Whether LVM metadata backups are taken, forwarded as
    /// `--autobackup=y|n`.
    pub backup_lvm: bool,
    /// Thin-pool chunk size for standard bricks.  Arbiter bricks always use
    /// 256 KiB chunks regardless of this setting.
    pub lv_chunk_size: String,
    /// XFS stripe unit.  Zero disables stripe parameters.
    pub xfs_su: u32,
    /// XFS stripe width.  Zero disables stripe parameters.
    pub xfs_sw: u32,
    /// Capture `lsof` output when a brick refuses to unmount.
    pub debug_umount_failures: bool,
    /// Per-command timeout for provisioning steps, in seconds.  Raise this
    /// when formatting very large devices.
    pub provision_timeout_secs: u64,
    /// Per-command timeout for teardown and query steps, in seconds.
    pub query_timeout_secs: u64,
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            fstab_path: "/etc/fstab".to_owned(),
            backup_lvm: false,
            lv_chunk_size: "256K".to_owned(),
            xfs_su: 0,
            xfs_sw: 0,
            debug_umount_failures: true,
            provision_timeout_secs: 10,
            query_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BrickConfig::default();
        assert_eq!(cfg.fstab_path, "/etc/fstab");
        assert_eq!(cfg.lv_chunk_size, "256K");
        assert_eq!(cfg.provision_timeout_secs, 10);
        assert_eq!(cfg.query_timeout_secs, 5);
        assert_eq!(cfg.xfs_su, 0);
        assert!(!cfg.backup_lvm);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: BrickConfig =
            serde_json::from_str(r#"{"backup_lvm": true, "xfs_su": 256, "xfs_sw": 2}"#)
                .expect("deserialize");
        assert!(cfg.backup_lvm);
        assert_eq!(cfg.xfs_su, 256);
        assert_eq!(cfg.fstab_path, "/etc/fstab");
    }
}
