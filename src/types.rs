//! Core brick types: requests, creation results, and mount status records.
//!
//! These types form the data model shared by the lifecycle trait, the LVM
//! backend, and the transport layer.  They are all
//! [`Serialize`]/[`Deserialize`] so they can cross process boundaries as
//! JSON.

use serde::{Deserialize, Serialize};

/// Inode allocation policy for the brick's file system.
///
/// Arbiter bricks hold only metadata, so their file system is tuned for a
/// very high inode share and the thin pool uses a fixed small chunk size.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrickFormat {
    /// Regular data brick: 512-byte inodes, configured chunk and stripe.
    #[default]
    Standard,
    /// Arbiter brick: `maxpct=100`, 256 KiB chunks, no stripe parameters.
    Arbiter,
}

/// Everything the engine needs to provision or tear down one brick.
///
/// Immutable per call; the same request that created a brick is handed back
/// to destroy it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrickRequest {
    /// Brick identifier; appears as a substring of its mount-table entry.
    pub name: String,
    /// Virtual size of the thin volume, in KiB.
    pub size_kib: u64,
    /// Size of the thin pool, in KiB.  Must be at least `size_kib`.
    pub tp_size_kib: u64,
    /// Thin-pool logical-volume name, shared by bricks in the same pool.
    pub tp_name: String,
    /// This brick's logical-volume name, unique within the volume group.
    pub lv_name: String,
    /// Volume-group identifier; prefixed to form the volume-group name.
    pub vg_id: String,
    /// Mount point of the brick data directory, one level below the
    /// volume's own mount point.
    pub path: String,
    /// Thin-pool metadata size in KiB, passed through to `lvcreate`.
    pub pool_metadata_size_kib: u64,
    /// Group owner of the data directory; `0` leaves the brick root-only.
    #[serde(default)]
    pub gid: u32,
    /// Inode allocation policy.
    #[serde(default)]
    pub format: BrickFormat,
}

/// Result of a successful brick creation.
///
/// Deliberately minimal: the engine writes no persistent state of its own,
/// so the mount-visible path is all the caller needs to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrickInfo {
    /// Mount-visible path of the brick data directory.
    pub path: String,
}

/// One persistent mount-table entry joined against the live mount list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrickMountStatus {
    /// Device path, e.g. `/dev/mapper/vg_x-brick_y`.
    pub device: String,
    /// Where the table says the device belongs.
    pub mount_point: String,
    /// File-system type recorded in the table.
    pub fs_type: String,
    /// Comma-separated mount options recorded in the table.
    pub mount_options: String,
    /// True iff the device currently appears in the live mount list.
    pub mounted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BrickRequest {
        BrickRequest {
            name: "b1".into(),
            size_kib: 1048576,
            tp_size_kib: 1048576,
            tp_name: "tp_b1".into(),
            lv_name: "b1_lv".into(),
            vg_id: "vg01".into(),
            path: "/var/lib/heketi/mounts/vg_vg01/brick_b1/brick".into(),
            pool_metadata_size_kib: 16384,
            gid: 0,
            format: BrickFormat::Standard,
        }
    }

    #[test]
    fn request_serde_roundtrip() {
        let req = request();
        let json = serde_json::to_string(&req).expect("serialize");
        let de: BrickRequest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de.name, req.name);
        assert_eq!(de.tp_size_kib, req.tp_size_kib);
        assert_eq!(de.format, BrickFormat::Standard);
    }

    #[test]
    fn format_defaults_when_absent() {
        let json = r#"{
            "name": "b1",
            "size_kib": 1024,
            "tp_size_kib": 1024,
            "tp_name": "tp_b1",
            "lv_name": "b1_lv",
            "vg_id": "vg01",
            "path": "/mnt/vg_vg01/brick_b1/brick",
            "pool_metadata_size_kib": 16384
        }"#;
        let de: BrickRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(de.format, BrickFormat::Standard);
        assert_eq!(de.gid, 0);
    }

    #[test]
    fn format_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&BrickFormat::Arbiter).expect("serialize"),
            "\"arbiter\""
        );
    }

    #[test]
    fn mount_status_serde_roundtrip() {
        let status = BrickMountStatus {
            device: "/dev/mapper/vg_vg01-b1_lv".into(),
            mount_point: "/var/lib/heketi/mounts/vg_vg01/brick_b1".into(),
            fs_type: "xfs".into(),
            mount_options: "rw,inode64,noatime,nouuid".into(),
            mounted: true,
        };
        let json = serde_json::to_string(&status).expect("serialize");
        let de: BrickMountStatus = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de.device, status.device);
        assert!(de.mounted);
    }
}
