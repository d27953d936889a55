//! Identifier-to-path derivation.
//!
//! Pure functions mapping volume-group ids and logical-volume names to the
//! device nodes, mount paths, and volume-group names the provisioning
//! commands operate on.  The provisioner and destroyer both rely on these
//! producing identical results for the same inputs, so all naming lives
//! here and nowhere else.
//!
//! Identifiers are assumed non-empty; the lifecycle entry points reject
//! empty ones before any derivation happens.

use std::path::Path;

/// Prefix joined with a volume-group id to form the volume-group name.
pub const VG_PREFIX: &str = "vg_";

/// Volume-group name for a volume-group id: `vg_<id>`.
pub fn vg_name(vg_id: &str) -> String {
    format!("{VG_PREFIX}{vg_id}")
}

/// Device node of a brick's thin volume.
///
/// Device-mapper concatenates the volume-group and logical-volume names
/// with a single dash and doubles every dash inside either name, so
/// `vg_a-b/lv` maps to `/dev/mapper/vg_a--b-lv`.
pub fn brick_dev_node(vg_id: &str, lv_name: &str) -> String {
    format!(
        "/dev/mapper/{}-{}",
        dm_escape(&vg_name(vg_id)),
        dm_escape(lv_name)
    )
}

/// Mount point of the formatted volume: the parent directory of the brick
/// data path.
pub fn brick_mount_from_path(brick_path: &str) -> String {
    Path::new(brick_path)
        .parent()
        .unwrap_or_else(|| Path::new("/"))
        .to_string_lossy()
        .into_owned()
}

fn dm_escape(name: &str) -> String {
    name.replace('-', "--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vg_name_prefixes_id() {
        assert_eq!(vg_name("vg01"), "vg_vg01");
        assert_eq!(vg_name("4b2a"), "vg_4b2a");
    }

    #[test]
    fn dev_node_joins_vg_and_lv() {
        assert_eq!(
            brick_dev_node("vg01", "b1_lv"),
            "/dev/mapper/vg_vg01-b1_lv"
        );
    }

    #[test]
    fn dev_node_doubles_dashes() {
        assert_eq!(
            brick_dev_node("vg-01", "brick-1"),
            "/dev/mapper/vg_vg--01-brick--1"
        );
    }

    #[test]
    fn mount_path_is_parent_of_data_dir() {
        assert_eq!(
            brick_mount_from_path("/var/lib/heketi/mounts/vg_vg01/brick_b1/brick"),
            "/var/lib/heketi/mounts/vg_vg01/brick_b1"
        );
    }

    #[test]
    fn mount_path_of_shallow_path() {
        assert_eq!(brick_mount_from_path("/brick"), "/");
    }

    #[test]
    fn derivation_is_deterministic() {
        // create and destroy must agree on every derived name
        assert_eq!(
            brick_dev_node("vg01", "b1_lv"),
            brick_dev_node("vg01", "b1_lv")
        );
    }
}
