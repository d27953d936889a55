//! Persistent mount-table plumbing.
//!
//! The mount table (one file per host, normally `/etc/fstab`) is the
//! canonical record of which bricks a node expects to have mounted after a
//! reboot.  This module owns the entry format, the shell commands that add
//! and remove entries on the remote node, and the line-level parsing shared
//! with the mount reconciler.
//!
//! Entries under `/run/gluster/` and `/var/run/gluster/` belong to the
//! distributed file-system daemon and are never written or removed by this
//! crate.

/// Mount options recorded for every brick entry.
pub const BRICK_MOUNT_OPTIONS: &str = "rw,inode64,noatime,nouuid";

/// Brick paths below these prefixes have no entry of ours in the table.
pub const EXEMPT_PATH_PREFIXES: [&str; 2] = ["/run/gluster/", "/var/run/gluster/"];

/// True when the brick path is managed by the file-system daemon and the
/// table must not be touched for it.
pub fn is_exempt_path(brick_path: &str) -> bool {
    EXEMPT_PATH_PREFIXES
        .iter()
        .any(|prefix| brick_path.starts_with(prefix))
}

/// The table line recorded for a brick device.
pub fn entry_line(device: &str, mount_path: &str) -> String {
    format!("{device} {mount_path} xfs {BRICK_MOUNT_OPTIONS} 0 0")
}

/// Shell command appending a brick entry to the table.
///
/// A single `>>` write of one line: the shell opens the file with
/// `O_APPEND`, so concurrent appends from other bricks interleave at line
/// granularity and a crash leaves the table either unchanged or with the
/// entry fully present.
pub fn append_command(device: &str, mount_path: &str, fstab_path: &str) -> String {
    format!(
        "echo '{}' >> {}",
        entry_line(device, mount_path),
        fstab_path
    )
}

/// Shell command deleting every table line containing the brick name.
///
/// The name is escaped so regex metacharacters in unusual brick names
/// cannot widen the match to unrelated entries.  `sed -i.save` keeps the
/// previous table next to the rewritten one.
pub fn remove_command(brick_name: &str, fstab_path: &str) -> String {
    format!(
        "sed -i.save '/{}/d' {}",
        escape_pattern(brick_name),
        fstab_path
    )
}

/// Lines of a table or `mount` listing that carry data: trimmed, non-empty,
/// not comments.
pub fn data_lines(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Escape basic-regex metacharacters (and the `/` address delimiter) so the
/// name matches literally inside a `sed` address.
fn escape_pattern(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '.' | '*' | '[' | ']' | '^' | '$' | '/') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
