//! LVM thin-pool brick backend.
//!
//! [`LvmBackend`] implements [`BrickLifecycle`] by translating each request
//! into an ordered batch of shell-level provisioning commands and pushing
//! them through a [`CommandExecutor`].  Creation is one strictly ordered
//! batch with compensating teardown on failure; destruction is a sequence
//! of independently absence-tolerant steps.
//!
//! # Ordering
//!
//! The persistent mount-table entry is written *before* the live mount and
//! removed *before* any logical-volume removal: a node that reboots while
//! the manager (or the node itself) died mid-operation must never find a
//! table entry pointing at a device that no longer exists.

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::config::BrickConfig;
use crate::error::BrickError;
use crate::executor::{any_error, CommandExecutor, CommandResult};
use crate::fstab;
use crate::lifecycle::BrickLifecycle;
use crate::paths;
use crate::types::{BrickFormat, BrickInfo, BrickMountStatus, BrickRequest};

/// Brick lifecycle engine over LVM thin pools and XFS.
pub struct LvmBackend<E> {
    executor: E,
    config: BrickConfig,
}

impl<E: CommandExecutor> LvmBackend<E> {
    /// Create a new backend dispatching through `executor`.
    pub fn new(executor: E, config: BrickConfig) -> Self {
        Self { executor, config }
    }

    fn check_create_request(&self, host: &str, brick: &BrickRequest) -> Result<(), BrickError> {
        if host.is_empty() {
            return Err(BrickError::InvalidArgument("host must not be empty".into()));
        }
        if brick.name.is_empty() {
            return Err(BrickError::InvalidArgument(
                "brick name must not be empty".into(),
            ));
        }
        if brick.vg_id.is_empty() {
            return Err(BrickError::InvalidArgument(
                "volume group id must not be empty".into(),
            ));
        }
        if brick.path.is_empty() {
            return Err(BrickError::InvalidArgument(
                "brick path must not be empty".into(),
            ));
        }
        if brick.size_kib == 0 {
            return Err(BrickError::InvalidArgument(
                "brick size must be positive".into(),
            ));
        }
        if brick.tp_size_kib < brick.size_kib {
            return Err(BrickError::InvalidArgument(
                "thin pool must be at least as large as the brick".into(),
            ));
        }
        if self.config.fstab_path.is_empty() {
            return Err(BrickError::InvalidArgument(
                "fstab path is not configured".into(),
            ));
        }
        Ok(())
    }

    fn check_destroy_request(&self, host: &str, brick: &BrickRequest) -> Result<(), BrickError> {
        if host.is_empty() {
            return Err(BrickError::InvalidArgument("host must not be empty".into()));
        }
        for (value, what) in [
            (&brick.name, "brick name"),
            (&brick.vg_id, "volume group id"),
            (&brick.path, "brick path"),
            (&brick.tp_name, "thin pool name"),
            (&brick.lv_name, "logical volume name"),
        ] {
            if value.is_empty() {
                return Err(BrickError::InvalidArgument(format!(
                    "{what} must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// The strictly ordered creation batch for one brick.
    fn create_commands(&self, brick: &BrickRequest) -> Vec<String> {
        let mount_path = paths::brick_mount_from_path(&brick.path);
        let devnode = paths::brick_dev_node(&brick.vg_id, &brick.lv_name);
        let vg = paths::vg_name(&brick.vg_id);

        let (xfs_inode_options, lv_chunk_size, xfs_su, xfs_sw) = match brick.format {
            // arbiter bricks hold metadata only: everything inodes, small
            // fixed chunks, no striping
            BrickFormat::Arbiter => ("maxpct=100".to_owned(), "256K".to_owned(), 0, 0),
            BrickFormat::Standard => (
                "size=512".to_owned(),
                self.config.lv_chunk_size.clone(),
                self.config.xfs_su,
                self.config.xfs_sw,
            ),
        };

        let mkfs_xfs = if xfs_su == 0 || xfs_sw == 0 {
            format!("mkfs.xfs -i {xfs_inode_options} -n size=8192 {devnode}")
        } else {
            format!(
                "mkfs.xfs -i {xfs_inode_options} -d su={xfs_su},sw={xfs_sw} -n size=8192 {devnode}"
            )
        };

        let mut commands = vec![
            format!("mkdir -p {mount_path}"),
            format!(
                "lvcreate -qq --autobackup={} --poolmetadatasize {}K --chunksize {} \
                 --size {}K --thin {}/{} --virtualsize {}K --name {}",
                autobackup(self.config.backup_lvm),
                brick.pool_metadata_size_kib,
                lv_chunk_size,
                brick.tp_size_kib,
                vg,
                brick.tp_name,
                brick.size_kib,
                brick.lv_name,
            ),
            mkfs_xfs,
            // table entry goes in before the live mount so a reboot after a
            // crash finds a consistent record
            fstab::append_command(&devnode, &mount_path, &self.config.fstab_path),
            format!("mount -o {} {devnode} {mount_path}", fstab::BRICK_MOUNT_OPTIONS),
            format!("mkdir {}", brick.path),
        ];

        // gid 0 leaves the brick writable by root alone
        if brick.gid != 0 {
            commands.push(format!("chown :{} {}", brick.gid, brick.path));
            commands.push(format!("chmod 2775 {}", brick.path));
        }

        commands
    }

    async fn exec_checked(
        &self,
        host: &str,
        commands: &[String],
        timeout_secs: u64,
    ) -> Result<Vec<CommandResult>, BrickError> {
        let results = self.executor.exec_commands(host, commands, timeout_secs).await?;
        any_error(&results)?;
        Ok(results)
    }

    /// Unmount the brick data path, clearing the error when the live mount
    /// list shows the path is not mounted at all.
    async fn unmount_brick(&self, host: &str, brick: &BrickRequest) -> Option<BrickError> {
        let timeout = self.config.query_timeout_secs;
        let commands = vec![format!("umount {}", brick.path)];
        let umount_err = match self.exec_checked(host, &commands, timeout).await {
            Ok(_) => return None,
            Err(e) => e,
        };
        warn!(error = %umount_err, path = %brick.path, "unmount failed, checking live mounts");

        match self.exec_checked(host, &["mount".to_owned()], timeout).await {
            Ok(results)
                if results
                    .first()
                    .is_some_and(|r| !r.output.contains(brick.path.as_str())) =>
            {
                warn!(path = %brick.path, "brick path not mounted, assuming deleted");
                return None;
            }
            _ => {}
        }

        if self.config.debug_umount_failures {
            // grab who keeps the path open for operator triage
            let commands = vec![format!("lsof {}", brick.path)];
            if let Ok(results) = self.executor.exec_commands(host, &commands, timeout).await {
                if let Some(r) = results.first() {
                    warn!(path = %brick.path, open_handles = %r.output, "brick path kept open");
                }
            }
        }

        Some(umount_err)
    }

    /// Remove the brick's entry from the persistent mount table.
    ///
    /// Always runs before any logical-volume removal; see the module docs
    /// for the boot-safety ordering.  Paths managed by the file-system
    /// daemon have no entry of ours and are skipped entirely.
    async fn remove_from_fstab(&self, host: &str, brick: &BrickRequest) -> Result<(), BrickError> {
        if fstab::is_exempt_path(&brick.path) {
            return Ok(());
        }
        let commands = vec![fstab::remove_command(&brick.name, &self.config.fstab_path)];
        if let Err(e) = self
            .exec_checked(host, &commands, self.config.query_timeout_secs)
            .await
        {
            error!(error = %e, brick = %brick.name, "mount table entry removal failed");
            return Err(e);
        }
        Ok(())
    }

    async fn delete_brick_lv(&self, host: &str, lv: &str) -> Result<(), BrickError> {
        let commands = vec![format!(
            "lvremove --autobackup={} -f {lv}",
            autobackup(self.config.backup_lvm)
        )];
        self.exec_checked(host, &commands, self.config.query_timeout_secs)
            .await?;
        Ok(())
    }

    /// Number of thin volumes still carved out of `pool`.
    async fn count_thin_lvs(&self, host: &str, pool: &str) -> Result<u64, BrickError> {
        let commands = vec![format!("lvs --noheadings --options=thin_count {pool}")];
        let results = self
            .exec_checked(host, &commands, self.config.query_timeout_secs)
            .await?;
        let raw = results
            .first()
            .map(|r| r.output.trim().to_owned())
            .unwrap_or_default();
        raw.parse::<u64>()
            .map_err(|e| BrickError::PoolCountUnreadable {
                pool: pool.to_owned(),
                host: host.to_owned(),
                reason: format!("bad thin count {raw:?}: {e}"),
            })
    }
}

#[async_trait]
impl<E: CommandExecutor> BrickLifecycle for LvmBackend<E> {
    #[instrument(skip(self, brick), fields(brick = %brick.name))]
    async fn create_brick(
        &self,
        host: &str,
        brick: &BrickRequest,
    ) -> Result<BrickInfo, BrickError> {
        self.check_create_request(host, brick)?;

        let commands = self.create_commands(brick);
        if let Err(e) = self
            .exec_checked(host, &commands, self.config.provision_timeout_secs)
            .await
        {
            warn!(error = %e, "brick creation failed, tearing partial state down");
            if let Err(cleanup) = self.destroy_brick(host, brick).await {
                warn!(error = %cleanup, "compensating teardown incomplete");
            }
            return Err(e);
        }

        info!(path = %brick.path, "brick created");
        Ok(BrickInfo {
            path: brick.path.clone(),
        })
    }

    #[instrument(skip(self, brick), fields(brick = %brick.name))]
    async fn destroy_brick(&self, host: &str, brick: &BrickRequest) -> Result<bool, BrickError> {
        self.check_destroy_request(host, brick)?;

        let mut space_reclaimed = false;
        let timeout = self.config.query_timeout_secs;

        let umount_err = self.unmount_brick(host, brick).await;

        // the table entry goes first even when the unmount failed, so the
        // brick cannot be re-mounted on the next reboot
        let table_err = self.remove_from_fstab(host, brick).await.err();

        // no point continuing if either half failed; recovery needs to know
        // something went wrong. The unmount failure outranks the table
        // error when both are present.
        if let Some(e) = umount_err.or(table_err) {
            return Err(e);
        }

        let vg = paths::vg_name(&brick.vg_id);
        let lv = format!("{vg}/{}", brick.lv_name);
        let tp = format!("{vg}/{}", brick.tp_name);

        if let Err(e) = self.delete_brick_lv(host, &lv).await {
            if e.is_absent() {
                warn!(lv = %lv, "did not delete missing logical volume");
            } else {
                return Err(e);
            }
        }

        let thin_count = match self.count_thin_lvs(host, &tp).await {
            Ok(count) => count,
            Err(e) if e.is_absent() => {
                // a missing pool hosts nothing
                warn!(pool = %tp, "unable to count thin volumes in missing pool");
                0
            }
            Err(e) => {
                error!(error = %e, pool = %tp, "thin volume count failed");
                return Err(match e {
                    unreadable @ BrickError::PoolCountUnreadable { .. } => unreadable,
                    other => BrickError::PoolCountUnreadable {
                        pool: tp,
                        host: host.to_owned(),
                        reason: other.to_string(),
                    },
                });
            }
        };

        // the pool is shared; only the last brick out turns the lights off
        if thin_count == 0 {
            let commands = vec![format!(
                "lvremove --autobackup={} -f {tp}",
                autobackup(self.config.backup_lvm)
            )];
            match self.exec_checked(host, &commands, timeout).await {
                Ok(_) => space_reclaimed = true,
                Err(e) if e.is_absent() => {
                    warn!(pool = %tp, "did not delete missing thin pool");
                    space_reclaimed = true;
                }
                Err(e) => {
                    // the brick itself is gone; a pool-cleanup hiccup is an
                    // operator problem, not a caller error
                    error!(error = %e, pool = %tp, "thin pool removal failed");
                }
            }
        }

        let commands = vec![format!("rmdir {}", brick.path)];
        if let Err(e) = self.exec_checked(host, &commands, timeout).await {
            warn!(error = %e, path = %brick.path, "mount point cleanup failed");
        }

        info!(space_reclaimed, "brick destroyed");
        Ok(space_reclaimed)
    }

    #[instrument(skip(self))]
    async fn brick_mount_status(&self, host: &str) -> Result<Vec<BrickMountStatus>, BrickError> {
        if host.is_empty() {
            return Err(BrickError::InvalidArgument("host must not be empty".into()));
        }

        let commands = vec![
            "mount".to_owned(),
            format!("cat {}", self.config.fstab_path),
        ];
        let results = match self
            .exec_checked(host, &commands, self.config.query_timeout_secs)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "unable to get mount status for bricks");
                return Err(e);
            }
        };
        let (live, table) = match (results.first(), results.get(1)) {
            (Some(live), Some(table)) => (live, table),
            _ => {
                return Err(BrickError::internal(
                    "mount status batch returned too few results",
                ))
            }
        };

        let mounted_devices: std::collections::HashSet<&str> = fstab::data_lines(&live.output)
            .filter_map(|line| line.split_whitespace().next())
            .collect();

        let mut statuses = Vec::new();
        for line in fstab::data_lines(&table.output) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                warn!(line, "skipping malformed mount table entry");
                continue;
            }
            statuses.push(BrickMountStatus {
                device: fields[0].to_owned(),
                mount_point: fields[1].to_owned(),
                fs_type: fields[2].to_owned(),
                mount_options: fields[3].to_owned(),
                mounted: mounted_devices.contains(fields[0]),
            });
        }

        Ok(statuses)
    }
}

fn autobackup(backup_lvm: bool) -> &'static str {
    if backup_lvm {
        "y"
    } else {
        "n"
    }
}
