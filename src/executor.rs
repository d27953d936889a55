//! The remote command executor contract.
//!
//! Every provisioning step in this crate ends up as a shell-level command
//! dispatched to a named host through [`CommandExecutor`].  The engine
//! depends only on this trait; concrete variants are the QUIC-backed
//! [`QuicExecutor`](crate::transport::QuicExecutor) used in production and
//! [`LocalExecutor`] which the node agent wraps to run batches on its own
//! host.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrickError;

/// Outcome of one command within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// The shell command that ran.
    pub command: String,
    /// Stdout on success; stderr on failure (provisioning tools report
    /// their diagnostics there).
    pub output: String,
    /// Raw exit status; `-1` when the process died without one.
    pub exit_status: i32,
    /// True iff the command exited zero.
    pub ok: bool,
}

impl CommandResult {
    /// A zero-exit result carrying the command's stdout.
    pub fn success(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            exit_status: 0,
            ok: true,
        }
    }

    /// A non-zero result carrying the command's stderr.
    pub fn failure(
        command: impl Into<String>,
        output: impl Into<String>,
        exit_status: i32,
    ) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            exit_status,
            ok: false,
        }
    }
}

/// Reduce a batch to its first failure, if any.
///
/// Transport errors dominate upstream (they arrive as the `Err` branch of
/// [`CommandExecutor::exec_commands`] and never reach this helper); here the
/// first non-ok result's output becomes the error message.
pub fn any_error(results: &[CommandResult]) -> Result<(), BrickError> {
    match results.iter().find(|r| !r.ok) {
        Some(r) => Err(BrickError::CommandFailed {
            command: r.command.clone(),
            output: r.output.clone(),
        }),
        None => Ok(()),
    }
}

/// Dispatch capability for ordered command batches.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `commands` sequentially on `host`, each bounded by
    /// `timeout_secs`.
    ///
    /// Execution stops at the first failing command; commands after it are
    /// not run and produce no results.  `Err` means the batch may never
    /// have reached the host ([`BrickError::Transport`]); per-command
    /// failures are `Ok` results with `ok == false`.
    async fn exec_commands(
        &self,
        host: &str,
        commands: &[String],
        timeout_secs: u64,
    ) -> Result<Vec<CommandResult>, BrickError>;
}

/// Executor that runs batches on the local host through `sh -c`.
///
/// The `host` argument is ignored.  This is the execution half of the node
/// agent: [`AgentServer`](crate::transport::AgentServer) receives a batch
/// over QUIC and hands it here.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalExecutor;

impl LocalExecutor {
    async fn run_one(&self, command: &str, timeout_secs: u64) -> CommandResult {
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output();

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child).await {
            Err(_) => CommandResult::failure(
                command,
                format!("timed out after {timeout_secs}s"),
                -1,
            ),
            Ok(Err(e)) => CommandResult::failure(command, e.to_string(), -1),
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                if output.status.success() {
                    CommandResult::success(
                        command,
                        String::from_utf8_lossy(&output.stdout).into_owned(),
                    )
                } else {
                    CommandResult::failure(
                        command,
                        String::from_utf8_lossy(&output.stderr).into_owned(),
                        code,
                    )
                }
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn exec_commands(
        &self,
        _host: &str,
        commands: &[String],
        timeout_secs: u64,
    ) -> Result<Vec<CommandResult>, BrickError> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.run_one(command, timeout_secs).await;
            let ok = result.ok;
            results.push(result);
            if !ok {
                break;
            }
        }
        Ok(results)
    }
}

/// In-memory scripted executor used by the engine test suites.
///
/// Commands are matched against scripted rules in insertion order by
/// substring; the first match decides the outcome.  Unmatched commands
/// succeed with empty output.  Every dispatched batch is recorded for
/// later inspection.
#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{CommandExecutor, CommandResult};
    use crate::error::BrickError;

    #[derive(Debug, Clone)]
    pub struct RecordedBatch {
        pub host: String,
        pub commands: Vec<String>,
        pub timeout_secs: u64,
    }

    enum Outcome {
        Output(String),
        Fail(String),
        Transport(String),
    }

    struct Rule {
        pattern: String,
        outcome: Outcome,
    }

    #[derive(Default)]
    pub struct ScriptedExecutor {
        rules: Mutex<Vec<Rule>>,
        batches: Mutex<Vec<RecordedBatch>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Commands containing `pattern` succeed with `output` as stdout.
        pub fn script_output(&self, pattern: &str, output: &str) {
            self.push(pattern, Outcome::Output(output.to_owned()));
        }

        /// Commands containing `pattern` fail with `stderr` and exit 1.
        pub fn script_failure(&self, pattern: &str, stderr: &str) {
            self.push(pattern, Outcome::Fail(stderr.to_owned()));
        }

        /// Batches whose first matching command contains `pattern` fail at
        /// the transport level.
        pub fn script_transport_error(&self, pattern: &str, message: &str) {
            self.push(pattern, Outcome::Transport(message.to_owned()));
        }

        pub fn batches(&self) -> Vec<RecordedBatch> {
            self.batches.lock().expect("batch log poisoned").clone()
        }

        /// All dispatched commands across batches, in order.
        pub fn commands(&self) -> Vec<String> {
            self.batches()
                .into_iter()
                .flat_map(|b| b.commands)
                .collect()
        }

        fn push(&self, pattern: &str, outcome: Outcome) {
            self.rules.lock().expect("rules poisoned").push(Rule {
                pattern: pattern.to_owned(),
                outcome,
            });
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn exec_commands(
            &self,
            host: &str,
            commands: &[String],
            timeout_secs: u64,
        ) -> Result<Vec<CommandResult>, BrickError> {
            self.batches
                .lock()
                .expect("batch log poisoned")
                .push(RecordedBatch {
                    host: host.to_owned(),
                    commands: commands.to_vec(),
                    timeout_secs,
                });

            let rules = self.rules.lock().expect("rules poisoned");
            let mut results = Vec::with_capacity(commands.len());
            for command in commands {
                let matched = rules.iter().find(|r| command.contains(&r.pattern));
                match matched.map(|r| &r.outcome) {
                    Some(Outcome::Transport(message)) => {
                        return Err(BrickError::Transport(message.clone()));
                    }
                    Some(Outcome::Fail(stderr)) => {
                        results.push(CommandResult::failure(command, stderr.clone(), 1));
                        return Ok(results);
                    }
                    Some(Outcome::Output(stdout)) => {
                        results.push(CommandResult::success(command, stdout.clone()));
                    }
                    None => results.push(CommandResult::success(command, "")),
                }
            }
            Ok(results)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_error_passes_clean_batches() {
        let results = vec![
            CommandResult::success("mkdir -p /mnt/a", ""),
            CommandResult::success("mount /dev/x /mnt/a", ""),
        ];
        assert!(any_error(&results).is_ok());
    }

    #[test]
    fn any_error_reports_first_failure() {
        let results = vec![
            CommandResult::success("mkdir -p /mnt/a", ""),
            CommandResult::failure("mkfs.xfs /dev/x", "mkfs.xfs: no such device", 1),
            CommandResult::failure("mount /dev/x /mnt/a", "never ran", -1),
        ];
        let err = any_error(&results).expect_err("batch had a failure");
        match err {
            BrickError::CommandFailed { command, output } => {
                assert_eq!(command, "mkfs.xfs /dev/x");
                assert_eq!(output, "mkfs.xfs: no such device");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn local_executor_captures_stdout() {
        let results = LocalExecutor
            .exec_commands("ignored", &["echo brick-ok".to_owned()], 5)
            .await
            .expect("local batch");
        assert_eq!(results.len(), 1);
        assert!(results[0].ok);
        assert_eq!(results[0].output.trim(), "brick-ok");
    }

    #[tokio::test]
    async fn local_executor_stops_at_first_failure() {
        let commands = vec![
            "true".to_owned(),
            "ls /definitely/not/found/anywhere".to_owned(),
            "echo unreachable".to_owned(),
        ];
        let results = LocalExecutor
            .exec_commands("ignored", &commands, 5)
            .await
            .expect("local batch");
        assert_eq!(results.len(), 2);
        assert!(results[0].ok);
        assert!(!results[1].ok);
        assert!(any_error(&results).is_err());
    }

    #[tokio::test]
    async fn local_executor_failure_carries_stderr() {
        let results = LocalExecutor
            .exec_commands("ignored", &["echo oops >&2; exit 3".to_owned()], 5)
            .await
            .expect("local batch");
        assert!(!results[0].ok);
        assert_eq!(results[0].exit_status, 3);
        assert_eq!(results[0].output.trim(), "oops");
    }

    #[tokio::test]
    async fn local_executor_times_out_as_command_failure() {
        let results = LocalExecutor
            .exec_commands("ignored", &["sleep 5".to_owned()], 1)
            .await
            .expect("timeouts are per-command failures, not transport errors");
        assert!(!results[0].ok);
        assert!(results[0].output.contains("timed out"));
    }

    #[tokio::test]
    async fn local_executor_appends_atomically() {
        // the fstab append helper relies on `>>` being a single O_APPEND
        // write per line
        let dir = tempfile::tempdir().expect("tempdir");
        let table = dir.path().join("fstab");
        let table_str = table.to_string_lossy().into_owned();
        let commands = vec![
            format!("echo '/dev/mapper/vg_a-b /mnt/a xfs rw 0 0' >> {table_str}"),
            format!("echo '/dev/mapper/vg_a-c /mnt/c xfs rw 0 0' >> {table_str}"),
        ];
        LocalExecutor
            .exec_commands("ignored", &commands, 5)
            .await
            .expect("local batch");
        let contents = std::fs::read_to_string(&table).expect("read table");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("/dev/mapper/vg_a-b"));
        assert!(lines[1].starts_with("/dev/mapper/vg_a-c"));
    }

    #[tokio::test]
    async fn scripted_executor_matches_in_insertion_order() {
        use mock::ScriptedExecutor;

        let exec = ScriptedExecutor::new();
        exec.script_failure("umount", "umount: target is busy");
        exec.script_output("mount", "/dev/sda1 on / type ext4 (rw)");

        let results = exec
            .exec_commands("node-1", &["umount /mnt/b".to_owned()], 5)
            .await
            .expect("scripted batch");
        assert!(!results[0].ok);

        let results = exec
            .exec_commands("node-1", &["mount".to_owned()], 5)
            .await
            .expect("scripted batch");
        assert!(results[0].ok);
        assert!(results[0].output.contains("ext4"));

        assert_eq!(exec.batches().len(), 2);
        assert_eq!(exec.batches()[0].host, "node-1");
    }
}
