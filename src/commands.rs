//! Hook command execution
//!
//! Runs the before/after hook commands of an artifact target. Commands are
//! shell strings executed sequentially; the list stops at the first failure.
//! Failures are logged, never propagated — a broken hook must not take the
//! fetch pipeline down with it.

use std::process::Output;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Outcome of one executed hook command
#[derive(Clone, Debug)]
pub struct CommandResult {
    /// The shell command string that was run
    pub command: String,
    /// Exit code, or `None` if the command was killed by a signal or never spawned
    pub exit_code: Option<i32>,
    /// Combined standard output and standard error
    pub output: String,
}

impl CommandResult {
    /// Whether the command ran and exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Sequential shell command runner for before/after hooks
pub struct CommandRunner;

impl CommandRunner {
    /// Run each command as `sh -c <command>`, in order
    ///
    /// The process environment is inherited and extended by `extra_env`.
    /// Execution stops at the first non-zero exit (or spawn failure);
    /// remaining commands are skipped. Every command's exit code and captured
    /// output is logged regardless of success.
    ///
    /// Returns one [`CommandResult`] per command actually attempted.
    pub async fn run_all(commands: &[String], extra_env: &[(String, String)]) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            debug!(cmd = %command, "running command");

            let output = Command::new("sh")
                .arg("-c")
                .arg(command)
                .envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .output()
                .await;

            match output {
                Ok(output) => {
                    let result = Self::record(command, &output);
                    let failed = !result.success();
                    results.push(result);
                    if failed {
                        break;
                    }
                }
                Err(e) => {
                    error!(cmd = %command, error = %e, "failed to spawn command");
                    results.push(CommandResult {
                        command: command.clone(),
                        exit_code: None,
                        output: e.to_string(),
                    });
                    break;
                }
            }
        }

        results
    }

    fn record(command: &str, output: &Output) -> CommandResult {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code();

        if output.status.success() {
            info!(cmd = %command, code = ?exit_code, out = %combined, "command output");
        } else {
            error!(cmd = %command, code = ?exit_code, out = %combined, "error running command");
        }

        CommandResult {
            command: command.to_string(),
            exit_code,
            output: combined,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_at_first_failing_command() {
        let commands = vec![
            "true".to_string(),
            "false".to_string(),
            "echo should-not-run".to_string(),
        ];

        let results = CommandRunner::run_all(&commands, &[]).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].success());
        assert_eq!(results[1].exit_code, Some(1));
        assert!(!results.iter().any(|r| r.output.contains("should-not-run")));
    }

    #[tokio::test]
    async fn captures_combined_output() {
        let commands = vec!["echo to-stdout; echo to-stderr >&2".to_string()];

        let results = CommandRunner::run_all(&commands, &[]).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success());
        assert!(results[0].output.contains("to-stdout"));
        assert!(results[0].output.contains("to-stderr"));
    }

    #[tokio::test]
    async fn extra_env_is_visible_to_commands() {
        let commands = vec!["printf '%s' \"$ARTIFACT_NAME\"".to_string()];
        let env = vec![("ARTIFACT_NAME".to_string(), "dist".to_string())];

        let results = CommandRunner::run_all(&commands, &env).await;

        assert_eq!(results[0].output, "dist");
    }

    #[tokio::test]
    async fn inherited_environment_is_preserved() {
        // PATH comes from the parent process, not extra_env
        let commands = vec!["command -v sh".to_string()];

        let results = CommandRunner::run_all(&commands, &[]).await;

        assert!(results[0].success());
        assert!(!results[0].output.trim().is_empty());
    }
}
