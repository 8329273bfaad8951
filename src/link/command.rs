//! Running external commands.
//!
//! Platform queries (`iw`, `netsh`, `airport`, `ping`) go through the
//! [`CommandAdapter`] trait so tests can substitute canned output.

use log::debug;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default bound on a single external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a command produced no output.
#[derive(Debug)]
pub enum CommandError {
    EmptyCommand,
    /// The program could not be started (usually not installed).
    Spawn {
        program: String,
        source: io::Error,
    },
    Timeout {
        program: String,
        timeout: Duration,
    },
    Io(io::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::EmptyCommand => write!(f, "empty command line"),
            CommandError::Spawn { program, source } => {
                write!(f, "failed to start '{}': {}", program, source)
            }
            CommandError::Timeout { program, timeout } => write!(
                f,
                "'{}' timed out after {} ms",
                program,
                timeout.as_millis()
            ),
            CommandError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Spawn { source, .. } => Some(source),
            CommandError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs a command line, `args[0]` being the program.
#[allow(async_fn_in_trait)]
pub trait CommandAdapter {
    async fn run_command(&self, args: &[String]) -> Result<CommandOutput, CommandError>;
}

impl<T: CommandAdapter> CommandAdapter for &T {
    async fn run_command(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        (**self).run_command(args).await
    }
}

/// Spawns real processes with a bounded wait.
#[derive(Debug, Clone)]
pub struct SystemCommandAdapter {
    timeout: Duration,
}

impl SystemCommandAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandAdapter for SystemCommandAdapter {
    async fn run_command(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        let (program, rest) = args.split_first().ok_or(CommandError::EmptyCommand)?;

        debug!("Running {:?} (timeout {:?})", args, self.timeout);

        // The child is killed if the timeout drops the wait future.
        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CommandError::Io(e)),
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Test doubles for [`CommandAdapter`].
pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum Canned {
        Output(CommandOutput),
        Missing,
        Timeout,
    }

    /// Returns canned output keyed by program name and records every call.
    ///
    /// Unknown programs fail to spawn, as they would on a machine without
    /// the tool installed.
    #[derive(Debug, Default)]
    pub struct CannedCommandAdapter {
        responses: Mutex<HashMap<String, Canned>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl CannedCommandAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        fn insert(&self, program: &str, canned: Canned) {
            if let Ok(mut responses) = self.responses.lock() {
                responses.insert(program.to_string(), canned);
            }
        }

        /// Answer `program` with exit code 0 and the given stdout.
        pub fn with_stdout(self, program: &str, stdout: &str) -> Self {
            self.insert(
                program,
                Canned::Output(CommandOutput {
                    exit_code: Some(0),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            );
            self
        }

        pub fn with_output(self, program: &str, output: CommandOutput) -> Self {
            self.insert(program, Canned::Output(output));
            self
        }

        /// Make `program` exceed its time bound.
        pub fn with_timeout(self, program: &str) -> Self {
            self.insert(program, Canned::Timeout);
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl CommandAdapter for CannedCommandAdapter {
        async fn run_command(
            &self,
            args: &[String],
        ) -> Result<CommandOutput, CommandError> {
            let program = args.first().ok_or(CommandError::EmptyCommand)?.clone();

            if let Ok(mut calls) = self.calls.lock() {
                calls.push(args.to_vec());
            }

            let canned = self
                .responses
                .lock()
                .ok()
                .and_then(|responses| responses.get(&program).cloned())
                .unwrap_or(Canned::Missing);

            match canned {
                Canned::Output(output) => Ok(output),
                Canned::Missing => Err(CommandError::Spawn {
                    program,
                    source: io::Error::new(io::ErrorKind::NotFound, "not found"),
                }),
                Canned::Timeout => Err(CommandError::Timeout {
                    program,
                    timeout: DEFAULT_COMMAND_TIMEOUT,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::CannedCommandAdapter;
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let adapter = SystemCommandAdapter::default();
        let result = adapter.run_command(&[]).await;
        assert!(matches!(result, Err(CommandError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let adapter = SystemCommandAdapter::default();
        let result = adapter
            .run_command(&argv(&["definitely-not-a-real-program-xyz"]))
            .await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let adapter = SystemCommandAdapter::default();
        let output = adapter
            .run_command(&argv(&["sh", "-c", "echo 'SSID: lab'; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "SSID: lab");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        let adapter = SystemCommandAdapter::new(Duration::from_millis(100));
        let result = adapter.run_command(&argv(&["sleep", "5"])).await;
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_canned_adapter_records_calls() {
        let adapter = CannedCommandAdapter::new().with_stdout("iw", "SSID: home\n");

        let output = adapter.run_command(&argv(&["iw", "dev", "wlan0", "link"])).await;
        assert_eq!(output.unwrap().stdout, "SSID: home\n");

        let missing = adapter.run_command(&argv(&["netsh"])).await;
        assert!(matches!(missing, Err(CommandError::Spawn { .. })));

        assert_eq!(adapter.calls().len(), 2);
        assert_eq!(adapter.calls()[0], argv(&["iw", "dev", "wlan0", "link"]));
    }
}
