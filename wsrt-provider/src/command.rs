//! Docker CLI invocation.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use wsrt_core::InfrastructureError;

/// Builder for one `docker` invocation.
#[derive(Debug, Clone)]
pub struct DockerCommand {
    binary: String,
    subcommand: Option<String>,
    args: Vec<String>,
    stdin: Option<String>,
}

impl DockerCommand {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            subcommand: None,
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Sets the subcommand, e.g. `run` or `network`.
    pub fn subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.subcommand = Some(subcommand.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds `flag value` for every value.
    pub fn repeated<I, S>(mut self, flag: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.args.push(flag.to_string());
            self.args.push(value.into());
        }
        self
    }

    /// Feeds `input` to the command's standard input.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Full argument vector, without the binary.
    pub fn argv(&self) -> Vec<String> {
        self.subcommand
            .iter()
            .chain(self.args.iter())
            .cloned()
            .collect()
    }

    pub async fn execute(self) -> Result<(), InfrastructureError> {
        self.execute_with_output().await.map(|_| ())
    }

    /// Runs the command and returns its standard output.
    pub async fn execute_with_output(self) -> Result<String, InfrastructureError> {
        let argv = self.argv();
        debug!("Executing Docker command: {} {}", self.binary, argv.join(" "));

        let mut command = Command::new(&self.binary);
        command
            .args(&argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            InfrastructureError::platform(format!("Failed to execute {}: {e}", self.binary))
        })?;

        if let (Some(input), Some(mut pipe)) = (self.stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(InfrastructureError::platform(format!(
                "'{} {}' failed with {}: {}",
                self.binary,
                argv.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            )))
        }
    }
}
