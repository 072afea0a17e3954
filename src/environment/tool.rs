//! Dump and restore primitives
//!
//! The primitives are opaque external programs. dbvault only spawns them,
//! streams bytes through their stdio and checks the exit status.

use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::config::DatabaseTarget;
use crate::error::{VaultError, VaultResult};

use super::ExecutionEnvironment;

/// Executor for the dump and restore primitives
pub trait DatabaseTool {
    /// Short description of where the primitives run
    fn describe(&self) -> String;

    /// Stream a logical dump of the database into `sink`
    ///
    /// Fails with [`VaultError::PrimitiveFailed`] on a non-zero exit, even if
    /// bytes were already written.
    fn dump(&self, sink: &mut dyn Write) -> VaultResult<()>;

    /// Apply a logical dump read from `source` to the database
    fn restore(&self, source: &mut dyn Read) -> VaultResult<()>;
}

/// Runs `pg_dump` and `psql` as subprocesses
#[derive(Debug, Clone)]
pub struct CommandTool {
    environment: ExecutionEnvironment,
    target: DatabaseTarget,
}

impl CommandTool {
    pub fn new(environment: ExecutionEnvironment, target: DatabaseTarget) -> Self {
        Self {
            environment,
            target,
        }
    }

    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.environment
    }

    /// Build a command for `program` in the resolved environment
    fn base_command(&self, program: &str) -> Command {
        match &self.environment {
            ExecutionEnvironment::Containerized { runtime, container } => {
                let mut cmd = Command::new(runtime);
                cmd.args(["exec", "-i"]).arg(container).arg(program);
                cmd
            }
            ExecutionEnvironment::NativeClient {
                host,
                port,
                password,
                ..
            } => {
                let mut cmd = Command::new(program);
                cmd.arg("-h").arg(host).arg("-p").arg(port.to_string());
                if let Some(password) = password {
                    cmd.env("PGPASSWORD", password.as_str());
                }
                cmd
            }
        }
    }

    fn user(&self) -> &str {
        match &self.environment {
            ExecutionEnvironment::NativeClient { user, .. } => user,
            ExecutionEnvironment::Containerized { .. } => &self.target.user,
        }
    }

    pub(crate) fn dump_command(&self) -> Command {
        let mut cmd = self.base_command("pg_dump");
        cmd.arg("-U")
            .arg(self.user())
            .args(["--no-owner", "--no-privileges"])
            .arg(&self.target.name);
        cmd
    }

    pub(crate) fn restore_command(&self) -> Command {
        let mut cmd = self.base_command("psql");
        cmd.args(["-v", "ON_ERROR_STOP=1", "--quiet"])
            .arg("-U")
            .arg(self.user())
            .arg("-d")
            .arg(&self.target.name);
        cmd
    }
}

impl DatabaseTool for CommandTool {
    fn describe(&self) -> String {
        self.environment.to_string()
    }

    fn dump(&self, sink: &mut dyn Write) -> VaultResult<()> {
        let mut cmd = self.dump_command();
        let label = command_line(&cmd);
        tracing::debug!(command = %label, "starting dump");

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VaultError::Io(format!("Failed to start {}: {}", label, e)))?;

        let stderr = drain_stderr(&mut child);

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, sink).map(|_| ()),
            None => Ok(()),
        };

        if let Err(e) = copied {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stderr.join();
            return Err(VaultError::WriteFailed(format!(
                "Failed to stream output of {}: {}",
                label, e
            )));
        }

        let status = child.wait()?;
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(VaultError::PrimitiveFailed {
                command: label,
                status,
                stderr,
            });
        }

        Ok(())
    }

    fn restore(&self, source: &mut dyn Read) -> VaultResult<()> {
        let mut cmd = self.restore_command();
        let label = command_line(&cmd);
        tracing::debug!(command = %label, "starting restore");

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VaultError::Io(format!("Failed to start {}: {}", label, e)))?;

        let stderr = drain_stderr(&mut child);

        // stdin is closed when it drops at the end of this block
        let fed = match child.stdin.take() {
            Some(mut stdin) => io::copy(source, &mut stdin).map(|_| ()),
            None => Ok(()),
        };

        let status = child.wait()?;
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(VaultError::PrimitiveFailed {
                command: label,
                status,
                stderr,
            });
        }

        fed.map_err(|e| VaultError::Io(format!("Failed to feed {}: {}", label, e)))
    }
}

/// Read the child's stderr on a helper thread so a chatty primitive cannot
/// block on a full pipe while we are streaming stdout.
fn drain_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut text);
        }
        text
    })
}

/// Render a command for logs and error messages
fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
