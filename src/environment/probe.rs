//! Read-only probes used by the resolver

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Side-effect-free checks for available database tooling
pub trait Probe {
    /// Is a container with exactly this name running?
    fn container_running(&self, runtime: &str, container: &str) -> bool;

    /// Is this client binary available on the host?
    fn client_available(&self, binary: &str) -> bool;
}

/// Probes the real host: the container runtime CLI and `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl Probe for SystemProbe {
    fn container_running(&self, runtime: &str, container: &str) -> bool {
        let output = Command::new(runtime)
            .args(["ps", "-q", "--filter"])
            .arg(format!("name=^{}$", container))
            .args(["--filter", "status=running"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => {
                !String::from_utf8_lossy(&output.stdout).trim().is_empty()
            }
            Ok(output) => {
                tracing::debug!(runtime, status = %output.status, "container probe failed");
                false
            }
            // Runtime not installed
            Err(e) => {
                tracing::debug!(runtime, "container runtime unavailable: {}", e);
                false
            }
        }
    }

    fn client_available(&self, binary: &str) -> bool {
        find_in_path(binary).is_some()
    }
}

/// Locate an executable on `PATH`
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| candidates(&dir, binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, binary: &str) -> Vec<PathBuf> {
    vec![dir.join(binary), dir.join(format!("{}.exe", binary))]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, binary: &str) -> Vec<PathBuf> {
    vec![dir.join(binary)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_runtime_is_not_running() {
        let probe = SystemProbe;
        assert!(!probe.container_running("dbvault-no-such-runtime", "db"));
    }

    #[test]
    fn test_missing_binary_not_found() {
        assert!(find_in_path("dbvault-no-such-binary").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_is_executable_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("tool");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_executable(&script));

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&script));

        assert!(!is_executable(temp_dir.path()));
    }
}
