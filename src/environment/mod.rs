//! Execution environment resolution
//!
//! Decides once per invocation whether database tooling runs inside a
//! container or through host-native clients, and hands back a
//! [`DatabaseTool`] that the orchestrators use without caring which.
//!
//! Probe order is container first: the client inside the database container
//! always matches the server version.

mod probe;
mod tool;

use std::fmt;

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::error::{VaultError, VaultResult};

pub use probe::{find_in_path, Probe, SystemProbe};
pub use tool::{CommandTool, DatabaseTool};

/// Binary whose presence on `PATH` selects the native client
pub const NATIVE_DUMP_BINARY: &str = "pg_dump";

/// How database tooling is reached for this invocation
#[derive(Clone, PartialEq, Eq)]
pub enum ExecutionEnvironment {
    /// Tools run inside a running database container
    Containerized { runtime: String, container: String },
    /// Tools run on the host and connect over the network
    NativeClient {
        host: String,
        port: u16,
        user: String,
        password: Option<Zeroizing<String>>,
    },
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionEnvironment::Containerized { runtime, container } => {
                write!(f, "container '{}' ({})", container, runtime)
            }
            ExecutionEnvironment::NativeClient {
                host, port, user, ..
            } => write!(f, "native client {}@{}:{}", user, host, port),
        }
    }
}

impl fmt::Debug for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionEnvironment({})", self)
    }
}

/// Resolve the execution environment using the real system probes
pub fn resolve(settings: &Settings) -> VaultResult<ExecutionEnvironment> {
    resolve_with(settings, &SystemProbe)
}

/// Resolve the execution environment using the given probe
///
/// Issues only read-only probes.
pub fn resolve_with(settings: &Settings, probe: &dyn Probe) -> VaultResult<ExecutionEnvironment> {
    if probe.container_running(&settings.container_runtime, &settings.container) {
        tracing::debug!(container = %settings.container, "database container is running");
        return Ok(ExecutionEnvironment::Containerized {
            runtime: settings.container_runtime.clone(),
            container: settings.container.clone(),
        });
    }

    if probe.client_available(NATIVE_DUMP_BINARY) {
        tracing::debug!("using native {} from PATH", NATIVE_DUMP_BINARY);
        let db = &settings.database;
        return Ok(ExecutionEnvironment::NativeClient {
            host: db.host.clone(),
            port: db.port,
            user: db.user.clone(),
            password: db.password.clone(),
        });
    }

    Err(VaultError::NoEnvironmentFound(format!(
        "container '{}' is not running under {} and {} is not on PATH",
        settings.container, settings.container_runtime, NATIVE_DUMP_BINARY
    )))
}
