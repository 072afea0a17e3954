//! Runtime settings for dbvault
//!
//! Every value has a default so the tool runs with no configuration at all.
//!
//! | Variable                | Default                   |
//! |-------------------------|---------------------------|
//! | `POSTGRES_DB`           | `postgres`                |
//! | `POSTGRES_USER`         | `postgres`                |
//! | `POSTGRES_PASSWORD`     | unset                     |
//! | `POSTGRES_HOST`         | `localhost`               |
//! | `POSTGRES_PORT`         | `5432`                    |
//! | `DB_CONTAINER`          | `db`                      |
//! | `CONTAINER_RUNTIME`     | `docker`                  |
//! | `BACKUP_DIR`            | `./backups`               |
//! | `BACKUP_LOG`            | `<BACKUP_DIR>/backup.log` |
//! | `BACKUP_RETENTION_DAYS` | `30`                      |

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

const DEFAULT_DATABASE: &str = "postgres";
const DEFAULT_USER: &str = "postgres";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_CONTAINER: &str = "db";
const DEFAULT_RUNTIME: &str = "docker";
const DEFAULT_BACKUP_DIR: &str = "./backups";
const DEFAULT_LOG_NAME: &str = "backup.log";
const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Age-based retention for primary archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Maximum age of a primary archive, in days
    pub max_age_days: u32,
}

impl RetentionPolicy {
    pub fn days(max_age_days: u32) -> Self {
        Self { max_age_days }
    }

    /// Archives created strictly before this instant are expired
    ///
    /// `None` when the window reaches past the earliest representable
    /// date, in which case nothing is expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(Duration::days(i64::from(self.max_age_days)))
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Connection details for the database being backed up
#[derive(Clone)]
pub struct DatabaseTarget {
    /// Logical database name
    pub name: String,
    /// Role used by the dump and restore clients
    pub user: String,
    /// Credential passed to native clients through `PGPASSWORD`
    pub password: Option<Zeroizing<String>>,
    /// Host for native clients
    pub host: String,
    /// Port for native clients
    pub port: u16,
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Default for DatabaseTarget {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE.to_string(),
            user: DEFAULT_USER.to_string(),
            password: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Complete configuration for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Database to dump and restore
    pub database: DatabaseTarget,
    /// Name of the database container to probe for
    pub container: String,
    /// Container runtime binary (`docker`, `podman`, ...)
    pub container_runtime: String,
    /// Root directory of the archive store
    pub backup_dir: PathBuf,
    /// Append-only operation log
    pub log_file: PathBuf,
    /// Retention applied after each primary backup
    pub retention: RetentionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        let backup_dir = PathBuf::from(DEFAULT_BACKUP_DIR);
        Self {
            database: DatabaseTarget::default(),
            container: DEFAULT_CONTAINER.to_string(),
            container_runtime: DEFAULT_RUNTIME.to_string(),
            log_file: backup_dir.join(DEFAULT_LOG_NAME),
            backup_dir,
            retention: RetentionPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> VaultResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> VaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = DatabaseTarget::default();

        let port = match get("POSTGRES_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                VaultError::Config(format!("POSTGRES_PORT must be a port number, got '{}'", raw))
            })?,
            None => defaults.port,
        };

        let retention = match get("BACKUP_RETENTION_DAYS") {
            Some(raw) => RetentionPolicy::days(raw.trim().parse::<u32>().map_err(|_| {
                VaultError::Config(format!(
                    "BACKUP_RETENTION_DAYS must be a whole number of days, got '{}'",
                    raw
                ))
            })?),
            None => RetentionPolicy::default(),
        };

        let backup_dir = get("BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        let log_file = get("BACKUP_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|| backup_dir.join(DEFAULT_LOG_NAME));

        Ok(Self {
            database: DatabaseTarget {
                name: get("POSTGRES_DB").unwrap_or(defaults.name),
                user: get("POSTGRES_USER").unwrap_or(defaults.user),
                password: lookup("POSTGRES_PASSWORD")
                    .filter(|v| !v.is_empty())
                    .map(Zeroizing::new),
                host: get("POSTGRES_HOST").unwrap_or(defaults.host),
                port,
            },
            container: get("DB_CONTAINER").unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            container_runtime: get("CONTAINER_RUNTIME")
                .unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            backup_dir,
            log_file,
            retention,
        })
    }

    /// Override the retention window (e.g. from `--retention-days`)
    pub fn with_retention_days(mut self, days: Option<u32>) -> Self {
        if let Some(days) = days {
            self.retention = RetentionPolicy::days(days);
        }
        self
    }
}
