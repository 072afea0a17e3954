//! Archive naming
//!
//! An archive's filename is its catalog entry: it carries the kind, the
//! database name and a second-resolution UTC timestamp.
//!
//! - primary: `backup_<db>_<YYYYMMDD_HHMMSS>.sql.gz`
//! - safety:  `pre_restore_backup_<db>_<YYYYMMDD_HHMMSS>.sql.gz`

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ARCHIVE_SUFFIX: &str = ".sql.gz";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Whether an archive is subject to retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Produced by a normal backup run; pruned by retention
    Primary,
    /// Taken automatically before a restore; never pruned
    Safety,
}

impl ArchiveKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ArchiveKind::Primary => "backup_",
            ArchiveKind::Safety => "pre_restore_backup_",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Primary => write!(f, "primary"),
            ArchiveKind::Safety => write!(f, "pre-restore"),
        }
    }
}

/// A single backup artifact in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    /// Logical database name
    pub database: String,
    pub kind: ArchiveKind,
    /// Creation time, second resolution, taken from the filename
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
    /// Compressed size in bytes
    pub size_bytes: u64,
}

impl Archive {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }
}

/// Build the filename for an archive
pub fn archive_file_name(database: &str, kind: ArchiveKind, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}{}_{}{}",
        kind.prefix(),
        database,
        timestamp.format(TIMESTAMP_FORMAT),
        ARCHIVE_SUFFIX
    )
}

/// Parse an archive filename into kind, database and timestamp
pub fn parse_archive_name(name: &str) -> Option<(ArchiveKind, String, DateTime<Utc>)> {
    let stem = name.strip_suffix(ARCHIVE_SUFFIX)?;

    // The safety prefix does not start with the primary one, so order is free.
    let (kind, rest) = [ArchiveKind::Safety, ArchiveKind::Primary]
        .into_iter()
        .find_map(|kind| stem.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))?;

    // Database names may contain underscores; the timestamp is the last two parts.
    let mut parts = rest.rsplitn(3, '_');
    let time = parts.next()?;
    let date = parts.next()?;
    let database = parts.next()?;

    if database.is_empty() || date.len() != 8 || time.len() != 6 {
        return None;
    }
    if !date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let naive =
        NaiveDateTime::parse_from_str(&format!("{}_{}", date, time), TIMESTAMP_FORMAT).ok()?;

    Some((
        kind,
        database.to_string(),
        DateTime::from_naive_utc_and_offset(naive, Utc),
    ))
}

/// Reject database names that cannot be embedded in a filename
pub fn valid_database_name(database: &str) -> bool {
    !database.is_empty()
        && !database.starts_with('.')
        && !database.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}
