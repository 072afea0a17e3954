//! Archive store
//!
//! All filesystem bookkeeping for archives lives here: naming, atomic
//! publication, discovery, retention and integrity checks. Archives are
//! gzip-compressed SQL dumps in a single flat directory.
//!
//! # Atomic publish
//!
//! Bytes are compressed into a hidden `.<name>.<uuid>.partial` file in the
//! store root, synced, and renamed into place only after the producer has
//! reported success. An interrupted or failed write therefore never leaves a
//! file that [`ArchiveStore::list`] would report. Partial files orphaned by a
//! killed process are swept by the next retention pass once they are a day
//! old.
//!
//! # Limitations
//!
//! [`ArchiveStore::verify`] checks the compression envelope only. A dump that
//! is well-formed gzip but logically truncated passes verification.

mod archive;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use uuid::Uuid;

use crate::config::RetentionPolicy;
use crate::error::{VaultError, VaultResult};

pub use archive::{
    archive_file_name, parse_archive_name, valid_database_name, Archive, ArchiveKind,
    ARCHIVE_SUFFIX, TIMESTAMP_FORMAT,
};

const PARTIAL_SUFFIX: &str = ".partial";

/// Partial files younger than this may still belong to a running write
const STALE_PARTIAL_HOURS: i64 = 24;

/// Outcome of a retention pass
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Archives that were deleted
    pub removed: Vec<Archive>,
    /// Archives that could not be deleted, with the reason
    pub failed: Vec<(Archive, String)>,
    /// Abandoned partial files that were cleaned up
    pub swept: Vec<PathBuf>,
}

impl PruneReport {
    /// Number of archives removed
    pub fn count(&self) -> usize {
        self.removed.len()
    }
}

/// Owns the on-disk archive directory
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an archive with these attributes would be published at
    pub fn path_for(&self, database: &str, kind: ArchiveKind, timestamp: DateTime<Utc>) -> PathBuf {
        self.root.join(archive_file_name(database, kind, timestamp))
    }

    /// Write a new archive, compressing whatever `produce` writes
    ///
    /// `produce` receives the uncompressed sink. If it fails, its error is
    /// returned unchanged and nothing is published. An existing archive with
    /// the same name is never overwritten: the write fails with
    /// [`VaultError::ArchiveExists`] instead. Timestamps of one database and
    /// kind never go backwards; a write older than the newest such archive
    /// fails with [`VaultError::OutOfOrder`].
    pub fn write<F>(
        &self,
        database: &str,
        kind: ArchiveKind,
        timestamp: DateTime<Utc>,
        produce: F,
    ) -> VaultResult<Archive>
    where
        F: FnOnce(&mut dyn Write) -> VaultResult<()>,
    {
        if !valid_database_name(database) {
            return Err(VaultError::Config(format!(
                "'{}' cannot be used in an archive name",
                database
            )));
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            VaultError::WriteFailed(format!(
                "Failed to create store directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let file_name = archive_file_name(database, kind, timestamp);
        let final_path = self.root.join(&file_name);
        if final_path.exists() {
            return Err(VaultError::ArchiveExists(final_path));
        }

        let newest = self.list(database)?.into_iter().find(|a| a.kind == kind);
        if let Some(newest) = newest {
            if newest.created_at > timestamp.trunc_subsecs(0) {
                return Err(VaultError::OutOfOrder {
                    path: final_path,
                    newest: newest.path,
                });
            }
        }

        let temp_path = self.root.join(format!(
            ".{}.{}{}",
            file_name,
            Uuid::new_v4(),
            PARTIAL_SUFFIX
        ));

        if let Err(e) = write_compressed(&temp_path, produce) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        // Re-check: another writer may have published while we were dumping.
        if final_path.exists() {
            let _ = fs::remove_file(&temp_path);
            return Err(VaultError::ArchiveExists(final_path));
        }

        fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            VaultError::WriteFailed(format!("Failed to publish {}: {}", file_name, e))
        })?;
        sync_directory(&self.root);

        self.inspect(&final_path).ok_or_else(|| {
            VaultError::WriteFailed(format!("Published archive vanished: {}", file_name))
        })
    }

    /// Write a new archive from an uncompressed byte stream
    pub fn write_stream(
        &self,
        database: &str,
        kind: ArchiveKind,
        timestamp: DateTime<Utc>,
        source: &mut dyn Read,
    ) -> VaultResult<Archive> {
        self.write(database, kind, timestamp, |sink| {
            io::copy(source, sink)
                .map(|_| ())
                .map_err(|e| VaultError::WriteFailed(e.to_string()))
        })
    }

    /// Structurally validate an archive's gzip envelope
    ///
    /// Streams the whole file through the decoder into a sink, which checks
    /// headers, the deflate stream and the CRC/length trailer without keeping
    /// any of the decoded content.
    pub fn verify(&self, archive: &Archive) -> VaultResult<()> {
        let corrupt = |reason: String| VaultError::CorruptArchive {
            path: archive.path.clone(),
            reason,
        };

        let file = File::open(&archive.path).map_err(|e| corrupt(format!("cannot open: {}", e)))?;
        let len = file
            .metadata()
            .map_err(|e| corrupt(format!("cannot stat: {}", e)))?
            .len();
        if len == 0 {
            return Err(corrupt("empty file".to_string()));
        }

        let mut decoder = MultiGzDecoder::new(BufReader::new(file));
        io::copy(&mut decoder, &mut io::sink()).map_err(|e| corrupt(e.to_string()))?;

        Ok(())
    }

    /// Open an archive for streaming its decompressed SQL
    pub fn open_decompressed(&self, archive: &Archive) -> VaultResult<impl Read> {
        let file = File::open(&archive.path).map_err(|e| {
            VaultError::Io(format!("Failed to open {}: {}", archive.path.display(), e))
        })?;
        Ok(MultiGzDecoder::new(BufReader::new(file)))
    }

    /// Archives of one database, newest first
    pub fn list(&self, database: &str) -> VaultResult<Vec<Archive>> {
        let mut archives = self.list_all()?;
        archives.retain(|a| a.database == database);
        Ok(archives)
    }

    /// Every archive in the store, newest first
    ///
    /// Ordering uses the timestamp embedded in the name, not file mtimes,
    /// so it survives copies between hosts.
    pub fn list_all(&self) -> VaultResult<Vec<Archive>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut archives = Vec::new();

        for entry in fs::read_dir(&self.root).map_err(|e| {
            VaultError::Io(format!("Failed to read store directory: {}", e))
        })? {
            let entry = entry
                .map_err(|e| VaultError::Io(format!("Failed to read directory entry: {}", e)))?;

            if let Some(archive) = self.inspect(&entry.path()) {
                archives.push(archive);
            }
        }

        archives.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.file_name().cmp(&a.file_name()))
        });

        Ok(archives)
    }

    /// Build an [`Archive`] for a file, if it is one
    pub fn inspect(&self, path: &Path) -> Option<Archive> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let (kind, database, created_at) = parse_archive_name(&file_name)?;

        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }

        Some(Archive {
            database,
            kind,
            created_at,
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }

    /// Primary archives older than the retention window
    pub fn expired_at(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> VaultResult<Vec<Archive>> {
        let cutoff = match policy.cutoff(now) {
            Some(cutoff) => cutoff,
            None => return Ok(Vec::new()),
        };
        let mut expired = self.list_all()?;
        expired.retain(|a| a.kind == ArchiveKind::Primary && a.created_at < cutoff);
        Ok(expired)
    }

    /// Delete expired primary archives
    pub fn prune(&self, policy: &RetentionPolicy) -> VaultResult<PruneReport> {
        self.prune_at(policy, Utc::now())
    }

    /// Delete primary archives older than the window ending at `now`
    ///
    /// Safety archives are never considered. A failed deletion is recorded
    /// and the pass continues with the remaining archives.
    pub fn prune_at(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> VaultResult<PruneReport> {
        self.prune_except(policy, now, None)
    }

    /// [`prune_at`](Self::prune_at), never removing the archive at `keep`
    pub fn prune_except(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
        keep: Option<&Path>,
    ) -> VaultResult<PruneReport> {
        let mut report = PruneReport {
            swept: self.sweep_partials(now),
            ..PruneReport::default()
        };

        for archive in self.expired_at(policy, now)? {
            if keep == Some(archive.path.as_path()) {
                continue;
            }
            match fs::remove_file(&archive.path) {
                Ok(()) => {
                    tracing::debug!(archive = %archive.file_name(), "pruned");
                    report.removed.push(archive);
                }
                Err(e) => {
                    tracing::warn!(archive = %archive.file_name(), "failed to prune: {}", e);
                    report.failed.push((archive, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Remove partial files left behind by writes that never finished
    fn sweep_partials(&self, now: DateTime<Utc>) -> Vec<PathBuf> {
        let threshold = match now.checked_sub_signed(Duration::hours(STALE_PARTIAL_HOURS)) {
            Some(threshold) => SystemTime::from(threshold),
            None => return Vec::new(),
        };
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut swept = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') || !name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }

            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|modified| modified < threshold)
                .unwrap_or(false);
            if !stale {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::debug!(file = %name, "removed abandoned partial");
                    swept.push(entry.path());
                }
                Err(e) => tracing::warn!(file = %name, "failed to remove partial: {}", e),
            }
        }
        swept
    }

    /// Delete one archive (operator request or failed verification)
    pub fn delete(&self, archive: &Archive) -> VaultResult<()> {
        fs::remove_file(&archive.path).map_err(|e| {
            VaultError::Io(format!(
                "Failed to delete {}: {}",
                archive.path.display(),
                e
            ))
        })
    }

    /// Resolve an operator-supplied selector against a listing snapshot
    ///
    /// Resolution order: exact path, filename inside the store, 1-based
    /// index into `snapshot`, then `latest`.
    pub fn resolve_selector(&self, input: &str, snapshot: &[Archive]) -> VaultResult<Archive> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VaultError::NotFound("no archive selected".to_string()));
        }

        let not_an_archive = |path: &Path| {
            VaultError::NotFound(format!("{} is not a dbvault archive", path.display()))
        };

        let path = Path::new(input);
        if path.is_file() {
            return self.inspect(path).ok_or_else(|| not_an_archive(path));
        }

        let in_store = self.root.join(input);
        if in_store.is_file() {
            return self.inspect(&in_store).ok_or_else(|| not_an_archive(&in_store));
        }

        if let Ok(index) = input.parse::<usize>() {
            if let Some(archive) = index.checked_sub(1).and_then(|i| snapshot.get(i)) {
                return Ok(archive.clone());
            }
        }

        if input.eq_ignore_ascii_case("latest") {
            if let Some(archive) = snapshot.first() {
                return Ok(archive.clone());
            }
        }

        Err(VaultError::NotFound(input.to_string()))
    }
}

fn write_compressed<F>(temp_path: &Path, produce: F) -> VaultResult<()>
where
    F: FnOnce(&mut dyn Write) -> VaultResult<()>,
{
    let write_failed = |what: &str, e: io::Error| {
        VaultError::WriteFailed(format!("{} {}: {}", what, temp_path.display(), e))
    };

    let file = File::create(temp_path).map_err(|e| write_failed("Failed to create", e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

    produce(&mut encoder)?;

    let writer = encoder
        .finish()
        .map_err(|e| write_failed("Failed to finish", e))?;
    let file = writer
        .into_inner()
        .map_err(|e| write_failed("Failed to flush", e.into_error()))?;
    file.sync_all()
        .map_err(|e| write_failed("Failed to sync", e))?;

    Ok(())
}

#[cfg(unix)]
fn sync_directory(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) {}
