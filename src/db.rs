//! # Database Adapter
//!
//! Owns the SQLite connection to an `.aup3` project and everything that
//! touches it directly: the open-time version gate, project-blob streaming,
//! autosave handling, the integrity check, and whole-table sample
//! extraction.
//!
//! ## Read-Only Discipline
//!
//! The original project file is never opened for writing. The adapter opens
//! it read-only; the first mutating operation copies it to a sibling
//! `<name>.recovered.aup3` and reopens that copy read-write
//! ([`AudacityDatabase::reopen_readonly_as_writable`]). The handle is
//! released before the copy so no open connection outlives a file swap.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, DatabaseName, OpenFlags, OptionalExtension};
use tracing::{info, warn};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::recovery;
use crate::wav::{SampleFormat, WaveFile};

// =============================================================================
// Constants
// =============================================================================

/// Value of the `application_id` pragma in Audacity projects.
pub const AUDACITY_APPLICATION_ID: i64 = 1096107097;

/// Highest `user_version` this tool understands: 3.1.3.0.
pub const MAX_SUPPORTED_VERSION: u32 = (3 << 24) | (1 << 16) | (3 << 8);

/// Files per inner shard directory, and inner directories per outer.
const ENTRIES_PER_DIRECTORY: u64 = 32;

/// Recovery behavior configuration, owned by the CLI layer.
#[derive(Debug, Default, Clone)]
pub struct RecoveryOptions {
    /// Retry a corrupt open once after driving the external helper.
    pub auto_recover: bool,
    /// Pass `--ignore-freelist` to the helper's `.recover` command.
    pub ignore_freelist: bool,
}

// =============================================================================
// Database Adapter
// =============================================================================

/// An open `.aup3` project database.
#[derive(Debug)]
pub struct AudacityDatabase {
    conn: Connection,
    project_path: PathBuf,
    writable_path: PathBuf,
    data_path: PathBuf,
    project_version: u32,
    read_only: bool,
}

impl AudacityDatabase {
    /// Opens a project read-only and checks its identity pragmas.
    ///
    /// An unexpected `application_id` is only a warning (damaged projects
    /// routinely lose it), but a `user_version` above 3.1.3.0 is rejected
    /// with [`Error::UnsupportedVersion`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let project_path = path.as_ref().to_path_buf();
        let conn =
            Connection::open_with_flags(&project_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let app_id: i64 = conn.query_row("PRAGMA application_id", [], |row| row.get(0))?;
        if app_id != AUDACITY_APPLICATION_ID {
            warn!(
                "unexpected application_id pragma {app_id}; is this really an Audacity project?"
            );
        }

        let project_version =
            conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as u32;

        info!(
            "project requires Audacity {}.{}.{}",
            (project_version >> 24) & 0xff,
            (project_version >> 16) & 0xff,
            (project_version >> 8) & 0xff
        );

        if project_version > MAX_SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion(project_version));
        }

        Ok(Self {
            conn,
            writable_path: recovered_path(&project_path),
            data_path: data_path(&project_path),
            project_path,
            project_version,
            read_only: true,
        })
    }

    /// Opens a project, retrying once through database recovery when the
    /// file is corrupt and `options.auto_recover` allows it.
    pub fn open_with_recovery(path: impl AsRef<Path>, options: &RecoveryOptions) -> Result<Self> {
        let path = path.as_ref();

        match Self::open(path) {
            Ok(db) => Ok(db),
            Err(err) if err.is_corrupt() && options.auto_recover => {
                warn!("database is corrupt, attempting recovery: {err}");

                let project_path = path.to_path_buf();
                let writable_path = recovered_path(&project_path);
                let (conn, version) = recovery::run_recovery(
                    &project_path,
                    &writable_path,
                    None,
                    options.ignore_freelist,
                )?;

                Ok(Self {
                    conn,
                    data_path: data_path(&project_path),
                    project_path,
                    writable_path,
                    project_version: version,
                    read_only: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Rebuilds the database through the external recovery helper,
    /// replacing the current handle with the recovered copy.
    pub fn recover_database(&mut self, options: &RecoveryOptions) -> Result<()> {
        self.release_connection()?;

        let (conn, version) = recovery::run_recovery(
            &self.project_path,
            &self.writable_path,
            Some(self.project_version),
            options.ignore_freelist,
        )?;

        self.conn = conn;
        self.project_version = version;
        self.read_only = false;
        Ok(())
    }

    /// First mutating operation: copy the project beside itself and reopen
    /// the copy read-write. The original is never modified. Idempotent.
    pub fn reopen_readonly_as_writable(&mut self) -> Result<()> {
        if !self.read_only {
            return Ok(());
        }

        info!(
            "reopening database in writable mode at {}",
            self.writable_path.display()
        );

        self.release_connection()?;
        remove_recovered_files(&self.writable_path)?;
        fs::copy(&self.project_path, &self.writable_path)?;

        self.conn = Connection::open_with_flags(
            &self.writable_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE,
        )?;
        self.read_only = false;
        Ok(())
    }

    /// Swaps the live connection for an in-memory placeholder so the file
    /// handle is closed before any copy or rename.
    fn release_connection(&mut self) -> Result<()> {
        let placeholder = Connection::open_in_memory()?;
        drop(std::mem::replace(&mut self.conn, placeholder));
        Ok(())
    }

    // =========================================================================
    // Project blobs
    // =========================================================================

    /// True when an uncommitted autosave row shadows the project row.
    pub fn has_autosave(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM autosave", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Deletes the autosave row, reopening writable first. No-op when no
    /// autosave exists.
    pub fn drop_autosave(&mut self) -> Result<()> {
        if self.has_autosave()? {
            self.reopen_readonly_as_writable()?;
            self.conn.execute("DELETE FROM autosave WHERE id = 1", [])?;
        }

        Ok(())
    }

    /// Reads the serialized project stream from `table` (`project` or
    /// `autosave`): the `dict` blob followed by the `doc` blob, streamed
    /// through incremental blob handles into one buffer.
    pub fn read_project_blob(&self, table: &str) -> Result<Buffer> {
        let mut buffer = Buffer::new();
        self.read_blob_column(table, "dict", &mut buffer)?;
        self.read_blob_column(table, "doc", &mut buffer)?;
        Ok(buffer)
    }

    fn read_blob_column(&self, table: &str, column: &str, out: &mut Buffer) -> Result<()> {
        let rowid: i64 = self.conn.query_row(
            &format!("SELECT ROWID FROM {table} WHERE id = 1"),
            [],
            |row| row.get(0),
        )?;

        let mut blob = self
            .conn
            .blob_open(DatabaseName::Main, table, column, rowid, true)?;

        let mut chunk = [0u8; 8 * 1024];
        loop {
            let count = blob.read(&mut chunk)?;
            if count == 0 {
                break;
            }
            out.append(&chunk[..count]);
        }

        Ok(())
    }

    /// Writes a serialized project back into `table` under `id = 1`.
    pub fn write_project_blob(&self, table: &str, dict: &[u8], doc: &[u8]) -> Result<()> {
        self.conn.execute(
            &format!("INSERT OR REPLACE INTO {table}(id, dict, doc) VALUES(1, ?1, ?2)"),
            params![dict, doc],
        )?;
        Ok(())
    }

    // =========================================================================
    // Sample blocks
    // =========================================================================

    /// The stored `sampleformat` of a block row, or `None` when no row
    /// exists for `block_id`.
    pub fn block_format(&self, block_id: i64) -> Result<Option<i32>> {
        Ok(self
            .conn
            .query_row(
                "SELECT sampleformat FROM sampleblocks WHERE blockid = ?1",
                [block_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// The raw `samples` blob of a block row.
    pub fn block_samples(&self, block_id: i64) -> Result<Option<Vec<u8>>> {
        Ok(self
            .conn
            .query_row(
                "SELECT samples FROM sampleblocks WHERE blockid = ?1",
                [block_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Every `blockid` present in the table, ascending.
    pub fn all_block_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT blockid FROM sampleblocks ORDER BY blockid")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Deletes the given block rows inside one transaction, then vacuums.
    pub fn delete_blocks(&mut self, block_ids: &BTreeSet<i64>) -> Result<()> {
        if !block_ids.is_empty() {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare("DELETE FROM sampleblocks WHERE blockid = ?1")?;
                for &block_id in block_ids {
                    stmt.execute([block_id])?;
                }
            }
            tx.commit()?;

            info!("removed {} orphaned blocks", block_ids.len());
        }

        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    // =========================================================================
    // Integrity
    // =========================================================================

    /// Runs `PRAGMA integrity_check` and reports every complaint. Returns
    /// `false` on any finding or on a check that itself fails.
    pub fn check_integrity(&self) -> bool {
        info!("checking database integrity");

        let run = || -> Result<bool> {
            let mut stmt = self.conn.prepare("PRAGMA integrity_check(10240)")?;
            let mut rows = stmt.query([])?;
            let mut passed = true;

            while let Some(row) = rows.next()? {
                let message: String = row.get(0)?;
                if message == "ok" {
                    return Ok(passed);
                }
                warn!("integrity: {message}");
                passed = false;
            }

            Ok(passed)
        };

        match run() {
            Ok(passed) => passed,
            Err(err) => {
                warn!("exception while checking the integrity: {err}");
                false
            }
        }
    }

    // =========================================================================
    // Whole-table extraction
    // =========================================================================

    /// Writes every sample block as its own WAV under
    /// `<data>/sampleblocks/{outer:03}/{inner:02}/{blockid}.wav`, 32 files
    /// per inner directory and 32 inner directories per outer. Returns the
    /// number of blocks written.
    pub fn extract_sample_blocks(&self, format: SampleFormat, sample_rate: u32) -> Result<u64> {
        let base = self.data_path.join("sampleblocks");

        let mut outer = 0u64;
        let mut inner = 0u64;
        let mut file_index = 0u64;
        let mut directory = shard_directory(&base, outer, inner)?;

        let mut stmt = self
            .conn
            .prepare("SELECT blockid, samples FROM sampleblocks ORDER BY blockid")?;
        let mut rows = stmt.query([])?;
        let mut written = 0u64;

        while let Some(row) = rows.next()? {
            let block_id: i64 = row.get(0)?;
            let samples: Vec<u8> = row.get(1)?;

            let mut wave = WaveFile::new(
                directory.join(format!("{block_id}.wav")),
                format,
                sample_rate,
                1,
            );
            wave.write_block(&samples, 0);
            wave.write_file()?;

            written += 1;
            file_index += 1;

            if file_index == ENTRIES_PER_DIRECTORY {
                file_index = 0;
                inner += 1;

                if inner == ENTRIES_PER_DIRECTORY {
                    outer += 1;
                    inner = 0;
                }

                directory = shard_directory(&base, outer, inner)?;
            }
        }

        info!("extracted {written} sample blocks to {}", base.display());
        Ok(written)
    }

    /// Concatenates every sample block into one track WAV. In stereo mode
    /// rows with an even `blockid` feed channel 1 and odd rows channel 0.
    pub fn extract_track(
        &self,
        format: SampleFormat,
        sample_rate: u32,
        as_stereo: bool,
    ) -> Result<()> {
        fs::create_dir_all(&self.data_path)?;

        let path = self
            .data_path
            .join(if as_stereo { "stereo.wav" } else { "mono.wav" });
        let channels = if as_stereo { 2 } else { 1 };
        let mut wave = WaveFile::new(path, format, sample_rate, channels);

        let mut stmt = self
            .conn
            .prepare("SELECT blockid, samples FROM sampleblocks ORDER BY blockid")?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let block_id: i64 = row.get(0)?;
            let samples: Vec<u8> = row.get(1)?;

            let channel = if as_stereo && block_id % 2 == 0 { 1 } else { 0 };
            wave.write_block(&samples, channel);
        }

        wave.write_file()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// The file the live handle points at: the original while read-only,
    /// the recovered copy afterwards.
    pub fn current_path(&self) -> &Path {
        if self.read_only {
            &self.project_path
        } else {
            &self.writable_path
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn project_version(&self) -> u32 {
        self.project_version
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

// =============================================================================
// Path Helpers
// =============================================================================

/// `<name>.recovered.aup3` beside the project.
fn recovered_path(project: &Path) -> PathBuf {
    project.with_extension("recovered.aup3")
}

/// `<stem>_data` beside the project; holds all extraction output.
fn data_path(project: &Path) -> PathBuf {
    let stem = project
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    project.with_file_name(format!("{stem}_data"))
}

/// Removes a stale recovered database along with its WAL and SHM files.
pub(crate) fn remove_recovered_files(writable: &Path) -> Result<()> {
    if writable.exists() {
        fs::remove_file(writable)?;

        for companion in ["aup3-wal", "aup3-shm"] {
            let path = writable.with_extension(companion);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
    }

    Ok(())
}

fn shard_directory(base: &Path, outer: u64, inner: u64) -> Result<PathBuf> {
    let path = base.join(format!("{outer:03}")).join(format!("{inner:02}"));
    fs::create_dir_all(&path)?;
    Ok(path)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovered_path_replaces_extension() {
        assert_eq!(
            recovered_path(Path::new("/tmp/song.aup3")),
            Path::new("/tmp/song.recovered.aup3")
        );
    }

    #[test]
    fn test_data_path_uses_project_stem() {
        assert_eq!(
            data_path(Path::new("/tmp/song.aup3")),
            Path::new("/tmp/song_data")
        );
    }

    #[test]
    fn test_version_constant_is_3_1_3_0() {
        assert_eq!(MAX_SUPPORTED_VERSION, 0x0301_0300);
    }

    #[test]
    fn test_shard_directory_layout() {
        let dir = tempfile::tempdir().expect("tempdir");

        let path = shard_directory(dir.path(), 0, 1).expect("shard dir");
        assert!(path.ends_with("000/01"));
        assert!(path.is_dir());

        let path = shard_directory(dir.path(), 12, 31).expect("shard dir");
        assert!(path.ends_with("012/31"));
    }
}
