//! # Database Recovery
//!
//! Rebuilds a damaged project by driving the external `sqlite3` helper's
//! `.recover` command and replaying its SQL output into a fresh database
//! with the project schema assumptions restored.
//!
//! ## Procedure
//!
//! ```text
//! original.aup3 ──► sqlite3 ".recover" ──► SQL text, line by line
//!                                             │
//!                   skip BEGIN/COMMIT ◄───────┤
//!                   rewrite lost_and_found ◄──┤
//!                                             ▼
//!                                   original.recovered.aup3
//!                                   (pragmas + ids restored)
//! ```
//!
//! Rows the helper could not attribute to a table are emitted into
//! `lost_and_found`; in a project file these are always sample blocks, so
//! they are rewritten back into the `sampleblocks` schema. A single failing
//! statement is logged and skipped; recovery carries on.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::db::{remove_recovered_files, AUDACITY_APPLICATION_ID, MAX_SUPPORTED_VERSION};
use crate::error::{Error, Result};

// =============================================================================
// Helper Binary Lookup
// =============================================================================

/// Locates the `sqlite3` helper: the directory of the running executable
/// takes precedence over the system path.
pub fn find_recovery_tool() -> Result<PathBuf> {
    let name = if cfg!(windows) { "sqlite3.exe" } else { "sqlite3" };

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    if let Some(path) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(Error::RecoveryToolNotFound)
}

// =============================================================================
// lost_and_found Rewriting
// =============================================================================

/// Parses an integer at `offset`, skipping leading whitespace. Returns the
/// value and the index just past its last digit.
fn read_int(line: &str, offset: usize) -> Result<(i64, usize)> {
    let bytes = line.as_bytes();

    let mut start = offset;
    while start < bytes.len() && bytes[start].is_ascii_whitespace() {
        start += 1;
    }

    let mut end = start;
    if end < bytes.len() && bytes[end] == b'-' {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    let value = line[start..end]
        .parse()
        .map_err(|_| Error::BadRecoveryLine(line.to_string()))?;
    Ok((value, end))
}

/// Rewrites a helper `INSERT INTO "lost_and_found"` line into an insertion
/// against the real `sampleblocks` schema.
///
/// The helper emits
/// `VALUES(root_n, n, n_fields, rowid, blockid, sampleformat, ...)` where
/// `n_fields` must be 8 and exactly one of `rowid`/`blockid` carries the id
/// (the other is `NULL`). `root_n` and `n` are dropped, the id becomes the
/// target `blockid`, and the remaining columns pass through verbatim.
pub fn rewrite_lost_and_found(line: &str) -> Result<String> {
    let bad = || Error::BadRecoveryLine(line.to_string());

    let open = line.find('(').ok_or_else(bad)?;

    // Skip root_n and n.
    let first_comma = line[open..].find(',').map(|i| i + open).ok_or_else(bad)?;
    let second_comma = line[first_comma + 1..]
        .find(',')
        .map(|i| i + first_comma + 1)
        .ok_or_else(bad)?;

    let (n_fields, cols_end) = read_int(line, second_comma + 1)?;
    if n_fields != 8 {
        return Err(bad());
    }

    let (row_id, rest_offset) = match read_int(line, cols_end + 1) {
        Ok((row_id, after)) => {
            // rowid present; blockid must be the following NULL.
            let null_end = line[after..]
                .find("NULL,")
                .map(|i| i + after + 5)
                .ok_or_else(bad)?;
            (row_id, null_end)
        }
        Err(_) => {
            // rowid is NULL; the id sits in the blockid column.
            let null_pos = line[cols_end + 1..]
                .find(" NULL,")
                .map(|i| i + cols_end + 1)
                .ok_or_else(bad)?;
            if null_pos != cols_end + 1 {
                return Err(bad());
            }

            let (row_id, after) = read_int(line, null_pos + 6)?;
            (row_id, after + 1)
        }
    };

    Ok(format!(
        "INSERT OR REPLACE INTO sampleblocks (blockid, sampleformat, summin, summax, sumrms, \
         summary256, summary64k, samples) VALUES({},{}",
        row_id,
        &line[rest_offset..]
    ))
}

// =============================================================================
// Recovery Procedure
// =============================================================================

/// Pragmas for the freshly created recovery target. Durability is traded
/// away while replaying; normal settings are restored afterwards.
const RECOVERY_TARGET_PRAGMAS: &str = "\
PRAGMA page_size = 65536;
PRAGMA busy_timeout = 5000;
PRAGMA locking_mode = EXCLUSIVE;
PRAGMA synchronous = OFF;
PRAGMA journal_mode = WAL;
PRAGMA wal_autocheckpoint = 1000;
VACUUM;";

/// Truncates a statement for log output without splitting a character.
fn display_prefix(statement: &str, limit: usize) -> &str {
    if statement.len() <= limit {
        return statement;
    }

    let mut end = limit;
    while !statement.is_char_boundary(end) {
        end -= 1;
    }
    &statement[..end]
}

/// Rebuilds `original` into a fresh database at `writable` by replaying the
/// recovery helper's output. Returns the recovered connection (read-write)
/// and the `user_version` stamped into it.
///
/// `version` is the value captured from the original file; `None` means it
/// could not be read, in which case the maximum supported version is used.
pub(crate) fn run_recovery(
    original: &Path,
    writable: &Path,
    version: Option<u32>,
    ignore_freelist: bool,
) -> Result<(Connection, u32)> {
    remove_recovered_files(writable)?;

    let recovered = Connection::open_with_flags(
        writable,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    recovered.execute_batch(RECOVERY_TARGET_PRAGMAS)?;

    let tool = find_recovery_tool()?;
    info!("using '{}' for recovery", tool.display());

    let recover_command = if ignore_freelist {
        ".recover --ignore-freelist"
    } else {
        ".recover"
    };

    let mut child = Command::new(&tool)
        .arg(original)
        .arg(recover_command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain stderr on its own thread so neither pipe can fill up and stall
    // the helper.
    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(stream) = stderr {
            let _ = BufReader::new(stream).read_to_string(&mut text);
        }
        text
    });

    let stdout = child.stdout.take().ok_or(Error::RecoveryHelperFailed(
        "helper stdout unavailable".to_string(),
    ))?;

    let mut recovered_blocks = 0i64;

    for line in BufReader::new(stdout).lines() {
        let mut statement = line?;

        if statement.is_empty()
            || statement.contains("BEGIN")
            || statement.contains("COMMIT")
        {
            continue;
        }

        if statement.contains("lost_and_found") {
            if statement.contains("CREATE") {
                continue;
            }

            if !statement.contains("INSERT") {
                return Err(Error::BadRecoveryLine(statement));
            }

            statement = rewrite_lost_and_found(&statement)?;
            recovered_blocks += 1;
        }

        // The helper's outer transaction is dropped, so every statement
        // stands alone; one bad statement must not sink the rest.
        if let Err(err) = recovered.execute_batch(&statement) {
            warn!(
                "skipping failed recovery statement ({err}): {}",
                display_prefix(&statement, 256)
            );
        }
    }

    let status = child.wait()?;
    let stderr_text = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        warn!(
            "recovery helper exited with {status}: {}",
            stderr_text.trim()
        );
    }

    let version = version.unwrap_or_else(|| {
        warn!("project version unknown, stamping maximum supported version");
        MAX_SUPPORTED_VERSION
    });

    recovered.execute_batch(
        "PRAGMA locking_mode = NORMAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    recovered.execute_batch(&format!(
        "PRAGMA application_id = {AUDACITY_APPLICATION_ID};"
    ))?;
    recovered.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    recovered.execute_batch("VACUUM;")?;

    if recovered_blocks > 0 {
        info!("recovered {recovered_blocks} sample blocks from the database");
    }

    Ok((recovered, version))
}

// =============================================================================
// Tests
// =============================================================================
