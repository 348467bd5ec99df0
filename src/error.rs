//! # Error Handling
//!
//! This module defines the error types used throughout the crate. We use a
//! single error enum ([`Error`]) to represent all failure modes, which keeps
//! function signatures small and lets the CLI report everything uniformly.
//!
//! ## Error Categories
//!
//! | Category | Examples | Typical Response |
//! |----------|----------|------------------|
//! | Stream decode | `Truncated`, `BadOpcode` | Abort the parse, report offset |
//! | Project repair | `BlockMissing`, `BlockFormatMismatch` | Collected per block, never thrown |
//! | Database | `Sqlite`, `UnsupportedVersion` | May trigger recovery, else propagate |
//! | Recovery | `RecoveryToolNotFound`, `BadRecoveryLine` | Logged; loop continues where safe |

use thiserror::Error;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur while inspecting or repairing a project.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Binary stream decoding
    // =========================================================================
    /// A record's payload extends past the end of the serialized stream.
    #[error("unable to read {needed} bytes at offset {offset}")]
    Truncated {
        /// Stream offset where the read was attempted.
        offset: u64,
        /// Number of bytes the record still required.
        needed: usize,
    },

    /// An opcode outside the defined 0..=15 range.
    #[error("unsupported opcode {0}")]
    BadOpcode(u8),

    /// A character-size record carried a width other than 1, 2 or 4, or a
    /// string was read before any width was declared.
    #[error("invalid character size {0}")]
    BadCharSize(u8),

    /// A record referenced a name id that no `Name` record has declared.
    #[error("name id {0} has not been declared")]
    UndeclaredName(u16),

    /// An attribute record arrived with no element open to receive it.
    #[error("attribute '{0}' outside of a tag context")]
    OrphanAttribute(String),

    /// The encoder was asked to emit a name missing from the name cache.
    #[error("name '{0}' not found in the lookup")]
    UnknownName(String),

    // =========================================================================
    // Project validation (collected per block, never thrown globally)
    // =========================================================================
    /// No `sampleblocks` row exists for a referenced block id.
    #[error("block {0} not found")]
    BlockMissing(i64),

    /// A `sampleblocks` row disagrees with its sequence's sample format.
    #[error("format mismatch for block {block_id}: sequence has {expected}, row has {actual}")]
    BlockFormatMismatch {
        block_id: i64,
        expected: i32,
        actual: i32,
    },

    /// A `samples` blob is too short for the window a clip needs from it.
    #[error("unexpected blob size for sample block {block_id}: need {needed} bytes, have {actual}")]
    BlobSizeMismatch {
        block_id: i64,
        needed: u64,
        actual: u64,
    },

    // =========================================================================
    // Database
    // =========================================================================
    /// The `user_version` pragma names a project format newer than 3.1.3.0.
    #[error("unsupported project version {}.{}.{}", (.0 >> 24) & 0xff, (.0 >> 16) & 0xff, (.0 >> 8) & 0xff)]
    UnsupportedVersion(u32),

    /// SQLite operation failed. Wraps any error from `rusqlite`, including
    /// corruption detected while opening or reading the project file.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // =========================================================================
    // Recovery
    // =========================================================================
    /// No `sqlite3` helper binary next to the executable or on the path.
    #[error("sqlite3 recovery helper not found next to the executable or on PATH")]
    RecoveryToolNotFound,

    /// The recovery helper exited abnormally; the payload is its stderr.
    #[error("recovery helper failed: {0}")]
    RecoveryHelperFailed(String),

    /// A `lost_and_found` line the rewriter could not understand.
    #[error("unsupported lost_and_found statement: {0}")]
    BadRecoveryLine(String),

    // =========================================================================
    // Everything else
    // =========================================================================
    /// Sample format string other than `int16`, `int24` or `float`.
    #[error("unsupported sample format '{0}'")]
    UnsupportedSampleFormat(String),

    /// Filesystem or pipe I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the underlying SQLite error reports a corrupt database.
    ///
    /// This is the gate for automatic recovery: a corrupt open may be retried
    /// once after the external helper has rebuilt the file, while every other
    /// database error propagates unchanged.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Error::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseCorrupt
        )
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Error messages appear in logs and CLI output; keep them readable.
    #[test]
    fn test_error_display() {
        let truncated = Error::Truncated {
            offset: 12,
            needed: 4,
        };
        assert_eq!(truncated.to_string(), "unable to read 4 bytes at offset 12");

        let version = Error::UnsupportedVersion((3 << 24) | (2 << 16));
        assert_eq!(version.to_string(), "unsupported project version 3.2.0");

        let mismatch = Error::BlockFormatMismatch {
            block_id: 7,
            expected: 0x0002_0001,
            actual: 0x0004_000F,
        };
        assert!(mismatch.to_string().contains("block 7"));
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let sqlite_err = rusqlite::Error::InvalidParameterName("test".to_string());
        let our_err: Error = sqlite_err.into();

        assert!(matches!(our_err, Error::Sqlite(_)));
        assert!(!our_err.is_corrupt());
    }

    #[test]
    fn test_corrupt_classifier() {
        let corrupt = Error::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            Some("database disk image is malformed".to_string()),
        ));
        assert!(corrupt.is_corrupt());
    }
}
