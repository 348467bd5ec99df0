//! # aup3rescue - Audacity Project Recovery
//!
//! Offline recovery and inspection for Audacity `.aup3` project files. An
//! `.aup3` file is a single-file SQLite database holding a serialized
//! project tree (two blobs in the `project` and/or `autosave` tables) plus a
//! large `sampleblocks` table of raw audio. Projects seen in the wild are
//! frequently damaged; this crate reads them defensively, repairs what it
//! can, and extracts audio from whatever is left.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          CLI (main)                             │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  db::AudacityDatabase            recovery (sqlite3 .recover)    │
//! │  read-only open, blob I/O,  ◄──► rebuilds a corrupt file into   │
//! │  version gate, extraction        <name>.recovered.aup3          │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ dict + doc blobs
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  codec (opcode stream)  ──events──►  tree + model overlay       │
//! │  decode / encode / XML export        validate, repair, extract  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The original project file is never written to: every mutating operation
//! works on a `.recovered.aup3` copy beside it.

/// Error types shared by every module.
pub mod error;

/// Chunked append-only byte buffer, the carrier for blobs and WAV data.
pub mod buffer;

/// XML event trait and typed attribute values.
pub mod xml;

/// Name cache, generic tree arena and the tree-building event sink.
pub mod tree;

/// The binary opcode codec: decoder, encoder and XML pretty-printer.
pub mod codec;

/// Typed overlay over the tree: tracks, clips, sequences, blocks, plus
/// validation, repair and clip extraction.
pub mod model;

/// The SQLite adapter owning the project file handle.
pub mod db;

/// External-helper database recovery and `lost_and_found` rewriting.
pub mod recovery;

/// Sample formats and the RIFF/WAVE writer.
pub mod wav;

pub use buffer::Buffer;
pub use db::{AudacityDatabase, RecoveryOptions};
pub use error::{Error, Result};
pub use model::AudacityProject;
pub use wav::{SampleFormat, WaveFile};
