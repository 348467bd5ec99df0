//! Shared helpers for integration tests: synthetic `.aup3` files built in
//! temporary directories, with real schema, pragmas and serialized project
//! blobs.

#![allow(dead_code)]

use std::path::PathBuf;

use rusqlite::{params, Connection};
use tempfile::TempDir;

use aup3rescue::codec;
use aup3rescue::tree::TreeBuilder;
use aup3rescue::xml::{Attribute, AttributeValue, XmlHandler};

pub const AUDACITY_APPLICATION_ID: i64 = 1096107097;
pub const VERSION_3_1_3: u32 = (3 << 24) | (1 << 16) | (3 << 8);

pub const INT16: i32 = 0x0002_0001;
pub const FLOAT32: i32 = 0x0004_000F;

/// A fresh temp directory and the path of a project file inside it.
pub fn temp_project(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

/// Creates the `.aup3` schema with identity pragmas.
pub fn init_schema(conn: &Connection, version: u32) {
    conn.execute_batch(
        "CREATE TABLE project(id INTEGER PRIMARY KEY, dict BLOB, doc BLOB);
         CREATE TABLE autosave(id INTEGER PRIMARY KEY, dict BLOB, doc BLOB);
         CREATE TABLE sampleblocks(
             blockid INTEGER PRIMARY KEY AUTOINCREMENT,
             sampleformat INTEGER,
             summin REAL, summax REAL, sumrms REAL,
             summary256 BLOB, summary64k BLOB,
             samples BLOB);",
    )
    .expect("should create schema");

    conn.pragma_update(None, "application_id", AUDACITY_APPLICATION_ID)
        .expect("should set application_id");
    conn.pragma_update(None, "user_version", version as i64)
        .expect("should set user_version");
}

/// Stores a serialized project under `id = 1` of the given table.
pub fn write_project_row(conn: &Connection, table: &str, dict: &[u8], doc: &[u8]) {
    conn.execute(
        &format!("INSERT OR REPLACE INTO {table}(id, dict, doc) VALUES(1, ?1, ?2)"),
        params![dict, doc],
    )
    .expect("should write project row");
}

/// Inserts one sample block row with zeroed summaries.
pub fn insert_block(conn: &Connection, block_id: i64, format: i32, samples: &[u8]) {
    conn.execute(
        "INSERT INTO sampleblocks(blockid, sampleformat, summin, summax, sumrms,
                                  summary256, summary64k, samples)
         VALUES(?1, ?2, 0, 0, 0, x'00', x'00', ?3)",
        params![block_id, format, samples],
    )
    .expect("should insert sample block");
}

/// Serializes a single-track, single-clip project tree and returns its
/// `(dict, doc)` blob pair.
///
/// `blocks` is a list of `(start, blockid)` pairs for the one sequence.
#[allow(clippy::too_many_arguments)]
pub fn simple_project_blob(
    track_name: &str,
    clip_name: &str,
    rate: i32,
    sample_format: i32,
    num_samples: i64,
    trim_left: f64,
    trim_right: f64,
    blocks: &[(i64, i64)],
) -> (Vec<u8>, Vec<u8>) {
    let mut builder = TreeBuilder::new();

    builder.handle_tag_start("project", &[]);
    builder.handle_tag_start(
        "wavetrack",
        &[
            Attribute::new("name", AttributeValue::Str(track_name.to_string())),
            Attribute::new("channel", AttributeValue::Int(0)),
            Attribute::new("linked", AttributeValue::Bool(false)),
            Attribute::new("sampleformat", AttributeValue::Int(sample_format)),
            Attribute::new("rate", AttributeValue::Int(rate)),
        ],
    );
    builder.handle_tag_start(
        "waveclip",
        &[
            Attribute::new("name", AttributeValue::Str(clip_name.to_string())),
            Attribute::new("offset", AttributeValue::Double(0.0)),
            Attribute::new("trimLeft", AttributeValue::Double(trim_left)),
            Attribute::new("trimRight", AttributeValue::Double(trim_right)),
        ],
    );
    builder.handle_tag_start(
        "sequence",
        &[
            Attribute::new("maxsamples", AttributeValue::LongLong(num_samples)),
            Attribute::new("numsamples", AttributeValue::LongLong(num_samples)),
            Attribute::new("sampleformat", AttributeValue::Int(sample_format)),
        ],
    );

    for &(start, block_id) in blocks {
        builder.handle_tag_start(
            "waveblock",
            &[
                Attribute::new("start", AttributeValue::LongLong(start)),
                Attribute::new("blockid", AttributeValue::LongLong(block_id)),
            ],
        );
        builder.handle_tag_end("waveblock");
    }

    builder.handle_tag_end("sequence");
    builder.handle_tag_end("waveclip");
    builder.handle_tag_end("wavetrack");
    builder.handle_tag_end("project");

    let (tree, names) = builder.finish();
    let (dict, doc) = codec::serialize_project(&names, &tree).expect("should serialize");

    (dict.linearize(), doc.linearize())
}

/// Builds a complete project file on disk: schema, pragmas, project row and
/// the given sample blocks. Returns the temp dir guard and the file path.
pub fn build_project_file(
    name: &str,
    num_samples: i64,
    rate: i32,
    sample_format: i32,
    tree_blocks: &[(i64, i64)],
    table_blocks: &[(i64, i32, Vec<u8>)],
) -> (TempDir, PathBuf) {
    let (dir, path) = temp_project(name);

    let conn = Connection::open(&path).expect("should create db");
    init_schema(&conn, VERSION_3_1_3);

    let (dict, doc) = simple_project_blob(
        "track",
        "clip",
        rate,
        sample_format,
        num_samples,
        0.0,
        0.0,
        tree_blocks,
    );
    write_project_row(&conn, "project", &dict, &doc);

    for (block_id, format, samples) in table_blocks {
        insert_block(&conn, *block_id, *format, samples);
    }

    drop(conn);
    (dir, path)
}
