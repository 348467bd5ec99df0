//! Database adapter behavior: the version gate, autosave precedence, and
//! the read-only-until-reopened discipline around `drop_autosave`.

mod common;

use rusqlite::Connection;

use aup3rescue::{AudacityDatabase, AudacityProject, Error};

#[test]
fn version_above_3_1_3_is_rejected() {
    let (_dir, path) = common::temp_project("future.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, (3 << 24) | (2 << 16));
    drop(conn);

    let err = AudacityDatabase::open(&path).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(v) if v == (3 << 24) | (2 << 16)));
}

#[test]
fn unexpected_application_id_is_only_a_warning() {
    let (_dir, path) = common::temp_project("foreign.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);
    conn.pragma_update(None, "application_id", 0i64).expect("should clear app id");
    drop(conn);

    let db = AudacityDatabase::open(&path).expect("mismatched app id still opens");
    assert_eq!(db.project_version(), common::VERSION_3_1_3);
    assert!(db.is_read_only());
}

#[test]
fn autosave_takes_precedence_over_project() {
    let (_dir, path) = common::temp_project("autosave.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);

    // Project row has one block, autosave row has two.
    let (dict, doc) = common::simple_project_blob(
        "track", "clip", 44100, common::FLOAT32, 100, 0.0, 0.0, &[(0, 1)],
    );
    common::write_project_row(&conn, "project", &dict, &doc);

    let (dict, doc) = common::simple_project_blob(
        "track", "clip", 44100, common::FLOAT32, 100, 0.0, 0.0, &[(0, 1), (50, 2)],
    );
    common::write_project_row(&conn, "autosave", &dict, &doc);
    drop(conn);

    let mut db = AudacityDatabase::open(&path).expect("should open project");
    assert!(db.has_autosave().expect("should query autosave"));

    let project = AudacityProject::load(&mut db).expect("should load project");
    assert!(project.from_autosave());
    assert_eq!(project.blocks().len(), 2);
}

#[test]
fn drop_autosave_works_on_the_copy_only() {
    let (_dir, path) = common::temp_project("drop.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);

    let (dict, doc) = common::simple_project_blob(
        "track", "clip", 44100, common::FLOAT32, 100, 0.0, 0.0, &[],
    );
    common::write_project_row(&conn, "project", &dict, &doc);
    common::write_project_row(&conn, "autosave", &dict, &doc);
    drop(conn);

    let original_bytes = std::fs::read(&path).expect("should read original");

    let mut db = AudacityDatabase::open(&path).expect("should open project");
    db.drop_autosave().expect("should drop autosave");
    assert!(!db.is_read_only());
    assert!(!db.has_autosave().expect("should query autosave"));

    // Original untouched; autosave row still present there.
    assert_eq!(std::fs::read(&path).expect("should re-read"), original_bytes);

    let recovered = path.with_extension("recovered.aup3");
    assert!(recovered.is_file());

    let check = Connection::open(&recovered).expect("should open copy");
    let count: i64 = check
        .query_row("SELECT COUNT(1) FROM autosave", [], |row| row.get(0))
        .expect("should count");
    assert_eq!(count, 0);
}

#[test]
fn reopen_is_idempotent_and_replaces_stale_copies() {
    let (_dir, path) = common::build_project_file(
        "reopen.aup3",
        100,
        44100,
        common::FLOAT32,
        &[],
        &[],
    );

    // A stale recovered file from an earlier run.
    let recovered = path.with_extension("recovered.aup3");
    std::fs::write(&recovered, b"stale").expect("should plant stale file");

    let mut db = AudacityDatabase::open(&path).expect("should open project");
    db.reopen_readonly_as_writable().expect("should reopen");
    db.reopen_readonly_as_writable().expect("reopen twice is fine");

    assert!(!db.is_read_only());
    assert_eq!(db.current_path(), recovered.as_path());

    // The stale file was replaced by a real database copy.
    let check = Connection::open(&recovered).expect("should open copy");
    let count: i64 = check
        .query_row("SELECT COUNT(1) FROM project", [], |row| row.get(0))
        .expect("should count");
    assert_eq!(count, 1);
}
