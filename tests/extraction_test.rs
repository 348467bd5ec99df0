//! Audio extraction: clip trims map to exact byte windows, sample-block
//! export shards 32 files per directory, and track export routes channels.

mod common;

use rusqlite::Connection;

use aup3rescue::{AudacityDatabase, AudacityProject, SampleFormat};

#[test]
fn clip_extraction_honors_trim_boundaries() {
    // trimLeft 0.5s and trimRight 0.25s at 1000 Hz over 2000 samples leaves
    // 1250 samples; int16 makes that 2500 data bytes.
    let (_dir, path) = common::temp_project("clips.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);

    let (dict, doc) = common::simple_project_blob(
        "track",
        "clip",
        1000,
        common::INT16,
        2000,
        0.5,
        0.25,
        &[(0, 1)],
    );
    common::write_project_row(&conn, "project", &dict, &doc);
    let samples: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();
    common::insert_block(&conn, 1, common::INT16, &samples);
    drop(conn);

    let mut db = AudacityDatabase::open(&path).expect("should open project");
    let project = AudacityProject::load(&mut db).expect("should load project");
    project.extract_clips().expect("should extract clips");

    let wav_path = path
        .parent()
        .unwrap()
        .join("clips_data")
        .join("clips")
        .join("0_track_0_clip.wav");
    let bytes = std::fs::read(&wav_path).expect("clip wav exists");

    assert_eq!(bytes.len(), 44 + 2500);
    // Subchunk2Size records exactly the clipped window.
    assert_eq!(
        u32::from_le_bytes(bytes[40..44].try_into().unwrap()),
        2500
    );
    // Data comes from the blob at the trim offset, not from its start:
    // sample 500 starts at blob byte 1000.
    assert_eq!(&bytes[44..], &samples[1000..3500]);
}

#[test]
fn silence_blocks_contribute_zeroed_bytes() {
    let (_dir, path) = common::temp_project("silence.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);

    // 100 real samples then 100 samples of silence placeholder.
    let (dict, doc) = common::simple_project_blob(
        "track",
        "clip",
        1000,
        common::INT16,
        200,
        0.0,
        0.0,
        &[(0, 1), (100, -100)],
    );
    common::write_project_row(&conn, "project", &dict, &doc);
    common::insert_block(&conn, 1, common::INT16, &vec![0xFFu8; 200]);
    drop(conn);

    let mut db = AudacityDatabase::open(&path).expect("should open project");
    let project = AudacityProject::load(&mut db).expect("should load project");
    project.extract_clips().expect("should extract clips");

    let wav_path = path
        .parent()
        .unwrap()
        .join("silence_data")
        .join("clips")
        .join("0_track_0_clip.wav");
    let bytes = std::fs::read(&wav_path).expect("clip wav exists");

    assert_eq!(bytes.len(), 44 + 400);
    assert!(bytes[44..244].iter().all(|&b| b == 0xFF));
    assert!(bytes[244..].iter().all(|&b| b == 0x00));
}

#[test]
fn sample_block_export_shards_32_per_directory() {
    let (_dir, path) = common::temp_project("shards.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);
    let (dict, doc) = common::simple_project_blob(
        "track",
        "clip",
        1000,
        common::INT16,
        10,
        0.0,
        0.0,
        &[],
    );
    common::write_project_row(&conn, "project", &dict, &doc);

    for block_id in 1..=65 {
        common::insert_block(&conn, block_id, common::INT16, &[0u8; 4]);
    }
    drop(conn);

    let db = AudacityDatabase::open(&path).expect("should open project");
    let written = db
        .extract_sample_blocks(SampleFormat::Int16, 44100)
        .expect("should extract blocks");
    assert_eq!(written, 65);

    let base = path.parent().unwrap().join("shards_data").join("sampleblocks");

    for block_id in 1..=32 {
        assert!(base.join("000/00").join(format!("{block_id}.wav")).is_file());
    }
    for block_id in 33..=64 {
        assert!(base.join("000/01").join(format!("{block_id}.wav")).is_file());
    }
    assert!(base.join("000/02").join("65.wav").is_file());
}

#[test]
fn stereo_track_export_routes_even_blocks_to_channel_one() {
    let (_dir, path) = common::temp_project("stereo.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);
    let (dict, doc) = common::simple_project_blob(
        "track",
        "clip",
        1000,
        common::INT16,
        10,
        0.0,
        0.0,
        &[],
    );
    common::write_project_row(&conn, "project", &dict, &doc);

    // One int16 sample per block, value = block id.
    for block_id in 1..=4i64 {
        common::insert_block(
            &conn,
            block_id,
            common::INT16,
            &(block_id as i16).to_le_bytes(),
        );
    }
    drop(conn);

    let db = AudacityDatabase::open(&path).expect("should open project");
    db.extract_track(SampleFormat::Int16, 44100, true)
        .expect("should extract track");

    let bytes = std::fs::read(path.parent().unwrap().join("stereo_data").join("stereo.wav"))
        .expect("stereo wav exists");

    assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 2);
    assert_eq!(bytes.len(), 44 + 8);

    // Odd ids land on channel 0, even ids on channel 1, in row order.
    let frames: Vec<i16> = bytes[44..]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(frames, vec![1, 2, 3, 4]);
}

#[test]
fn mono_track_export_concatenates_all_blocks() {
    let (_dir, path) = common::temp_project("mono.aup3");

    let conn = Connection::open(&path).expect("should create db");
    common::init_schema(&conn, common::VERSION_3_1_3);
    let (dict, doc) = common::simple_project_blob(
        "track",
        "clip",
        1000,
        common::INT16,
        10,
        0.0,
        0.0,
        &[],
    );
    common::write_project_row(&conn, "project", &dict, &doc);

    for block_id in 1..=3i64 {
        common::insert_block(
            &conn,
            block_id,
            common::INT16,
            &(block_id as i16).to_le_bytes(),
        );
    }
    drop(conn);

    let db = AudacityDatabase::open(&path).expect("should open project");
    db.extract_track(SampleFormat::Int16, 8000, false)
        .expect("should extract track");

    let bytes = std::fs::read(path.parent().unwrap().join("mono_data").join("mono.wav"))
        .expect("mono wav exists");

    assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 1);
    let samples: Vec<i16> = bytes[44..]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(samples, vec![1, 2, 3]);
}
