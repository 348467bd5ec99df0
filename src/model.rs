//! # Semantic Project Model
//!
//! A typed overlay over the generic project tree: tracks own clips, clips
//! own sequences, sequences own sample-block references. The overlay is
//! built during the same event pass that builds the tree, and every overlay
//! node keeps the [`NodeId`] of its tree node so repair mutations write
//! straight through to the tree that gets re-encoded.
//!
//! ## Overlay Shape
//!
//! ```text
//! wavetrack ──► waveclip ──► sequence ──► waveblock
//!   name          offset       numsamples    start
//!   rate          trimLeft     sampleformat  blockid   (≤ 0 means silence)
//!   ...           trimRight    maxsamples
//! ```
//!
//! Entities live in append-only arenas and reference each other by index, so
//! sibling and parent links stay valid while the tree is mutated.
//!
//! A block's length is never stored: it is the next sibling's `start` minus
//! its own, or the sequence's `numsamples` minus its own for the last block.
//! Repair reads the length before touching anything else, and the only
//! mutations made (`blockid`, `badblock`) leave every `start` untouched.

use std::collections::{BTreeSet, HashMap};
use std::fs;

use tracing::{info, warn};

use crate::codec;
use crate::db::AudacityDatabase;
use crate::error::{Error, Result};
use crate::tree::{NameCache, NodeId, ProjectTree, TreeBuilder};
use crate::wav::{SampleFormat, WaveFile};
use crate::xml::{find_attribute, Attribute, AttributeValue, XmlHandler};

// =============================================================================
// Overlay Entities
// =============================================================================

#[derive(Debug)]
pub struct WaveTrack {
    pub node: NodeId,
    /// Position of this track within the project.
    pub index: usize,
    pub name: String,
    pub channel: i32,
    pub linked: bool,
    pub sample_format: i32,
    pub rate: i32,
    /// Arena indices of this track's clips, in document order.
    pub clips: Vec<usize>,
}

#[derive(Debug)]
pub struct Clip {
    pub node: NodeId,
    /// Arena index of the owning track.
    pub track: usize,
    /// Position of this clip within its track.
    pub index: usize,
    pub name: String,
    pub offset: f64,
    pub trim_left: f64,
    pub trim_right: f64,
    pub sequences: Vec<usize>,
}

#[derive(Debug)]
pub struct Sequence {
    pub node: NodeId,
    pub clip: usize,
    pub index: usize,
    pub max_samples: i64,
    pub num_samples: i64,
    pub sample_format: i32,
    pub blocks: Vec<usize>,
}

#[derive(Debug)]
pub struct WaveBlock {
    pub node: NodeId,
    /// Arena index of the owning sequence.
    pub sequence: usize,
    /// Position of this block within its sequence.
    pub index: usize,
    /// Sample offset into the sequence.
    pub start: i64,
    /// Row id in `sampleblocks` when positive; silence of length
    /// `-block_id` otherwise.
    pub block_id: i64,
}

impl WaveBlock {
    pub fn is_silence(&self) -> bool {
        self.block_id <= 0
    }
}

// =============================================================================
// Attribute Readout
// =============================================================================
// Damaged projects routinely carry odd attribute values; an absent or
// unconvertible attribute defaults rather than failing the whole parse.

fn attr_i64(attributes: &[Attribute], name: &str) -> i64 {
    match find_attribute(attributes, name) {
        None => 0,
        Some(value) => value.as_i64().unwrap_or_else(|| {
            warn!("attribute '{name}' has an incompatible value, using 0");
            0
        }),
    }
}

fn attr_f64(attributes: &[Attribute], name: &str) -> f64 {
    match find_attribute(attributes, name) {
        None => 0.0,
        Some(value) => value.as_f64().unwrap_or_else(|| {
            warn!("attribute '{name}' has an incompatible value, using 0");
            0.0
        }),
    }
}

fn attr_bool(attributes: &[Attribute], name: &str) -> bool {
    match find_attribute(attributes, name) {
        None => false,
        Some(value) => value.as_bool().unwrap_or_else(|| {
            warn!("attribute '{name}' has an incompatible value, using false");
            false
        }),
    }
}

fn attr_string(attributes: &[Attribute], name: &str) -> String {
    find_attribute(attributes, name)
        .map(AttributeValue::to_text)
        .unwrap_or_default()
}

// =============================================================================
// Project Data
// =============================================================================

/// The generic tree plus the semantic overlay, independent of any database.
#[derive(Default)]
pub(crate) struct ProjectData {
    pub tree: ProjectTree,
    pub names: NameCache,
    pub tracks: Vec<WaveTrack>,
    pub clips: Vec<Clip>,
    pub sequences: Vec<Sequence>,
    pub blocks: Vec<WaveBlock>,
}

impl ProjectData {
    /// Derived block length: distance to the next sibling's start, or to
    /// the end of the sequence for the last block.
    pub fn block_length(&self, block_index: usize) -> i64 {
        let block = &self.blocks[block_index];
        let sequence = &self.sequences[block.sequence];

        match sequence.blocks.get(block.index + 1) {
            Some(&next) => self.blocks[next].start - block.start,
            None => sequence.num_samples - block.start,
        }
    }

    /// Rewrites a block as silence of its current length and marks it bad.
    ///
    /// The length is read before the mutation; since only `blockid` changes,
    /// converting several siblings in any order yields the same lengths, and
    /// converting an already-silent block is a no-op in effect.
    pub fn convert_to_silence(&mut self, block_index: usize) {
        let length = self.block_length(block_index);

        let blockid = self.names.intern("blockid");
        let badblock = self.names.intern("badblock");

        self.blocks[block_index].block_id = -length;

        let node = self.tree.node_mut(self.blocks[block_index].node);
        node.set_attribute(blockid, AttributeValue::LongLong(-length));
        node.set_attribute(badblock, AttributeValue::Bool(true));
    }
}

// =============================================================================
// Project Parser
// =============================================================================

/// Overlay slot pushed per element so the overlay stack mirrors the parse
/// stack even across unrecognized elements.
#[derive(Clone, Copy)]
enum OverlayRef {
    None,
    Track(usize),
    Clip(usize),
    Sequence(usize),
}

/// Event sink building the tree and the semantic overlay in one pass.
pub(crate) struct ProjectParser {
    builder: TreeBuilder,
    stack: Vec<OverlayRef>,
    tracks: Vec<WaveTrack>,
    clips: Vec<Clip>,
    sequences: Vec<Sequence>,
    blocks: Vec<WaveBlock>,
}

impl ProjectParser {
    pub fn new() -> Self {
        Self {
            builder: TreeBuilder::new(),
            stack: Vec::new(),
            tracks: Vec::new(),
            clips: Vec::new(),
            sequences: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Most recent overlay ancestor of the wanted kind.
    fn innermost_track(&self) -> Option<usize> {
        self.stack.iter().rev().find_map(|entry| match entry {
            OverlayRef::Track(index) => Some(*index),
            _ => None,
        })
    }

    fn innermost_clip(&self) -> Option<usize> {
        self.stack.iter().rev().find_map(|entry| match entry {
            OverlayRef::Clip(index) => Some(*index),
            _ => None,
        })
    }

    fn innermost_sequence(&self) -> Option<usize> {
        self.stack.iter().rev().find_map(|entry| match entry {
            OverlayRef::Sequence(index) => Some(*index),
            _ => None,
        })
    }

    pub fn finish(self) -> ProjectData {
        let (tree, names) = self.builder.finish();
        ProjectData {
            tree,
            names,
            tracks: self.tracks,
            clips: self.clips,
            sequences: self.sequences,
            blocks: self.blocks,
        }
    }
}

impl XmlHandler for ProjectParser {
    fn handle_tag_start(&mut self, name: &str, attributes: &[Attribute]) {
        let node = self.builder.start_element(name, attributes);

        let entry = match name {
            "wavetrack" => {
                let index = self.tracks.len();
                self.tracks.push(WaveTrack {
                    node,
                    index,
                    name: attr_string(attributes, "name"),
                    channel: attr_i64(attributes, "channel") as i32,
                    linked: attr_bool(attributes, "linked"),
                    sample_format: attr_i64(attributes, "sampleformat") as i32,
                    rate: attr_i64(attributes, "rate") as i32,
                    clips: Vec::new(),
                });
                OverlayRef::Track(index)
            }
            "waveclip" => match self.innermost_track() {
                Some(track) => {
                    let arena_index = self.clips.len();
                    self.clips.push(Clip {
                        node,
                        track,
                        index: self.tracks[track].clips.len(),
                        name: attr_string(attributes, "name"),
                        offset: attr_f64(attributes, "offset"),
                        trim_left: attr_f64(attributes, "trimLeft"),
                        trim_right: attr_f64(attributes, "trimRight"),
                        sequences: Vec::new(),
                    });
                    self.tracks[track].clips.push(arena_index);
                    OverlayRef::Clip(arena_index)
                }
                None => {
                    warn!("waveclip outside of any wavetrack, ignored");
                    OverlayRef::None
                }
            },
            "sequence" => match self.innermost_clip() {
                Some(clip) => {
                    let arena_index = self.sequences.len();
                    self.sequences.push(Sequence {
                        node,
                        clip,
                        index: self.clips[clip].sequences.len(),
                        max_samples: attr_i64(attributes, "maxsamples"),
                        num_samples: attr_i64(attributes, "numsamples"),
                        sample_format: attr_i64(attributes, "sampleformat") as i32,
                        blocks: Vec::new(),
                    });
                    self.clips[clip].sequences.push(arena_index);
                    OverlayRef::Sequence(arena_index)
                }
                None => {
                    warn!("sequence outside of any waveclip, ignored");
                    OverlayRef::None
                }
            },
            "waveblock" => match self.innermost_sequence() {
                Some(sequence) => {
                    let arena_index = self.blocks.len();
                    self.blocks.push(WaveBlock {
                        node,
                        sequence,
                        index: self.sequences[sequence].blocks.len(),
                        start: attr_i64(attributes, "start"),
                        block_id: attr_i64(attributes, "blockid"),
                    });
                    self.sequences[sequence].blocks.push(arena_index);
                    OverlayRef::None
                }
                None => {
                    warn!("waveblock outside of any sequence, ignored");
                    OverlayRef::None
                }
            },
            _ => OverlayRef::None,
        };

        self.stack.push(entry);
    }

    fn handle_tag_end(&mut self, _name: &str) {
        self.builder.end_element();
        self.stack.pop();
    }

    fn handle_char_data(&mut self, data: &str) {
        self.builder.char_data(data);
    }
}

// =============================================================================
// Audacity Project
// =============================================================================

/// Rounding used for trim boundaries: half away from zero.
fn round_samples(value: f64) -> i64 {
    value.round() as i64
}

/// A parsed project bound to its database for validation, repair and
/// extraction.
pub struct AudacityProject<'db> {
    db: &'db mut AudacityDatabase,
    data: ProjectData,
    from_autosave: bool,
}

impl<'db> AudacityProject<'db> {
    /// Parses the project blob out of the database. The `autosave` row takes
    /// precedence over `project` when present.
    pub fn load(db: &'db mut AudacityDatabase) -> Result<Self> {
        let from_autosave = db.has_autosave()?;
        let table = if from_autosave { "autosave" } else { "project" };
        info!("reading project from table {table}");

        let blob = db.read_project_blob(table)?;

        let mut parser = ProjectParser::new();
        codec::parse(&blob, &mut parser)?;

        Ok(Self {
            db,
            data: parser.finish(),
            from_autosave,
        })
    }

    pub fn from_autosave(&self) -> bool {
        self.from_autosave
    }

    pub fn tracks(&self) -> &[WaveTrack] {
        &self.data.tracks
    }

    pub fn blocks(&self) -> &[WaveBlock] {
        &self.data.blocks
    }

    /// Checks every non-silence block against `sampleblocks` in document
    /// order. A block is invalid when its row is missing, its stored format
    /// disagrees with the sequence, or its row cannot even be queried; ids
    /// already known bad are not re-checked.
    pub fn validate_blocks(&self) -> BTreeSet<i64> {
        let mut invalid = BTreeSet::new();

        for block in &self.data.blocks {
            if block.is_silence() || invalid.contains(&block.block_id) {
                continue;
            }

            let expected = self.data.sequences[block.sequence].sample_format;

            let fault = match self.db.block_format(block.block_id) {
                Ok(Some(actual)) if actual == expected => None,
                Ok(Some(actual)) => Some(Error::BlockFormatMismatch {
                    block_id: block.block_id,
                    expected,
                    actual,
                }),
                Ok(None) => Some(Error::BlockMissing(block.block_id)),
                Err(err) => Some(err),
            };

            if let Some(fault) = fault {
                warn!("invalid block {}: {fault}", block.block_id);
                invalid.insert(block.block_id);
            }
        }

        invalid
    }

    /// Validates, converts every invalid block to silence, registers the
    /// `badblock` name, and writes the repaired tree back. Returns the ids
    /// that were repaired.
    pub fn fixup_missing_blocks(&mut self) -> Result<BTreeSet<i64>> {
        let missing = self.validate_blocks();

        for index in 0..self.data.blocks.len() {
            if missing.contains(&self.data.blocks[index].block_id) {
                self.data.convert_to_silence(index);
            }
        }

        if !missing.is_empty() {
            self.data.names.intern("badblock");
            self.save_project()?;
        }

        Ok(missing)
    }

    /// Re-encodes the tree and replaces the blob row it was read from.
    pub fn save_project(&mut self) -> Result<()> {
        self.db.reopen_readonly_as_writable()?;

        let (dict, doc) = codec::serialize_project(&self.data.names, &self.data.tree)?;
        let table = if self.from_autosave { "autosave" } else { "project" };

        self.db
            .write_project_blob(table, &dict.linearize(), &doc.linearize())
    }

    /// Deletes every `sampleblocks` row not referenced by a non-silence
    /// block, inside one transaction, then vacuums.
    pub fn remove_unused_blocks(&mut self) -> Result<()> {
        let available = self.db.all_block_ids()?;

        let referenced: BTreeSet<i64> = self
            .data
            .blocks
            .iter()
            .filter(|block| !block.is_silence())
            .map(|block| block.block_id)
            .collect();

        let orphaned: BTreeSet<i64> = available
            .into_iter()
            .filter(|id| !referenced.contains(id))
            .collect();

        self.db.reopen_readonly_as_writable()?;
        self.db.delete_blocks(&orphaned)
    }

    /// Writes one WAV per clip under `<data>/clips`, honoring the clip's
    /// trim window and substituting zeroes for silence blocks.
    pub fn extract_clips(&self) -> Result<()> {
        let directory = self.db.data_path().join("clips");
        fs::create_dir_all(&directory)?;

        for clip in &self.data.clips {
            let track = &self.data.tracks[clip.track];
            let format = SampleFormat::from_raw(track.sample_format)?;
            let bytes_per_sample = format.bytes_per_sample() as i64;
            let rate = track.rate as f64;

            let file_name = format!(
                "{}_{}_{}_{}.wav",
                track.index, track.name, clip.index, clip.name
            );
            let mut wave = WaveFile::new(
                directory.join(&file_name),
                format,
                track.rate as u32,
                1,
            );

            let mut silence: Vec<u8> = Vec::new();

            for &sequence_index in &clip.sequences {
                let sequence = &self.data.sequences[sequence_index];

                let first_sample = round_samples(clip.trim_left * rate);
                let last_sample = sequence.num_samples - round_samples(clip.trim_right * rate);

                for &block_index in &sequence.blocks {
                    let block = &self.data.blocks[block_index];

                    let start = block.start;
                    let end = start + self.data.block_length(block_index);

                    if end <= first_sample || start >= last_sample {
                        continue;
                    }

                    let clipped_start = start.max(first_sample);
                    let clipped_end = end.min(last_sample);
                    let clipped_bytes = ((clipped_end - clipped_start) * bytes_per_sample) as usize;

                    if clipped_bytes == 0 {
                        continue;
                    }

                    if block.is_silence() {
                        if silence.len() < clipped_bytes {
                            silence.resize(clipped_bytes, 0);
                        }
                        wave.write_block(&silence[..clipped_bytes], 0);
                        continue;
                    }

                    let Some(samples) = self.db.block_samples(block.block_id)? else {
                        warn!(
                            "sample block {} missing during clip extraction, skipped",
                            block.block_id
                        );
                        continue;
                    };

                    let offset = ((clipped_start - start) * bytes_per_sample) as usize;
                    let needed = offset + clipped_bytes;

                    if samples.len() < needed {
                        return Err(Error::BlobSizeMismatch {
                            block_id: block.block_id,
                            needed: needed as u64,
                            actual: samples.len() as u64,
                        });
                    }

                    wave.write_block(&samples[offset..needed], 0);
                }
            }

            wave.write_file()?;
            info!("extracted clip to {file_name}");
        }

        Ok(())
    }

    /// Prints a per-track, per-clip report plus block sharing statistics.
    pub fn print_statistics(&self) {
        #[derive(Default)]
        struct BlockStats {
            total: usize,
            audible: usize,
        }

        let mut stats: HashMap<i64, BlockStats> = HashMap::new();

        for track in &self.data.tracks {
            println!("Track {}: {}", track.index, track.name);

            for &clip_index in &track.clips {
                let clip = &self.data.clips[clip_index];
                let rate = track.rate as f64;

                let first_sample = (clip.trim_left * rate) as i64;
                let last_sample_offset = (clip.trim_right * rate) as i64;

                let mut num_samples: i64 = 0;

                for &sequence_index in &clip.sequences {
                    let sequence = &self.data.sequences[sequence_index];
                    num_samples += sequence.num_samples;

                    let last_sample = sequence.num_samples - last_sample_offset;

                    for &block_index in &sequence.blocks {
                        let block = &self.data.blocks[block_index];
                        let entry = stats.entry(block.block_id).or_default();

                        entry.total += 1;
                        if block.start + self.data.block_length(block_index) >= first_sample
                            && block.start < last_sample
                        {
                            entry.audible += 1;
                        }
                    }
                }

                let total_time = num_samples as f64 / rate;
                let trimmed_time = total_time - clip.trim_left - clip.trim_right;

                println!("\tClip {}: '{}'", clip.index, clip.name);
                println!("\t\tTotal samples: {num_samples}");
                println!("\t\tTotal time: {}", format_time(total_time));
                println!("\t\tTrimmed time: {}", format_time(trimmed_time));
                if total_time > 0.0 {
                    println!(
                        "\t\tTrimmed / Total: {:.4}%",
                        trimmed_time / total_time * 100.0
                    );
                }
            }
        }

        let total_blocks = stats.len();
        let silent = stats.values().filter(|s| s.audible == 0).count();
        let unshared = stats.values().filter(|s| s.total == 1).count();
        let unshared_silent = stats
            .values()
            .filter(|s| s.audible == 0 && s.total == 1)
            .count();

        println!("Total blocks in project: {total_blocks}");
        if total_blocks > 0 {
            println!(
                "\tNever audible: {} ({:.2}%)",
                silent,
                silent as f64 / total_blocks as f64 * 100.0
            );
            println!(
                "Not shared: {} ({:.2}%)",
                unshared,
                unshared as f64 / total_blocks as f64 * 100.0
            );
            println!("\tNever audible and not shared: {unshared_silent}");
        }
    }
}

/// `HH:MM:SS.mmm`, shortened when the magnitude allows.
fn format_time(seconds: f64) -> String {
    if seconds < 0.0 {
        return format!("{seconds}");
    }

    let whole = seconds as i64;
    let millis = ((seconds * 1000.0) as i64) % 1000;

    if seconds > 3600.0 {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            whole / 3600,
            whole / 60 % 60,
            whole % 60,
            millis
        )
    } else if seconds > 60.0 {
        format!("{:02}:{:02}.{:03}", whole / 60, whole % 60, millis)
    } else {
        format!("{:02}.{:03}", whole, millis)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds a synthetic track/clip/sequence with the given blocks through
    /// the parser.
    fn parse_sequence(num_samples: i64, blocks: &[(i64, i64)]) -> ProjectData {
        let mut parser = ProjectParser::new();

        parser.handle_tag_start("project", &[]);
        parser.handle_tag_start(
            "wavetrack",
            &[
                Attribute::new("name", AttributeValue::Str("track".into())),
                Attribute::new("rate", AttributeValue::Int(44100)),
                Attribute::new("sampleformat", AttributeValue::Int(0x0004_000F)),
            ],
        );
        parser.handle_tag_start("waveclip", &[]);
        parser.handle_tag_start(
            "sequence",
            &[
                Attribute::new("numsamples", AttributeValue::LongLong(num_samples)),
                Attribute::new("sampleformat", AttributeValue::Int(0x0004_000F)),
            ],
        );

        for &(start, block_id) in blocks {
            parser.handle_tag_start(
                "waveblock",
                &[
                    Attribute::new("start", AttributeValue::LongLong(start)),
                    Attribute::new("blockid", AttributeValue::LongLong(block_id)),
                ],
            );
            parser.handle_tag_end("waveblock");
        }

        parser.handle_tag_end("sequence");
        parser.handle_tag_end("waveclip");
        parser.handle_tag_end("wavetrack");
        parser.handle_tag_end("project");

        parser.finish()
    }

    #[test]
    fn test_overlay_structure() {
        let data = parse_sequence(600, &[(0, 1), (100, 2), (250, 3)]);

        assert_eq!(data.tracks.len(), 1);
        assert_eq!(data.clips.len(), 1);
        assert_eq!(data.sequences.len(), 1);
        assert_eq!(data.blocks.len(), 3);

        assert_eq!(data.tracks[0].rate, 44100);
        assert_eq!(data.clips[0].track, 0);
        assert_eq!(data.sequences[0].blocks, vec![0, 1, 2]);
        assert_eq!(data.blocks[2].index, 2);
    }

    #[test]
    fn test_block_lengths_sum_to_sequence_samples() {
        let data = parse_sequence(600, &[(0, 1), (100, 2), (250, 3)]);

        let lengths: Vec<i64> = (0..3).map(|i| data.block_length(i)).collect();
        assert_eq!(lengths, vec![100, 150, 350]);
        assert_eq!(lengths.iter().sum::<i64>(), 600);
    }

    #[test]
    fn test_convert_to_silence_marks_tree_node() {
        let mut data = parse_sequence(1000, &[(0, 42)]);

        data.convert_to_silence(0);

        assert_eq!(data.blocks[0].block_id, -1000);
        assert!(data.blocks[0].is_silence());

        let node = data.tree.node(data.blocks[0].node);
        let blockid = data.names.lookup("blockid").unwrap();
        let badblock = data.names.lookup("badblock").unwrap();

        assert_eq!(
            node.attribute(blockid),
            Some(&AttributeValue::LongLong(-1000))
        );
        assert_eq!(node.attribute(badblock), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_convert_to_silence_is_idempotent() {
        let mut data = parse_sequence(1000, &[(0, 42)]);

        data.convert_to_silence(0);
        data.convert_to_silence(0);

        assert_eq!(data.blocks[0].block_id, -1000);

        let node = data.tree.node(data.blocks[0].node);
        let blockid = data.names.lookup("blockid").unwrap();
        assert_eq!(
            node.attribute(blockid),
            Some(&AttributeValue::LongLong(-1000))
        );
    }

    #[test]
    fn test_unrecognized_elements_keep_stacks_aligned() {
        let mut parser = ProjectParser::new();

        parser.handle_tag_start("project", &[]);
        parser.handle_tag_start("tags", &[]);
        parser.handle_tag_end("tags");
        parser.handle_tag_start("wavetrack", &[]);
        parser.handle_tag_start("effects", &[]); // unknown wrapper
        parser.handle_tag_start("waveclip", &[]);
        parser.handle_tag_end("waveclip");
        parser.handle_tag_end("effects");
        parser.handle_tag_end("wavetrack");
        parser.handle_tag_end("project");

        let data = parser.finish();

        // The clip still finds its track through the unknown wrapper.
        assert_eq!(data.clips.len(), 1);
        assert_eq!(data.clips[0].track, 0);
        assert_eq!(data.tracks[0].clips, vec![0]);
    }

    #[test]
    fn test_orphan_semantic_elements_are_ignored() {
        let mut parser = ProjectParser::new();

        parser.handle_tag_start("project", &[]);
        parser.handle_tag_start("waveblock", &[]); // no sequence anywhere
        parser.handle_tag_end("waveblock");
        parser.handle_tag_end("project");

        let data = parser.finish();
        assert!(data.blocks.is_empty());
        // The generic tree still holds the node.
        assert_eq!(data.tree.len(), 2);
    }

    #[test]
    fn test_format_time_magnitudes() {
        assert_eq!(format_time(5.25), "05.250");
        assert_eq!(format_time(65.5), "01:05.500");
        assert_eq!(format_time(3723.5), "01:02:03.500");
        assert_eq!(format_time(-1.0), "-1");
    }

    #[test]
    fn test_round_samples_half_away_from_zero() {
        assert_eq!(round_samples(0.5), 1);
        assert_eq!(round_samples(1.5), 2);
        assert_eq!(round_samples(-0.5), -1);
        assert_eq!(round_samples(2.4), 2);
    }
}
