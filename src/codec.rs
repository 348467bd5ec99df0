//! # Binary Project-Tree Codec
//!
//! `.aup3` files store the project document in a custom opcode stream split
//! across two blobs: `dict` (character-size header plus the name table) and
//! `doc` (the element stream). This module decodes that stream into
//! [`XmlHandler`](crate::xml::XmlHandler) events and encodes a
//! [`ProjectTree`](crate::tree::ProjectTree) back into it.
//!
//! ## Record Format
//!
//! Every record starts with a one-byte opcode. Most carry a u16 name id;
//! strings are length-prefixed; all values are little-endian:
//!
//! ```text
//! CharSize  [00][width u8]                       width ∈ {1, 2, 4}
//! StartTag  [01][id u16]
//! EndTag    [02][id u16]
//! String    [03][id u16][len u32][bytes]
//! Int       [04][id u16][i32]
//! Bool      [05][id u16][u8]
//! Long      [06][id u16][i32]                    legacy, kept distinct
//! LongLong  [07][id u16][i64]
//! SizeT     [08][id u16][u32]
//! Float     [09][id u16][f32][digits u32]        digits ignored on decode
//! Double    [0A][id u16][f64][digits u32]
//! Data      [0B][len u32][bytes]                 character data
//! Raw       [0C][len u32][bytes]                 skipped
//! Push      [0D]                                 no payload, no effect
//! Pop       [0E]
//! Name      [0F][id u16][len u16][bytes]         declares an identifier
//! ```
//!
//! The active character width applies to `String`, `Data` and `Name`
//! payloads, which are converted to UTF-8 on decode. The encoder always
//! writes width 1 and re-emits floats and doubles with digit suffixes 7 and
//! 19, matching the writer that produces these files.

use std::cmp::Ordering;

use crate::buffer::{Buffer, Trivial};
use crate::error::{Error, Result};
use crate::tree::{NameCache, ProjectTree, TreeNode};
use crate::xml::{Attribute, AttributeValue, XmlHandler};

// =============================================================================
// Opcodes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Op {
    CharSize = 0,
    StartTag = 1,
    EndTag = 2,
    String = 3,
    Int = 4,
    Bool = 5,
    Long = 6,
    LongLong = 7,
    SizeT = 8,
    Float = 9,
    Double = 10,
    Data = 11,
    Raw = 12,
    Push = 13,
    Pop = 14,
    Name = 15,
}

impl Op {
    fn from_byte(byte: u8) -> Result<Op> {
        Ok(match byte {
            0 => Op::CharSize,
            1 => Op::StartTag,
            2 => Op::EndTag,
            3 => Op::String,
            4 => Op::Int,
            5 => Op::Bool,
            6 => Op::Long,
            7 => Op::LongLong,
            8 => Op::SizeT,
            9 => Op::Float,
            10 => Op::Double,
            11 => Op::Data,
            12 => Op::Raw,
            13 => Op::Push,
            14 => Op::Pop,
            15 => Op::Name,
            other => return Err(Error::BadOpcode(other)),
        })
    }
}

/// Digit-count suffix the writer appends to `Float` records.
const FLOAT_DIGITS: u32 = 7;
/// Digit-count suffix the writer appends to `Double` records.
const DOUBLE_DIGITS: u32 = 19;

// =============================================================================
// Stream Reader
// =============================================================================

/// Cursor over a serialized stream with the out-of-band character width.
struct StreamReader<'a> {
    buffer: &'a Buffer,
    offset: usize,
    /// 0 until a `CharSize` record has been seen.
    char_size: u8,
}

impl<'a> StreamReader<'a> {
    fn new(buffer: &'a Buffer) -> Self {
        Self {
            buffer,
            offset: 0,
            char_size: 0,
        }
    }

    fn is_eof(&self) -> bool {
        self.offset >= self.buffer.size()
    }

    fn read<T: Trivial>(&mut self) -> Result<T> {
        match self.buffer.read_value::<T>(self.offset) {
            Some(value) => {
                self.offset += T::SIZE;
                Ok(value)
            }
            None => Err(Error::Truncated {
                offset: self.offset as u64,
                needed: T::SIZE,
            }),
        }
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; count];
        if self.buffer.read(&mut data, self.offset) != count {
            return Err(Error::Truncated {
                offset: self.offset as u64,
                needed: count,
            });
        }

        self.offset += count;
        Ok(data)
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        let target = self.offset + count;
        if target > self.buffer.size() {
            return Err(Error::Truncated {
                offset: self.offset as u64,
                needed: count,
            });
        }

        self.offset = target;
        Ok(())
    }

    fn set_char_size(&mut self, width: u8) -> Result<()> {
        if !matches!(width, 1 | 2 | 4) {
            return Err(Error::BadCharSize(width));
        }

        self.char_size = width;
        Ok(())
    }

    fn read_len(&mut self, wide: bool) -> Result<usize> {
        Ok(if wide {
            self.read::<u32>()? as usize
        } else {
            self.read::<u16>()? as usize
        })
    }

    /// Reads a length-prefixed string in the active character width and
    /// converts it to UTF-8. Ill-formed input is replaced, not rejected:
    /// this tool exists to read damaged files.
    fn read_string(&mut self, wide_len: bool) -> Result<String> {
        let byte_count = self.read_len(wide_len)?;
        let raw = self.read_bytes(byte_count)?;

        match self.char_size {
            1 => Ok(String::from_utf8_lossy(&raw).into_owned()),
            2 => {
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(String::from_utf16_lossy(&units))
            }
            4 => Ok(raw
                .chunks_exact(4)
                .map(|quad| {
                    let unit = u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]);
                    char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect()),
            other => Err(Error::BadCharSize(other)),
        }
    }

    fn skip_string(&mut self, wide_len: bool) -> Result<()> {
        let byte_count = self.read_len(wide_len)?;
        self.skip(byte_count)
    }
}

// =============================================================================
// Name Table (decoder side)
// =============================================================================

/// Per-parse table of declared identifiers, indexed by wire name id.
#[derive(Default)]
struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    /// Declares `id`. Appending and redeclaring are allowed; leaving a gap
    /// would make lower ids dangling and is rejected.
    fn store(&mut self, id: u16, value: String) -> Result<()> {
        let index = id as usize;
        match index.cmp(&self.names.len()) {
            Ordering::Equal => self.names.push(value),
            Ordering::Less => self.names[index] = value,
            Ordering::Greater => return Err(Error::UndeclaredName(id)),
        }

        Ok(())
    }

    fn get(&self, id: u16) -> Result<&str> {
        self.names
            .get(id as usize)
            .map(String::as_str)
            .ok_or(Error::UndeclaredName(id))
    }
}

// =============================================================================
// Event Assembly
// =============================================================================

/// Buffers attributes between a `StartTag` and the next structural record,
/// then flushes the complete start event to the sink.
struct EventAssembler<'h, H: XmlHandler + ?Sized> {
    handler: &'h mut H,
    pending: Option<String>,
    attributes: Vec<Attribute>,
}

impl<'h, H: XmlHandler + ?Sized> EventAssembler<'h, H> {
    fn new(handler: &'h mut H) -> Self {
        Self {
            handler,
            pending: None,
            attributes: Vec::new(),
        }
    }

    fn flush_pending(&mut self) {
        if let Some(name) = self.pending.take() {
            self.handler.handle_tag_start(&name, &self.attributes);
            self.attributes.clear();
        }
    }

    fn start_tag(&mut self, name: &str) {
        self.flush_pending();
        self.pending = Some(name.to_string());
    }

    fn end_tag(&mut self, name: &str) {
        self.flush_pending();
        self.handler.handle_tag_end(name);
    }

    fn attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        if self.pending.is_none() {
            return Err(Error::OrphanAttribute(name.to_string()));
        }

        self.attributes.push(Attribute::new(name, value));
        Ok(())
    }

    fn char_data(&mut self, data: &str) {
        self.flush_pending();
        self.handler.handle_char_data(data);
    }

    /// A stream may end with a start tag whose attributes are still pending;
    /// flush it and close the element so the sink sees balanced events.
    fn finish(mut self) {
        if let Some(name) = self.pending.clone() {
            self.flush_pending();
            self.handler.handle_tag_end(&name);
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decodes a serialized stream, emitting document events to `handler`.
///
/// The buffer normally holds the `dict` and `doc` blobs concatenated in that
/// order, so the name table is complete before the first element record.
pub fn parse<H: XmlHandler + ?Sized>(buffer: &Buffer, handler: &mut H) -> Result<()> {
    let mut stream = StreamReader::new(buffer);
    let mut names = NameTable::default();
    let mut events = EventAssembler::new(handler);

    while !stream.is_eof() {
        let op = Op::from_byte(stream.read::<u8>()?)?;

        match op {
            Op::CharSize => {
                let width = stream.read::<u8>()?;
                stream.set_char_size(width)?;
            }
            Op::StartTag => {
                let id = stream.read::<u16>()?;
                events.start_tag(names.get(id)?);
            }
            Op::EndTag => {
                let id = stream.read::<u16>()?;
                events.end_tag(names.get(id)?);
            }
            Op::String => {
                let id = stream.read::<u16>()?;
                let value = stream.read_string(true)?;
                events.attribute(names.get(id)?, AttributeValue::Str(value))?;
            }
            Op::Int => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<i32>()?;
                events.attribute(names.get(id)?, AttributeValue::Int(value))?;
            }
            Op::Bool => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<u8>()?;
                events.attribute(names.get(id)?, AttributeValue::Bool(value != 0))?;
            }
            Op::Long => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<i32>()?;
                events.attribute(names.get(id)?, AttributeValue::Long(value))?;
            }
            Op::LongLong => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<i64>()?;
                events.attribute(names.get(id)?, AttributeValue::LongLong(value))?;
            }
            Op::SizeT => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<u32>()?;
                events.attribute(names.get(id)?, AttributeValue::UInt(value))?;
            }
            Op::Float => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<f32>()?;
                stream.skip(4)?; // digit-count hint
                events.attribute(names.get(id)?, AttributeValue::Float(value))?;
            }
            Op::Double => {
                let id = stream.read::<u16>()?;
                let value = stream.read::<f64>()?;
                stream.skip(4)?;
                events.attribute(names.get(id)?, AttributeValue::Double(value))?;
            }
            Op::Data => {
                let data = stream.read_string(true)?;
                events.char_data(&data);
            }
            Op::Raw => {
                stream.skip_string(true)?;
            }
            Op::Push | Op::Pop => {}
            Op::Name => {
                let id = stream.read::<u16>()?;
                let name = stream.read_string(false)?;
                names.store(id, name)?;
            }
        }
    }

    events.finish();
    Ok(())
}

// =============================================================================
// Encoding
// =============================================================================

fn name_id(names: &NameCache, id: crate::tree::NameId) -> Result<u16> {
    if (id.0 as usize) < names.len() {
        Ok(id.0)
    } else {
        Err(Error::UnknownName(format!("#{}", id.0)))
    }
}

fn write_attribute(doc: &mut Buffer, id: u16, value: &AttributeValue) {
    match value {
        AttributeValue::Bool(v) => {
            doc.append_value(Op::Bool as u8);
            doc.append_value(id);
            doc.append_value(u8::from(*v));
        }
        AttributeValue::Int(v) => {
            doc.append_value(Op::Int as u8);
            doc.append_value(id);
            doc.append_value(*v);
        }
        AttributeValue::Long(v) => {
            doc.append_value(Op::Long as u8);
            doc.append_value(id);
            doc.append_value(*v);
        }
        AttributeValue::UInt(v) => {
            doc.append_value(Op::SizeT as u8);
            doc.append_value(id);
            doc.append_value(*v);
        }
        AttributeValue::SizeT(v) => {
            doc.append_value(Op::SizeT as u8);
            doc.append_value(id);
            doc.append_value(*v as u32);
        }
        AttributeValue::LongLong(v) => {
            doc.append_value(Op::LongLong as u8);
            doc.append_value(id);
            doc.append_value(*v);
        }
        AttributeValue::Float(v) => {
            doc.append_value(Op::Float as u8);
            doc.append_value(id);
            doc.append_value(*v);
            doc.append_value(FLOAT_DIGITS);
        }
        AttributeValue::Double(v) => {
            doc.append_value(Op::Double as u8);
            doc.append_value(id);
            doc.append_value(*v);
            doc.append_value(DOUBLE_DIGITS);
        }
        AttributeValue::Str(s) => {
            doc.append_value(Op::String as u8);
            doc.append_value(id);
            doc.append_value(s.len() as u32);
            doc.append(s.as_bytes());
        }
    }
}

fn write_node(
    names: &NameCache,
    tree: &ProjectTree,
    node: &TreeNode,
    doc: &mut Buffer,
) -> Result<()> {
    let tag = name_id(names, node.tag)?;

    doc.append_value(Op::StartTag as u8);
    doc.append_value(tag);

    for (attr_name, value) in &node.attributes {
        write_attribute(doc, name_id(names, *attr_name)?, value);
    }

    if !node.data.is_empty() {
        doc.append_value(Op::Data as u8);
        doc.append_value(node.data.len() as u32);
        doc.append(node.data.as_bytes());
    }

    for &child in &node.children {
        write_node(names, tree, tree.node(child), doc)?;
    }

    doc.append_value(Op::EndTag as u8);
    doc.append_value(tag);

    Ok(())
}

/// Serializes a tree into the `(dict, doc)` blob pair.
///
/// The dict blob carries a `CharSize = 1` header (strings are written solely
/// in UTF-8) and one `Name` record per cache entry in cache order, so a
/// name's cache index is its wire id. The doc blob is the depth-first
/// element stream.
pub fn serialize_project(names: &NameCache, tree: &ProjectTree) -> Result<(Buffer, Buffer)> {
    let mut dict = Buffer::new();
    let mut doc = Buffer::new();

    dict.append_value(Op::CharSize as u8);
    dict.append_value(1u8);

    for (index, name) in names.iter().enumerate() {
        dict.append_value(Op::Name as u8);
        dict.append_value(index as u16);
        dict.append_value(name.len() as u16);
        dict.append(name.as_bytes());
    }

    if let Some(root) = tree.root() {
        write_node(names, tree, tree.node(root), &mut doc)?;
    }

    Ok((dict, doc))
}

// =============================================================================
// XML Pretty-Printer
// =============================================================================

/// Event sink that renders the document as indented UTF-8 XML.
///
/// Elements collapse to self-closing form only when the end tag immediately
/// follows its own start tag with no intervening character data.
pub struct XmlPrinter {
    out: Buffer,
    indent: String,
    last_started: String,
    /// Start tag written but not yet closed with `>`.
    in_tag: bool,
    /// Character data emitted since the last start tag.
    inline_text: bool,
}

impl XmlPrinter {
    pub fn new() -> Self {
        Self {
            out: Buffer::new(),
            indent: String::new(),
            last_started: String::new(),
            in_tag: false,
            inline_text: false,
        }
    }

    pub fn into_buffer(self) -> Buffer {
        self.out
    }

    fn write(&mut self, text: &str) {
        self.out.append(text.as_bytes());
    }

    /// Escapes markup characters and drops control bytes other than tab,
    /// line feed and carriage return.
    fn write_escaped(&mut self, text: &str) {
        for &byte in text.as_bytes() {
            match byte {
                b'\'' => self.out.append(b"&apos;"),
                b'"' => self.out.append(b"&quot;"),
                b'&' => self.out.append(b"&amp;"),
                b'<' => self.out.append(b"&lt;"),
                b'>' => self.out.append(b"&gt;"),
                0x09 | 0x0A | 0x0D => self.out.append(&[byte]),
                byte if byte < 0x20 => {}
                byte => self.out.append(&[byte]),
            }
        }
    }
}

impl Default for XmlPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlHandler for XmlPrinter {
    fn handle_tag_start(&mut self, name: &str, attributes: &[Attribute]) {
        if self.in_tag {
            self.write(">\n");
        }

        let indent = self.indent.clone();
        self.write(&indent);
        self.write("<");
        self.write(name);

        for attr in attributes {
            self.write(" ");
            self.write(&attr.name);
            self.write("=\"");
            let text = attr.value.to_text();
            self.write_escaped(&text);
            self.write("\"");
        }

        self.last_started = name.to_string();
        self.in_tag = true;
        self.inline_text = false;
        self.indent.push_str("  ");
    }

    fn handle_tag_end(&mut self, name: &str) {
        self.indent.truncate(self.indent.len().saturating_sub(2));

        if self.in_tag && !self.inline_text && self.last_started == name {
            self.write(" />\n");
            self.in_tag = false;
            return;
        }

        if self.in_tag {
            self.write(">\n");
            self.in_tag = false;
        }

        if self.inline_text && self.last_started == name {
            // Closing the element whose text was just written inline.
            self.inline_text = false;
        } else {
            let indent = self.indent.clone();
            self.write(&indent);
        }

        self.write("</");
        self.write(name);
        self.write(">\n");
    }

    fn handle_char_data(&mut self, data: &str) {
        if self.in_tag {
            self.write(">");
            self.in_tag = false;
        }

        self.write_escaped(data);
        self.inline_text = true;
    }
}

/// Decodes a serialized stream and renders it as an XML document.
pub fn convert_to_xml(buffer: &Buffer) -> Result<Buffer> {
    let mut printer = XmlPrinter::new();
    parse(buffer, &mut printer)?;
    Ok(printer.into_buffer())
}

// =============================================================================
// Tests
// =============================================================================
