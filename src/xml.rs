//! # XML Events and Attribute Values
//!
//! The serialized project stream is an XML-shaped document: elements with
//! typed attributes and character data. This module defines the tagged
//! attribute value, the attribute list passed with start-tag events, and the
//! [`XmlHandler`] trait every event sink implements.
//!
//! Two sinks exist in this crate: the tree builder ([`crate::tree`]) and the
//! XML pretty-printer ([`crate::codec`]). They share nothing but this trait.

use std::fmt;

// =============================================================================
// Attribute Value
// =============================================================================

/// A typed XML attribute value.
///
/// The variant mirrors the wire opcode the value was read from, and the
/// encoder picks the opcode from the variant, so a value survives a
/// decode/encode round trip with its original record type. In particular
/// `Long` stays distinct from `Int` even though both carry an `i32`:
/// canonicalizing would change the re-encoded stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Int(i32),
    /// Same width as [`AttributeValue::Int`]; appears only in streams written
    /// by old writers and is preserved verbatim.
    Long(i32),
    /// Decode target of `SizeT` records.
    UInt(u32),
    LongLong(i64),
    /// Machine-size values produced programmatically; encoded like
    /// [`AttributeValue::UInt`].
    SizeT(u64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl AttributeValue {
    /// Integral readout. Numeric variants convert; strings are parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Bool(v) => Some(*v as i64),
            AttributeValue::Int(v) | AttributeValue::Long(v) => Some(*v as i64),
            AttributeValue::UInt(v) => Some(*v as i64),
            AttributeValue::LongLong(v) => Some(*v),
            AttributeValue::SizeT(v) => i64::try_from(*v).ok(),
            AttributeValue::Float(v) => Some(*v as i64),
            AttributeValue::Double(v) => Some(*v as i64),
            AttributeValue::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Floating-point readout. Numeric variants convert; strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Bool(v) => Some(*v as u8 as f64),
            AttributeValue::Int(v) | AttributeValue::Long(v) => Some(*v as f64),
            AttributeValue::UInt(v) => Some(*v as f64),
            AttributeValue::LongLong(v) => Some(*v as f64),
            AttributeValue::SizeT(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v as f64),
            AttributeValue::Double(v) => Some(*v),
            AttributeValue::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Boolean readout. Strings accept `true`/`false`/`1`/`0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            AttributeValue::Str(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// The string slice of a `Str` value, or `None` for numeric variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form of any variant, as rendered into exported XML.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Int(v) | AttributeValue::Long(v) => write!(f, "{v}"),
            AttributeValue::UInt(v) => write!(f, "{v}"),
            AttributeValue::LongLong(v) => write!(f, "{v}"),
            AttributeValue::SizeT(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Double(v) => write!(f, "{v}"),
            AttributeValue::Str(s) => write!(f, "{s}"),
        }
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// A named attribute as carried by a start-tag event.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Finds an attribute by name in wire order.
pub fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a AttributeValue> {
    attributes
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| &attr.value)
}

// =============================================================================
// Event Sink
// =============================================================================

/// Receiver of decoded document events, in strict document order.
///
/// The decoder guarantees that attributes arrive already collected on the
/// start event, that `handle_tag_end` names the element being closed (which
/// may differ from the innermost start in malformed streams), and that
/// character data belongs to the most recently started element.
pub trait XmlHandler {
    fn handle_tag_start(&mut self, name: &str, attributes: &[Attribute]);
    fn handle_tag_end(&mut self, name: &str);
    fn handle_char_data(&mut self, data: &str);
}

// =============================================================================
// Tests
// =============================================================================
