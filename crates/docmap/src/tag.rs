//! Type tags for document values.
//!
//! A type tag is a single byte naming the logical kind of a value. The
//! numbering follows the BSON element types, so a tag can be compared with
//! what the codec writes in front of every element. `Array` (0x04) shares
//! its byte-level layout with `Document` (0x03); which of the two a
//! marshalled value gets is decided by the engine, not by the bytes.

use bson::Bson;
use bson::spec::ElementType;

/// Logical kind of a document value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    RegularExpression = 0x0B,
    DbPointer = 0x0C,
    JavaScriptCode = 0x0D,
    Symbol = 0x0E,
    JavaScriptCodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl TypeTag {
    /// Parse a tag from its raw byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x01 => TypeTag::Double,
            0x02 => TypeTag::String,
            0x03 => TypeTag::Document,
            0x04 => TypeTag::Array,
            0x05 => TypeTag::Binary,
            0x06 => TypeTag::Undefined,
            0x07 => TypeTag::ObjectId,
            0x08 => TypeTag::Boolean,
            0x09 => TypeTag::DateTime,
            0x0A => TypeTag::Null,
            0x0B => TypeTag::RegularExpression,
            0x0C => TypeTag::DbPointer,
            0x0D => TypeTag::JavaScriptCode,
            0x0E => TypeTag::Symbol,
            0x0F => TypeTag::JavaScriptCodeWithScope,
            0x10 => TypeTag::Int32,
            0x11 => TypeTag::Timestamp,
            0x12 => TypeTag::Int64,
            0x13 => TypeTag::Decimal128,
            0x7F => TypeTag::MaxKey,
            0xFF => TypeTag::MinKey,
            _ => return None,
        })
    }

    /// Get the raw tag byte.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Tag the codec assigns to a value.
    ///
    /// The codec has no notion of the value's Rust type, so a sequence that
    /// was encoded as a document is classified as a document here.
    #[must_use]
    pub fn infer(value: &Bson) -> Self {
        Self::from(value.element_type())
    }

    /// Whether bytes carrying this tag are laid out as a document.
    #[inline]
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, TypeTag::Document | TypeTag::Array)
    }

    /// Get the tag name (for error messages).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::Document => "document",
            TypeTag::Array => "array",
            TypeTag::Binary => "binary",
            TypeTag::Undefined => "undefined",
            TypeTag::ObjectId => "objectId",
            TypeTag::Boolean => "bool",
            TypeTag::DateTime => "date",
            TypeTag::Null => "null",
            TypeTag::RegularExpression => "regex",
            TypeTag::DbPointer => "dbPointer",
            TypeTag::JavaScriptCode => "javascript",
            TypeTag::Symbol => "symbol",
            TypeTag::JavaScriptCodeWithScope => "javascriptWithScope",
            TypeTag::Int32 => "int",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Int64 => "long",
            TypeTag::Decimal128 => "decimal",
            TypeTag::MaxKey => "maxKey",
            TypeTag::MinKey => "minKey",
        }
    }
}

impl From<ElementType> for TypeTag {
    fn from(t: ElementType) -> Self {
        // Both enums use the BSON element numbering.
        TypeTag::from_byte(t as u8).unwrap_or(TypeTag::Document)
    }
}

/// Name of a value's kind (for error messages).
#[must_use]
pub fn kind_name(value: &Bson) -> &'static str {
    TypeTag::infer(value).name()
}
