//! Binary document values.

use std::fmt;

use bson::{Bson, Document, RawDocument};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::tag::TypeTag;

/// Smallest valid document: 4-byte length prefix + terminator.
const MIN_DOCUMENT_LEN: usize = 5;

/// Maximum number of characters shown by `Display`.
const SNIPPET_LEN: usize = 256;

/// Field name used to frame a non-container value as a document.
pub(crate) const SCALAR_KEY: &str = "";

/// An immutable encoded document together with the kind of value it holds.
///
/// Cloning is cheap: the bytes are reference counted and never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct BsonDocument {
    bytes: Bytes,
    tag: TypeTag,
}

impl BsonDocument {
    /// Wrap bytes read from a document store.
    ///
    /// Only the frame is checked (length prefix and terminator); the codec
    /// validates the elements when the document is decoded.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedDocument` if the buffer is too short, its
    /// length prefix disagrees with the buffer length, or it is not
    /// terminated by a zero byte.
    pub fn from_bytes(bytes: impl Into<Bytes>, tag: TypeTag) -> Result<Self> {
        let bytes = bytes.into();
        check_frame(&bytes)?;
        Ok(Self { bytes, tag })
    }

    /// Encode a codec document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encode` if the codec rejects the document.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let bytes = bson::to_vec(doc)?;
        Ok(Self {
            bytes: Bytes::from(bytes),
            tag: TypeTag::Document,
        })
    }

    /// Get the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get a shared handle to the underlying bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Byte length of the document.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Decode the logical value held by this document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Raw` if the codec rejects the bytes.
    pub fn to_bson(&self) -> Result<Bson> {
        unframe(&self.bytes, self.tag)
    }

    pub(crate) fn from_parts(bytes: Vec<u8>, tag: TypeTag) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            tag,
        }
    }
}

impl fmt::Debug for BsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BsonDocument")
            .field("tag", &self.tag)
            .field("size", &self.size())
            .finish()
    }
}

/// Short, human readable rendering for diagnostics.
impl fmt::Display for BsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bson() {
            Ok(value) => {
                let text = value.into_relaxed_extjson().to_string();
                if text.chars().count() > SNIPPET_LEN {
                    let head: String = text.chars().take(SNIPPET_LEN).collect();
                    write!(f, "{head}...")
                } else {
                    f.write_str(&text)
                }
            }
            Err(_) => {
                let head = &self.bytes[..self.bytes.len().min(32)];
                write!(f, "<{} bytes: {head:02x?}>", self.bytes.len())
            }
        }
    }
}

fn check_frame(bytes: &[u8]) -> Result<()> {
    let len = bytes.len();
    if len < MIN_DOCUMENT_LEN {
        return Err(Error::MalformedDocument {
            reason: "shorter than the minimal document",
            len,
        });
    }
    let prefix = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if usize::try_from(prefix).ok() != Some(len) {
        return Err(Error::MalformedDocument {
            reason: "length prefix does not match buffer length",
            len,
        });
    }
    if bytes[len - 1] != 0 {
        return Err(Error::MalformedDocument {
            reason: "missing document terminator",
            len,
        });
    }
    Ok(())
}

/// Encode a logical value as document-shaped bytes.
///
/// - documents are written as-is
/// - arrays are written as a document keyed `"0".."n-1"`
/// - anything else is wrapped as `{"": value}`
pub(crate) fn frame(value: &Bson) -> Result<Vec<u8>> {
    let bytes = match value {
        Bson::Document(doc) => bson::to_vec(doc)?,
        Bson::Array(items) => bson::to_vec(&array_document(items))?,
        other => {
            let mut doc = Document::new();
            doc.insert(SCALAR_KEY, other.clone());
            bson::to_vec(&doc)?
        }
    };
    Ok(bytes)
}

/// Decode document-shaped bytes back into the logical value named by `tag`.
///
/// Elements are read as stored: `$`-prefixed keys stay plain fields.
pub(crate) fn unframe(bytes: &[u8], tag: TypeTag) -> Result<Bson> {
    let doc = Document::try_from(RawDocument::from_bytes(bytes)?)?;
    match tag {
        TypeTag::Document => Ok(Bson::Document(doc)),
        TypeTag::Array => Ok(Bson::Array(doc.into_iter().map(|(_, v)| v).collect())),
        _ => {
            let mut doc = doc;
            doc.remove(SCALAR_KEY).ok_or(Error::MalformedDocument {
                reason: "scalar frame has no value field",
                len: bytes.len(),
            })
        }
    }
}

fn array_document(items: &[Bson]) -> Document {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn from_bytes_accepts_empty_document() {
        let data = [0x05, 0x00, 0x00, 0x00, 0x00];
        let doc = BsonDocument::from_bytes(data.to_vec(), TypeTag::Document).unwrap();
        assert_eq!(doc.size(), 5);
        assert_eq!(doc.as_bytes(), &data);
        assert_eq!(doc.to_bson().unwrap(), Bson::Document(Document::new()));
    }

    #[test]
    fn from_bytes_rejects_empty_buffer() {
        let err = BsonDocument::from_bytes(Vec::new(), TypeTag::Document).unwrap_err();
        assert!(err.is_malformed_document());
    }

    #[test]
    fn from_bytes_rejects_length_mismatch() {
        let data = [0x06, 0x00, 0x00, 0x00, 0x00];
        let err = BsonDocument::from_bytes(data.to_vec(), TypeTag::Document).unwrap_err();
        assert!(err.is_malformed_document());
    }

    #[test]
    fn from_bytes_rejects_missing_terminator() {
        let data = [0x05, 0x00, 0x00, 0x00, 0x01];
        let err = BsonDocument::from_bytes(data.to_vec(), TypeTag::Document).unwrap_err();
        assert!(err.is_malformed_document());
    }

    #[test]
    fn from_document_matches_codec_bytes() {
        let source = doc! {"name": "robert"};
        let doc = BsonDocument::from_document(&source).unwrap();
        assert_eq!(doc.as_bytes(), bson::to_vec(&source).unwrap().as_slice());
        assert_eq!(doc.type_tag(), TypeTag::Document);
        assert_eq!(doc.to_bson().unwrap(), Bson::Document(source));
    }

    #[test]
    fn frame_array_as_indexed_document() {
        let value = Bson::Array(vec![Bson::Int32(7), Bson::String("x".into())]);
        let bytes = frame(&value).unwrap();
        let raw: Document = bson::from_slice(&bytes).unwrap();
        assert_eq!(raw, doc! {"0": 7, "1": "x"});
        assert_eq!(unframe(&bytes, TypeTag::Array).unwrap(), value);
    }

    #[test]
    fn frame_scalar_under_empty_key() {
        let value = Bson::String("robert".into());
        let bytes = frame(&value).unwrap();
        let raw: Document = bson::from_slice(&bytes).unwrap();
        assert_eq!(raw, doc! {"": "robert"});
        assert_eq!(unframe(&bytes, TypeTag::String).unwrap(), value);
    }

    #[test]
    fn unframe_scalar_requires_value_field() {
        let bytes = bson::to_vec(&doc! {"a": 1}).unwrap();
        let err = unframe(&bytes, TypeTag::Int32).unwrap_err();
        assert!(err.is_malformed_document());
    }

    #[test]
    fn unframe_keeps_dollar_keys() {
        let source = doc! {
            "w": {"$oid": "504482e5e4b0d1b2c47fff66"},
            "d": {"$date": 1000_i64},
            "x": {"$oid": "not-hex"},
        };
        let doc = BsonDocument::from_document(&source).unwrap();
        assert_eq!(doc.to_bson().unwrap(), Bson::Document(source));
        assert!(doc.to_string().contains("not-hex"), "{doc}");
    }

    #[test]
    fn unframe_rejects_corrupt_elements() {
        // Valid frame, element type 0x02 with a string length past the end.
        let data = [0x0C, 0, 0, 0, 0x02, b'a', 0, 0xFF, 0, 0, 0, 0];
        let doc = BsonDocument::from_bytes(data.to_vec(), TypeTag::Document).unwrap();
        assert!(matches!(doc.to_bson(), Err(Error::Raw(_))));
    }

    #[test]
    fn display_renders_snippet() {
        let doc = BsonDocument::from_document(&doc! {"name": "robert"}).unwrap();
        assert_eq!(doc.to_string(), r#"{"name":"robert"}"#);
    }
}
