//! Marshalling engine: typed values in, binary documents out, and back.

use std::any::type_name;
use std::sync::Arc;

use tracing::trace;

use crate::config::MappingConfig;
use crate::document::{self, BsonDocument};
use crate::error::{Direction, Result};
use crate::mapped::{Mapped, Shape};
use crate::tag::TypeTag;

/// Turns typed values into binary documents.
pub trait Marshaller {
    /// Encode `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be encoded; no document is produced.
    fn marshall<T: Mapped>(&self, value: &T) -> Result<BsonDocument>;
}

/// Turns binary documents into typed values.
pub trait Unmarshaller {
    /// Decode `document` into a `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `document` cannot be decoded into a `T`; no value
    /// is produced.
    fn unmarshall<T: Mapped>(&self, document: &BsonDocument) -> Result<T>;
}

/// Marshaller and unmarshaller bound to one [`MappingConfig`].
///
/// The engine only holds a shared reference to its configuration, so it is
/// cheap to clone and can be used from any number of threads at once.
/// Failures are reported immediately: a failing custom coder is never
/// retried with the default strategy.
#[derive(Clone, Debug, Default)]
pub struct BsonEngine {
    config: Arc<MappingConfig>,
}

impl BsonEngine {
    /// Engine using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: impl Into<Arc<MappingConfig>>) -> Self {
        Self {
            config: config.into(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<MappingConfig> {
        &self.config
    }

    /// Decode `document` into a `T`.
    ///
    /// The bytes are read from offset 0 for the document's full size and
    /// interpreted according to its type tag.
    ///
    /// # Errors
    ///
    /// Returns `Error::Marshalling` (direction `Decode`, naming `T` and
    /// quoting the document) wrapping the cause, or `Error::UnsupportedType`
    /// / `Error::MalformedDocument` as is.
    pub fn unmarshall<T: Mapped>(&self, document: &BsonDocument) -> Result<T> {
        trace!(target_type = type_name::<T>(), size = document.size(), tag = document.type_tag().name(), "unmarshall");
        self.config
            .reader::<T>()
            .read_tagged(document.as_bytes(), 0, document.size(), document.type_tag())
            .map_err(|e| {
                e.into_marshalling(Direction::Decode, type_name::<T>(), || {
                    format!("from content {document}")
                })
            })
    }

    /// Encode `value` into a binary document.
    ///
    /// The document is tagged `Array` when `T` is a sequence type, and with
    /// the codec's inferred tag of the encoded value otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Error::Marshalling` (direction `Encode`, naming `T`) wrapping
    /// the cause, or `Error::UnsupportedType` as is.
    pub fn marshall<T: Mapped>(&self, value: &T) -> Result<BsonDocument> {
        let encode = || -> Result<BsonDocument> {
            let encoded = self.config.writer_for(value).to_bson(value)?;
            let tag = object_type_tag::<T>(&encoded);
            let bytes = document::frame(&encoded)?;
            Ok(BsonDocument::from_parts(bytes, tag))
        };
        let document = encode().map_err(|e| {
            e.into_marshalling(Direction::Encode, type_name::<T>(), || {
                "into bson".to_owned()
            })
        })?;
        trace!(source_type = type_name::<T>(), size = document.size(), tag = document.type_tag().name(), "marshall");
        Ok(document)
    }
}

/// Tag for a marshalled value: sequences by their Rust shape, everything
/// else by what the codec infers.
fn object_type_tag<T: Mapped>(encoded: &bson::Bson) -> TypeTag {
    match T::shape() {
        Shape::Sequence => TypeTag::Array,
        Shape::Single => TypeTag::infer(encoded),
    }
}

impl Marshaller for BsonEngine {
    fn marshall<T: Mapped>(&self, value: &T) -> Result<BsonDocument> {
        BsonEngine::marshall(self, value)
    }
}

impl Unmarshaller for BsonEngine {
    fn unmarshall<T: Mapped>(&self, document: &BsonDocument) -> Result<T> {
        BsonEngine::unmarshall(self, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MappingBuilder;
    use crate::context::EncodeContext;
    use crate::error::Error;
    use bson::{Bson, doc};

    #[test]
    fn marshall_document() {
        let engine = BsonEngine::new();
        let document = engine.marshall(&doc! {"name": "robert"}).unwrap();
        assert_eq!(document.type_tag(), TypeTag::Document);
        assert_eq!(
            document.as_bytes(),
            bson::to_vec(&doc! {"name": "robert"}).unwrap().as_slice()
        );
    }

    #[test]
    fn marshall_scalar_uses_inferred_tag() {
        let engine = BsonEngine::new();
        let document = engine.marshall(&42i32).unwrap();
        assert_eq!(document.type_tag(), TypeTag::Int32);
        assert_eq!(engine.unmarshall::<i32>(&document).unwrap(), 42);
    }

    #[test]
    fn sequence_tag_follows_shape_not_value() {
        // A custom encoder that renders a sequence as a document still yields
        // an array-tagged value.
        let engine = MappingBuilder::new()
            .serialize_with(|v: &Vec<i32>, _: &EncodeContext<'_>| {
                Ok(Bson::Document(doc! {"count": v.len() as i32}))
            })
            .build();
        let document = engine.marshall(&vec![1, 2, 3]).unwrap();
        assert_eq!(document.type_tag(), TypeTag::Array);
    }

    #[test]
    fn marshall_failure_carries_direction() {
        let engine = MappingBuilder::new()
            .serialize_with(|_: &String, _: &EncodeContext<'_>| Err(Error::custom("refused")))
            .build();
        let err = engine.marshall(&"x".to_string()).unwrap_err();
        assert!(err.is_marshalling());
        assert_eq!(err.direction(), Some(Direction::Encode));
        assert!(err.to_string().contains("String"), "{err}");
    }
}
