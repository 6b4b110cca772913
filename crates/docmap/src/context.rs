//! Per-call dispatch between registered coders and default strategies.

use std::any::{Any, type_name};

use bson::{Bson, Document};
use tracing::trace;

use crate::config::MappingConfig;
use crate::error::{Error, Result};
use crate::mapped::Mapped;
use crate::registry::TypeKey;
use crate::tag::kind_name;

/// Encoding state handed to every [`Mapped::to_bson`] and custom serializer.
#[derive(Clone, Copy)]
pub struct EncodeContext<'c> {
    config: &'c MappingConfig,
}

impl<'c> EncodeContext<'c> {
    pub(crate) fn new(config: &'c MappingConfig) -> Self {
        Self { config }
    }

    /// The configuration this call runs under.
    #[must_use]
    pub fn config(&self) -> &'c MappingConfig {
        self.config
    }

    /// Encode a value, preferring a coder registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns whatever the selected coder returns.
    pub fn encode<T: Mapped>(&self, value: &T) -> Result<Bson> {
        let key = TypeKey::of::<T>();
        match self.config.serializer(key) {
            Some(registration) => {
                trace!(type_name = key.name(), origin = %registration.origin, "custom serializer");
                let value: &dyn Any = value;
                (registration.coder)(value, self)
            }
            None => value.to_bson(self),
        }
    }

    /// Encode a value with `T`'s default strategy, skipping any coder
    /// registered for `T` itself. Nested values still go through
    /// [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns whatever `T::to_bson` returns.
    pub fn encode_default<T: Mapped>(&self, value: &T) -> Result<Bson> {
        value.to_bson(self)
    }

    /// Start writing a document.
    #[must_use]
    pub fn document(&self) -> DocumentWriter<'_, 'c> {
        DocumentWriter {
            ctx: self,
            doc: Document::new(),
        }
    }
}

/// Decoding state handed to every [`Mapped::from_bson`] and custom
/// deserializer.
#[derive(Clone, Copy)]
pub struct DecodeContext<'c> {
    config: &'c MappingConfig,
}

impl<'c> DecodeContext<'c> {
    pub(crate) fn new(config: &'c MappingConfig) -> Self {
        Self { config }
    }

    /// The configuration this call runs under.
    #[must_use]
    pub fn config(&self) -> &'c MappingConfig {
        self.config
    }

    /// Decode a value, preferring a coder registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns whatever the selected coder returns, or `Error::TypeMismatch`
    /// if a registered coder produced something other than a `T`.
    pub fn decode<T: Mapped>(&self, value: Bson) -> Result<T> {
        let key = TypeKey::of::<T>();
        match self.config.deserializer(key) {
            Some(registration) => {
                trace!(type_name = key.name(), origin = %registration.origin, "custom deserializer");
                let decoded = (registration.coder)(value, self)?;
                decoded.downcast::<T>().map(|b| *b).map_err(|_| Error::TypeMismatch {
                    expected: key.name(),
                })
            }
            None => T::from_bson(value, self),
        }
    }

    /// Decode a value with `T`'s default strategy, skipping any coder
    /// registered for `T` itself.
    ///
    /// # Errors
    ///
    /// Returns whatever `T::from_bson` returns.
    pub fn decode_default<T: Mapped>(&self, value: Bson) -> Result<T> {
        T::from_bson(value, self)
    }

    /// Open a document value for field-by-field decoding into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnexpectedType` if `value` is not a document.
    pub fn fields<T: ?Sized>(&self, value: Bson) -> Result<DocumentReader<'_, 'c>> {
        match value {
            Bson::Document(doc) => Ok(DocumentReader {
                ctx: self,
                doc,
                type_name: type_name::<T>(),
            }),
            other => Err(Error::UnexpectedType {
                expected: "document",
                found: kind_name(&other),
            }),
        }
    }
}

/// Builds a document one field at a time.
pub struct DocumentWriter<'a, 'c> {
    ctx: &'a EncodeContext<'c>,
    doc: Document,
}

impl DocumentWriter<'_, '_> {
    /// Append a field.
    ///
    /// # Errors
    ///
    /// Returns the error from encoding `value`.
    pub fn field<T: Mapped>(&mut self, key: &str, value: &T) -> Result<&mut Self> {
        let encoded = self.ctx.encode(value)?;
        self.doc.insert(key, encoded);
        Ok(self)
    }

    /// Append a field only when `value` is `Some`.
    ///
    /// # Errors
    ///
    /// Returns the error from encoding the inner value.
    pub fn field_if_some<T: Mapped>(&mut self, key: &str, value: &Option<T>) -> Result<&mut Self> {
        match value {
            Some(value) => self.field(key, value),
            None => Ok(self),
        }
    }

    /// Finish as a document value.
    #[must_use]
    pub fn finish(self) -> Bson {
        Bson::Document(self.doc)
    }
}

/// Takes fields out of a document one at a time.
pub struct DocumentReader<'a, 'c> {
    ctx: &'a DecodeContext<'c>,
    doc: Document,
    type_name: &'static str,
}

impl DocumentReader<'_, '_> {
    /// Take and decode a field.
    ///
    /// A missing field decodes to `T::absent()` when the type has one.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingField` if the field is missing and `T` has no
    /// absent value, or the error from decoding it.
    pub fn field<T: Mapped>(&mut self, key: &str) -> Result<T> {
        match self.doc.remove(key) {
            Some(value) => self.ctx.decode(value),
            None => T::absent().ok_or_else(|| Error::MissingField {
                field: key.to_owned(),
                type_name: self.type_name,
            }),
        }
    }

    /// Take and decode a field that may be missing or null.
    ///
    /// # Errors
    ///
    /// Returns the error from decoding a present, non-null value.
    pub fn optional_field<T: Mapped>(&mut self, key: &str) -> Result<Option<T>> {
        match self.doc.remove(key) {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => self.ctx.decode(value).map(Some),
        }
    }

    /// Fields not taken so far.
    #[must_use]
    pub fn remaining(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub fn into_remaining(self) -> Document {
        self.doc
    }
}
