//! Immutable mapping configuration and the readers/writers it hands out.

use std::any::type_name;
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::marker::PhantomData;

use bson::Bson;

use crate::builder::MappingBuilder;
use crate::context::{DecodeContext, EncodeContext};
use crate::document::{self, BsonDocument};
use crate::error::{Error, Result};
use crate::json;
use crate::mapped::Mapped;
use crate::registry::{DecodeFn, EncodeFn, Registration, Registry, TypeKey};
use crate::tag::TypeTag;

/// Registered coders and installed modules.
///
/// A configuration is a value: it has no mutating methods, so one instance
/// can be shared (`Arc<MappingConfig>`) by any number of engines and threads.
/// Build new ones with [`MappingBuilder`].
///
/// The default configuration has no registrations; every type uses its
/// [`Mapped`] strategy.
#[derive(Clone, Default)]
pub struct MappingConfig {
    serializers: Registry<EncodeFn>,
    deserializers: Registry<DecodeFn>,
    modules: BTreeSet<String>,
}

impl MappingConfig {
    /// Start a builder seeded with the default configuration.
    #[must_use]
    pub fn builder() -> MappingBuilder {
        MappingBuilder::new()
    }

    pub(crate) fn from_parts(
        serializers: Registry<EncodeFn>,
        deserializers: Registry<DecodeFn>,
        modules: BTreeSet<String>,
    ) -> Self {
        Self {
            serializers,
            deserializers,
            modules,
        }
    }

    pub(crate) fn to_parts(&self) -> (Registry<EncodeFn>, Registry<DecodeFn>, BTreeSet<String>) {
        (
            self.serializers.clone(),
            self.deserializers.clone(),
            self.modules.clone(),
        )
    }

    /// Get a reader producing `T`.
    #[must_use]
    pub fn reader<T: Mapped>(&self) -> Reader<'_, T> {
        Reader {
            config: self,
            _target: PhantomData,
        }
    }

    /// Get a writer for values of type `T`.
    #[must_use]
    pub fn writer<T: Mapped>(&self) -> Writer<'_, T> {
        Writer {
            config: self,
            _source: PhantomData,
        }
    }

    /// Get a writer for `instance`'s type.
    #[must_use]
    pub fn writer_for<T: Mapped>(&self, _instance: &T) -> Writer<'_, T> {
        self.writer()
    }

    #[must_use]
    pub fn has_serializer<T: 'static>(&self) -> bool {
        self.serializers.contains_key(&TypeKey::of::<T>())
    }

    #[must_use]
    pub fn has_deserializer<T: 'static>(&self) -> bool {
        self.deserializers.contains_key(&TypeKey::of::<T>())
    }

    /// Names of installed modules, in sorted order.
    pub fn installed_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_module_installed(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    pub(crate) fn serializer(&self, key: TypeKey) -> Option<&Registration<EncodeFn>> {
        self.serializers.get(&key)
    }

    pub(crate) fn deserializer(&self, key: TypeKey) -> Option<&Registration<DecodeFn>> {
        self.deserializers.get(&key)
    }
}

impl fmt::Debug for MappingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut serializers: Vec<_> = self.serializers.keys().map(TypeKey::name).collect();
        let mut deserializers: Vec<_> = self.deserializers.keys().map(TypeKey::name).collect();
        serializers.sort_unstable();
        deserializers.sort_unstable();
        f.debug_struct("MappingConfig")
            .field("serializers", &serializers)
            .field("deserializers", &deserializers)
            .field("modules", &self.modules)
            .finish()
    }
}

/// Decodes documents into `T` under one configuration.
pub struct Reader<'c, T> {
    config: &'c MappingConfig,
    _target: PhantomData<fn() -> T>,
}

impl<T: Mapped> Reader<'_, T> {
    /// Decode a document held in `bytes[offset..offset + len]`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedDocument` if the range is outside `bytes`,
    /// `Error::Raw` if the codec rejects the bytes, or the error from
    /// mapping the decoded value to `T`.
    pub fn read_value(&self, bytes: &[u8], offset: usize, len: usize) -> Result<T> {
        self.read_tagged(bytes, offset, len, TypeTag::Document)
    }

    /// Decode document-shaped bytes holding a value of kind `tag`.
    ///
    /// # Errors
    ///
    /// See [`read_value`](Self::read_value).
    pub fn read_tagged(&self, bytes: &[u8], offset: usize, len: usize, tag: TypeTag) -> Result<T> {
        let slice = offset
            .checked_add(len)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(Error::MalformedDocument {
                reason: "range outside buffer",
                len: bytes.len(),
            })?;
        self.read_bson(document::unframe(slice, tag)?)
    }

    /// Decode a binary document value.
    ///
    /// # Errors
    ///
    /// See [`read_value`](Self::read_value).
    pub fn read_document(&self, document: &BsonDocument) -> Result<T> {
        self.read_tagged(
            document.as_bytes(),
            0,
            document.size(),
            document.type_tag(),
        )
    }

    /// Decode an already parsed value.
    ///
    /// # Errors
    ///
    /// Returns the error from mapping `value` to `T`.
    pub fn read_bson(&self, value: Bson) -> Result<T> {
        DecodeContext::new(self.config).decode(value)
    }

    /// Decode JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the text is not JSON, or the error from
    /// mapping the parsed value to `T`.
    pub fn read_json(&self, text: &str) -> Result<T> {
        self.read_bson(json::from_json(text)?)
    }
}

impl<T> fmt::Debug for Reader<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reader").field(&type_name::<T>()).finish()
    }
}

/// Encodes values of type `T` under one configuration.
pub struct Writer<'c, T> {
    config: &'c MappingConfig,
    _source: PhantomData<fn(&T)>,
}

impl<T: Mapped> Writer<'_, T> {
    /// Encode `value` to its logical document value.
    ///
    /// # Errors
    ///
    /// Returns the error from mapping `value`.
    pub fn to_bson(&self, value: &T) -> Result<Bson> {
        EncodeContext::new(self.config).encode(value)
    }

    /// Encode `value` as document-shaped bytes into `out`.
    ///
    /// # Errors
    ///
    /// Returns the mapping or codec error, or `Error::Io` if `out` fails.
    pub fn write_value<W: Write + ?Sized>(&self, out: &mut W, value: &T) -> Result<()> {
        let bytes = self.write_value_as_bytes(value)?;
        out.write_all(&bytes)?;
        Ok(())
    }

    /// Encode `value` as document-shaped bytes.
    ///
    /// # Errors
    ///
    /// Returns the mapping or codec error.
    pub fn write_value_as_bytes(&self, value: &T) -> Result<Vec<u8>> {
        document::frame(&self.to_bson(value)?)
    }

    /// Encode `value` as JSON text.
    ///
    /// # Errors
    ///
    /// Returns the mapping error, or `Error::NonFiniteFloat` for NaN/Infinity.
    pub fn write_value_as_string(&self, value: &T) -> Result<String> {
        json::to_json(&self.to_bson(value)?)
    }
}

impl<T> fmt::Debug for Writer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Writer").field(&type_name::<T>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn default_config_is_empty() {
        let config = MappingConfig::default();
        assert!(!config.has_serializer::<String>());
        assert!(!config.has_deserializer::<String>());
        assert_eq!(config.installed_modules().count(), 0);
    }

    #[test]
    fn read_value_honours_offset_and_length() {
        let config = MappingConfig::default();
        let doc_bytes = bson::to_vec(&doc! {"n": 4}).unwrap();
        let mut stream = vec![0xAA, 0xBB];
        stream.extend_from_slice(&doc_bytes);
        stream.push(0xCC);

        let value: bson::Document = config
            .reader()
            .read_value(&stream, 2, doc_bytes.len())
            .unwrap();
        assert_eq!(value, doc! {"n": 4});
    }

    #[test]
    fn read_value_rejects_out_of_range() {
        let config = MappingConfig::default();
        let err = config
            .reader::<bson::Document>()
            .read_value(&[0x05, 0, 0, 0, 0], 1, 5)
            .unwrap_err();
        assert!(err.is_malformed_document());

        let err = config
            .reader::<bson::Document>()
            .read_value(&[], usize::MAX, 2)
            .unwrap_err();
        assert!(err.is_malformed_document());
    }

    #[test]
    fn writer_emits_framed_bytes() {
        let config = MappingConfig::default();
        let mut out = Vec::new();
        config
            .writer_for(&doc! {"name": "robert"})
            .write_value(&mut out, &doc! {"name": "robert"})
            .unwrap();
        assert_eq!(out, bson::to_vec(&doc! {"name": "robert"}).unwrap());
    }

    #[test]
    fn writer_emits_json() {
        let config = MappingConfig::default();
        let text = config
            .writer::<Vec<i32>>()
            .write_value_as_string(&vec![1, 2])
            .unwrap();
        assert_eq!(text, "[1,2]");
    }

    #[test]
    fn reader_parses_json() {
        let config = MappingConfig::default();
        let value: Vec<String> = config.reader().read_json(r#"["a", "b"]"#).unwrap();
        assert_eq!(value, vec!["a".to_string(), "b".to_string()]);
    }
}
