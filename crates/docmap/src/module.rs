//! Installable bundles of registrations.

use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document, doc};

use crate::builder::{insert_deserializer, insert_serializer};
use crate::context::{DecodeContext, EncodeContext};
use crate::error::{Error, Result};
use crate::registry::{DecodeFn, Deserializer, EncodeFn, Origin, Registry, Serializer};
use crate::tag::kind_name;

/// A named bundle of serializers and deserializers.
///
/// Modules are identified by name; a builder installs each name once.
pub trait Module {
    /// Identifier of this module. Must not be blank.
    fn name(&self) -> &str;

    /// Register this module's coders.
    fn setup(&self, ctx: &mut SetupContext<'_>);
}

/// Registration surface handed to [`Module::setup`].
pub struct SetupContext<'b> {
    pub(crate) origin: Origin,
    pub(crate) serializers: &'b mut Registry<EncodeFn>,
    pub(crate) deserializers: &'b mut Registry<DecodeFn>,
    pub(crate) added: usize,
}

impl SetupContext<'_> {
    pub fn add_serializer<T, S>(&mut self, serializer: S) -> &mut Self
    where
        T: 'static,
        S: Serializer<T>,
    {
        insert_serializer(self.serializers, self.origin.clone(), serializer);
        self.added += 1;
        self
    }

    pub fn add_deserializer<T, D>(&mut self, deserializer: D) -> &mut Self
    where
        T: 'static,
        D: Deserializer<T>,
    {
        insert_deserializer(self.deserializers, self.origin.clone(), deserializer);
        self.added += 1;
        self
    }
}

/// Extended-JSON style wrappers for identifier and date values.
///
/// | Type       | Encoded as                 |
/// |------------|----------------------------|
/// | `ObjectId` | `{"$oid": "<24 hex>"}`     |
/// | `DateTime` | `{"$date": <millis>}`      |
///
/// The decoders accept the wrapped form as well as native values, so
/// documents written before the module was installed still decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedJsonModule;

impl ExtendedJsonModule {
    pub const NAME: &'static str = "extended-json";
}

impl Module for ExtendedJsonModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) {
        ctx.add_serializer::<ObjectId, _>(OidWrapper)
            .add_deserializer::<ObjectId, _>(OidWrapper)
            .add_serializer::<DateTime, _>(DateWrapper)
            .add_deserializer::<DateTime, _>(DateWrapper);
    }
}

struct OidWrapper;

impl Serializer<ObjectId> for OidWrapper {
    fn serialize(&self, value: &ObjectId, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Document(doc! {"$oid": value.to_hex()}))
    }
}

impl Deserializer<ObjectId> for OidWrapper {
    fn deserialize(&self, value: Bson, _ctx: &DecodeContext<'_>) -> Result<ObjectId> {
        match value {
            Bson::ObjectId(oid) => Ok(oid),
            Bson::String(hex) => Ok(ObjectId::parse_str(&hex)?),
            Bson::Document(doc) => match unwrap_single(doc, "$oid")? {
                Bson::String(hex) => Ok(ObjectId::parse_str(&hex)?),
                other => Err(Error::UnexpectedType {
                    expected: "string",
                    found: kind_name(&other),
                }),
            },
            other => Err(Error::UnexpectedType {
                expected: "objectId",
                found: kind_name(&other),
            }),
        }
    }
}

struct DateWrapper;

impl Serializer<DateTime> for DateWrapper {
    fn serialize(&self, value: &DateTime, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Document(doc! {"$date": value.timestamp_millis()}))
    }
}

impl Deserializer<DateTime> for DateWrapper {
    fn deserialize(&self, value: Bson, _ctx: &DecodeContext<'_>) -> Result<DateTime> {
        let millis = match value {
            Bson::DateTime(dt) => return Ok(dt),
            Bson::Document(doc) => unwrap_single(doc, "$date")?,
            other => other,
        };
        match millis {
            Bson::Int64(n) => Ok(DateTime::from_millis(n)),
            Bson::Int32(n) => Ok(DateTime::from_millis(i64::from(n))),
            other => Err(Error::UnexpectedType {
                expected: "date",
                found: kind_name(&other),
            }),
        }
    }
}

fn unwrap_single(mut doc: Document, key: &'static str) -> Result<Bson> {
    if doc.len() != 1 {
        return Err(Error::custom(format!(
            "expected a document with the single field `{key}`"
        )));
    }
    doc.remove(key).ok_or(Error::MissingField {
        field: key.to_owned(),
        type_name: "extended JSON wrapper",
    })
}
