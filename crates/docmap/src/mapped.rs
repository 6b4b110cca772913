//! Default mapping strategies.
//!
//! # The `Mapped` Trait
//!
//! [`Mapped`] is the statically checked description of how a type becomes a
//! document value and back. It is implemented for the Rust types that map
//! directly onto document values:
//!
//! | Rust Type                       | Document Value     |
//! |---------------------------------|--------------------|
//! | `bool`                          | bool               |
//! | `i8`, `i16`, `i32`, `u8`, `u16` | int                |
//! | `i64`, `u32`                    | long               |
//! | `f32`, `f64`                    | double             |
//! | `String`                        | string             |
//! | `Option<T>`                     | null or `T`        |
//! | `Vec<T>`, `VecDeque<T>`, `[T; N]` | array            |
//! | `BTreeMap<String, T>`, `HashMap<String, T>` | document |
//! | `ObjectId`, `DateTime`, `Binary` | objectId, date, binary |
//! | `Bson`, `Document`              | themselves         |
//!
//! Domain types implement it by hand, with [`mapped_struct!`], or through
//! serde with [`mapped_via_serde!`]. Nested values are always encoded and
//! decoded through the context, so a coder registered for a field's type
//! takes precedence over that type's default.
//!
//! [`mapped_struct!`]: crate::mapped_struct
//! [`mapped_via_serde!`]: crate::mapped_via_serde

use std::any::type_name;
use std::collections::{BTreeMap, HashMap, VecDeque};

use bson::oid::ObjectId;
use bson::{Binary, Bson, DateTime, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::{DecodeContext, EncodeContext};
use crate::error::{Direction, Error, Result};
use crate::tag::kind_name;

/// Run-time shape of a value, as far as type tagging is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Anything that is not a sequence.
    Single,
    /// Arrays, vectors and other ordered sequences.
    Sequence,
}

/// Default encoding and decoding for a type.
///
/// Both methods default to `Error::UnsupportedType`, which lets a type opt
/// into mapping purely through registered coders. The error is raised when
/// the type is first encoded or decoded, not when a configuration is built.
pub trait Mapped: Sized + 'static {
    /// Shape used to tag marshalled values.
    fn shape() -> Shape {
        Shape::Single
    }

    /// Encode this value.
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Err(Error::UnsupportedType {
            type_name: type_name::<Self>(),
            direction: Direction::Encode,
        })
    }

    /// Decode a value of this type.
    fn from_bson(_value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        Err(Error::UnsupportedType {
            type_name: type_name::<Self>(),
            direction: Direction::Decode,
        })
    }

    /// Value used when a document field is missing; `None` makes the field
    /// required.
    fn absent() -> Option<Self> {
        None
    }
}

fn unexpected(expected: &'static str, found: &Bson) -> Error {
    Error::UnexpectedType {
        expected,
        found: kind_name(found),
    }
}

fn integer(value: &Bson) -> Result<i64> {
    match value {
        Bson::Int32(n) => Ok(i64::from(*n)),
        Bson::Int64(n) => Ok(*n),
        other => Err(unexpected("integer", other)),
    }
}

// --- Scalars ---

impl Mapped for bool {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Boolean(*self))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::Boolean(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }
}

macro_rules! mapped_int {
    ($variant:ident as $repr:ty => $($ty:ty),+) => {$(
        impl Mapped for $ty {
            fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
                Ok(Bson::$variant(<$repr>::from(*self)))
            }

            fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
                let n = integer(&value)?;
                <$ty>::try_from(n).map_err(|_| Error::IntegerOutOfRange {
                    value: n,
                    target: stringify!($ty),
                })
            }
        }
    )+};
}

mapped_int!(Int32 as i32 => i8, i16, i32, u8, u16);
mapped_int!(Int64 as i64 => i64, u32);

impl Mapped for f64 {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Double(*self))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::Double(f) => Ok(f),
            Bson::Int32(n) => Ok(f64::from(n)),
            // Rounds beyond 2^53.
            Bson::Int64(n) => Ok(n as f64),
            other => Err(unexpected("double", &other)),
        }
    }
}

impl Mapped for f32 {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Double(f64::from(*self)))
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        let f = f64::from_bson(value, ctx)?;
        if f.is_finite() && f.abs() > f64::from(f32::MAX) {
            return Err(Error::FloatOutOfRange {
                value: f,
                target: "f32",
            });
        }
        Ok(f as f32)
    }
}

impl Mapped for String {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::String(self.clone()))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::String(s) | Bson::Symbol(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }
}

/// Encode-only: a borrowed string cannot be produced from a document.
impl Mapped for &'static str {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::String((*self).to_owned()))
    }
}

impl Mapped for ObjectId {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::ObjectId(*self))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::ObjectId(oid) => Ok(oid),
            // JSON input has no object id type; accept the hex form.
            Bson::String(hex) => Ok(ObjectId::parse_str(&hex)?),
            other => Err(unexpected("objectId", &other)),
        }
    }
}

impl Mapped for DateTime {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::DateTime(*self))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::DateTime(dt) => Ok(dt),
            Bson::Int64(millis) => Ok(DateTime::from_millis(millis)),
            Bson::Int32(millis) => Ok(DateTime::from_millis(i64::from(millis))),
            other => Err(unexpected("date", &other)),
        }
    }
}

impl Mapped for Binary {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Binary(self.clone()))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::Binary(bin) => Ok(bin),
            other => Err(unexpected("binary", &other)),
        }
    }
}

impl Mapped for Bson {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(self.clone())
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        Ok(value)
    }

    fn absent() -> Option<Self> {
        Some(Bson::Null)
    }
}

impl Mapped for Document {
    fn to_bson(&self, _ctx: &EncodeContext<'_>) -> Result<Bson> {
        Ok(Bson::Document(self.clone()))
    }

    fn from_bson(value: Bson, _ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::Document(doc) => Ok(doc),
            other => Err(unexpected("document", &other)),
        }
    }
}

// --- Wrappers ---

impl<T: Mapped> Mapped for Option<T> {
    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        match self {
            Some(value) => ctx.encode(value),
            None => Ok(Bson::Null),
        }
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        match value {
            Bson::Null | Bson::Undefined => Ok(None),
            other => ctx.decode(other).map(Some),
        }
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

impl<T: Mapped> Mapped for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        ctx.encode(self.as_ref())
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        ctx.decode(value).map(Box::new)
    }
}

// --- Sequences ---

fn encode_items<'a, T: Mapped>(
    items: impl Iterator<Item = &'a T>,
    ctx: &EncodeContext<'_>,
) -> Result<Bson> {
    items
        .map(|item| ctx.encode(item))
        .collect::<Result<Vec<_>>>()
        .map(Bson::Array)
}

fn decode_items<T: Mapped>(value: Bson, ctx: &DecodeContext<'_>) -> Result<Vec<T>> {
    match value {
        Bson::Array(items) => items.into_iter().map(|item| ctx.decode(item)).collect(),
        other => Err(unexpected("array", &other)),
    }
}

impl<T: Mapped> Mapped for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence
    }

    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        encode_items(self.iter(), ctx)
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        decode_items(value, ctx)
    }
}

impl<T: Mapped> Mapped for VecDeque<T> {
    fn shape() -> Shape {
        Shape::Sequence
    }

    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        encode_items(self.iter(), ctx)
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        decode_items(value, ctx).map(VecDeque::from)
    }
}

impl<T: Mapped, const N: usize> Mapped for [T; N] {
    fn shape() -> Shape {
        Shape::Sequence
    }

    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        encode_items(self.iter(), ctx)
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        let items: Vec<T> = decode_items(value, ctx)?;
        let found = items.len();
        items
            .try_into()
            .map_err(|_| Error::LengthMismatch { expected: N, found })
    }
}

// --- Maps ---

fn encode_entries<'a, T: Mapped>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
    ctx: &EncodeContext<'_>,
) -> Result<Bson> {
    let mut doc = Document::new();
    for (key, value) in entries {
        doc.insert(key.clone(), ctx.encode(value)?);
    }
    Ok(Bson::Document(doc))
}

fn decode_entries<T: Mapped, C: FromIterator<(String, T)>>(
    value: Bson,
    ctx: &DecodeContext<'_>,
) -> Result<C> {
    match value {
        Bson::Document(doc) => doc
            .into_iter()
            .map(|(key, value)| ctx.decode(value).map(|value| (key, value)))
            .collect(),
        other => Err(unexpected("document", &other)),
    }
}

impl<T: Mapped> Mapped for BTreeMap<String, T> {
    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        encode_entries(self.iter(), ctx)
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        decode_entries(value, ctx)
    }
}

impl<T: Mapped> Mapped for HashMap<String, T> {
    fn to_bson(&self, ctx: &EncodeContext<'_>) -> Result<Bson> {
        encode_entries(self.iter(), ctx)
    }

    fn from_bson(value: Bson, ctx: &DecodeContext<'_>) -> Result<Self> {
        decode_entries(value, ctx)
    }
}

// --- serde bridge ---

/// Encode a value through its `serde::Serialize` implementation.
///
/// Nested values are handled by serde, so registered coders for field types
/// do not apply below this point.
pub fn serde_to_bson<T: Serialize + ?Sized>(value: &T) -> Result<Bson> {
    Ok(bson::to_bson(value)?)
}

/// Decode a value through its `serde::Deserialize` implementation.
pub fn serde_from_bson<T: DeserializeOwned>(value: Bson) -> Result<T> {
    Ok(bson::from_bson(value)?)
}

/// Implement [`Mapped`] for types that derive serde's traits.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// docmap::mapped_via_serde!(Point);
/// ```
#[macro_export]
macro_rules! mapped_via_serde {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Mapped for $ty {
            fn to_bson(
                &self,
                _ctx: &$crate::EncodeContext<'_>,
            ) -> $crate::Result<$crate::bson::Bson> {
                $crate::mapped::serde_to_bson(self)
            }

            fn from_bson(
                value: $crate::bson::Bson,
                _ctx: &$crate::DecodeContext<'_>,
            ) -> $crate::Result<Self> {
                $crate::mapped::serde_from_bson(value)
            }
        }
    )+};
}

/// Implement [`Mapped`] for a struct as a document, one field per entry.
///
/// Every field goes through the context, so registered coders apply to it.
///
/// ```
/// use docmap::bson::oid::ObjectId;
///
/// struct Friend {
///     id: Option<ObjectId>,
///     name: String,
/// }
///
/// docmap::mapped_struct!(Friend { id: "_id", name: "name" });
/// ```
#[macro_export]
macro_rules! mapped_struct {
    ($ty:ident { $($field:ident : $key:literal),* $(,)? }) => {
        impl $crate::Mapped for $ty {
            fn to_bson(
                &self,
                ctx: &$crate::EncodeContext<'_>,
            ) -> $crate::Result<$crate::bson::Bson> {
                let mut doc = ctx.document();
                $( doc.field($key, &self.$field)?; )*
                Ok(doc.finish())
            }

            fn from_bson(
                value: $crate::bson::Bson,
                ctx: &$crate::DecodeContext<'_>,
            ) -> $crate::Result<Self> {
                let mut doc = ctx.fields::<Self>(value)?;
                Ok(Self {
                    $( $field: doc.field($key)?, )*
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingConfig;
    use bson::doc;

    fn roundtrip<T: Mapped>(value: &T) -> (Bson, T) {
        let config = MappingConfig::default();
        let encoded = EncodeContext::new(&config).encode(value).unwrap();
        let decoded = DecodeContext::new(&config)
            .decode(encoded.clone())
            .unwrap();
        (encoded, decoded)
    }

    #[test]
    fn scalars() {
        assert_eq!(roundtrip(&true), (Bson::Boolean(true), true));
        assert_eq!(roundtrip(&7i32), (Bson::Int32(7), 7));
        assert_eq!(roundtrip(&7u8), (Bson::Int32(7), 7));
        assert_eq!(roundtrip(&7i64), (Bson::Int64(7), 7));
        assert_eq!(roundtrip(&7u32), (Bson::Int64(7), 7));
        assert_eq!(roundtrip(&1.5f64), (Bson::Double(1.5), 1.5));
        assert_eq!(
            roundtrip(&"robert".to_string()),
            (Bson::String("robert".into()), "robert".to_string())
        );
    }

    #[test]
    fn integer_widths_are_checked() {
        let config = MappingConfig::default();
        let ctx = DecodeContext::new(&config);
        let err = ctx.decode::<u8>(Bson::Int32(300)).unwrap_err();
        assert!(matches!(
            err,
            Error::IntegerOutOfRange {
                value: 300,
                target: "u8"
            }
        ));
        assert_eq!(ctx.decode::<i64>(Bson::Int32(-3)).unwrap(), -3);
        assert_eq!(ctx.decode::<f64>(Bson::Int64(2)).unwrap(), 2.0);
    }

    #[test]
    fn f32_range_is_checked() {
        let config = MappingConfig::default();
        let ctx = DecodeContext::new(&config);
        assert!(matches!(
            ctx.decode::<f32>(Bson::Double(1e300)).unwrap_err(),
            Error::FloatOutOfRange { target: "f32", .. }
        ));
        assert_eq!(ctx.decode::<f32>(Bson::Double(1.5)).unwrap(), 1.5);
        assert!(ctx.decode::<f32>(Bson::Double(f64::INFINITY)).unwrap().is_infinite());
        assert!(ctx.decode::<f32>(Bson::Double(f64::NAN)).unwrap().is_nan());
    }

    #[test]
    fn unexpected_kind() {
        let config = MappingConfig::default();
        let err = DecodeContext::new(&config)
            .decode::<String>(Bson::Int32(1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedType {
                expected: "string",
                found: "int"
            }
        ));
    }

    #[test]
    fn option_maps_null() {
        assert_eq!(roundtrip(&None::<i32>), (Bson::Null, None));
        assert_eq!(roundtrip(&Some(3i32)), (Bson::Int32(3), Some(3)));
        assert_eq!(Option::<i32>::absent(), Some(None));
        assert_eq!(i32::absent(), None);
    }

    #[test]
    fn sequences() {
        let (encoded, decoded) = roundtrip(&vec![1i32, 2, 3]);
        assert_eq!(
            encoded,
            Bson::Array(vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)])
        );
        assert_eq!(decoded, vec![1, 2, 3]);
        assert_eq!(Vec::<i32>::shape(), Shape::Sequence);
        assert_eq!(<[i32; 2]>::shape(), Shape::Sequence);
        assert_eq!(Box::<Vec<i32>>::shape(), Shape::Sequence);
        assert_eq!(String::shape(), Shape::Single);

        let (_, decoded) = roundtrip(&["a".to_string(), "b".to_string()]);
        assert_eq!(decoded, ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn fixed_array_length_is_checked() {
        let config = MappingConfig::default();
        let err = DecodeContext::new(&config)
            .decode::<[i32; 3]>(Bson::Array(vec![Bson::Int32(1)]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn maps() {
        let mut scores = BTreeMap::new();
        scores.insert("amy".to_string(), 3i32);
        scores.insert("bob".to_string(), 5i32);
        let (encoded, decoded) = roundtrip(&scores);
        assert_eq!(encoded, Bson::Document(doc! {"amy": 3, "bob": 5}));
        assert_eq!(decoded, scores);
    }

    #[test]
    fn object_id_accepts_hex() {
        let config = MappingConfig::default();
        let ctx = DecodeContext::new(&config);
        let oid = ctx
            .decode::<ObjectId>(Bson::String("504482e5e4b0d1b2c47fff66".into()))
            .unwrap();
        assert_eq!(oid.to_hex(), "504482e5e4b0d1b2c47fff66");
        let err = ctx
            .decode::<ObjectId>(Bson::String("nope".into()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidObjectId(_)));
    }

    #[test]
    fn static_str_is_encode_only() {
        let config = MappingConfig::default();
        let encoded = EncodeContext::new(&config).encode(&"Doe").unwrap();
        assert_eq!(encoded, Bson::String("Doe".into()));
        let err = DecodeContext::new(&config)
            .decode::<&'static str>(encoded)
            .unwrap_err();
        assert!(err.is_unsupported_type());
        assert_eq!(err.direction(), Some(Direction::Decode));
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    crate::mapped_via_serde!(Point);

    #[test]
    fn serde_bridge() {
        let (encoded, decoded) = roundtrip(&Point { x: 1, y: -2 });
        assert_eq!(encoded, Bson::Document(doc! {"x": 1, "y": -2}));
        assert_eq!(decoded, Point { x: 1, y: -2 });
    }
}
