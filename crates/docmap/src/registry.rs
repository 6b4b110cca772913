//! Type-keyed registries of custom coders.
//!
//! A registry maps a [`TypeKey`] to a type-erased coder. Erasure happens once,
//! at registration, from a statically typed [`Serializer`] or
//! [`Deserializer`]; lookups downcast back to the concrete type, so a coder
//! can only ever be invoked for the type it was registered for.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bson::Bson;

use crate::context::{DecodeContext, EncodeContext};
use crate::error::{Error, Result};

/// Stable, hashable identity of a Rust type.
///
/// Generic instantiations are distinct keys (`Vec<String>` is not
/// `Vec<i64>`); type aliases share the key of the aliased type.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Fully qualified type name (diagnostics only).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Custom encoding logic for values of type `T`.
pub trait Serializer<T>: Send + Sync + 'static {
    /// Produce the document value for `value`.
    ///
    /// Nested values should go through `ctx.encode` so that registrations
    /// for their types apply as well.
    fn serialize(&self, value: &T, ctx: &EncodeContext<'_>) -> Result<Bson>;
}

/// Custom decoding logic producing values of type `T`.
pub trait Deserializer<T>: Send + Sync + 'static {
    /// Build a `T` from a document value.
    fn deserialize(&self, value: Bson, ctx: &DecodeContext<'_>) -> Result<T>;
}

pub(crate) type EncodeFn = dyn Fn(&dyn Any, &EncodeContext<'_>) -> Result<Bson> + Send + Sync;
pub(crate) type DecodeFn = dyn Fn(Bson, &DecodeContext<'_>) -> Result<Box<dyn Any>> + Send + Sync;

/// Where a registration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Registered directly on a builder.
    Explicit,
    /// Registered by the named module.
    Module(Arc<str>),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Explicit => f.write_str("explicit"),
            Origin::Module(name) => write!(f, "module `{name}`"),
        }
    }
}

/// One registered coder.
pub(crate) struct Registration<F: ?Sized> {
    pub(crate) origin: Origin,
    pub(crate) coder: Arc<F>,
}

impl<F: ?Sized> Clone for Registration<F> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            coder: Arc::clone(&self.coder),
        }
    }
}

pub(crate) type Registry<F> = HashMap<TypeKey, Registration<F>>;

pub(crate) fn erase_serializer<T, S>(serializer: S) -> Arc<EncodeFn>
where
    T: 'static,
    S: Serializer<T>,
{
    Arc::new(move |value: &dyn Any, ctx: &EncodeContext<'_>| {
        let value = value.downcast_ref::<T>().ok_or(Error::TypeMismatch {
            expected: type_name::<T>(),
        })?;
        serializer.serialize(value, ctx)
    })
}

pub(crate) fn erase_deserializer<T, D>(deserializer: D) -> Arc<DecodeFn>
where
    T: 'static,
    D: Deserializer<T>,
{
    Arc::new(
        move |value: Bson, ctx: &DecodeContext<'_>| -> Result<Box<dyn Any>> {
            Ok(Box::new(deserializer.deserialize(value, ctx)?))
        },
    )
}

/// Adapts a closure to [`Serializer`].
pub(crate) struct FnSerializer<F>(pub(crate) F);

impl<T, F> Serializer<T> for FnSerializer<F>
where
    F: Fn(&T, &EncodeContext<'_>) -> Result<Bson> + Send + Sync + 'static,
{
    fn serialize(&self, value: &T, ctx: &EncodeContext<'_>) -> Result<Bson> {
        (self.0)(value, ctx)
    }
}

/// Adapts a closure to [`Deserializer`].
pub(crate) struct FnDeserializer<F>(pub(crate) F);

impl<T, F> Deserializer<T> for FnDeserializer<F>
where
    F: Fn(Bson, &DecodeContext<'_>) -> Result<T> + Send + Sync + 'static,
{
    fn deserialize(&self, value: Bson, ctx: &DecodeContext<'_>) -> Result<T> {
        (self.0)(value, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Alias = Vec<String>;

    #[test]
    fn generic_instantiations_are_distinct() {
        assert_ne!(TypeKey::of::<Vec<String>>(), TypeKey::of::<Vec<i64>>());
        assert_eq!(TypeKey::of::<Alias>(), TypeKey::of::<Vec<String>>());
    }

    #[test]
    fn key_name_is_type_name() {
        assert_eq!(TypeKey::of::<String>().name(), "alloc::string::String");
        assert_eq!(format!("{:?}", TypeKey::of::<i32>()), "i32");
    }

    #[test]
    fn origin_display() {
        assert_eq!(Origin::Explicit.to_string(), "explicit");
        assert_eq!(
            Origin::Module(Arc::from("extended-json")).to_string(),
            "module `extended-json`"
        );
    }
}
