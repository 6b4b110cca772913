//! Fluent builder for [`MappingConfig`].

use std::collections::BTreeSet;
use std::sync::Arc;

use bson::Bson;
use tracing::debug;

use crate::config::MappingConfig;
use crate::context::{DecodeContext, EncodeContext};
use crate::engine::BsonEngine;
use crate::error::{Error, Result};
use crate::module::{Module, SetupContext};
use crate::registry::{
    DecodeFn, Deserializer, EncodeFn, FnDeserializer, FnSerializer, Origin, Registration,
    Registry, Serializer, TypeKey, erase_deserializer, erase_serializer,
};

/// Accumulates registrations, then freezes them into a [`MappingConfig`].
///
/// Registrations apply in call order; a later registration for the same type
/// replaces an earlier one, whether either came from a module or not.
///
/// Every method consumes the builder, and `build`/`inner_config` consume it
/// for good: a builder can neither be shared during accumulation nor reused
/// after finalization. Clone it first to derive several configurations from
/// a common base.
#[derive(Clone, Default)]
pub struct MappingBuilder {
    serializers: Registry<EncodeFn>,
    deserializers: Registry<DecodeFn>,
    modules: BTreeSet<String>,
}

impl MappingBuilder {
    /// Start from the default configuration (no registrations).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of an existing configuration.
    ///
    /// The source configuration is not affected by anything done to the
    /// builder.
    #[must_use]
    pub fn from_config(config: &MappingConfig) -> Self {
        let (serializers, deserializers, modules) = config.to_parts();
        Self {
            serializers,
            deserializers,
            modules,
        }
    }

    /// Register a decoder for `T`.
    #[must_use]
    pub fn add_deserializer<T, D>(mut self, deserializer: D) -> Self
    where
        T: 'static,
        D: Deserializer<T>,
    {
        insert_deserializer(&mut self.deserializers, Origin::Explicit, deserializer);
        self
    }

    /// Register an encoder for `T`.
    #[must_use]
    pub fn add_serializer<T, S>(mut self, serializer: S) -> Self
    where
        T: 'static,
        S: Serializer<T>,
    {
        insert_serializer(&mut self.serializers, Origin::Explicit, serializer);
        self
    }

    /// Register a closure as the decoder for `T`.
    #[must_use]
    pub fn deserialize_with<T, F>(self, f: F) -> Self
    where
        T: 'static,
        F: Fn(Bson, &DecodeContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.add_deserializer::<T, _>(FnDeserializer(f))
    }

    /// Register a closure as the encoder for `T`.
    #[must_use]
    pub fn serialize_with<T, F>(self, f: F) -> Self
    where
        T: 'static,
        F: Fn(&T, &EncodeContext<'_>) -> Result<Bson> + Send + Sync + 'static,
    {
        self.add_serializer::<T, _>(FnSerializer(f))
    }

    /// Install a module's registrations.
    ///
    /// Installing a module whose name is already installed does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRegistration` if the module name is blank.
    pub fn add_module<M: Module>(mut self, module: M) -> Result<Self> {
        let name = module.name().trim();
        if name.is_empty() {
            return Err(Error::InvalidRegistration(
                "module name must not be blank".to_owned(),
            ));
        }
        if self.modules.contains(name) {
            debug!(module = name, "module already installed, skipping");
            return Ok(self);
        }

        let name: Arc<str> = Arc::from(name);
        let mut ctx = SetupContext {
            origin: Origin::Module(Arc::clone(&name)),
            serializers: &mut self.serializers,
            deserializers: &mut self.deserializers,
            added: 0,
        };
        module.setup(&mut ctx);
        debug!(module = &*name, registrations = ctx.added, "module installed");
        self.modules.insert(name.to_string());
        Ok(self)
    }

    /// Freeze the registrations into a configuration.
    #[must_use]
    pub fn inner_config(self) -> MappingConfig {
        debug!(
            serializers = self.serializers.len(),
            deserializers = self.deserializers.len(),
            modules = self.modules.len(),
            "mapping configuration built"
        );
        MappingConfig::from_parts(self.serializers, self.deserializers, self.modules)
    }

    /// Freeze the registrations and bind an engine to them.
    #[must_use]
    pub fn build(self) -> BsonEngine {
        BsonEngine::with_config(self.inner_config())
    }
}

pub(crate) fn insert_serializer<T, S>(registry: &mut Registry<EncodeFn>, origin: Origin, serializer: S)
where
    T: 'static,
    S: Serializer<T>,
{
    let key = TypeKey::of::<T>();
    debug!(type_name = key.name(), %origin, "serializer registered");
    registry.insert(
        key,
        Registration {
            origin,
            coder: erase_serializer(serializer),
        },
    );
}

pub(crate) fn insert_deserializer<T, D>(
    registry: &mut Registry<DecodeFn>,
    origin: Origin,
    deserializer: D,
) where
    T: 'static,
    D: Deserializer<T>,
{
    let key = TypeKey::of::<T>();
    debug!(type_name = key.name(), %origin, "deserializer registered");
    registry.insert(
        key,
        Registration {
            origin,
            coder: erase_deserializer(deserializer),
        },
    );
}
