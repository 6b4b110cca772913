//! Object-document marshalling between BSON buffers and typed Rust values.
//!
//! ```
//! use docmap::{BsonDocument, DecodeContext, MappingBuilder, bson::{Bson, doc}};
//!
//! #[derive(Debug, PartialEq)]
//! struct Friend {
//!     name: String,
//! }
//!
//! docmap::mapped_struct!(Friend { name: "name" });
//!
//! let engine = MappingBuilder::new()
//!     .deserialize_with(|_: Bson, _: &DecodeContext<'_>| Ok("Doe".to_string()))
//!     .build();
//!
//! let document = BsonDocument::from_document(&doc! {"name": "robert"}).unwrap();
//! let friend: Friend = engine.unmarshall(&document).unwrap();
//! assert_eq!(friend.name, "Doe");
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod json;
pub mod mapped;
pub mod module;
pub mod registry;
pub mod tag;

pub use bson;

pub use crate::builder::MappingBuilder;
pub use crate::config::{MappingConfig, Reader, Writer};
pub use crate::context::{DecodeContext, DocumentReader, DocumentWriter, EncodeContext};
pub use crate::document::BsonDocument;
pub use crate::engine::{BsonEngine, Marshaller, Unmarshaller};
pub use crate::error::{Direction, Error, Result};
pub use crate::mapped::{Mapped, Shape};
pub use crate::module::{ExtendedJsonModule, Module, SetupContext};
pub use crate::registry::{Deserializer, Origin, Serializer, TypeKey};
pub use crate::tag::TypeTag;
