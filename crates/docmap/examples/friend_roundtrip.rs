//! Example of mapping a record through a customised engine.
//!
//! cargo run --package docmap --example friend_roundtrip

use docmap::bson::oid::ObjectId;
use docmap::bson::{Bson, doc};
use docmap::{BsonDocument, DecodeContext, ExtendedJsonModule, MappingBuilder};

#[derive(Debug)]
struct Friend {
    id: Option<ObjectId>,
    name: String,
}

docmap::mapped_struct!(Friend { id: "_id", name: "name" });

fn main() -> Result<(), docmap::Error> {
    let config = MappingBuilder::new()
        .add_module(ExtendedJsonModule)?
        .deserialize_with(|value: Bson, _: &DecodeContext<'_>| match value {
            Bson::String(name) => Ok(name.to_uppercase()),
            other => Err(docmap::Error::custom(format!("not a name: {other}"))),
        })
        .inner_config();

    // json out: ids wrapped as {"$oid": ...}
    let robert = Friend {
        id: Some(ObjectId::parse_str("504482e5e4b0d1b2c47fff66")?),
        name: "Robert".into(),
    };
    println!("{}", config.writer_for(&robert).write_value_as_string(&robert)?);

    // binary in: names decoded through the registered decoder
    let engine = docmap::BsonEngine::with_config(config);
    let document = BsonDocument::from_document(&doc! {"name": "robert"})?;
    let friend: Friend = engine.unmarshall(&document)?;
    println!("{friend:?}");

    let document = engine.marshall(&friend)?;
    println!("{document} ({} bytes, {})", document.size(), document.type_tag().name());
    Ok(())
}
