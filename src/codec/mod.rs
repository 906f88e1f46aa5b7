//! Codec adapter contract and the registry of built-in adapters.
//!
//! An adapter folds the tree while it writes bytes, and folds whatever its
//! parser produces while it reads them. It never sees the other side's tree.
pub mod bson;
pub mod json;
pub mod msgpack;
pub mod ubjson;

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::Result;
use crate::fold::FoldOptions;
use crate::hash::Digest;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "MessagePack")]
    MessagePack,
    #[serde(rename = "BSON")]
    Bson,
    #[serde(rename = "UBJSON")]
    Ubjson,
}

impl Format {
    pub fn file_extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::MessagePack => "mp",
            Format::Bson => "bson",
            Format::Ubjson => "ubj",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("JSON"),
            Format::MessagePack => f.write_str("MessagePack"),
            Format::Bson => f.write_str("BSON"),
            Format::Ubjson => f.write_str("UBJSON"),
        }
    }
}

/// Bytes produced by an encoder, with the digest folded while writing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub digest: Digest,
}

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    fn format(&self) -> Format;

    /// Fold `value` while serializing it. Nothing is returned on failure.
    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded>;

    /// Parse `bytes` and fold what was parsed.
    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest>;
}

static REGISTRY: Lazy<Vec<Box<dyn Codec>>> = Lazy::new(|| {
    vec![
        Box::new(json::JsonStream),
        Box::new(json::JsonDom),
        Box::new(msgpack::MsgPack::compact()),
        Box::new(msgpack::MsgPack::wide()),
        Box::new(msgpack::MsgPackNode),
        Box::new(bson::Bson),
        Box::new(bson::BsonDoc),
        Box::new(ubjson::Ubjson::unsized_containers()),
        Box::new(ubjson::Ubjson::counted_containers()),
    ]
});

/// Every built-in adapter, in a fixed order.
pub fn all() -> impl Iterator<Item = &'static dyn Codec> {
    REGISTRY.iter().map(|c| c.as_ref())
}

pub fn by_name(name: &str) -> Option<&'static dyn Codec> {
    all().find(|c| c.name() == name)
}

pub fn names() -> Vec<&'static str> {
    all().map(|c| c.name()).collect()
}
