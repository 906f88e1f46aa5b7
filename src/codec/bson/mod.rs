//! BSON adapters.
//!
//! Two bindings share one writer:
//! - `bson` folds while iterating the document,
//! - `bson-doc` builds a [`Value`] tree first and folds that.
//!
//! BSON carries no element counts, so decoders fold what they read. Array
//! documents key their elements `"0"`, `"1"`, ...; those keys are checked and
//! then skipped. Integers are written as int32 when they fit and int64
//! otherwise, so unsigned values above `i64::MAX` cannot be carried.
pub mod read;
pub mod write;

use super::{Codec, Encoded, Format};
use crate::error::{DecodeError, Result};
use crate::fold::{DEFAULT_MAX_DEPTH, FoldOptions, Folder, MAX_DEPTH_CEILING, fold_value};
use crate::hash::Digest;
use crate::value::Value;

pub use read::{Header, Payload, Reader};
pub use write::Writer;

/// Element type bytes.
pub mod element {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BOOL: u8 = 0x08;
    pub const NULL: u8 = 0x0a;
    pub const INT32: u8 = 0x10;
    pub const INT64: u8 = 0x12;
}

fn encode_with(name: &'static str, value: &Value, options: &FoldOptions) -> Result<Encoded> {
    let mut writer = Writer::new(name);
    let mut folder = Folder::for_encode(options);
    write::write_root(&mut writer, &mut folder, value)?;
    Ok(Encoded { bytes: writer.into_bytes(), digest: folder.finish()? })
}

fn no_trailing(r: &Reader<'_>) -> Result<()> {
    match r.remaining() {
        0 => Ok(()),
        remaining => Err(DecodeError::TrailingBytes { remaining }.into()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bson;

impl Codec for Bson {
    fn name(&self) -> &'static str {
        "bson"
    }

    fn format(&self) -> Format {
        Format::Bson
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        encode_with(self.name(), value, options)
    }

    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let mut reader = Reader::new(bytes);
        let mut folder = Folder::new(options);
        read::fold_document(&mut reader, &mut folder, read::root_is_array(bytes))?;
        no_trailing(&reader)?;
        folder.finish()
    }
}

/// Tree-building decoder: parse everything, then fold the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonDoc;

impl Codec for BsonDoc {
    fn name(&self) -> &'static str {
        "bson-doc"
    }

    fn format(&self) -> Format {
        Format::Bson
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        encode_with(self.name(), value, options)
    }

    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let tree = read_value_with_depth(bytes, options.effective_max_depth())?;
        fold_value(&tree, options)
    }
}

/// Decode one BSON document into a tree.
pub fn read_value(bytes: &[u8]) -> Result<Value> {
    read_value_with_depth(bytes, DEFAULT_MAX_DEPTH)
}

/// `max_depth` is clamped to [`MAX_DEPTH_CEILING`].
pub fn read_value_with_depth(bytes: &[u8], max_depth: usize) -> Result<Value> {
    let mut reader = Reader::new(bytes);
    let value = read::read_document(&mut reader, read::root_is_array(bytes), 0, max_depth.min(MAX_DEPTH_CEILING))?;
    no_trailing(&reader)?;
    Ok(value)
}
