//! UBJSON adapters.
//!
//! Two bindings share one reader:
//! - `ubjson` writes unsized containers closed by `]` and `}`,
//! - `ubjson-counted` writes a `#` count on every container, and a `$` type
//!   when all of a container's elements share one.
//!
//! The reader accepts both framings and folds `#` counts as declared counts.
//! Integers take the smallest marker that holds them. No marker is wider than
//! signed 64 bits, so unsigned values above `i64::MAX` cannot be carried.
pub mod read;
pub mod write;

use super::{Codec, Encoded, Format};
use crate::error::{DecodeError, Result};
use crate::fold::{FoldOptions, Folder};
use crate::hash::Digest;
use crate::value::Value;

pub use read::{ContainerHeader, Reader};
pub use write::{Containers, Writer};

pub mod marker {
    pub const NULL: u8 = b'Z';
    pub const NOOP: u8 = b'N';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    pub const INT8: u8 = b'i';
    pub const UINT8: u8 = b'U';
    pub const INT16: u8 = b'I';
    pub const INT32: u8 = b'l';
    pub const INT64: u8 = b'L';
    pub const FLOAT32: u8 = b'd';
    pub const FLOAT64: u8 = b'D';
    pub const HIGH_PRECISION: u8 = b'H';
    pub const CHAR: u8 = b'C';
    pub const STRING: u8 = b'S';
    pub const ARRAY_START: u8 = b'[';
    pub const ARRAY_END: u8 = b']';
    pub const OBJECT_START: u8 = b'{';
    pub const OBJECT_END: u8 = b'}';
    pub const TYPE: u8 = b'$';
    pub const COUNT: u8 = b'#';
}

#[derive(Debug, Clone, Copy)]
pub struct Ubjson {
    name: &'static str,
    containers: Containers,
}

impl Ubjson {
    pub fn unsized_containers() -> Self {
        Self { name: "ubjson", containers: Containers::Unsized }
    }

    pub fn counted_containers() -> Self {
        Self { name: "ubjson-counted", containers: Containers::Counted }
    }
}

impl Codec for Ubjson {
    fn name(&self) -> &'static str {
        self.name
    }

    fn format(&self) -> Format {
        Format::Ubjson
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        let mut writer = Writer::new(self.name, self.containers);
        let mut folder = Folder::for_encode(options);
        write::write_value(&mut writer, &mut folder, value, false)?;
        Ok(Encoded { bytes: writer.into_bytes(), digest: folder.finish()? })
    }

    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let mut reader = Reader::new(bytes);
        let mut folder = Folder::new(options);
        read::fold_element(&mut reader, &mut folder)?;
        match reader.remaining() {
            0 => folder.finish(),
            remaining => Err(DecodeError::TrailingBytes { remaining }.into()),
        }
    }
}
