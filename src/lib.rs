//! Canonical structural hashing for checking that independent codecs agree
//! on the content of a document, without comparing their bytes.
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod fold;
pub mod generate;
pub mod harness;
pub mod hash;
pub mod value;

pub use codec::{Codec, Encoded, Format};
pub use error::{DecodeError, EncodeError, Error, ProtocolViolation, Result};
pub use fold::{FoldOptions, Folder, KeyOrder, fold_value};
pub use hash::{Accumulator, DEFAULT_SEED, Digest};
pub use value::{Kind, Value};
