//! MessagePack adapters.
//!
//! Three bindings share one reader and one writer:
//! - `msgpack` writes the smallest widths and folds while reading,
//! - `msgpack-wide` writes 64-bit integers and 32-bit headers everywhere,
//! - `msgpack-node` decodes into a [`Value`] tree first and folds that.
//!
//! Headers carry element counts, which the fold checks against what was
//! actually read.
pub mod read;
pub mod write;

use super::{Codec, Encoded, Format};
use crate::error::{DecodeError, Result};
use crate::fold::{DEFAULT_MAX_DEPTH, FoldOptions, Folder, MAX_DEPTH_CEILING, fold_value};
use crate::hash::Digest;
use crate::value::Value;

pub use read::{Reader, Tag};
pub use write::{Widths, Writer};

#[derive(Debug, Clone, Copy)]
pub struct MsgPack {
    name: &'static str,
    widths: Widths,
}

impl MsgPack {
    pub fn compact() -> Self {
        Self { name: "msgpack", widths: Widths::Compact }
    }

    pub fn wide() -> Self {
        Self { name: "msgpack-wide", widths: Widths::Wide }
    }
}

fn encode_with(name: &'static str, widths: Widths, value: &Value, options: &FoldOptions) -> Result<Encoded> {
    let mut writer = Writer::new(name, widths);
    let mut folder = Folder::for_encode(options);
    write::write_value(&mut writer, &mut folder, value)?;
    Ok(Encoded { bytes: writer.into_bytes(), digest: folder.finish()? })
}

fn no_trailing(r: &Reader<'_>) -> Result<()> {
    match r.remaining() {
        0 => Ok(()),
        remaining => Err(DecodeError::TrailingBytes { remaining }.into()),
    }
}

impl Codec for MsgPack {
    fn name(&self) -> &'static str {
        self.name
    }

    fn format(&self) -> Format {
        Format::MessagePack
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        encode_with(self.name, self.widths, value, options)
    }

    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let mut reader = Reader::new(bytes);
        let mut folder = Folder::new(options);
        read::fold_element(&mut reader, &mut folder)?;
        no_trailing(&reader)?;
        folder.finish()
    }
}

/// Tree-building decoder: parse everything, then fold the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackNode;

impl Codec for MsgPackNode {
    fn name(&self) -> &'static str {
        "msgpack-node"
    }

    fn format(&self) -> Format {
        Format::MessagePack
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        encode_with(self.name(), Widths::Compact, value, options)
    }

    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let tree = read_value_with_depth(bytes, options.effective_max_depth())?;
        fold_value(&tree, options)
    }
}

/// Decode one MessagePack document into a tree.
pub fn read_value(bytes: &[u8]) -> Result<Value> {
    read_value_with_depth(bytes, DEFAULT_MAX_DEPTH)
}

/// `max_depth` is clamped to [`MAX_DEPTH_CEILING`].
pub fn read_value_with_depth(bytes: &[u8], max_depth: usize) -> Result<Value> {
    let mut reader = Reader::new(bytes);
    let value = read::read_element(&mut reader, 0, max_depth.min(MAX_DEPTH_CEILING))?;
    no_trailing(&reader)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hash::{DEFAULT_SEED, fold_count, fold_double};

    fn sample() -> Value {
        Value::map([
            ("n", Value::Nil),
            ("t", Value::Bool(true)),
            ("neg", Value::Int(-40_000)),
            ("pos", Value::UInt(300)),
            ("huge", Value::UInt(u64::MAX)),
            ("pi", Value::Double(std::f64::consts::PI)),
            ("bin", Value::Str(vec![0, 0xff, 0x10])),
            ("list", Value::list((0..20).map(Value::Int))),
        ])
    }

    #[test]
    fn all_bindings_round_trip_and_cross_decode() {
        let opts = FoldOptions::default();
        let codecs: [&dyn Codec; 3] = [&MsgPack::compact(), &MsgPack::wide(), &MsgPackNode];
        let reference = fold_value(&sample(), &opts).unwrap();
        for writer in codecs {
            let enc = writer.encode(&sample(), &opts).unwrap();
            assert_eq!(enc.digest, reference, "{}", writer.name());
            for reader in codecs {
                assert_eq!(reader.decode(&enc.bytes, &opts).unwrap(), reference, "{} -> {}", writer.name(), reader.name());
            }
        }
    }

    #[test]
    fn wide_output_is_larger_but_equivalent() {
        let opts = FoldOptions::default();
        let compact = MsgPack::compact().encode(&sample(), &opts).unwrap();
        let wide = MsgPack::wide().encode(&sample(), &opts).unwrap();
        assert!(wide.bytes.len() > compact.bytes.len());
        assert_eq!(wide.digest, compact.digest);
    }

    #[test]
    fn read_value_restores_the_tree() {
        let enc = MsgPack::compact().encode(&sample(), &FoldOptions::default()).unwrap();
        let back = read_value(&enc.bytes).unwrap();
        // positive ints come back unsigned, which folds identically
        let Value::Map(pairs) = back else { panic!("expected map") };
        assert_eq!(pairs.len(), 8);
        assert_eq!(pairs[2], (b"neg".to_vec(), Value::Int(-40_000)));
        assert_eq!(pairs[6].1, Value::Str(vec![0, 0xff, 0x10]));
    }

    #[test]
    fn float32_widens_to_double() {
        let mut bytes = vec![0x91, 0xca];
        bytes.extend_from_slice(&1.5f32.to_be_bytes());
        let expected = Digest(fold_count(fold_double(DEFAULT_SEED, 1.5), 1));
        let opts = FoldOptions::default();
        assert_eq!(MsgPack::compact().decode(&bytes, &opts).unwrap(), expected);
        assert_eq!(MsgPackNode.decode(&bytes, &opts).unwrap(), expected);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let err = MsgPack::compact().decode(&[0x90, 0xc0], &FoldOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::TrailingBytes { remaining: 1 })));
    }

    #[test]
    fn hostile_nesting_stops_at_the_ceiling() {
        let opts = FoldOptions::default().with_max_depth(usize::MAX);
        let mut bytes = vec![0x91; 2_000_000];
        bytes.push(0xc0);
        for codec in [&MsgPack::compact() as &dyn Codec, &MsgPackNode] {
            let err = codec.decode(&bytes, &opts).unwrap_err();
            assert!(
                matches!(err, Error::Decode(DecodeError::DepthExceeded { limit: MAX_DEPTH_CEILING })),
                "{}: {err}",
                codec.name()
            );
        }
    }

    #[test]
    fn depth_limit_applies_to_both_decoders() {
        let opts = FoldOptions::default().with_max_depth(2);
        let nested: [u8; 4] = [0x91, 0x91, 0x91, 0xc0];
        for codec in [&MsgPack::compact() as &dyn Codec, &MsgPackNode] {
            let err = codec.decode(&nested, &opts).unwrap_err();
            assert!(matches!(err, Error::Decode(DecodeError::DepthExceeded { limit: 2 })), "{}", codec.name());
        }
    }
}
