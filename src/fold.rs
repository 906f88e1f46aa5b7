//! Canonical traversal.
//!
//! `Folder` is the event interface every adapter drives, whether it walks a
//! tree it is encoding or a byte stream it is decoding. It owns the
//! accumulator and the recursion frames, and rejects any event sequence that
//! would make two traversals of the same content disagree:
//!
//! - scalars fold once, with the matching combinator
//! - list: elements in order, then `count(n)`
//! - map: per pair `bytes(key)` then the value, then `count(n)`
//! - a container's self-reported count must match what was produced
//!
//! With [`KeyOrder::Sorted`] each map's pairs are buffered as already-folded
//! primitive operations and replayed in key order when the map closes.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{DecodeError, EncodeError, ProtocolViolation, Result};
use crate::hash::{Accumulator, DEFAULT_SEED, Digest};
use crate::value::Value;

pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Hard upper bound on `max_depth`. serde_json refuses a 128th nested
/// container before any visitor sees it, and the recursive readers must stay
/// well inside the stack.
pub const MAX_DEPTH_CEILING: usize = 126;

/// Whether map pair order is part of the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyOrder {
    /// Pairs fold in stored order; reordering a map changes its digest.
    #[default]
    Preserve,
    /// Pairs fold sorted by key bytes (stable, so duplicates keep their order).
    Sorted,
}

/// Parameters both sides of a comparison must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoldOptions {
    pub seed: u32,
    pub key_order: KeyOrder,
    /// Maximum number of simultaneously open containers.
    pub max_depth: usize,
}

impl Default for FoldOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            key_order: KeyOrder::Preserve,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FoldOptions {
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Refuse limits no codec can honor. Folders clamp to the ceiling
    /// anyway; this surfaces the problem before any bytes are written.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth > MAX_DEPTH_CEILING {
            return Err(ConfigError::DepthLimit { requested: self.max_depth, ceiling: MAX_DEPTH_CEILING });
        }
        Ok(())
    }

    /// `max_depth` as every folder and reader applies it.
    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_CEILING)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One primitive fold, recorded for later replay.
#[derive(Debug, Clone, PartialEq)]
enum Op {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Bytes(Vec<u8>),
    Count(u32),
}

impl Op {
    fn apply(self, acc: &mut Accumulator) {
        match self {
            Op::Nil => acc.nil(),
            Op::Bool(b) => acc.bool(b),
            Op::Int(i) => acc.signed_int(i),
            Op::UInt(u) => acc.unsigned_int(u),
            Op::Double(d) => acc.double(d),
            Op::Bytes(b) => acc.bytes(&b),
            Op::Count(n) => acc.count(n),
        }
    }
}

#[derive(Debug)]
struct BufferedPair {
    key: Vec<u8>,
    ops: Vec<Op>,
}

#[derive(Debug)]
enum Frame {
    List {
        declared: Option<u32>,
        seen: u32,
    },
    Map {
        declared: Option<u32>,
        seen: u32,
        key_pending: bool,
        /// `Some` only under `KeyOrder::Sorted`.
        buffer: Option<Vec<BufferedPair>>,
    },
}

impl Frame {
    fn name(&self) -> &'static str {
        match self {
            Frame::List { .. } => "list",
            Frame::Map { .. } => "map",
        }
    }
}

/// Which way the bytes flow, for error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Encode,
    Decode,
}

#[derive(Debug)]
pub struct Folder {
    side: Side,
    acc: Accumulator,
    key_order: KeyOrder,
    max_depth: usize,
    frames: Vec<Frame>,
    root_done: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Folder {
    /// Folder for a decoder: limits are reported as [`DecodeError`]s.
    pub fn new(options: &FoldOptions) -> Self {
        Self::with_side(options, Side::Decode)
    }

    /// Folder for an encoder walking an in-memory tree: limits are reported
    /// as [`EncodeError`]s.
    pub fn for_encode(options: &FoldOptions) -> Self {
        Self::with_side(options, Side::Encode)
    }

    fn with_side(options: &FoldOptions, side: Side) -> Self {
        Self {
            side,
            acc: Accumulator::new(options.seed),
            key_order: options.key_order,
            max_depth: options.effective_max_depth(),
            frames: Vec::new(),
            root_done: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn nil(&mut self) -> Result<()> {
        self.scalar(Op::Nil)
    }

    pub fn bool(&mut self, b: bool) -> Result<()> {
        self.scalar(Op::Bool(b))
    }

    /// Any signed width, widened by the caller.
    pub fn int(&mut self, i: i64) -> Result<()> {
        self.scalar(Op::Int(i))
    }

    pub fn uint(&mut self, u: u64) -> Result<()> {
        self.scalar(Op::UInt(u))
    }

    pub fn double(&mut self, d: f64) -> Result<()> {
        self.scalar(Op::Double(d))
    }

    pub fn float(&mut self, f: f32) -> Result<()> {
        self.scalar(Op::Double(f as f64))
    }

    pub fn str(&mut self, bytes: &[u8]) -> Result<()> {
        self.scalar(Op::Bytes(bytes.to_vec()))
    }

    /// Open a list. `declared` is the element count a wire header claimed,
    /// if the format has one.
    pub fn begin_list(&mut self, declared: Option<u32>) -> Result<()> {
        self.before_value()?;
        self.check_depth()?;
        self.frames.push(Frame::List { declared, seen: 0 });
        Ok(())
    }

    pub fn end_list(&mut self) -> Result<()> {
        let (declared, seen) = match self.frames.pop() {
            Some(Frame::List { declared, seen }) => (declared, seen),
            Some(other) => {
                let open = other.name();
                self.frames.push(other);
                return Err(ProtocolViolation::MismatchedEnd { closed: "list", open }.into());
            }
            None => return Err(ProtocolViolation::UnbalancedEnd { closed: "list" }.into()),
        };
        check_declared(declared, seen)?;
        self.emit(Op::Count(seen));
        self.complete_value()
    }

    pub fn begin_map(&mut self, declared: Option<u32>) -> Result<()> {
        self.before_value()?;
        self.check_depth()?;
        let buffer = match self.key_order {
            KeyOrder::Preserve => None,
            KeyOrder::Sorted => Some(Vec::new()),
        };
        self.frames.push(Frame::Map { declared, seen: 0, key_pending: false, buffer });
        Ok(())
    }

    pub fn key(&mut self, key: &[u8]) -> Result<()> {
        match self.frames.last_mut() {
            Some(Frame::Map { key_pending, buffer, .. }) => {
                if *key_pending {
                    return Err(ProtocolViolation::KeyAfterKey.into());
                }
                *key_pending = true;
                if let Some(pairs) = buffer {
                    pairs.push(BufferedPair { key: key.to_vec(), ops: Vec::new() });
                    return Ok(());
                }
            }
            _ => return Err(ProtocolViolation::KeyOutsideMap.into()),
        }
        self.emit(Op::Bytes(key.to_vec()));
        Ok(())
    }

    pub fn end_map(&mut self) -> Result<()> {
        let (declared, seen, buffer) = match self.frames.pop() {
            Some(Frame::Map { key_pending: true, .. }) => {
                return Err(ProtocolViolation::DanglingKey.into());
            }
            Some(Frame::Map { declared, seen, buffer, .. }) => (declared, seen, buffer),
            Some(other) => {
                let open = other.name();
                self.frames.push(other);
                return Err(ProtocolViolation::MismatchedEnd { closed: "map", open }.into());
            }
            None => return Err(ProtocolViolation::UnbalancedEnd { closed: "map" }.into()),
        };
        check_declared(declared, seen)?;
        if let Some(mut pairs) = buffer {
            pairs.sort_by(|a, b| a.key.cmp(&b.key));
            for pair in pairs {
                self.emit(Op::Bytes(pair.key));
                for op in pair.ops {
                    self.emit(op);
                }
            }
        }
        self.emit(Op::Count(seen));
        self.complete_value()
    }

    /// Fold an in-memory tree at the current position.
    pub fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Nil => self.nil(),
            Value::Bool(b) => self.bool(*b),
            Value::Int(i) => self.int(*i),
            Value::UInt(u) => self.uint(*u),
            Value::Double(d) => self.double(*d),
            Value::Str(s) => self.str(s),
            Value::List(items) => {
                self.begin_list(Some(count_of(items.len())?))?;
                for item in items {
                    self.value(item)?;
                }
                self.end_list()
            }
            Value::Map(pairs) => {
                self.begin_map(Some(count_of(pairs.len())?))?;
                for (k, v) in pairs {
                    self.key(k)?;
                    self.value(v)?;
                }
                self.end_map()
            }
        }
    }

    /// Digest of a completed fold. Fails if the root never closed.
    pub fn finish(self) -> Result<Digest> {
        if !self.frames.is_empty() {
            return Err(ProtocolViolation::Unterminated { open: self.frames.len() }.into());
        }
        if !self.root_done {
            return Err(ProtocolViolation::NoRoot.into());
        }
        Ok(self.acc.digest())
    }

    fn scalar(&mut self, op: Op) -> Result<()> {
        self.before_value()?;
        self.emit(op);
        self.complete_value()
    }

    fn before_value(&self) -> Result<()> {
        if self.root_done {
            return Err(ProtocolViolation::AfterRoot.into());
        }
        if let Some(Frame::Map { key_pending: false, .. }) = self.frames.last() {
            return Err(ProtocolViolation::ValueWithoutKey.into());
        }
        Ok(())
    }

    fn check_depth(&self) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            let limit = self.max_depth;
            return Err(match self.side {
                Side::Encode => EncodeError::DepthExceeded { limit }.into(),
                Side::Decode => DecodeError::DepthExceeded { limit }.into(),
            });
        }
        Ok(())
    }

    fn complete_value(&mut self) -> Result<()> {
        match self.frames.last_mut() {
            None => {
                self.root_done = true;
                Ok(())
            }
            Some(Frame::List { declared, seen }) => bump(declared, seen),
            Some(Frame::Map { declared, seen, key_pending, .. }) => {
                *key_pending = false;
                bump(declared, seen)
            }
        }
    }

    /// Route a primitive to the innermost sorting map, or straight into the
    /// accumulator when nothing is buffering.
    fn emit(&mut self, op: Op) {
        for frame in self.frames.iter_mut().rev() {
            if let Frame::Map { buffer: Some(pairs), .. } = frame {
                if let Some(pair) = pairs.last_mut() {
                    pair.ops.push(op);
                    return;
                }
            }
        }
        op.apply(&mut self.acc);
    }
}

fn bump(declared: &Option<u32>, seen: &mut u32) -> Result<()> {
    *seen = seen.checked_add(1).ok_or(ProtocolViolation::CountOverflow)?;
    match *declared {
        Some(d) if *seen > d => Err(DecodeError::CountMismatch { declared: d, actual: *seen }.into()),
        _ => Ok(()),
    }
}

fn check_declared(declared: Option<u32>, seen: u32) -> Result<()> {
    match declared {
        Some(d) if d != seen => Err(DecodeError::CountMismatch { declared: d, actual: seen }.into()),
        _ => Ok(()),
    }
}

/// Container length as a fold count.
pub fn count_of(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ProtocolViolation::CountOverflow.into())
}

/// Reference traversal of an in-memory tree.
pub fn fold_value(value: &Value, options: &FoldOptions) -> Result<Digest> {
    let mut folder = Folder::for_encode(options);
    folder.value(value)?;
    folder.finish()
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
