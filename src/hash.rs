//! 32-bit fold algebra.
//!
//! One combinator per primitive kind. Every combinator mixes a kind tag and
//! then its payload through a murmur-style multiply-rotate-xor step, so the
//! state depends on value, kind, order and count, and nothing else.

use std::fmt;

/// Seed shared by both sides of a comparison unless configured otherwise.
pub const DEFAULT_SEED: u32 = 0x2F4A_8A41;

const TAG_NIL: u32 = 0x01;
const TAG_BOOL: u32 = 0x02;
const TAG_INT: u32 = 0x03;
const TAG_UINT: u32 = 0x04;
const TAG_DOUBLE: u32 = 0x05;
const TAG_BYTES: u32 = 0x06;
const TAG_COUNT: u32 = 0x07;

const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

#[inline]
fn mix(h: u32, k: u32) -> u32 {
    let k = k.wrapping_mul(0xCC9E_2D51).rotate_left(15).wrapping_mul(0x1B87_3593);
    (h ^ k).rotate_left(13).wrapping_mul(5).wrapping_add(0xE654_6B64)
}

#[inline]
fn mix_u64(h: u32, v: u64) -> u32 {
    mix(mix(h, v as u32), (v >> 32) as u32)
}

pub fn fold_nil(state: u32) -> u32 {
    mix(state, TAG_NIL)
}

pub fn fold_bool(state: u32, b: bool) -> u32 {
    mix(mix(state, TAG_BOOL), b as u32)
}

/// Narrower integers must be widened to `i64` by the caller.
pub fn fold_signed_int(state: u32, i: i64) -> u32 {
    mix_u64(mix(state, TAG_INT), i as u64)
}

/// Folds by numeric value: anything representable as `i64` lands on the
/// signed path, since text formats cannot tell the two apart.
pub fn fold_unsigned_int(state: u32, u: u64) -> u32 {
    match i64::try_from(u) {
        Ok(i) => fold_signed_int(state, i),
        Err(_) => mix_u64(mix(state, TAG_UINT), u),
    }
}

pub fn fold_double(state: u32, d: f64) -> u32 {
    let bits = if d.is_nan() { CANONICAL_NAN } else { d.to_bits() };
    mix_u64(mix(state, TAG_DOUBLE), bits)
}

/// Single precision is widened; the canonical form only knows doubles.
pub fn fold_float(state: u32, f: f32) -> u32 {
    fold_double(state, f as f64)
}

pub fn fold_bytes(state: u32, bytes: &[u8]) -> u32 {
    let mut h = mix_u64(mix(state, TAG_BYTES), bytes.len() as u64);
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        h = mix(h, u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut tail = [0u8; 4];
        tail[..rest.len()].copy_from_slice(rest);
        h = mix(h, u32::from_le_bytes(tail));
    }
    h
}

/// Container terminator, folded after the contents.
pub fn fold_count(state: u32, n: u32) -> u32 {
    mix(mix(state, TAG_COUNT), n)
}

/// Final 32-bit result of a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Digest(pub u32);

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Accumulator state threaded through a traversal.
///
/// Method form of the free combinators, for call sites that hold state in a
/// struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    state: u32,
}

impl Accumulator {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn nil(&mut self) { self.state = fold_nil(self.state); }
    pub fn bool(&mut self, b: bool) { self.state = fold_bool(self.state, b); }
    pub fn signed_int(&mut self, i: i64) { self.state = fold_signed_int(self.state, i); }
    pub fn unsigned_int(&mut self, u: u64) { self.state = fold_unsigned_int(self.state, u); }
    pub fn double(&mut self, d: f64) { self.state = fold_double(self.state, d); }
    pub fn bytes(&mut self, b: &[u8]) { self.state = fold_bytes(self.state, b); }
    pub fn count(&mut self, n: u32) { self.state = fold_count(self.state, n); }

    pub fn digest(&self) -> Digest {
        Digest(self.state)
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_do_not_collide_on_zero() {
        let s = DEFAULT_SEED;
        let all = [
            fold_nil(s),
            fold_bool(s, false),
            fold_signed_int(s, 0),
            fold_double(s, 0.0),
            fold_bytes(s, b""),
            fold_count(s, 0),
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn unsigned_in_signed_range_matches_signed() {
        let s = DEFAULT_SEED;
        assert_eq!(fold_unsigned_int(s, 200), fold_signed_int(s, 200));
        assert_eq!(fold_unsigned_int(s, i64::MAX as u64), fold_signed_int(s, i64::MAX));
        assert_ne!(fold_unsigned_int(s, u64::MAX), fold_signed_int(s, -1));
    }

    #[test]
    fn bytes_fold_length_and_tail() {
        let s = DEFAULT_SEED;
        // same padded word, different length
        assert_ne!(fold_bytes(s, b"ab"), fold_bytes(s, b"ab\0"));
        assert_ne!(fold_bytes(s, b"abcd"), fold_bytes(s, b"abce"));
        assert_ne!(fold_bytes(s, b"hello"), fold_bytes(s, b"hellp"));
    }

    #[test]
    fn bytes_fold_the_full_64_bit_length() {
        let s = DEFAULT_SEED;
        let tagged = mix(s, TAG_BYTES);
        assert_eq!(fold_bytes(s, b""), mix(mix(tagged, 0), 0));
        let ab = u32::from_le_bytes([b'a', b'b', 0, 0]);
        assert_eq!(fold_bytes(s, b"ab"), mix(mix(mix(tagged, 2), 0), ab));
        // a length of 2 and one of 2 + 2^32 differ only in the high word
        assert_ne!(mix_u64(tagged, 2), mix_u64(tagged, 2 + (1 << 32)));
    }

    #[test]
    fn order_matters() {
        let s = DEFAULT_SEED;
        let ab = fold_signed_int(fold_signed_int(s, 1), 2);
        let ba = fold_signed_int(fold_signed_int(s, 2), 1);
        assert_ne!(ab, ba);
    }

    #[test]
    fn float_widens_and_nan_is_canonical() {
        let s = DEFAULT_SEED;
        assert_eq!(fold_float(s, 1.5), fold_double(s, 1.5));
        let other_nan = f64::from_bits(0x7FF8_0000_0000_0001);
        assert_eq!(fold_double(s, other_nan), fold_double(s, f64::NAN));
        assert_ne!(fold_double(s, 0.0), fold_double(s, -0.0));
    }

    #[test]
    fn accumulator_matches_free_functions() {
        let mut acc = Accumulator::new(7);
        acc.bytes(b"k");
        acc.unsigned_int(3);
        acc.count(1);
        let expected = fold_count(fold_unsigned_int(fold_bytes(7, b"k"), 3), 1);
        assert_eq!(acc.digest(), Digest(expected));
        assert_eq!(Digest(0xab).to_string(), "000000ab");
    }
}
