//! Seeded synthesis of test trees.
//!
//! The root is always a map. Every node spends one unit of the size budget
//! and the root keeps taking children until the budget is gone, so a tree
//! for budget `n` has exactly `max(n, 1)` nodes. Output stays inside what
//! every built-in codec can carry: unsigned integers at or below `i64::MAX`,
//! finite doubles, printable ASCII strings, unique keys per map.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::value::Value;

/// Deepest container nesting below the root.
pub const MAX_NESTING: usize = 6;

/// Widest non-root container.
const MAX_WIDTH: usize = 12;

const MAX_STR_LEN: usize = 24;
const MAX_KEY_LEN: usize = 10;

pub struct Generator {
    rng: StdRng,
}

impl Generator {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn tree(&mut self, size: usize) -> Value {
        let mut budget = size.saturating_sub(1);
        let mut pairs = Vec::new();
        let mut seen = HashSet::new();
        while budget > 0 {
            let key = self.unique_key(&mut seen, pairs.len());
            pairs.push((key, self.node(&mut budget, 1)));
        }
        Value::Map(pairs)
    }

    fn node(&mut self, budget: &mut usize, depth: usize) -> Value {
        *budget = budget.saturating_sub(1);
        if depth <= MAX_NESTING && self.rng.gen_bool(0.25) {
            let width = self.rng.gen_range(0..=MAX_WIDTH);
            return if self.rng.gen_bool(0.5) {
                let mut items = Vec::with_capacity(width);
                while items.len() < width && *budget > 0 {
                    items.push(self.node(budget, depth + 1));
                }
                Value::List(items)
            } else {
                let mut pairs = Vec::with_capacity(width);
                let mut seen = HashSet::new();
                while pairs.len() < width && *budget > 0 {
                    let key = self.unique_key(&mut seen, pairs.len());
                    pairs.push((key, self.node(budget, depth + 1)));
                }
                Value::Map(pairs)
            };
        }
        self.scalar()
    }

    fn scalar(&mut self) -> Value {
        match self.rng.gen_range(0..100) {
            0..5 => Value::Nil,
            5..15 => Value::Bool(self.rng.gen_bool(0.5)),
            15..35 => Value::Int(if self.rng.gen_bool(0.5) {
                self.rng.gen_range(-200..200)
            } else {
                self.rng.gen_range(i64::MIN..=i64::MAX)
            }),
            35..50 => Value::UInt(if self.rng.gen_bool(0.5) {
                self.rng.gen_range(0..300)
            } else {
                self.rng.gen_range(0..=i64::MAX as u64)
            }),
            50..70 => Value::Double(self.rng.gen_range(-1.0e6..1.0e6)),
            _ => Value::Str(self.text(0, MAX_STR_LEN)),
        }
    }

    fn text(&mut self, min: usize, max: usize) -> Vec<u8> {
        let len = self.rng.gen_range(min..=max);
        (0..len).map(|_| self.rng.gen_range(0x20u8..0x7f)).collect()
    }

    fn unique_key(&mut self, seen: &mut HashSet<Vec<u8>>, index: usize) -> Vec<u8> {
        let len = self.rng.gen_range(1..=MAX_KEY_LEN);
        let mut key: Vec<u8> = (0..len).map(|_| self.rng.gen_range(b'a'..=b'z')).collect();
        while !seen.insert(key.clone()) {
            key.push(b'_');
            key.extend_from_slice(index.to_string().as_bytes());
        }
        key
    }
}

/// One tree for `size`, reproducible from `seed`.
pub fn generate(size: usize, seed: u64) -> Value {
    Generator::new(seed).tree(size)
}
