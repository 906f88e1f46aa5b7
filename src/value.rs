//! In-memory document model.
//!
//! A `Value` is a closed tagged union. Maps are ordered pair lists, not hash
//! maps: insertion order is part of the content and duplicate keys survive.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    /// Generators keep this at or below `i64::MAX` for formats without a
    /// wider unsigned range.
    UInt(u64),
    Double(f64),
    /// Explicit-length bytes. Never null-terminated here, even when a codec
    /// needs that on the wire.
    Str(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Vec<u8>, Value)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Nil,
    Bool,
    Int,
    UInt,
    Double,
    Str,
    List,
    Map,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Nil => "nil",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::UInt => "uint",
            Kind::Double => "double",
            Kind::Str => "str",
            Kind::List => "list",
            Kind::Map => "map",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn str(s: impl AsRef<[u8]>) -> Self {
        Value::Str(s.as_ref().to_vec())
    }

    /// Build a map from `(key, value)` pairs, keeping their order.
    pub fn map<K, I>(pairs: I) -> Self
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_vec(), v))
                .collect(),
        )
    }

    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::UInt(_) => Kind::UInt,
            Value::Double(_) => Kind::Double,
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Transitive node count. Map keys are not nodes; their values are.
    pub fn node_count(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::node_count).sum::<usize>(),
            Value::Map(pairs) => 1 + pairs.iter().map(|(_, v)| v.node_count()).sum::<usize>(),
            _ => 1,
        }
    }

    /// Container nesting depth; scalars are depth 0, `[]` is depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Value::Map(pairs) => 1 + pairs.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
            _ => 0,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Int(i as i64) }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self { Value::UInt(u) }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self { Value::Double(d) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.as_bytes().to_vec()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s.into_bytes()) }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self { Value::List(items) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_skips_keys() {
        let v = Value::map([
            ("a", Value::Int(1)),
            ("b", Value::list([Value::Nil, Value::from("x")])),
        ]);
        // map + int + list + nil + str
        assert_eq!(v.node_count(), 5);
        assert_eq!(v.depth(), 2);
    }

    #[test]
    fn duplicate_keys_are_kept_in_order() {
        let v = Value::map([("k", Value::Int(1)), ("k", Value::Int(2))]);
        let Value::Map(pairs) = v else { panic!("expected map") };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].1, Value::Int(2));
    }

    #[test]
    fn empty_containers() {
        assert_eq!(Value::List(vec![]).depth(), 1);
        assert_eq!(Value::Map(vec![]).node_count(), 1);
        assert_eq!(Value::Map(vec![]).kind().to_string(), "map");
    }
}
