use bytes::BufMut;

use super::marker::*;
use crate::error::{EncodeError, Result};
use crate::fold::{Folder, count_of};
use crate::value::Value;

/// How the writer frames containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containers {
    /// No count; closed by `]` or `}`.
    Unsized,
    /// A `#` count up front. Containers of two or more elements that share a
    /// payload-carrying marker also get a `$` type and drop per-element markers.
    Counted,
}

pub struct Writer {
    buf: Vec<u8>,
    containers: Containers,
    codec: &'static str,
}

/// The smallest integer marker that holds `i`.
pub fn int_marker(i: i64) -> u8 {
    match i {
        -128..=127 => INT8,
        128..=255 => UINT8,
        -32_768..=32_767 => INT16,
        -2_147_483_648..=2_147_483_647 => INT32,
        _ => INT64,
    }
}

/// The marker `value` is written with, if it has one.
fn marker_of(value: &Value) -> Option<u8> {
    let marker = match value {
        Value::Nil => NULL,
        Value::Bool(true) => TRUE,
        Value::Bool(false) => FALSE,
        Value::Int(i) => int_marker(*i),
        Value::UInt(u) => int_marker(i64::try_from(*u).ok()?),
        Value::Double(_) => FLOAT64,
        Value::Str(_) => STRING,
        Value::List(_) => ARRAY_START,
        Value::Map(_) => OBJECT_START,
    };
    Some(marker)
}

impl Writer {
    pub fn new(codec: &'static str, containers: Containers) -> Self {
        Self { buf: Vec::new(), containers, codec }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn unrepresentable(&self, what: impl Into<String>) -> EncodeError {
        EncodeError::Unrepresentable { codec: self.codec, what: what.into() }
    }

    fn marker(&mut self, marker: u8, typed: bool) {
        if !typed {
            self.buf.put_u8(marker);
        }
    }

    pub fn int(&mut self, i: i64, typed: bool) {
        let marker = int_marker(i);
        self.marker(marker, typed);
        match marker {
            INT8 => self.buf.put_i8(i as i8),
            UINT8 => self.buf.put_u8(i as u8),
            INT16 => self.buf.put_i16(i as i16),
            INT32 => self.buf.put_i32(i as i32),
            _ => self.buf.put_i64(i),
        }
    }

    pub fn uint(&mut self, u: u64, typed: bool) -> Result<(), EncodeError> {
        let i = i64::try_from(u).map_err(|_| self.unrepresentable(format!("the unsigned integer {u}")))?;
        self.int(i, typed);
        Ok(())
    }

    pub fn double(&mut self, d: f64, typed: bool) {
        self.marker(FLOAT64, typed);
        self.buf.put_f64(d);
    }

    /// Length-prefixed UTF-8, as used by strings and object keys.
    fn text(&mut self, s: &[u8], what: &str) -> Result<(), EncodeError> {
        if std::str::from_utf8(s).is_err() {
            return Err(self.unrepresentable(format!("a {what} that is not UTF-8")));
        }
        let len = i64::try_from(s.len()).map_err(|_| self.unrepresentable(format!("a {what} of length {}", s.len())))?;
        self.int(len, false);
        self.buf.put_slice(s);
        Ok(())
    }

    pub fn str(&mut self, s: &[u8], typed: bool) -> Result<(), EncodeError> {
        self.marker(STRING, typed);
        self.text(s, "string")
    }

    pub fn key(&mut self, k: &[u8]) -> Result<(), EncodeError> {
        self.text(k, "key")
    }

    /// Open a container after its start marker. Returns whether its elements
    /// are written without markers.
    fn open<'v>(&mut self, n: u32, mut children: impl Iterator<Item = &'v Value>) -> bool {
        if self.containers == Containers::Unsized {
            return false;
        }
        let shared = match children.next().and_then(marker_of) {
            Some(first) if n >= 2 && !matches!(first, NULL | TRUE | FALSE) => {
                children.all(|v| marker_of(v) == Some(first)).then_some(first)
            }
            _ => None,
        };
        if let Some(marker) = shared {
            self.buf.put_u8(TYPE);
            self.buf.put_u8(marker);
        }
        self.buf.put_u8(COUNT);
        self.int(n as i64, false);
        shared.is_some()
    }

    fn close(&mut self, end: u8) {
        if self.containers == Containers::Unsized {
            self.buf.put_u8(end);
        }
    }
}

/// Write `value` and fold it in the same pass. `typed` drops the leading
/// marker because the enclosing container declared it.
pub fn write_value(w: &mut Writer, folder: &mut Folder, value: &Value, typed: bool) -> Result<()> {
    match value {
        Value::Nil => {
            folder.nil()?;
            w.marker(NULL, typed);
        }
        Value::Bool(b) => {
            folder.bool(*b)?;
            w.marker(if *b { TRUE } else { FALSE }, typed);
        }
        Value::Int(i) => {
            folder.int(*i)?;
            w.int(*i, typed);
        }
        Value::UInt(u) => {
            w.uint(*u, typed)?;
            folder.uint(*u)?;
        }
        Value::Double(d) => {
            folder.double(*d)?;
            w.double(*d, typed);
        }
        Value::Str(s) => {
            w.str(s, typed)?;
            folder.str(s)?;
        }
        Value::List(items) => {
            let n = count_of(items.len())?;
            folder.begin_list(Some(n))?;
            w.marker(ARRAY_START, typed);
            let children_typed = w.open(n, items.iter());
            for item in items {
                write_value(w, folder, item, children_typed)?;
            }
            w.close(ARRAY_END);
            folder.end_list()?;
        }
        Value::Map(pairs) => {
            let n = count_of(pairs.len())?;
            folder.begin_map(Some(n))?;
            w.marker(OBJECT_START, typed);
            let children_typed = w.open(n, pairs.iter().map(|(_, v)| v));
            for (k, v) in pairs {
                folder.key(k)?;
                w.key(k)?;
                write_value(w, folder, v, children_typed)?;
            }
            w.close(OBJECT_END);
            folder.end_map()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fold::FoldOptions;

    fn write(containers: Containers, value: &Value) -> Result<Vec<u8>> {
        let mut w = Writer::new("test", containers);
        let mut folder = Folder::for_encode(&FoldOptions::default());
        write_value(&mut w, &mut folder, value, false)?;
        Ok(w.into_bytes())
    }

    #[test]
    fn integers_pick_the_smallest_marker() {
        let cases: [(i64, &[u8]); 6] = [
            (-1, &[b'i', 0xff]),
            (200, &[b'U', 200]),
            (-200, &[b'I', 0xff, 0x38]),
            (40_000, &[b'l', 0, 0, 0x9c, 0x40]),
            (1 << 40, &[b'L', 0, 0, 1, 0, 0, 0, 0, 0]),
            (127, &[b'i', 127]),
        ];
        for (i, expected) in cases {
            assert_eq!(write(Containers::Unsized, &Value::Int(i)).unwrap(), expected, "{i}");
        }
    }

    #[test]
    fn unsized_containers_are_closed_by_markers() {
        let value = Value::map([("a", Value::list([Value::Bool(true), Value::Nil]))]);
        let bytes = write(Containers::Unsized, &value).unwrap();
        assert_eq!(bytes, b"{i\x01a[TZ]}");
    }

    #[test]
    fn counted_containers_type_uniform_children() {
        let uniform = Value::list([Value::Int(1), Value::Int(2)]);
        assert_eq!(write(Containers::Counted, &uniform).unwrap(), b"[$i#i\x02\x01\x02");
        let mixed = Value::list([Value::Int(1), Value::Int(300)]);
        assert_eq!(write(Containers::Counted, &mixed).unwrap(), b"[#i\x02i\x01I\x01\x2c");
        // markers without payload are never shared
        let flags = Value::list([Value::Bool(true), Value::Bool(true)]);
        assert_eq!(write(Containers::Counted, &flags).unwrap(), b"[#i\x02TT");
    }

    #[test]
    fn unsigned_values_above_i64_max_are_unrepresentable() {
        let err = write(Containers::Counted, &Value::UInt(u64::MAX)).unwrap_err();
        assert!(matches!(err, Error::Encode(EncodeError::Unrepresentable { .. })), "{err}");
    }

    #[test]
    fn strings_and_keys_must_be_utf8() {
        for value in [Value::Str(vec![0xff]), Value::map([(&[0xfe][..], Value::Nil)])] {
            let err = write(Containers::Unsized, &value).unwrap_err();
            assert!(matches!(err, Error::Encode(EncodeError::Unrepresentable { .. })), "{value:?}");
        }
    }
}
