use bytes::BufMut;

use super::element;
use crate::error::{EncodeError, Result};
use crate::fold::{Folder, count_of};
use crate::value::Value;

pub struct Writer {
    buf: Vec<u8>,
    codec: &'static str,
}

impl Writer {
    pub fn new(codec: &'static str) -> Self {
        Self { buf: Vec::new(), codec }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn unrepresentable(&self, what: impl Into<String>) -> EncodeError {
        EncodeError::Unrepresentable { codec: self.codec, what: what.into() }
    }

    /// Reserve the length prefix; returns where it sits.
    fn open_document(&mut self) -> usize {
        let at = self.buf.len();
        self.buf.put_i32_le(0);
        at
    }

    fn close_document(&mut self, at: usize) -> Result<(), EncodeError> {
        self.buf.put_u8(0);
        let len = self.buf.len() - at;
        let len = i32::try_from(len).map_err(|_| self.unrepresentable(format!("a document of {len} bytes")))?;
        self.buf[at..at + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }

    /// Element header: type byte, then the key as a cstring.
    fn element(&mut self, kind: u8, key: &[u8]) -> Result<(), EncodeError> {
        if key.contains(&0) {
            return Err(self.unrepresentable(format!("the key {:?} containing a NUL byte", String::from_utf8_lossy(key))));
        }
        self.buf.put_u8(kind);
        self.buf.put_slice(key);
        self.buf.put_u8(0);
        Ok(())
    }

    pub fn nil(&mut self, key: &[u8]) -> Result<(), EncodeError> {
        self.element(element::NULL, key)
    }

    pub fn bool(&mut self, key: &[u8], b: bool) -> Result<(), EncodeError> {
        self.element(element::BOOL, key)?;
        self.buf.put_u8(b as u8);
        Ok(())
    }

    /// int32 when the value fits, int64 otherwise.
    pub fn int(&mut self, key: &[u8], i: i64) -> Result<(), EncodeError> {
        match i32::try_from(i) {
            Ok(small) => {
                self.element(element::INT32, key)?;
                self.buf.put_i32_le(small);
            }
            Err(_) => {
                self.element(element::INT64, key)?;
                self.buf.put_i64_le(i);
            }
        }
        Ok(())
    }

    pub fn uint(&mut self, key: &[u8], u: u64) -> Result<(), EncodeError> {
        let i = i64::try_from(u).map_err(|_| self.unrepresentable(format!("the unsigned integer {u}")))?;
        self.int(key, i)
    }

    pub fn double(&mut self, key: &[u8], d: f64) -> Result<(), EncodeError> {
        self.element(element::DOUBLE, key)?;
        self.buf.put_f64_le(d);
        Ok(())
    }

    pub fn str(&mut self, key: &[u8], s: &[u8]) -> Result<(), EncodeError> {
        let len = i32::try_from(s.len() + 1).map_err(|_| self.unrepresentable(format!("a string of length {}", s.len())))?;
        self.element(element::STRING, key)?;
        self.buf.put_i32_le(len);
        self.buf.put_slice(s);
        self.buf.put_u8(0);
        Ok(())
    }
}

/// Write a root document and fold it in the same pass.
///
/// A list root becomes an array document. Scalar roots have no BSON form, and
/// neither does a map whose first key is `"0"`, which readers take for an array.
pub fn write_root(w: &mut Writer, folder: &mut Folder, value: &Value) -> Result<()> {
    match value {
        Value::List(items) => write_array(w, folder, items),
        Value::Map(pairs) if pairs.first().is_some_and(|(k, _)| k == b"0") => {
            Err(w.unrepresentable("a root map whose first key is \"0\"").into())
        }
        Value::Map(pairs) => write_document(w, folder, pairs),
        other => Err(w.unrepresentable(format!("a {} root", other.kind())).into()),
    }
}

fn write_document(w: &mut Writer, folder: &mut Folder, pairs: &[(Vec<u8>, Value)]) -> Result<()> {
    folder.begin_map(Some(count_of(pairs.len())?))?;
    let at = w.open_document();
    for (k, v) in pairs {
        folder.key(k)?;
        write_element(w, folder, k, v)?;
    }
    w.close_document(at)?;
    folder.end_map()
}

fn write_array(w: &mut Writer, folder: &mut Folder, items: &[Value]) -> Result<()> {
    folder.begin_list(Some(count_of(items.len())?))?;
    let at = w.open_document();
    for (index, item) in items.iter().enumerate() {
        write_element(w, folder, index.to_string().as_bytes(), item)?;
    }
    w.close_document(at)?;
    folder.end_list()
}

fn write_element(w: &mut Writer, folder: &mut Folder, key: &[u8], value: &Value) -> Result<()> {
    match value {
        Value::Nil => {
            folder.nil()?;
            w.nil(key)?;
        }
        Value::Bool(b) => {
            folder.bool(*b)?;
            w.bool(key, *b)?;
        }
        Value::Int(i) => {
            folder.int(*i)?;
            w.int(key, *i)?;
        }
        Value::UInt(u) => {
            w.uint(key, *u)?;
            folder.uint(*u)?;
        }
        Value::Double(d) => {
            folder.double(*d)?;
            w.double(key, *d)?;
        }
        Value::Str(s) => {
            folder.str(s)?;
            w.str(key, s)?;
        }
        Value::List(items) => {
            w.element(element::ARRAY, key)?;
            write_array(w, folder, items)?;
        }
        Value::Map(pairs) => {
            w.element(element::DOCUMENT, key)?;
            write_document(w, folder, pairs)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fold::FoldOptions;

    fn bytes_of(f: impl FnOnce(&mut Writer) -> Result<(), EncodeError>) -> Vec<u8> {
        let mut w = Writer::new("test");
        f(&mut w).unwrap();
        w.into_bytes()
    }

    fn write(value: &Value) -> Result<Vec<u8>> {
        let mut w = Writer::new("test");
        let mut folder = Folder::for_encode(&FoldOptions::default());
        write_root(&mut w, &mut folder, value)?;
        Ok(w.into_bytes())
    }

    #[test]
    fn integers_use_int32_until_they_overflow_it() {
        assert_eq!(bytes_of(|w| w.int(b"a", 7)), [0x10, b'a', 0, 7, 0, 0, 0]);
        assert_eq!(bytes_of(|w| w.int(b"a", -1)), [0x10, b'a', 0, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(bytes_of(|w| w.int(b"a", 1 << 31)), [0x12, b'a', 0, 0, 0, 0, 0x80, 0, 0, 0, 0]);
        assert_eq!(bytes_of(|w| w.uint(b"a", 300)), [0x10, b'a', 0, 0x2c, 1, 0, 0]);
    }

    #[test]
    fn strings_count_their_terminator() {
        assert_eq!(bytes_of(|w| w.str(b"k", b"hi")), [0x02, b'k', 0, 3, 0, 0, 0, b'h', b'i', 0]);
    }

    #[test]
    fn list_roots_get_index_keys_and_a_backpatched_length() {
        let bytes = write(&Value::list([Value::Bool(true), Value::Nil])).unwrap();
        assert_eq!(bytes, [12, 0, 0, 0, 0x08, b'0', 0, 1, 0x0a, b'1', 0, 0][..]);
    }

    #[test]
    fn unsigned_values_above_i64_max_are_unrepresentable() {
        let err = write(&Value::map([("big", Value::UInt(u64::MAX))])).unwrap_err();
        assert!(matches!(err, Error::Encode(EncodeError::Unrepresentable { .. })), "{err}");
        assert!(write(&Value::map([("max", Value::UInt(i64::MAX as u64))])).is_ok());
    }

    #[test]
    fn nul_in_a_key_is_unrepresentable() {
        let err = write(&Value::map([(&b"a\0b"[..], Value::Nil)])).unwrap_err();
        assert!(matches!(err, Error::Encode(EncodeError::Unrepresentable { .. })), "{err}");
    }

    #[test]
    fn roots_that_read_back_differently_are_refused() {
        for value in [Value::Int(1), Value::str("x"), Value::map([("0", Value::Nil), ("1", Value::Nil)])] {
            let err = write(&value).unwrap_err();
            assert!(matches!(err, Error::Encode(EncodeError::Unrepresentable { .. })), "{value:?}");
        }
        assert!(write(&Value::map([("1", Value::Nil), ("0", Value::Nil)])).is_ok());
    }
}
