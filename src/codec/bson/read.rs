use bytes::Buf;

use super::element;
use crate::error::{DecodeError, Result};
use crate::fold::Folder;
use crate::value::Value;

/// One element header inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub offset: usize,
    pub kind: u8,
    pub key: &'a [u8],
}

/// An element's payload. Embedded documents are left for the caller to open.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(&'a [u8]),
    Document,
    Array,
}

pub struct Reader<'a> {
    input: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, len: input.len() }
    }

    pub fn offset(&self) -> usize {
        self.len - self.input.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.input.remaining()
    }

    fn need(&self, n: usize) -> Result<(), DecodeError> {
        let have = self.input.remaining();
        if have < n {
            return Err(DecodeError::Truncated { offset: self.offset(), needed: n - have });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.need(n)?;
        let (head, tail) = self.input.split_at(n);
        self.input = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        self.need(1)?;
        Ok(self.input.get_u8())
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        self.need(4)?;
        Ok(self.input.get_i32_le())
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        self.need(8)?;
        Ok(self.input.get_i64_le())
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        self.need(8)?;
        Ok(self.input.get_f64_le())
    }

    fn malformed(&self, offset: usize, detail: impl Into<String>) -> DecodeError {
        DecodeError::Malformed { offset, detail: detail.into() }
    }

    /// Read a length prefix; returns the offset one past the document's terminator.
    pub fn open_document(&mut self) -> Result<usize, DecodeError> {
        let at = self.offset();
        let len = self.i32()?;
        if len < 5 {
            return Err(self.malformed(at, format!("document length {len} is below the minimum of 5")));
        }
        self.need(len as usize - 4)?;
        Ok(at + len as usize)
    }

    /// The next element of a document ending at `end`, or `None` at its terminator.
    pub fn next_element(&mut self, end: usize) -> Result<Option<Header<'a>>, DecodeError> {
        let offset = self.offset();
        if offset >= end {
            return Err(self.malformed(offset, "element overruns its document"));
        }
        let kind = self.u8()?;
        if kind == 0 {
            if offset + 1 != end {
                return Err(self.malformed(offset, "document terminator before its declared end"));
            }
            return Ok(None);
        }
        let room = (end - offset - 1).min(self.input.remaining());
        let Some(nul) = self.input[..room].iter().position(|&b| b == 0) else {
            return Err(self.malformed(offset + 1, "unterminated element key"));
        };
        let key = self.take(nul)?;
        self.input.advance(1);
        Ok(Some(Header { offset, kind, key }))
    }

    pub fn read_payload(&mut self, header: &Header<'_>) -> Result<Payload<'a>, DecodeError> {
        let payload = match header.kind {
            element::DOUBLE => Payload::Double(self.f64()?),
            element::STRING => {
                let at = self.offset();
                let len = self.i32()?;
                if len < 1 {
                    return Err(self.malformed(at, format!("string length {len} is below the minimum of 1")));
                }
                let bytes = self.take(len as usize)?;
                match bytes.split_last() {
                    Some((&0, text)) => Payload::Str(text),
                    _ => return Err(self.malformed(at, "string is not NUL-terminated")),
                }
            }
            element::DOCUMENT => Payload::Document,
            element::ARRAY => Payload::Array,
            element::BOOL => {
                let at = self.offset();
                match self.u8()? {
                    0 => Payload::Bool(false),
                    1 => Payload::Bool(true),
                    b => return Err(self.malformed(at, format!("boolean byte 0x{b:02x}"))),
                }
            }
            element::NULL => Payload::Nil,
            element::INT32 => Payload::Int(self.i32()? as i64),
            element::INT64 => Payload::Int(self.i64()?),
            marker => return Err(DecodeError::UnsupportedType { offset: header.offset, marker }),
        };
        Ok(payload)
    }

    /// Array elements must be keyed by their index in decimal.
    fn check_index(&self, header: &Header<'_>, index: usize) -> Result<(), DecodeError> {
        if header.key != index.to_string().as_bytes() {
            return Err(self.malformed(
                header.offset,
                format!("array key {:?} where {index} was expected", String::from_utf8_lossy(header.key)),
            ));
        }
        Ok(())
    }
}

/// A root document whose first key is `"0"` is read as an array.
pub fn root_is_array(bytes: &[u8]) -> bool {
    bytes.get(4).is_some_and(|&kind| kind != 0) && bytes.get(5..7) == Some(&b"0\0"[..])
}

/// Fold one document straight off the wire. Counts are not declared up front,
/// so the fold counts what it reads.
pub fn fold_document(r: &mut Reader<'_>, folder: &mut Folder, is_array: bool) -> Result<()> {
    if is_array {
        folder.begin_list(None)?;
    } else {
        folder.begin_map(None)?;
    }
    let end = r.open_document()?;
    let mut index = 0;
    while let Some(header) = r.next_element(end)? {
        if is_array {
            r.check_index(&header, index)?;
        } else {
            folder.key(header.key)?;
        }
        match r.read_payload(&header)? {
            Payload::Nil => folder.nil()?,
            Payload::Bool(b) => folder.bool(b)?,
            Payload::Int(i) => folder.int(i)?,
            Payload::Double(d) => folder.double(d)?,
            Payload::Str(s) => folder.str(s)?,
            Payload::Document => fold_document(r, folder, false)?,
            Payload::Array => fold_document(r, folder, true)?,
        }
        index += 1;
    }
    if is_array { folder.end_list() } else { folder.end_map() }
}

/// Build a tree from one document. `depth` counts containers already open.
pub fn read_document(r: &mut Reader<'_>, is_array: bool, depth: usize, max_depth: usize) -> Result<Value> {
    if depth >= max_depth {
        return Err(DecodeError::DepthExceeded { limit: max_depth }.into());
    }
    let end = r.open_document()?;
    let mut pairs = Vec::new();
    while let Some(header) = r.next_element(end)? {
        if is_array {
            r.check_index(&header, pairs.len())?;
        }
        let value = match r.read_payload(&header)? {
            Payload::Nil => Value::Nil,
            Payload::Bool(b) => Value::Bool(b),
            Payload::Int(i) => Value::Int(i),
            Payload::Double(d) => Value::Double(d),
            Payload::Str(s) => Value::Str(s.to_vec()),
            Payload::Document => read_document(r, false, depth + 1, max_depth)?,
            Payload::Array => read_document(r, true, depth + 1, max_depth)?,
        };
        pairs.push((header.key.to_vec(), value));
    }
    if is_array {
        Ok(Value::List(pairs.into_iter().map(|(_, v)| v).collect()))
    } else {
        Ok(Value::Map(pairs))
    }
}
