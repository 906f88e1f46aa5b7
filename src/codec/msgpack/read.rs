use bytes::Buf;

use crate::error::{DecodeError, Result};
use crate::fold::Folder;
use crate::value::Value;

/// One decoded MessagePack header, with any scalar payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    /// str and bin families both land here.
    Str(&'a [u8]),
    Array(u32),
    Map(u32),
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

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.need(2)?;
        Ok(self.input.get_u16())
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.need(4)?;
        Ok(self.input.get_u32())
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.need(8)?;
        Ok(self.input.get_u64())
    }

    pub fn read_tag(&mut self) -> Result<Tag<'a>, DecodeError> {
        let at = self.offset();
        let marker = self.u8()?;
        let tag = match marker {
            0x00..=0x7f => Tag::UInt(marker as u64),
            0x80..=0x8f => Tag::Map((marker & 0x0f) as u32),
            0x90..=0x9f => Tag::Array((marker & 0x0f) as u32),
            0xa0..=0xbf => Tag::Str(self.take((marker & 0x1f) as usize)?),
            0xc0 => Tag::Nil,
            0xc2 => Tag::Bool(false),
            0xc3 => Tag::Bool(true),
            0xc4 | 0xd9 => {
                let n = self.u8()? as usize;
                Tag::Str(self.take(n)?)
            }
            0xc5 | 0xda => {
                let n = self.u16()? as usize;
                Tag::Str(self.take(n)?)
            }
            0xc6 | 0xdb => {
                let n = self.u32()? as usize;
                Tag::Str(self.take(n)?)
            }
            0xca => Tag::Float(f32::from_bits(self.u32()?)),
            0xcb => Tag::Double(f64::from_bits(self.u64()?)),
            0xcc => Tag::UInt(self.u8()? as u64),
            0xcd => Tag::UInt(self.u16()? as u64),
            0xce => Tag::UInt(self.u32()? as u64),
            0xcf => Tag::UInt(self.u64()?),
            0xd0 => Tag::Int(self.u8()? as i8 as i64),
            0xd1 => Tag::Int(self.u16()? as i16 as i64),
            0xd2 => Tag::Int(self.u32()? as i32 as i64),
            0xd3 => Tag::Int(self.u64()? as i64),
            0xdc => Tag::Array(self.u16()? as u32),
            0xdd => Tag::Array(self.u32()?),
            0xde => Tag::Map(self.u16()? as u32),
            0xdf => Tag::Map(self.u32()?),
            0xe0..=0xff => Tag::Int(marker as i8 as i64),
            // 0xc1 is never used; 0xc7..=0xc9 and 0xd4..=0xd8 are ext types
            _ => return Err(DecodeError::UnsupportedType { offset: at, marker }),
        };
        Ok(tag)
    }

    pub fn read_key(&mut self) -> Result<&'a [u8], DecodeError> {
        let at = self.offset();
        match self.read_tag()? {
            Tag::Str(key) => Ok(key),
            other => Err(DecodeError::Malformed {
                offset: at,
                detail: format!("map key must be a string, found {other:?}"),
            }),
        }
    }

    /// Every element takes at least one byte, so a header claiming more
    /// elements than bytes left is already truncated.
    fn check_claim(&self, n: u32, per_entry: usize) -> Result<(), DecodeError> {
        let needed = (n as usize).saturating_mul(per_entry);
        self.need(needed)
    }
}

/// Fold one element straight off the wire.
pub fn fold_element(r: &mut Reader<'_>, folder: &mut Folder) -> Result<()> {
    match r.read_tag()? {
        Tag::Nil => folder.nil(),
        Tag::Bool(b) => folder.bool(b),
        Tag::Int(i) => folder.int(i),
        Tag::UInt(u) => folder.uint(u),
        Tag::Float(f) => folder.float(f),
        Tag::Double(d) => folder.double(d),
        Tag::Str(s) => folder.str(s),
        Tag::Array(n) => {
            folder.begin_list(Some(n))?;
            r.check_claim(n, 1)?;
            for _ in 0..n {
                fold_element(r, folder)?;
            }
            folder.end_list()
        }
        Tag::Map(n) => {
            folder.begin_map(Some(n))?;
            r.check_claim(n, 2)?;
            for _ in 0..n {
                folder.key(r.read_key()?)?;
                fold_element(r, folder)?;
            }
            folder.end_map()
        }
    }
}

/// Build a tree from one element. `depth` counts containers already open.
pub fn read_element(r: &mut Reader<'_>, depth: usize, max_depth: usize) -> Result<Value> {
    let value = match r.read_tag()? {
        Tag::Nil => Value::Nil,
        Tag::Bool(b) => Value::Bool(b),
        Tag::Int(i) => Value::Int(i),
        Tag::UInt(u) => Value::UInt(u),
        Tag::Float(f) => Value::Double(f as f64),
        Tag::Double(d) => Value::Double(d),
        Tag::Str(s) => Value::Str(s.to_vec()),
        Tag::Array(n) => {
            if depth >= max_depth {
                return Err(DecodeError::DepthExceeded { limit: max_depth }.into());
            }
            r.check_claim(n, 1)?;
            let mut items = Vec::with_capacity(n as usize);
            for _ in 0..n {
                items.push(read_element(r, depth + 1, max_depth)?);
            }
            Value::List(items)
        }
        Tag::Map(n) => {
            if depth >= max_depth {
                return Err(DecodeError::DepthExceeded { limit: max_depth }.into());
            }
            r.check_claim(n, 2)?;
            let mut pairs = Vec::with_capacity(n as usize);
            for _ in 0..n {
                let key = r.read_key()?.to_vec();
                pairs.push((key, read_element(r, depth + 1, max_depth)?));
            }
            Value::Map(pairs)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_integer_width_decodes_to_the_same_number() {
        let forms: [&[u8]; 5] = [
            &[0xcc, 200],
            &[0xcd, 0, 200],
            &[0xce, 0, 0, 0, 200],
            &[0xd1, 0, 200],
            &[0xd3, 0, 0, 0, 0, 0, 0, 0, 200],
        ];
        for bytes in forms {
            let tag = Reader::new(bytes).read_tag().unwrap();
            let n = match tag {
                Tag::UInt(u) => u as i64,
                Tag::Int(i) => i,
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(n, 200, "{bytes:?}");
        }
    }

    #[test]
    fn negative_fixint_and_int8() {
        assert_eq!(Reader::new(&[0xe0]).read_tag().unwrap(), Tag::Int(-32));
        assert_eq!(Reader::new(&[0xd0, 0x80]).read_tag().unwrap(), Tag::Int(-128));
    }

    #[test]
    fn truncation_reports_offset_and_shortfall() {
        let err = Reader::new(&[0xa5, b'a', b'b']).read_tag().unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { offset: 1, needed: 3 }));
    }

    #[test]
    fn ext_and_reserved_markers_are_unsupported() {
        for marker in [0xc1u8, 0xc7, 0xd4, 0xd8] {
            let err = Reader::new(&[marker, 0, 0, 0]).read_tag().unwrap_err();
            assert!(matches!(err, DecodeError::UnsupportedType { offset: 0, marker: m } if m == marker));
        }
    }

    #[test]
    fn keys_must_be_strings() {
        let err = Reader::new(&[0x01]).read_key().unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { offset: 0, .. }));
    }

    #[test]
    fn huge_claims_fail_before_allocating() {
        let mut r = Reader::new(&[0xdd, 0xff, 0xff, 0xff, 0xff, 0xc0]);
        let err = read_element(&mut r, 0, 10).unwrap_err();
        assert!(err.is_decode());
    }
}
