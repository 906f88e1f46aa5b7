use bytes::Buf;

use super::marker::*;
use crate::error::{DecodeError, Result};
use crate::fold::Folder;

/// A container's optional `$` type and `#` count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub shared: Option<u8>,
    pub count: Option<u32>,
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

    fn malformed(&self, offset: usize, detail: impl Into<String>) -> DecodeError {
        DecodeError::Malformed { offset, detail: detail.into() }
    }

    /// The next marker, skipping no-ops.
    pub fn marker(&mut self) -> Result<u8, DecodeError> {
        loop {
            match self.u8()? {
                NOOP => continue,
                marker => return Ok(marker),
            }
        }
    }

    /// The next marker without consuming it, skipping no-ops.
    fn peek_marker(&mut self) -> Result<u8, DecodeError> {
        loop {
            self.need(1)?;
            match self.input[0] {
                NOOP => self.input.advance(1),
                marker => return Ok(marker),
            }
        }
    }

    /// Integer payload for one of the five integer markers.
    pub fn int(&mut self, marker: u8) -> Result<i64, DecodeError> {
        let at = self.offset();
        let i = match marker {
            INT8 => self.take(1)?.get_i8() as i64,
            UINT8 => self.take(1)?.get_u8() as i64,
            INT16 => self.take(2)?.get_i16() as i64,
            INT32 => self.take(4)?.get_i32() as i64,
            INT64 => self.take(8)?.get_i64(),
            other => return Err(self.malformed(at, format!("expected an integer marker, found 0x{other:02x}"))),
        };
        Ok(i)
    }

    /// A marker-prefixed, non-negative integer.
    fn length(&mut self) -> Result<usize, DecodeError> {
        let at = self.offset();
        let marker = self.marker()?;
        let n = self.int(marker)?;
        usize::try_from(n).map_err(|_| self.malformed(at, format!("negative length {n}")))
    }

    fn text(&mut self) -> Result<&'a [u8], DecodeError> {
        let at = self.offset();
        let n = self.length()?;
        let bytes = self.take(n)?;
        std::str::from_utf8(bytes).map_err(|e| self.malformed(at, format!("text is not UTF-8: {e}")))?;
        Ok(bytes)
    }

    pub fn key(&mut self) -> Result<&'a [u8], DecodeError> {
        self.text()
    }

    /// Read the `$` type and `#` count that may follow a container's start marker.
    pub fn container_header(&mut self) -> Result<ContainerHeader, DecodeError> {
        let mut shared = None;
        if self.peek_marker()? == TYPE {
            self.input.advance(1);
            let at = self.offset();
            let marker = self.u8()?;
            if matches!(marker, NULL | TRUE | FALSE | NOOP | HIGH_PRECISION | ARRAY_END | OBJECT_END | TYPE | COUNT) {
                return Err(DecodeError::UnsupportedType { offset: at, marker });
            }
            shared = Some(marker);
            if self.peek_marker()? != COUNT {
                return Err(self.malformed(self.offset(), "typed container without a count"));
            }
        }
        let mut count = None;
        if self.peek_marker()? == COUNT {
            self.input.advance(1);
            let at = self.offset();
            let n = self.length()?;
            count = Some(u32::try_from(n).map_err(|_| self.malformed(at, format!("container count {n} is too large")))?);
        }
        Ok(ContainerHeader { shared, count })
    }

    /// Every element takes at least `per_entry` bytes, so a count claiming more
    /// than the bytes left is already truncated.
    fn check_claim(&self, n: u32, per_entry: usize) -> Result<(), DecodeError> {
        self.need((n as usize).saturating_mul(per_entry))
    }
}

/// Fold one element straight off the wire.
pub fn fold_element(r: &mut Reader<'_>, folder: &mut Folder) -> Result<()> {
    let at = r.offset();
    let marker = r.marker()?;
    fold_marked(r, folder, marker, at)
}

/// Fold the payload of an element whose marker has been read or declared.
fn fold_marked(r: &mut Reader<'_>, folder: &mut Folder, marker: u8, at: usize) -> Result<()> {
    match marker {
        NULL => folder.nil(),
        TRUE => folder.bool(true),
        FALSE => folder.bool(false),
        INT8 | UINT8 | INT16 | INT32 | INT64 => folder.int(r.int(marker)?),
        FLOAT32 => folder.float(f32::from_bits(r.take(4)?.get_u32())),
        FLOAT64 => folder.double(f64::from_bits(r.take(8)?.get_u64())),
        CHAR => folder.str(r.take(1)?),
        STRING => folder.str(r.text()?),
        ARRAY_START => fold_container(r, folder, false),
        OBJECT_START => fold_container(r, folder, true),
        _ => Err(DecodeError::UnsupportedType { offset: at, marker }.into()),
    }
}

fn fold_container(r: &mut Reader<'_>, folder: &mut Folder, object: bool) -> Result<()> {
    let header = r.container_header()?;
    if object {
        folder.begin_map(header.count)?;
    } else {
        folder.begin_list(header.count)?;
    }
    let end = if object { OBJECT_END } else { ARRAY_END };
    match header.count {
        Some(n) => {
            r.check_claim(n, if object { 2 } else { 1 })?;
            for _ in 0..n {
                if object {
                    folder.key(r.key()?)?;
                }
                match header.shared {
                    Some(marker) => {
                        let at = r.offset();
                        fold_marked(r, folder, marker, at)?;
                    }
                    None => fold_element(r, folder)?,
                }
            }
        }
        None => {
            while r.peek_marker()? != end {
                if object {
                    folder.key(r.key()?)?;
                }
                fold_element(r, folder)?;
            }
            r.input.advance(1);
        }
    }
    if object { folder.end_map() } else { folder.end_list() }
}
