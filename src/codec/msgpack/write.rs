use bytes::BufMut;

use crate::error::{EncodeError, Result};
use crate::fold::Folder;
use crate::value::Value;

/// How wide the writer makes integers and headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widths {
    /// Smallest encoding that fits: fixints, 8/16/32-bit forms.
    Compact,
    /// Always 64-bit integers and 32-bit length headers.
    Wide,
}

pub struct Writer {
    buf: Vec<u8>,
    widths: Widths,
    codec: &'static str,
}

impl Writer {
    pub fn new(codec: &'static str, widths: Widths) -> Self {
        Self { buf: Vec::new(), widths, codec }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn nil(&mut self) {
        self.buf.put_u8(0xc0);
    }

    pub fn bool(&mut self, b: bool) {
        self.buf.put_u8(if b { 0xc3 } else { 0xc2 });
    }

    pub fn int(&mut self, i: i64) {
        if self.widths == Widths::Wide {
            self.buf.put_u8(0xd3);
            self.buf.put_i64(i);
            return;
        }
        if i >= 0 {
            self.uint(i as u64);
        } else if i >= -32 {
            self.buf.put_i8(i as i8);
        } else if i >= i8::MIN as i64 {
            self.buf.put_u8(0xd0);
            self.buf.put_i8(i as i8);
        } else if i >= i16::MIN as i64 {
            self.buf.put_u8(0xd1);
            self.buf.put_i16(i as i16);
        } else if i >= i32::MIN as i64 {
            self.buf.put_u8(0xd2);
            self.buf.put_i32(i as i32);
        } else {
            self.buf.put_u8(0xd3);
            self.buf.put_i64(i);
        }
    }

    pub fn uint(&mut self, u: u64) {
        if self.widths == Widths::Wide {
            self.buf.put_u8(0xcf);
            self.buf.put_u64(u);
            return;
        }
        if u < 0x80 {
            self.buf.put_u8(u as u8);
        } else if u <= u8::MAX as u64 {
            self.buf.put_u8(0xcc);
            self.buf.put_u8(u as u8);
        } else if u <= u16::MAX as u64 {
            self.buf.put_u8(0xcd);
            self.buf.put_u16(u as u16);
        } else if u <= u32::MAX as u64 {
            self.buf.put_u8(0xce);
            self.buf.put_u32(u as u32);
        } else {
            self.buf.put_u8(0xcf);
            self.buf.put_u64(u);
        }
    }

    pub fn double(&mut self, d: f64) {
        self.buf.put_u8(0xcb);
        self.buf.put_f64(d);
    }

    pub fn str(&mut self, s: &[u8]) -> Result<(), EncodeError> {
        let len = self.length(s.len(), "string")?;
        match self.widths {
            Widths::Compact if len < 32 => self.buf.put_u8(0xa0 | len as u8),
            Widths::Compact if len <= u8::MAX as u32 => {
                self.buf.put_u8(0xd9);
                self.buf.put_u8(len as u8);
            }
            Widths::Compact if len <= u16::MAX as u32 => {
                self.buf.put_u8(0xda);
                self.buf.put_u16(len as u16);
            }
            _ => {
                self.buf.put_u8(0xdb);
                self.buf.put_u32(len);
            }
        }
        self.buf.put_slice(s);
        Ok(())
    }

    pub fn array(&mut self, n: u32) {
        self.header(n, 0x90, 0xdc, 0xdd);
    }

    pub fn map(&mut self, n: u32) {
        self.header(n, 0x80, 0xde, 0xdf);
    }

    fn header(&mut self, n: u32, fix: u8, m16: u8, m32: u8) {
        match self.widths {
            Widths::Compact if n < 16 => self.buf.put_u8(fix | n as u8),
            Widths::Compact if n <= u16::MAX as u32 => {
                self.buf.put_u8(m16);
                self.buf.put_u16(n as u16);
            }
            _ => {
                self.buf.put_u8(m32);
                self.buf.put_u32(n);
            }
        }
    }

    fn length(&self, len: usize, what: &str) -> Result<u32, EncodeError> {
        u32::try_from(len).map_err(|_| EncodeError::Unrepresentable {
            codec: self.codec,
            what: format!("a {what} of length {len}"),
        })
    }
}

/// Write `value` and fold it in the same pass.
pub fn write_value(w: &mut Writer, folder: &mut Folder, value: &Value) -> Result<()> {
    match value {
        Value::Nil => {
            folder.nil()?;
            w.nil();
        }
        Value::Bool(b) => {
            folder.bool(*b)?;
            w.bool(*b);
        }
        Value::Int(i) => {
            folder.int(*i)?;
            w.int(*i);
        }
        Value::UInt(u) => {
            folder.uint(*u)?;
            w.uint(*u);
        }
        Value::Double(d) => {
            folder.double(*d)?;
            w.double(*d);
        }
        Value::Str(s) => {
            folder.str(s)?;
            w.str(s)?;
        }
        Value::List(items) => {
            let n = w.length(items.len(), "list")?;
            folder.begin_list(Some(n))?;
            w.array(n);
            for item in items {
                write_value(w, folder, item)?;
            }
            folder.end_list()?;
        }
        Value::Map(pairs) => {
            let n = w.length(pairs.len(), "map")?;
            folder.begin_map(Some(n))?;
            w.map(n);
            for (k, v) in pairs {
                folder.key(k)?;
                w.str(k)?;
                write_value(w, folder, v)?;
            }
            folder.end_map()?;
        }
    }
    Ok(())
}
