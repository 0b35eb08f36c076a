//! Deterministic binary encoding for state records and sign documents.
//!
//! - Fixed-size fields (u64, u32, bool, 20/32-byte arrays) are written directly
//! - Variable-length fields (bytes, strings) are length-prefixed (u32 LE)
//! - Optional fields carry a 1-byte flag (0 = None, 1 = Some)
//!
//! All integers are little-endian.

use crate::error::{ExecError, ExecResult};

/// A cursor for reading bytes during decoding.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, n: usize) -> ExecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ExecError::Internal("unexpected end of data".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> ExecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> ExecResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> ExecResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> ExecResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_bool(&mut self) -> ExecResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ExecError::Internal("invalid bool value".into())),
        }
    }

    pub fn read_address(&mut self) -> ExecResult<[u8; 20]> {
        self.read_array()
    }

    pub fn read_hash(&mut self) -> ExecResult<[u8; 32]> {
        self.read_array()
    }

    pub fn read_optional_hash(&mut self) -> ExecResult<Option<[u8; 32]>> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_hash()?)),
            _ => Err(ExecError::Internal("invalid optional flag".into())),
        }
    }

    pub fn read_var_bytes(&mut self) -> ExecResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> ExecResult<String> {
        String::from_utf8(self.read_var_bytes()?)
            .map_err(|_| ExecError::Internal("invalid UTF-8".into()))
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(self) -> ExecResult<()> {
        if self.remaining() != 0 {
            return Err(ExecError::Internal(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Append-only byte writer mirroring [`Reader`].
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    pub fn fixed(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn optional_hash(&mut self, h: Option<&[u8; 32]>) -> &mut Self {
        match h {
            None => self.u8(0),
            Some(hash) => self.u8(1).fixed(hash),
        }
    }

    pub fn var_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.u32(data.len() as u32).fixed(data)
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.var_bytes(s.as_bytes())
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
