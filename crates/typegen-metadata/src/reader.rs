//! Byte cursor over a metadata payload.
//!
//! Every read either advances the cursor or fails with a [`DecodeError`]
//! positioned at the offset where the item started, so a truncated or
//! corrupt payload always points at the exact byte to look at.

use typegen_core::{DecodeError, DecodeErrorKind};

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(self.pos, kind)
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(self.error(DecodeErrorKind::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            }));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    /// SCALE compact integer, widened to `u128`.
    pub(crate) fn read_compact(&mut self) -> Result<u128, DecodeError> {
        let start = self.pos;
        let first = self.read_u8()?;
        let value = match first & 0b11 {
            0b00 => u128::from(first >> 2),
            0b01 => {
                let second = self.read_u8()?;
                u128::from(u16::from_le_bytes([first, second]) >> 2)
            }
            0b10 => {
                let rest = self.take(3)?;
                u128::from(u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2)
            }
            _ => {
                let len = usize::from(first >> 2) + 4;
                if len > 16 {
                    return Err(DecodeError::new(
                        start,
                        DecodeErrorKind::IntegerOverflow { target: "u128" },
                    ));
                }
                let raw = self.take(len)?;
                let mut buf = [0u8; 16];
                buf[..len].copy_from_slice(raw);
                u128::from_le_bytes(buf)
            }
        };
        Ok(value)
    }

    pub(crate) fn read_compact_u32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let value = self.read_compact()?;
        u32::try_from(value)
            .map_err(|_| DecodeError::new(start, DecodeErrorKind::IntegerOverflow { target: "u32" }))
    }

    pub(crate) fn read_len(&mut self) -> Result<usize, DecodeError> {
        let start = self.pos;
        let value = self.read_compact()?;
        usize::try_from(value).map_err(|_| {
            DecodeError::new(start, DecodeErrorKind::IntegerOverflow { target: "usize" })
        })
    }

    pub(crate) fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    pub(crate) fn read_str(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let len = self.read_len()?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| DecodeError::new(start, DecodeErrorKind::InvalidUtf8))
    }

    pub(crate) fn read_option<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        let start = self.pos;
        match self.read_u8()? {
            0 => Ok(None),
            1 => item(self).map(Some),
            tag => Err(DecodeError::new(
                start,
                DecodeErrorKind::UnknownTag {
                    context: "option",
                    tag,
                },
            )),
        }
    }

    pub(crate) fn read_vec<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let len = self.read_len()?;
        // Every item occupies at least one byte.
        let mut out = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            out.push(item(self)?);
        }
        Ok(out)
    }
}
