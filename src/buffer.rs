//! Fixed/growable byte buffers (§4.1).

use crate::codec::{BytesEncode, EncodeError};
use crate::error::{Error, Result};

/// A byte buffer with a declared logical capacity.
///
/// A fixed cell never grows: an encode that overflows it surfaces
/// [`Error::EncodingOverflow`]. A growable cell grows once, to
/// `2 * measure_size(value)`, and retries the encode before giving up.
/// Key buffers are always fixed; value buffers are always growable (§3,
/// §4.1).
pub struct BufferCell {
    buf: Vec<u8>,
    filled: usize,
    growable: bool,
}

impl BufferCell {
    pub fn fixed(capacity: usize) -> BufferCell {
        BufferCell { buf: vec![0u8; capacity], filled: 0, growable: false }
    }

    pub fn growable(capacity: usize) -> BufferCell {
        BufferCell { buf: vec![0u8; capacity], filled: 0, growable: true }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// A writable view, cleared before every encode attempt.
    fn input_view(&mut self) -> &mut [u8] {
        self.filled = 0;
        &mut self.buf
    }

    fn mark_filled(&mut self, len: usize) {
        debug_assert!(len <= self.buf.len());
        self.filled = len;
    }

    /// The filled region, valid until the next `encode`/`set` call.
    pub fn output_view(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Copy `bytes` in verbatim, growing first if this is a growable cell
    /// that's too small. Used to materialize a value fetched from the
    /// native store, which is its own "encoding" of already-encoded bytes.
    pub fn set(&mut self, bytes: &[u8]) {
        if bytes.len() > self.buf.len() {
            debug_assert!(self.growable, "fixed buffer cannot hold {} bytes", bytes.len());
            self.buf.resize((bytes.len() * 2).max(self.buf.len() + 1), 0);
        }
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.filled = bytes.len();
    }

    /// Encode `value` into this cell via `C`, growing once on overflow if
    /// growable.
    pub fn encode<T: ?Sized, C: BytesEncode<T>>(&mut self, value: &T) -> Result<()> {
        match C::bytes_encode_into(value, self.input_view()) {
            Ok(len) => {
                self.mark_filled(len);
                Ok(())
            }
            Err(EncodeError) if self.growable => {
                let needed = C::measure_size(value).saturating_mul(2).max(self.buf.len() + 1);
                self.buf.resize(needed, 0);
                match C::bytes_encode_into(value, self.input_view()) {
                    Ok(len) => {
                        self.mark_filled(len);
                        Ok(())
                    }
                    Err(EncodeError) => Err(Error::EncodingOverflow),
                }
            }
            Err(EncodeError) => Err(Error::EncodingOverflow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Bytes, Str};

    #[test]
    fn fixed_cell_rejects_overflow() {
        let mut cell = BufferCell::fixed(4);
        assert!(matches!(cell.encode::<str, Str>("too long"), Err(Error::EncodingOverflow)));
    }

    #[test]
    fn growable_cell_grows_and_retries() {
        let mut cell = BufferCell::growable(2);
        cell.encode::<[u8], Bytes>(b"0123456789").unwrap();
        assert_eq!(cell.output_view(), b"0123456789");
        assert!(cell.capacity() >= 10);
    }

    #[test]
    fn set_materializes_fetched_bytes() {
        let mut cell = BufferCell::growable(1);
        cell.set(b"hello world");
        assert_eq!(cell.output_view(), b"hello world");
    }
}
