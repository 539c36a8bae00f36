//! The serialization seam this adapter depends on but does not own.
//!
//! `spec.md` §1 places the real serialization layer (the one that encodes
//! typed Datalog values) out of scope. This module gives that seam a
//! minimal concrete shape — `BytesEncode`/`BytesDecode` plus `Bytes`, `Str`
//! and (behind the `serde-json` feature) `SerdeJson<T>` — so the crate
//! compiles and tests standalone. Callers of a real Datalog engine are
//! expected to supply their own codecs against the same two traits.

use std::marker::PhantomData;

/// Raised when an encoder's destination buffer cannot hold the encoding.
/// [`crate::buffer::BufferCell`] is the only thing that should ever see
/// this; it is translated into [`crate::error::Error::EncodingOverflow`]
/// after the grow-and-retry cycle (value buffers only) is exhausted.
#[derive(Debug)]
pub struct EncodeError;

/// Encodes `T` into a caller-supplied byte slice.
pub trait BytesEncode<T: ?Sized> {
    /// Writes `item`'s encoding into `dst`, returning the number of bytes
    /// written. Must fail with [`EncodeError`], not panic, if `item` does
    /// not fit.
    fn bytes_encode_into(item: &T, dst: &mut [u8]) -> Result<usize, EncodeError>;

    /// An upper bound on the encoded size of `item`. Used to size a grown
    /// value buffer (`2 * measure_size(item)`, per §4.1).
    fn measure_size(item: &T) -> usize;
}

/// Decodes `T` from a byte slice borrowed from the RTX that produced it.
pub trait BytesDecode<'a, T> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn bytes_decode(bytes: &'a [u8]) -> Result<T, Self::Error>;
}

/// Raw-bytes codec: copies in, borrows out. This is the `:data` default
/// type named in §4.7.
pub struct Bytes;

impl BytesEncode<[u8]> for Bytes {
    fn bytes_encode_into(item: &[u8], dst: &mut [u8]) -> Result<usize, EncodeError> {
        if item.len() > dst.len() {
            return Err(EncodeError);
        }
        dst[..item.len()].copy_from_slice(item);
        Ok(item.len())
    }

    fn measure_size(item: &[u8]) -> usize {
        item.len()
    }
}

impl<'a> BytesDecode<'a, &'a [u8]> for Bytes {
    type Error = std::convert::Infallible;

    fn bytes_decode(bytes: &'a [u8]) -> Result<&'a [u8], Self::Error> {
        Ok(bytes)
    }
}

/// UTF-8 string codec.
pub struct Str;

impl BytesEncode<str> for Str {
    fn bytes_encode_into(item: &str, dst: &mut [u8]) -> Result<usize, EncodeError> {
        Bytes::bytes_encode_into(item.as_bytes(), dst)
    }

    fn measure_size(item: &str) -> usize {
        item.len()
    }
}

impl<'a> BytesDecode<'a, &'a str> for Str {
    type Error = std::str::Utf8Error;

    fn bytes_decode(bytes: &'a [u8]) -> Result<&'a str, Self::Error> {
        std::str::from_utf8(bytes)
    }
}

/// Raw-bytes codec that copies out instead of borrowing. Needed wherever a
/// decoded value must outlive the read transaction that produced it — the
/// `Env`-level point-lookup and range helpers, which release their leased
/// RTX back to the pool before returning.
pub struct OwnedBytes;

impl BytesEncode<[u8]> for OwnedBytes {
    fn bytes_encode_into(item: &[u8], dst: &mut [u8]) -> Result<usize, EncodeError> {
        Bytes::bytes_encode_into(item, dst)
    }

    fn measure_size(item: &[u8]) -> usize {
        Bytes::measure_size(item)
    }
}

impl<'a> BytesDecode<'a, Vec<u8>> for OwnedBytes {
    type Error = std::convert::Infallible;

    fn bytes_decode(bytes: &'a [u8]) -> Result<Vec<u8>, Self::Error> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 string codec that copies out, the owned counterpart to [`Str`].
pub struct OwnedStr;

impl BytesEncode<str> for OwnedStr {
    fn bytes_encode_into(item: &str, dst: &mut [u8]) -> Result<usize, EncodeError> {
        Str::bytes_encode_into(item, dst)
    }

    fn measure_size(item: &str) -> usize {
        Str::measure_size(item)
    }
}

impl<'a> BytesDecode<'a, String> for OwnedStr {
    type Error = std::str::Utf8Error;

    fn bytes_decode(bytes: &'a [u8]) -> Result<String, Self::Error> {
        std::str::from_utf8(bytes).map(str::to_owned)
    }
}

/// JSON codec for any `Serialize + Deserialize` value, gated behind the
/// `serde-json` feature (on by default).
#[cfg(feature = "serde-json")]
pub struct SerdeJson<T>(PhantomData<T>);

#[cfg(feature = "serde-json")]
impl<T: serde::Serialize> BytesEncode<T> for SerdeJson<T> {
    fn bytes_encode_into(item: &T, dst: &mut [u8]) -> Result<usize, EncodeError> {
        let bytes = serde_json::to_vec(item).map_err(|_| EncodeError)?;
        if bytes.len() > dst.len() {
            return Err(EncodeError);
        }
        dst[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn measure_size(item: &T) -> usize {
        serde_json::to_vec(item).map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(feature = "serde-json")]
impl<'a, T: serde::Deserialize<'a>> BytesDecode<'a, T> for SerdeJson<T> {
    type Error = serde_json::Error;

    fn bytes_decode(bytes: &'a [u8]) -> Result<T, Self::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Bincode codec for any `Serialize + Deserialize` value, gated behind the
/// `serde-bincode` feature.
#[cfg(feature = "serde-bincode")]
pub struct SerdeBincode<T>(PhantomData<T>);

#[cfg(feature = "serde-bincode")]
impl<T: serde::Serialize> BytesEncode<T> for SerdeBincode<T> {
    fn bytes_encode_into(item: &T, dst: &mut [u8]) -> Result<usize, EncodeError> {
        let bytes = bincode::serialize(item).map_err(|_| EncodeError)?;
        if bytes.len() > dst.len() {
            return Err(EncodeError);
        }
        dst[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn measure_size(item: &T) -> usize {
        bincode::serialized_size(item).map(|n| n as usize).unwrap_or(0)
    }
}

#[cfg(feature = "serde-bincode")]
impl<'a, T: serde::Deserialize<'a>> BytesDecode<'a, T> for SerdeBincode<T> {
    type Error = bincode::Error;

    fn bytes_decode(bytes: &'a [u8]) -> Result<T, Self::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        let mut dst = [0u8; 8];
        let n = Bytes::bytes_encode_into(b"abcd", &mut dst).unwrap();
        assert_eq!(&dst[..n], b"abcd");
        assert_eq!(Bytes::bytes_decode(&dst[..n]).unwrap(), b"abcd");
    }

    #[test]
    fn bytes_overflow() {
        let mut dst = [0u8; 2];
        assert!(Bytes::bytes_encode_into(b"abcd", &mut dst).is_err());
    }

    #[test]
    fn str_roundtrip() {
        let mut dst = [0u8; 16];
        let n = Str::bytes_encode_into("hello", &mut dst).unwrap();
        assert_eq!(Str::bytes_decode(&dst[..n]).unwrap(), "hello");
    }

    #[test]
    fn owned_variants_copy_out() {
        let mut dst = [0u8; 8];
        let n = OwnedStr::bytes_encode_into("hi", &mut dst).unwrap();
        let decoded: String = OwnedStr::bytes_decode(&dst[..n]).unwrap();
        assert_eq!(decoded, "hi");

        let n = OwnedBytes::bytes_encode_into(b"hi", &mut dst).unwrap();
        let decoded: Vec<u8> = OwnedBytes::bytes_decode(&dst[..n]).unwrap();
        assert_eq!(decoded, b"hi");
    }
}
