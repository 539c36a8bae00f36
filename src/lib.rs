//! A thread-safe, pooled read-transaction adapter over a native
//! memory-mapped B+tree store.
//!
//! An [`Env`] opens one store directory and hands out [`Dbi`] handles, named
//! sub-databases within it. Reads lease a recycled read transaction from an
//! internal pool (bounded by [`EnvOptions::use_readers`]); writes go through
//! [`Env::transact`], which batches puts and deletes into one native
//! transaction and grows the map automatically if it runs out of room.
//!
//! Key/value encoding is pluggable via the [`BytesEncode`]/[`BytesDecode`]
//! traits; [`Bytes`] and [`Str`] cover the common cases, and `SerdeJson<T>`
//! is available behind the `serde-json` feature (on by default).

mod buffer;
mod codec;
mod config;
mod cursor;
mod dbi;
mod env;
mod error;
mod mdb;
mod pool;
mod range;
mod rtx;

pub use codec::{Bytes, BytesDecode, BytesEncode, EncodeError, OwnedBytes, OwnedStr, Str};
#[cfg(feature = "serde-json")]
pub use codec::SerdeJson;
#[cfg(feature = "serde-bincode")]
pub use codec::SerdeBincode;
pub use config::EnvOptions;
pub use cursor::{KvCursor, KvIter};
pub use dbi::{Dbi, PutFlags};
pub use env::{Env, EnvStat, Op};
pub use error::{Error, Result};
pub use range::{RangeDescriptor, RangeTag};
