use std::path::PathBuf;

use thiserror::Error;

use crate::mdb::error::MdbError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong using an [`crate::env::Env`].
///
/// Every read-path failure resets its leased RTX before this is returned to
/// the caller; every write-path failure aborts the write transaction
/// implicitly (on scope exit) before this is returned.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted on a closed environment.
    #[error("environment is closed")]
    NotOpen,

    /// `get_dbi` (or an operation implying it) referenced an unregistered
    /// database name.
    #[error("unknown database {0:?}")]
    UnknownDbi(String),

    /// A key/value encoding did not fit its destination buffer. Value
    /// buffers auto-grow and retry once before this is ever raised for a
    /// value; it is always raised for a key, which never grows.
    #[error("buffer overflow encoding into a fixed-size buffer")]
    EncodingOverflow,

    /// A native lookup missed. Surfaced as an empty result for point reads
    /// and as iterator termination for scans; only escapes to this variant
    /// when neither of those contexts can absorb it.
    #[error("key not found")]
    NotFound,

    /// The write path hit LMDB's `MDB_MAP_FULL`. The caller (internally,
    /// `Env::transact`) grows the map 10x and retries the whole batch once
    /// this is observed; it only escapes if that retry also fails.
    #[error("map is full")]
    MapFull,

    /// LMDB's reader lock table is exhausted for this directory. This means
    /// more than one `Env` handle is open against the same directory in
    /// this process; open exactly one `Env` per directory per process.
    #[error(
        "reader lock table exhausted for {0:?}: open a single Env per process for this directory"
    )]
    BadReaderLock(PathBuf),

    /// The environment directory could not be created or is not usable.
    #[error("invalid environment directory {path:?}")]
    InvalidDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other non-zero return code from the native engine, wrapped with
    /// the operation that produced it.
    #[error("{context}")]
    Native {
        context: &'static str,
        #[source]
        source: MdbError,
    },
}

impl Error {
    pub(crate) fn native(context: &'static str, source: MdbError) -> Error {
        Error::Native { context, source }
    }

    /// Classify a raw native failure into the named variant the caller
    /// cares about, falling back to the opaque [`Error::Native`] wrapper.
    pub(crate) fn from_mdb(context: &'static str, source: MdbError) -> Error {
        if source.map_full() {
            Error::MapFull
        } else if source.not_found() {
            Error::NotFound
        } else {
            Error::native(context, source)
        }
    }
}
