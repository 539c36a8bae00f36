//! The DBI handle (§3, §4.5): a named sub-database plus the scratch cells
//! its encode helpers reuse.

use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use crate::buffer::BufferCell;
use crate::codec::BytesEncode;
use crate::cursor::KvCursor;
use crate::error::{Error, Result};
use crate::mdb::error::mdb_result;
use crate::mdb::ffi;
use crate::range::RangeDescriptor;
use crate::rtx::Rtx;

/// Flags accepted by [`Dbi::put`], mirroring LMDB's `MDB_NOOVERWRITE` and
/// `MDB_APPEND` (the only two a batched write pipeline has any use for).
#[derive(Debug, Clone, Copy, Default)]
pub struct PutFlags {
    pub no_overwrite: bool,
    pub append: bool,
}

impl PutFlags {
    pub(crate) fn bits(self) -> u32 {
        let mut bits = 0;
        if self.no_overwrite {
            bits |= ffi::MDB_NOOVERWRITE;
        }
        if self.append {
            bits |= ffi::MDB_APPEND;
        }
        bits
    }
}

/// The encode-time scratch cells a DBI owns (§3, §4.1): reused across every
/// `encode_key`/`encode_val` call, copied out before each call returns.
struct Scratch {
    key: BufferCell,
    val: BufferCell,
}

struct DbiShared {
    id: ffi::MDB_dbi,
    name: String,
    scratch: Mutex<Scratch>,
}

/// A named sub-database. Cheap to clone (an `Arc` around the shared state);
/// every clone refers to the same native DBI and the same scratch buffers.
#[derive(Clone)]
pub struct Dbi {
    inner: Arc<DbiShared>,
}

impl Dbi {
    pub(crate) fn new(id: ffi::MDB_dbi, name: String, key_cap: usize, val_cap: usize) -> Dbi {
        Dbi {
            inner: Arc::new(DbiShared {
                id,
                name,
                scratch: Mutex::new(Scratch {
                    key: BufferCell::fixed(key_cap),
                    val: BufferCell::growable(val_cap),
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn id(&self) -> ffi::MDB_dbi {
        self.inner.id
    }

    /// Encode a key through this DBI's (fixed) key scratch cell, returning
    /// an owned copy. Overflow is a user error (§4.1) — keys never auto-grow.
    /// Owned so a caller can stage several keys (e.g. for one batched
    /// [`crate::env::Op`] list) without one encode's result being clobbered
    /// by the next — the cell itself is just reused scratch space.
    pub fn encode_key<T: ?Sized, C: BytesEncode<T>>(&self, key: &T) -> Result<Vec<u8>> {
        let mut scratch = self.inner.scratch.lock().unwrap();
        scratch.key.encode::<T, C>(key)?;
        Ok(scratch.key.output_view().to_vec())
    }

    /// Encode a value through this DBI's (growable) value scratch cell,
    /// returning an owned copy.
    pub fn encode_val<T: ?Sized, C: BytesEncode<T>>(&self, value: &T) -> Result<Vec<u8>> {
        let mut scratch = self.inner.scratch.lock().unwrap();
        scratch.val.encode::<T, C>(value)?;
        Ok(scratch.val.output_view().to_vec())
    }

    /// Put `key`/`val` under `txn`.
    pub(crate) fn put(&self, txn: NonNull<ffi::MDB_txn>, key: &[u8], val: &[u8], flags: PutFlags) -> Result<()> {
        let mut k = unsafe { ffi::into_val(key) };
        let mut v = unsafe { ffi::into_val(val) };
        let rc = unsafe { ffi::mdb_put(txn.as_ptr(), self.inner.id, &mut k, &mut v, flags.bits()) };
        mdb_result(rc).map_err(|e| Error::from_mdb("mdb_put", e))
    }

    /// Delete `key` under `txn`. Deleting an absent key is treated as a
    /// no-op: the postcondition §8 cares about (`get_value` afterward
    /// reports `NotFound`) already holds.
    pub(crate) fn del(&self, txn: NonNull<ffi::MDB_txn>, key: &[u8]) -> Result<()> {
        let mut k = unsafe { ffi::into_val(key) };
        let rc = unsafe { ffi::mdb_del(txn.as_ptr(), self.inner.id, &mut k, std::ptr::null_mut()) };
        match mdb_result(rc) {
            Ok(()) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(Error::native("mdb_del", e)),
        }
    }

    /// Look up the key currently encoded in `rtx.key`, copying any hit into
    /// `rtx.val` (§4.5's "materialise the value buffer").
    pub(crate) fn get_kv(&self, rtx: &mut Rtx) -> Result<bool> {
        let mut key_val = unsafe { ffi::into_val(rtx.key.output_view()) };
        let mut val = std::mem::MaybeUninit::uninit();
        let rc =
            unsafe { ffi::mdb_get(rtx.txn_ptr().as_ptr(), self.inner.id, &mut key_val, val.as_mut_ptr()) };
        match mdb_result(rc) {
            Ok(()) => {
                let bytes = unsafe { ffi::from_val::<'_>(val.assume_init()) };
                rtx.val.set(bytes);
                Ok(true)
            }
            Err(e) if e.not_found() => Ok(false),
            Err(e) => Err(Error::native("mdb_get", e)),
        }
    }

    /// Open a cursor over this DBI bound to `rtx`'s snapshot, restricted to
    /// `descriptor`. `start`/`stop` are staged into `rtx`'s own range
    /// scratch cells rather than copied into a fresh allocation.
    pub(crate) fn iterate_kv<'rtx>(
        &self,
        rtx: &'rtx mut Rtx,
        descriptor: RangeDescriptor,
        start: &[u8],
        stop: &[u8],
    ) -> Result<KvCursor<'rtx>> {
        KvCursor::open(rtx, self.inner.id, descriptor, start, stop)
    }

    /// `MDB_drop` with `del=0` (truncate) or `del=1` (drop the DBI handle
    /// itself).
    pub(crate) fn drop_native(&self, txn: NonNull<ffi::MDB_txn>, del: bool) -> Result<()> {
        let rc = unsafe { ffi::mdb_drop(txn.as_ptr(), self.inner.id, del as i32) };
        mdb_result(rc).map_err(|e| Error::native("mdb_drop", e))
    }

    /// Row count, via `MDB_stat`'s `ms_entries` field.
    pub(crate) fn entries(&self, rtx: &Rtx) -> Result<usize> {
        let mut stat = std::mem::MaybeUninit::<ffi::MDB_stat>::uninit();
        let rc = unsafe { ffi::mdb_stat(rtx.txn_ptr().as_ptr(), self.inner.id, stat.as_mut_ptr()) };
        mdb_result(rc).map_err(|e| Error::native("mdb_stat", e))?;
        Ok(unsafe { stat.assume_init() }.ms_entries)
    }
}
