//! Read transactions (§3, §4.2): one native read-only txn plus the four
//! scratch buffers a scan needs.

use std::ptr::NonNull;

use crate::buffer::BufferCell;
use crate::config::EnvOptions;
use crate::env::EnvPtr;
use crate::error::{Error, Result};
use crate::mdb::error::mdb_result;
use crate::mdb::ffi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RtxState {
    Active,
    Reset,
}

/// One pooled read transaction. Lives from the moment the pool first
/// allocates its slot until `close_pool` tears the pool down; in between it
/// cycles between [`RtxState::Active`] (leased, usable) and
/// [`RtxState::Reset`] (idle, holding no reader slot) via native
/// `mdb_txn_reset`/`mdb_txn_renew`.
pub struct Rtx {
    env: EnvPtr,
    txn: NonNull<ffi::MDB_txn>,
    pub(crate) state: RtxState,
    pub key: BufferCell,
    pub val: BufferCell,
    pub range_start: BufferCell,
    pub range_stop: BufferCell,
}

// SAFETY: an `Rtx` is only ever touched by the one thread that currently
// holds its pool lease (enforced by `RtxPool`'s `in_use` bookkeeping), so
// moving the native handle to a different thread between leases is sound —
// `mdb_txn_renew` rebinds the reader slot to whichever thread calls it.
unsafe impl Send for Rtx {}

impl Rtx {
    pub(crate) fn open(env: EnvPtr, opts: &EnvOptions) -> Result<Rtx> {
        let mut txn: *mut ffi::MDB_txn = std::ptr::null_mut();
        let rc = unsafe {
            ffi::mdb_txn_begin(env.as_ptr(), std::ptr::null_mut(), ffi::MDB_RDONLY, &mut txn)
        };
        mdb_result(rc).map_err(|e| {
            if e.bad_rslot() {
                Error::BadReaderLock(env.path().to_path_buf())
            } else {
                Error::native("mdb_txn_begin", e)
            }
        })?;
        Ok(Rtx {
            env,
            txn: NonNull::new(txn).expect("mdb_txn_begin returned a null txn on success"),
            state: RtxState::Active,
            key: BufferCell::fixed(opts.max_key_size),
            val: BufferCell::growable(opts.default_val_size),
            range_start: BufferCell::fixed(opts.max_key_size),
            range_stop: BufferCell::fixed(opts.max_key_size),
        })
    }

    pub(crate) fn txn_ptr(&self) -> NonNull<ffi::MDB_txn> {
        self.txn
    }

    /// Release the reader slot without destroying the underlying `MDB_txn`.
    pub(crate) fn reset(&mut self) {
        unsafe { ffi::mdb_txn_reset(self.txn.as_ptr()) };
        self.state = RtxState::Reset;
    }

    /// Reacquire a reader slot for the current thread, refreshing the
    /// snapshot this RTX observes.
    pub(crate) fn renew(&mut self) -> Result<()> {
        let rc = unsafe { ffi::mdb_txn_renew(self.txn.as_ptr()) };
        mdb_result(rc).map_err(|e| {
            if e.bad_rslot() {
                Error::BadReaderLock(self.env.path().to_path_buf())
            } else {
                Error::native("mdb_txn_renew", e)
            }
        })?;
        self.state = RtxState::Active;
        Ok(())
    }
}

impl Drop for Rtx {
    fn drop(&mut self) {
        unsafe { ffi::mdb_txn_abort(self.txn.as_ptr()) };
    }
}
