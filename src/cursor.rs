//! The lazy range cursor (§4.4): translates a [`RangeDescriptor`] into a
//! correct `has_next`/`next` walk over one DBI.

use std::cmp::Ordering;
use std::ptr;

use crate::error::{Error, Result};
use crate::mdb::error::mdb_result;
use crate::mdb::ffi;
use crate::range::RangeDescriptor;
use crate::rtx::Rtx;

/// A thin wrapper around one native `MDB_cursor`, offering the handful of
/// positioning primitives `KvCursor`'s state machine needs. Mirrors the
/// shape of a typed LMDB wrapper's cursor (`move_on_first`/`move_on_next`/
/// `move_on_key_greater_than_or_equal_to`/...), minus the DUP-sort variants
/// this adapter has no use for.
struct RawCursor<'txn> {
    cursor: ptr::NonNull<ffi::MDB_cursor>,
    _marker: std::marker::PhantomData<&'txn ()>,
}

impl<'txn> RawCursor<'txn> {
    fn open(rtx: &'txn Rtx, dbi: ffi::MDB_dbi) -> Result<RawCursor<'txn>> {
        let mut cursor: *mut ffi::MDB_cursor = ptr::null_mut();
        let rc = unsafe { ffi::mdb_cursor_open(rtx.txn_ptr().as_ptr(), dbi, &mut cursor) };
        mdb_result(rc).map_err(|e| Error::native("mdb_cursor_open", e))?;
        Ok(RawCursor {
            cursor: ptr::NonNull::new(cursor).expect("mdb_cursor_open returned null on success"),
            _marker: std::marker::PhantomData,
        })
    }

    fn get(&mut self, op: u32) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        let mut key = std::mem::MaybeUninit::uninit();
        let mut val = std::mem::MaybeUninit::uninit();
        let rc =
            unsafe { ffi::mdb_cursor_get(self.cursor.as_ptr(), key.as_mut_ptr(), val.as_mut_ptr(), op) };
        match mdb_result(rc) {
            Ok(()) => unsafe {
                Ok(Some((ffi::from_val(key.assume_init()), ffi::from_val(val.assume_init()))))
            },
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(Error::native("mdb_cursor_get", e)),
        }
    }

    fn set_range(&mut self, key: &[u8]) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        let mut key_val = unsafe { ffi::into_val(key) };
        let mut val = std::mem::MaybeUninit::uninit();
        let rc = unsafe {
            ffi::mdb_cursor_get(
                self.cursor.as_ptr(),
                &mut key_val,
                val.as_mut_ptr(),
                ffi::cursor_op::MDB_SET_RANGE,
            )
        };
        match mdb_result(rc) {
            Ok(()) => unsafe { Ok(Some((ffi::from_val(key_val), ffi::from_val(val.assume_init())))) },
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(Error::native("mdb_cursor_get", e)),
        }
    }

    fn current(&mut self) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        self.get(ffi::cursor_op::MDB_GET_CURRENT)
    }
}

impl Drop for RawCursor<'_> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_cursor_close(self.cursor.as_ptr()) };
    }
}

/// A lazy, single-pass, ordered walk over one DBI, bounded by a
/// [`RangeDescriptor`]. Implements the `has_next`/`next` protocol of §4.4
/// exactly: every `next()` must be preceded by a `has_next()` that returned
/// `true`.
pub struct KvCursor<'txn> {
    raw: RawCursor<'txn>,
    descriptor: RangeDescriptor,
    start: &'txn [u8],
    stop: &'txn [u8],
    started: bool,
    ended: bool,
    current: Option<(&'txn [u8], &'txn [u8])>,
}

impl<'txn> KvCursor<'txn> {
    /// Opens a cursor bounded by `descriptor`. `start`/`stop` are written
    /// into `rtx`'s own `range_start`/`range_stop` scratch cells (§3) rather
    /// than copied into a fresh allocation per call; the returned cursor
    /// borrows those cells for its whole walk.
    pub(crate) fn open(
        rtx: &'txn mut Rtx,
        dbi: ffi::MDB_dbi,
        descriptor: RangeDescriptor,
        start: &[u8],
        stop: &[u8],
    ) -> Result<KvCursor<'txn>> {
        rtx.range_start.set(start);
        rtx.range_stop.set(stop);
        let rtx: &'txn Rtx = rtx;
        Ok(KvCursor {
            raw: RawCursor::open(rtx, dbi)?,
            descriptor,
            start: rtx.range_start.output_view(),
            stop: rtx.range_stop.output_view(),
            started: false,
            ended: false,
            current: None,
        })
    }

    /// Advance and position the cursor. Must be called before every `next`.
    /// Returns `false` once the range is exhausted; all further calls also
    /// return `false`.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.ended {
            return Ok(false);
        }

        let landed = if !self.started {
            self.started = true;
            self.seek_start()?
        } else {
            self.step()?
        };

        let (key, val) = match landed {
            Some(kv) => kv,
            None => {
                self.ended = true;
                self.current = None;
                return Ok(false);
            }
        };

        if self.descriptor.has_stop {
            let ord = key.cmp(self.stop);
            let reached = if self.descriptor.forward { ord != Ordering::Less } else { ord != Ordering::Greater };
            if reached {
                self.ended = true;
                if ord == Ordering::Equal && self.descriptor.include_stop {
                    self.current = Some((key, val));
                    return Ok(true);
                }
                self.current = None;
                return Ok(false);
            }
        }

        self.current = Some((key, val));
        Ok(true)
    }

    /// Read the key/value at the current position. Panics if the preceding
    /// `has_next()` did not return `true` — the same contract violation
    /// that calling `Iterator::next()` past exhaustion would be, just made
    /// explicit by the two-call protocol.
    pub fn next(&mut self) -> (&'txn [u8], &'txn [u8]) {
        self.current.expect("KvCursor::next called without has_next() == true")
    }

    fn seek_start(&mut self) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        if !self.descriptor.has_start {
            return if self.descriptor.forward {
                self.raw.get(ffi::cursor_op::MDB_FIRST)
            } else {
                self.raw.get(ffi::cursor_op::MDB_LAST)
            };
        }

        let start = self.start;
        if self.descriptor.forward {
            match self.raw.set_range(start)? {
                Some((k, v)) if k == start && !self.descriptor.include_start => {
                    self.raw.get(ffi::cursor_op::MDB_NEXT)
                }
                other => Ok(other),
            }
        } else {
            match self.raw.set_range(start)? {
                Some((k, _)) if k == start => {
                    if self.descriptor.include_start {
                        self.raw.current()
                    } else {
                        self.raw.get(ffi::cursor_op::MDB_PREV)
                    }
                }
                Some(_) => self.raw.get(ffi::cursor_op::MDB_PREV),
                None => self.raw.get(ffi::cursor_op::MDB_LAST),
            }
        }
    }

    fn step(&mut self) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        let op = if self.descriptor.forward { ffi::cursor_op::MDB_NEXT } else { ffi::cursor_op::MDB_PREV };
        match self.raw.get(op)? {
            Some(_) => self.raw.current(),
            None => Ok(None),
        }
    }
}

impl<'txn> IntoIterator for KvCursor<'txn> {
    type Item = Result<(&'txn [u8], &'txn [u8])>;
    type IntoIter = KvIter<'txn>;

    fn into_iter(self) -> KvIter<'txn> {
        KvIter { cursor: self }
    }
}

/// Ergonomic `for`-loop adapter over [`KvCursor`]'s `has_next`/`next`
/// protocol, the way heed layers `RoIter`/`RoRange` over `RoCursor`. Each
/// item is a `Result` since advancing the underlying cursor can fail;
/// iteration stops at the first error.
pub struct KvIter<'txn> {
    cursor: KvCursor<'txn>,
}

impl<'txn> Iterator for KvIter<'txn> {
    type Item = Result<(&'txn [u8], &'txn [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.has_next() {
            Ok(true) => Some(Ok(self.cursor.next())),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
