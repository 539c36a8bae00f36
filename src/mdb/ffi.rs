//! Thin re-export of the raw LMDB bindings this adapter is bound to.
//!
//! Everything here is `unsafe` by construction. Code outside `crate::mdb`
//! should never see a raw `MDB_*` type; it talks to [`crate::pool`],
//! [`crate::dbi`] and [`crate::env`] instead.

pub use lmdb_rkv_sys::{
    mdb_cursor_close, mdb_cursor_del, mdb_cursor_get, mdb_cursor_open, mdb_dbi_open, mdb_del,
    mdb_drop, mdb_env_close, mdb_env_create, mdb_env_info, mdb_env_open, mdb_env_set_mapsize,
    mdb_env_set_maxdbs, mdb_env_set_maxreaders, mdb_env_stat, mdb_get, mdb_put, mdb_stat,
    mdb_strerror, mdb_txn_abort, mdb_txn_begin, mdb_txn_commit, mdb_txn_id, mdb_txn_renew,
    mdb_txn_reset, MDB_cursor, MDB_dbi, MDB_env, MDB_envinfo, MDB_stat, MDB_txn, MDB_val,
};

pub const MDB_RDONLY: u32 = lmdb_rkv_sys::MDB_RDONLY;
pub const MDB_NORDAHEAD: u32 = lmdb_rkv_sys::MDB_NORDAHEAD;
pub const MDB_WRITEMAP: u32 = lmdb_rkv_sys::MDB_WRITEMAP;
pub const MDB_MAPASYNC: u32 = lmdb_rkv_sys::MDB_MAPASYNC;
pub const MDB_CREATE: u32 = lmdb_rkv_sys::MDB_CREATE;
pub const MDB_NOOVERWRITE: u32 = lmdb_rkv_sys::MDB_NOOVERWRITE;
pub const MDB_APPEND: u32 = lmdb_rkv_sys::MDB_APPEND;

/// Named cursor-positioning operations, mirrored from `MDB_cursor_op`.
///
/// Only the operations §6 enumerates are exposed; LMDB's `DUP`-oriented
/// variants have no use in this adapter (no `DUPSORT` databases).
pub mod cursor_op {
    pub const MDB_FIRST: u32 = lmdb_rkv_sys::MDB_FIRST;
    pub const MDB_LAST: u32 = lmdb_rkv_sys::MDB_LAST;
    pub const MDB_NEXT: u32 = lmdb_rkv_sys::MDB_NEXT;
    pub const MDB_PREV: u32 = lmdb_rkv_sys::MDB_PREV;
    pub const MDB_SET: u32 = lmdb_rkv_sys::MDB_SET;
    pub const MDB_SET_RANGE: u32 = lmdb_rkv_sys::MDB_SET_RANGE;
    pub const MDB_GET_CURRENT: u32 = lmdb_rkv_sys::MDB_GET_CURRENT;
}

/// Build an `MDB_val` borrowing `bytes`. The returned value is only valid
/// for as long as `bytes` is.
pub unsafe fn into_val(bytes: &[u8]) -> MDB_val {
    MDB_val { mv_size: bytes.len(), mv_data: bytes.as_ptr() as *mut _ }
}

/// Borrow the bytes an `MDB_val` points to, tied to the txn lifetime `'a`.
///
/// # Safety
///
/// `val` must have been filled in by a successful `mdb_*_get`-style call
/// against a transaction that outlives `'a`.
pub unsafe fn from_val<'a>(val: MDB_val) -> &'a [u8] {
    std::slice::from_raw_parts(val.mv_data as *const u8, val.mv_size)
}

pub fn empty_val() -> MDB_val {
    MDB_val { mv_size: 0, mv_data: std::ptr::null_mut() }
}
