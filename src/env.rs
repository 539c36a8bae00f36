//! The environment coordinator (§3, §4.6, §4.7): owns the native handle, the
//! DBI registry, the RTX pool, and the write pipeline.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Mutex, RwLock};

use log::{debug, warn};

use crate::codec::BytesEncode;
use crate::config::EnvOptions;
use crate::dbi::{Dbi, PutFlags};
use crate::error::{Error, Result};
use crate::mdb::error::mdb_result;
use crate::mdb::ffi;
use crate::pool::RtxPool;
use crate::range::{RangeDescriptor, RangeTag};

/// A `Copy`able handle to the native environment, shared by [`Env`] and
/// everything it hands out (the RTX pool, every leased [`crate::rtx::Rtx`]).
/// The path pointer is stable for the environment's whole lifetime: it
/// points into a [`Box<PathBuf>`] owned by [`EnvInner`], never reallocated.
#[derive(Clone, Copy)]
pub(crate) struct EnvPtr {
    env: NonNull<ffi::MDB_env>,
    path: NonNull<PathBuf>,
}

// SAFETY: the native environment handle is documented safe for concurrent
// use from multiple threads (that's the entire point of the RTX pool and
// the write-path mutex this module builds around it).
unsafe impl Send for EnvPtr {}
unsafe impl Sync for EnvPtr {}

impl EnvPtr {
    pub(crate) fn as_ptr(&self) -> *mut ffi::MDB_env {
        self.env.as_ptr()
    }

    pub(crate) fn path(&self) -> &Path {
        unsafe { self.path.as_ref() }
    }
}

/// One write operation batched into a [`Env::transact`] call (§4.6). Key and
/// value are already-encoded bytes (from [`Dbi::encode_key`]/
/// [`Dbi::encode_val`]) so a whole batch can be staged before any of it runs
/// — nothing here depends on a DBI's scratch cell still holding what it held
/// when the op was built.
pub enum Op {
    Put(Dbi, Vec<u8>, Vec<u8>, PutFlags),
    Del(Dbi, Vec<u8>),
}

struct EnvInner {
    env_ptr: EnvPtr,
    _path: Box<PathBuf>,
    opts: EnvOptions,
    closed: RwLock<bool>,
    dbis: RwLock<HashMap<String, Dbi>>,
    pool: RtxPool,
    write_lock: Mutex<()>,
}

/// The top-level handle to one native store (§3's `Environment`). Cheap to
/// clone: every clone shares the same native handle, DBI registry and RTX
/// pool via an internal `Arc`.
#[derive(Clone)]
pub struct Env {
    inner: std::sync::Arc<EnvInner>,
}

impl Env {
    /// Open (creating the directory if absent) a native store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, opts: EnvOptions) -> Result<Env> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)
            .map_err(|source| Error::InvalidDirectory { path: path.clone(), source })?;

        let mut raw_env: *mut ffi::MDB_env = std::ptr::null_mut();
        mdb_result(unsafe { ffi::mdb_env_create(&mut raw_env) })
            .map_err(|e| Error::native("mdb_env_create", e))?;
        let env = NonNull::new(raw_env).expect("mdb_env_create returned a null env on success");

        unsafe {
            mdb_result(ffi::mdb_env_set_mapsize(env.as_ptr(), opts.init_map_size_bytes()))
                .map_err(|e| Error::native("mdb_env_set_mapsize", e))?;
            mdb_result(ffi::mdb_env_set_maxreaders(env.as_ptr(), opts.max_readers))
                .map_err(|e| Error::native("mdb_env_set_maxreaders", e))?;
            mdb_result(ffi::mdb_env_set_maxdbs(env.as_ptr(), opts.max_dbs))
                .map_err(|e| Error::native("mdb_env_set_maxdbs", e))?;
        }

        let path_str = path.to_str().ok_or_else(|| Error::InvalidDirectory {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path is not valid UTF-8"),
        })?;
        let c_path = CString::new(path_str).map_err(|_| Error::InvalidDirectory {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains a NUL byte"),
        })?;
        let flags = ffi::MDB_NORDAHEAD | ffi::MDB_WRITEMAP | ffi::MDB_MAPASYNC;
        if let Err(e) = mdb_result(unsafe { ffi::mdb_env_open(env.as_ptr(), c_path.as_ptr(), flags, 0o664) })
        {
            unsafe { ffi::mdb_env_close(env.as_ptr()) };
            return Err(Error::native("mdb_env_open", e));
        }

        let path_box = Box::new(path);
        let env_ptr = EnvPtr { env, path: NonNull::from(path_box.as_ref()) };

        debug!("opened environment at {:?}", env_ptr.path());

        Ok(Env {
            inner: std::sync::Arc::new(EnvInner {
                env_ptr,
                _path: path_box,
                pool: RtxPool::new(env_ptr, opts),
                opts,
                closed: RwLock::new(false),
                dbis: RwLock::new(HashMap::new()),
                write_lock: Mutex::new(()),
            }),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.inner.closed.read().unwrap() {
            Err(Error::NotOpen)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.read().unwrap()
    }

    /// Tear the environment down: drains the RTX pool, then closes the
    /// native handle. Idempotent.
    pub fn close(&self) {
        let mut closed = self.inner.closed.write().unwrap();
        if *closed {
            return;
        }
        self.inner.pool.close();
        unsafe { ffi::mdb_env_close(self.inner.env_ptr.as_ptr()) };
        *closed = true;
    }

    /// Open (creating if absent) a named sub-database. Idempotent per name.
    pub fn open_dbi(&self, name: &str) -> Result<Dbi> {
        self.ensure_open()?;
        if let Some(dbi) = self.inner.dbis.read().unwrap().get(name) {
            return Ok(dbi.clone());
        }

        let _write_guard = self.inner.write_lock.lock().unwrap();
        let mut dbis = self.inner.dbis.write().unwrap();
        if let Some(dbi) = dbis.get(name) {
            return Ok(dbi.clone());
        }

        let mut txn: *mut ffi::MDB_txn = std::ptr::null_mut();
        mdb_result(unsafe { ffi::mdb_txn_begin(self.inner.env_ptr.as_ptr(), std::ptr::null_mut(), 0, &mut txn) })
            .map_err(|e| Error::native("mdb_txn_begin", e))?;
        let txn = NonNull::new(txn).expect("mdb_txn_begin returned a null txn on success");

        let c_name = CString::new(name).map_err(|_| Error::UnknownDbi(name.to_string()))?;
        let mut dbi_id: ffi::MDB_dbi = 0;
        if let Err(e) = mdb_result(unsafe {
            ffi::mdb_dbi_open(txn.as_ptr(), c_name.as_ptr(), ffi::MDB_CREATE, &mut dbi_id)
        }) {
            unsafe { ffi::mdb_txn_abort(txn.as_ptr()) };
            return Err(Error::native("mdb_dbi_open", e));
        }
        mdb_result(unsafe { ffi::mdb_txn_commit(txn.as_ptr()) })
            .map_err(|e| Error::native("mdb_txn_commit", e))?;

        let dbi = Dbi::new(dbi_id, name.to_string(), self.inner.opts.max_key_size, self.inner.opts.default_val_size);
        dbis.insert(name.to_string(), dbi.clone());
        Ok(dbi)
    }

    /// Look up an already-open DBI by name.
    pub fn get_dbi(&self, name: &str) -> Result<Dbi> {
        self.ensure_open()?;
        self.inner
            .dbis
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDbi(name.to_string()))
    }

    /// Row count of a DBI (supplemented, §3's `Env::stat` grounding).
    pub fn entries(&self, dbi: &Dbi) -> Result<usize> {
        self.ensure_open()?;
        let lease = self.inner.pool.get_rtx()?;
        dbi.entries(&lease)
    }

    /// Truncate a DBI's contents without removing its registry entry.
    pub fn clear_dbi(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let dbi = self.get_dbi(name)?;
        self.with_write_txn(|txn| dbi.drop_native(txn, false))
    }

    /// Remove a DBI's registry entry, dropping its contents too.
    pub fn drop_dbi(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let dbi = self.get_dbi(name)?;
        self.with_write_txn(|txn| dbi.drop_native(txn, true))?;
        self.inner.dbis.write().unwrap().remove(name);
        Ok(())
    }

    /// Map-size and entry-count snapshot (supplemented `Env::stat`).
    pub fn stat(&self) -> Result<EnvStat> {
        self.ensure_open()?;
        let mut info = std::mem::MaybeUninit::<ffi::MDB_envinfo>::uninit();
        mdb_result(unsafe { ffi::mdb_env_info(self.inner.env_ptr.as_ptr(), info.as_mut_ptr()) })
            .map_err(|e| Error::native("mdb_env_info", e))?;
        let info = unsafe { info.assume_init() };
        Ok(EnvStat { map_size: info.me_mapsize, last_txn_id: info.me_last_txnid as u64 })
    }

    /// Run `body` under one short-lived write transaction, committing on
    /// success and aborting (implicitly, via `Drop`-free `mdb_txn_abort`) on
    /// failure. Used by the DBI-management operations, which don't need the
    /// map-resize-and-retry dance `transact` does for batched puts/dels.
    fn with_write_txn<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce(NonNull<ffi::MDB_txn>) -> Result<()>,
    {
        let _guard = self.inner.write_lock.lock().unwrap();
        let mut txn: *mut ffi::MDB_txn = std::ptr::null_mut();
        mdb_result(unsafe { ffi::mdb_txn_begin(self.inner.env_ptr.as_ptr(), std::ptr::null_mut(), 0, &mut txn) })
            .map_err(|e| Error::native("mdb_txn_begin", e))?;
        let txn = NonNull::new(txn).expect("mdb_txn_begin returned a null txn on success");

        match body(txn) {
            Ok(()) => mdb_result(unsafe { ffi::mdb_txn_commit(txn.as_ptr()) })
                .map_err(|e| Error::native("mdb_txn_commit", e)),
            Err(e) => {
                unsafe { ffi::mdb_txn_abort(txn.as_ptr()) };
                Err(e)
            }
        }
    }

    /// Execute `ops` atomically (§4.6). On `MapFull`, the map is grown 10x
    /// and the whole batch retried; no bound is placed on the number of
    /// grows, matching the working set eventually fitting.
    pub fn transact(&self, ops: &[Op]) -> Result<()> {
        self.ensure_open()?;
        loop {
            match self.transact_once(ops) {
                Ok(()) => return Ok(()),
                Err(Error::MapFull) => self.grow_map()?,
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt at `ops` under a single write transaction. The write lock
    /// is released (its guard drops with this function's frame) before
    /// `transact` decides whether to grow the map and retry — growing while
    /// still holding it would deadlock against the retry's own lock attempt.
    fn transact_once(&self, ops: &[Op]) -> Result<()> {
        let _guard = self.inner.write_lock.lock().unwrap();
        let mut txn: *mut ffi::MDB_txn = std::ptr::null_mut();
        mdb_result(unsafe { ffi::mdb_txn_begin(self.inner.env_ptr.as_ptr(), std::ptr::null_mut(), 0, &mut txn) })
            .map_err(|e| Error::native("mdb_txn_begin", e))?;
        let txn = NonNull::new(txn).expect("mdb_txn_begin returned a null txn on success");

        for op in ops {
            let result = match op {
                Op::Put(dbi, key, val, flags) => dbi.put(txn, key, val, *flags),
                Op::Del(dbi, key) => dbi.del(txn, key),
            };
            if let Err(e) = result {
                unsafe { ffi::mdb_txn_abort(txn.as_ptr()) };
                return Err(e);
            }
        }

        mdb_result(unsafe { ffi::mdb_txn_commit(txn.as_ptr()) })
            .map_err(|e| Error::from_mdb("mdb_txn_commit", e))
    }

    fn grow_map(&self) -> Result<()> {
        let mut info = std::mem::MaybeUninit::<ffi::MDB_envinfo>::uninit();
        mdb_result(unsafe { ffi::mdb_env_info(self.inner.env_ptr.as_ptr(), info.as_mut_ptr()) })
            .map_err(|e| Error::native("mdb_env_info", e))?;
        let current = unsafe { info.assume_init() }.me_mapsize;
        let grown = current.saturating_mul(10);
        warn!("map full, growing from {current} to {grown} bytes and retrying the batch");
        mdb_result(unsafe { ffi::mdb_env_set_mapsize(self.inner.env_ptr.as_ptr(), grown) })
            .map_err(|e| Error::native("mdb_env_set_mapsize", e))
    }

    /// Point lookup, §4.7. Encodes `key` into a leased RTX's key buffer,
    /// looks it up, and decodes any hit.
    pub fn get_value<K, V, KC, VC>(&self, dbi: &Dbi, key: &K) -> Result<Option<V>>
    where
        K: ?Sized,
        KC: BytesEncode<K>,
        VC: for<'a> crate::codec::BytesDecode<'a, V>,
    {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        lease.key.encode::<K, KC>(key)?;
        if !dbi.get_kv(&mut lease)? {
            return Ok(None);
        }
        // Copied out of the lease before it's released: `V` must own its
        // data (the `for<'a>` bound below rules out anything that borrows
        // `owned`), but the lease itself is about to go back to the pool and
        // may be handed to another thread.
        let owned = lease.val.output_view().to_vec();
        VC::bytes_decode(&owned).map(Some).map_err(|_| Error::EncodingOverflow)
    }

    /// First entry in forward key order, or `None` if the DBI is empty.
    pub fn get_first<K, V, KC, VC>(&self, dbi: &Dbi) -> Result<Option<(K, V)>>
    where
        KC: for<'a> crate::codec::BytesDecode<'a, K>,
        VC: for<'a> crate::codec::BytesDecode<'a, V>,
    {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        let cursor = dbi.iterate_kv(&mut lease, RangeDescriptor::from(RangeTag::All), &[], &[])?;
        match cursor.into_iter().next() {
            None => Ok(None),
            Some(kv) => {
                let (k, v) = kv?;
                let key = KC::bytes_decode(k).map_err(|_| Error::EncodingOverflow)?;
                let val = VC::bytes_decode(v).map_err(|_| Error::EncodingOverflow)?;
                Ok(Some((key, val)))
            }
        }
    }

    /// Decode every entry in `tag`'s range into a `Vec` (§4.7's `get_range`).
    pub fn get_range<K, V, KC, VC>(&self, dbi: &Dbi, tag: RangeTag, start: &[u8], stop: &[u8]) -> Result<Vec<(K, V)>>
    where
        KC: for<'a> crate::codec::BytesDecode<'a, K>,
        VC: for<'a> crate::codec::BytesDecode<'a, V>,
    {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        let cursor = dbi.iterate_kv(&mut lease, RangeDescriptor::from(tag), start, stop)?;
        let mut out = Vec::new();
        for kv in cursor {
            let (k, v) = kv?;
            out.push((
                KC::bytes_decode(k).map_err(|_| Error::EncodingOverflow)?,
                VC::bytes_decode(v).map_err(|_| Error::EncodingOverflow)?,
            ));
        }
        Ok(out)
    }

    /// Count entries in `tag`'s range without materialising them.
    pub fn range_count(&self, dbi: &Dbi, tag: RangeTag, start: &[u8], stop: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        let cursor = dbi.iterate_kv(&mut lease, RangeDescriptor::from(tag), start, stop)?;
        let mut count = 0;
        for kv in cursor {
            kv?;
            count += 1;
        }
        Ok(count)
    }

    /// First decoded entry in `tag`'s range satisfying `pred` (§4.7's shared
    /// pattern, named but not separately specified — implemented as
    /// `range_filter` bounded to one result).
    pub fn get_some<K, V, KC, VC, P>(
        &self,
        dbi: &Dbi,
        tag: RangeTag,
        start: &[u8],
        stop: &[u8],
        mut pred: P,
    ) -> Result<Option<(K, V)>>
    where
        KC: for<'a> crate::codec::BytesDecode<'a, K>,
        VC: for<'a> crate::codec::BytesDecode<'a, V>,
        P: FnMut(&K, &V) -> bool,
    {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        let cursor = dbi.iterate_kv(&mut lease, RangeDescriptor::from(tag), start, stop)?;
        for kv in cursor {
            let (k, v) = kv?;
            let key = KC::bytes_decode(k).map_err(|_| Error::EncodingOverflow)?;
            let val = VC::bytes_decode(v).map_err(|_| Error::EncodingOverflow)?;
            if pred(&key, &val) {
                return Ok(Some((key, val)));
            }
        }
        Ok(None)
    }

    /// Every decoded entry in `tag`'s range satisfying `pred`.
    pub fn range_filter<K, V, KC, VC, P>(
        &self,
        dbi: &Dbi,
        tag: RangeTag,
        start: &[u8],
        stop: &[u8],
        mut pred: P,
    ) -> Result<Vec<(K, V)>>
    where
        KC: for<'a> crate::codec::BytesDecode<'a, K>,
        VC: for<'a> crate::codec::BytesDecode<'a, V>,
        P: FnMut(&K, &V) -> bool,
    {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        let cursor = dbi.iterate_kv(&mut lease, RangeDescriptor::from(tag), start, stop)?;
        let mut out = Vec::new();
        for kv in cursor {
            let (k, v) = kv?;
            let key = KC::bytes_decode(k).map_err(|_| Error::EncodingOverflow)?;
            let val = VC::bytes_decode(v).map_err(|_| Error::EncodingOverflow)?;
            if pred(&key, &val) {
                out.push((key, val));
            }
        }
        Ok(out)
    }

    /// Count of entries in `tag`'s range satisfying `pred`.
    pub fn range_filter_count<K, V, KC, VC, P>(
        &self,
        dbi: &Dbi,
        tag: RangeTag,
        start: &[u8],
        stop: &[u8],
        mut pred: P,
    ) -> Result<usize>
    where
        KC: for<'a> crate::codec::BytesDecode<'a, K>,
        VC: for<'a> crate::codec::BytesDecode<'a, V>,
        P: FnMut(&K, &V) -> bool,
    {
        self.ensure_open()?;
        let mut lease = self.inner.pool.get_rtx()?;
        let cursor = dbi.iterate_kv(&mut lease, RangeDescriptor::from(tag), start, stop)?;
        let mut count = 0;
        for kv in cursor {
            let (k, v) = kv?;
            let key = KC::bytes_decode(k).map_err(|_| Error::EncodingOverflow)?;
            let val = VC::bytes_decode(v).map_err(|_| Error::EncodingOverflow)?;
            if pred(&key, &val) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn allocated_rtx_count(&self) -> usize {
        self.inner.pool.allocated()
    }
}

impl Drop for EnvInner {
    fn drop(&mut self) {
        if !*self.closed.get_mut() {
            self.pool.close();
            unsafe { ffi::mdb_env_close(self.env_ptr.as_ptr()) };
        }
    }
}

/// Map-size and transaction-id snapshot, the supplemented `Env::stat`.
#[derive(Debug, Clone, Copy)]
pub struct EnvStat {
    pub map_size: usize,
    pub last_txn_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested");
        assert!(!path.exists());
        let env = Env::open(&path, EnvOptions::default().init_db_size_mb(1)).unwrap();
        assert!(path.exists());
        env.close();
    }

    #[test]
    fn closing_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::open(dir.path(), EnvOptions::default().init_db_size_mb(1)).unwrap();
        env.close();
        env.close();
        assert!(env.is_closed());
    }

    #[test]
    fn operations_after_close_report_not_open() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::open(dir.path(), EnvOptions::default().init_db_size_mb(1)).unwrap();
        env.close();
        assert!(matches!(env.open_dbi("foo"), Err(Error::NotOpen)));
    }
}
