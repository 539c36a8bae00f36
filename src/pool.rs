//! The bounded, thread-affine RTX pool (§4.2).

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::{trace, warn};

use crate::config::EnvOptions;
use crate::env::EnvPtr;
use crate::error::Result;
use crate::rtx::{Rtx, RtxState};

struct Slot {
    rtx: Rtx,
    in_use: bool,
}

struct PoolState {
    slots: Vec<Box<Slot>>,
}

/// A bounded pool of reusable read transactions, leased round the
/// thread-identity probe described in §4.2.
///
/// `slots` live behind a `Mutex`, but each `Box<Slot>` has a stable heap
/// address: a lease hands out a raw pointer into that box, which stays
/// valid even if the `Vec` backing the pool reallocates while growing.
pub struct RtxPool {
    env: EnvPtr,
    opts: EnvOptions,
    state: Mutex<PoolState>,
    freed: Condvar,
}

impl RtxPool {
    pub(crate) fn new(env: EnvPtr, opts: EnvOptions) -> RtxPool {
        RtxPool { env, opts, state: Mutex::new(PoolState { slots: Vec::new() }), freed: Condvar::new() }
    }

    /// Lease an Active RTX, per the allocation policy of §4.2.
    pub fn get_rtx(&self) -> Result<RtxLease<'_>> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if guard.slots.is_empty() {
                let rtx = Rtx::open(self.env, &self.opts)?;
                guard.slots.push(Box::new(Slot { rtx, in_use: true }));
                let index = guard.slots.len() - 1;
                return Ok(RtxLease { pool: self, index });
            }

            let count = guard.slots.len();
            let start = thread_probe_start(count);
            for offset in 0..count {
                let i = (start + offset) % count;
                if !guard.slots[i].in_use {
                    guard.slots[i].rtx.renew()?;
                    guard.slots[i].in_use = true;
                    return Ok(RtxLease { pool: self, index: i });
                }
            }

            if count < self.opts.use_readers {
                let rtx = Rtx::open(self.env, &self.opts)?;
                guard.slots.push(Box::new(Slot { rtx, in_use: true }));
                let index = guard.slots.len() - 1;
                return Ok(RtxLease { pool: self, index });
            }

            trace!("rtx pool exhausted ({count}/{}), waiting for a free slot", self.opts.use_readers);
            let (g, timed_out) =
                self.freed.wait_timeout(guard, Duration::from_millis(50)).unwrap();
            guard = g;
            if timed_out.timed_out() {
                warn!("rtx pool probe woke on timeout, not a reset signal; retrying");
            }
        }
    }

    pub(crate) fn close(&self) {
        let mut guard = self.state.lock().unwrap();
        for slot in guard.slots.drain(..) {
            drop(slot);
        }
    }

    pub fn allocated(&self) -> usize {
        self.state.lock().unwrap().slots.len()
    }

    fn release(&self, index: usize) {
        let mut guard = self.state.lock().unwrap();
        guard.slots[index].rtx.reset();
        guard.slots[index].in_use = false;
        self.freed.notify_one();
    }
}

/// Hash the calling thread's identity down to a starting slot index. This
/// only biases distinct threads toward distinct slots to cut contention; it
/// never guarantees affinity (§4.2).
fn thread_probe_start(count: usize) -> usize {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    (hasher.finish() as usize) % count
}

/// An Active RTX leased from the pool. Resets the RTX and returns it to the
/// pool on drop — callers never need to remember to release it explicitly.
pub struct RtxLease<'p> {
    pool: &'p RtxPool,
    index: usize,
}

impl Deref for RtxLease<'_> {
    type Target = Rtx;

    fn deref(&self) -> &Rtx {
        // SAFETY: `in_use` is set under `self.pool.state`'s mutex before this
        // lease is handed out and not cleared until `release` runs in
        // `Drop`, so no other lease can alias this slot's `Rtx` while this
        // one is alive.
        let state = self.pool.state.lock().unwrap();
        let slot: *const Slot = &*state.slots[self.index];
        unsafe { &(*slot).rtx }
    }
}

impl DerefMut for RtxLease<'_> {
    fn deref_mut(&mut self) -> &mut Rtx {
        let state = self.pool.state.lock().unwrap();
        let slot: *mut Slot = &mut *(state.slots[self.index].as_ref() as *const Slot as *mut Slot);
        debug_assert!(matches!(unsafe { &(*slot).rtx }.state, RtxState::Active));
        unsafe { &mut (*slot).rtx }
    }
}

impl Drop for RtxLease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}
