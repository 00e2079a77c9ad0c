// Reader/writer counterpart of the futex mutex in
// https://github.com/rust-lang/rust/blob/master/library/std/src/sys/sync/mutex/futex.rs
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{
    AtomicU32,
    Ordering::{Acquire, Relaxed, Release},
};

// Bits 0..30 hold the reader count, or WRITE_LOCKED when a writer holds the lock.
// Bit 30 is set when at least one thread may be parked on the futex.
const READ_LOCKED: u32 = 1;
const MASK: u32 = (1 << 30) - 1;
const WRITE_LOCKED: u32 = MASK;
const MAX_READERS: u32 = MASK - 1;
const WAITING: u32 = 1 << 30;

#[inline]
fn is_unlocked(state: u32) -> bool {
    state & MASK == 0
}

#[inline]
fn is_write_locked(state: u32) -> bool {
    state & MASK == WRITE_LOCKED
}

#[inline]
fn is_read_lockable(state: u32) -> bool {
    // Readers get in whenever no writer holds the lock, parked writers or not.
    state & MASK < MAX_READERS
}

/// A reader-preferring, non-reentrant reader/writer lock.
///
/// Guards release the lock on drop, including during unwinding, so the lock is
/// never poisoned.
pub struct RwLock<T: ?Sized> {
    state: AtomicU32,
    data: UnsafeCell<T>,
}

// Safety: access to `data` is serialized by `state`, exactly like `std::sync::RwLock`.
unsafe impl<T: ?Sized + Send> Send for RwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            state: AtomicU32::new(0),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> RwLock<T> {
    /// Acquires a shared hold, blocking while a writer holds the lock.
    #[inline]
    pub fn read(&self) -> ReadGuard<'_, T> {
        if !self.try_read_lock() {
            self.read_contended();
        }
        ReadGuard { lock: self }
    }

    /// Acquires an exclusive hold, blocking while any reader or writer holds the lock.
    ///
    /// **Locking behaviour:** Deadlock if the calling thread already holds a guard
    /// on the same lock.
    #[inline]
    pub fn write(&self) -> WriteGuard<'_, T> {
        if !self.try_write_lock() {
            self.write_contended();
        }
        WriteGuard { lock: self }
    }

    #[inline]
    fn try_read_lock(&self) -> bool {
        self.state
            .fetch_update(Acquire, Relaxed, |s| {
                is_read_lockable(s).then_some(s + READ_LOCKED)
            })
            .is_ok()
    }

    #[inline]
    fn try_write_lock(&self) -> bool {
        self.state
            .fetch_update(Acquire, Relaxed, |s| {
                is_unlocked(s).then_some(s | WRITE_LOCKED)
            })
            .is_ok()
    }

    #[cold]
    fn read_contended(&self) {
        tracing::trace!("read lock contended");
        let mut state = self.spin(is_read_lockable);

        loop {
            if is_read_lockable(state) {
                match self.state.compare_exchange_weak(
                    state,
                    state + READ_LOCKED,
                    Acquire,
                    Relaxed,
                ) {
                    Ok(_) => return, // Locked!
                    Err(s) => {
                        state = s;
                        continue;
                    }
                }
            }

            if !is_write_locked(state) {
                panic!("too many active read locks on RwLock");
            }

            if !self.mark_waiting(&mut state) {
                continue;
            }

            atomic_wait::wait(&self.state, state | WAITING);

            // Spin again after waking up.
            state = self.spin(is_read_lockable);
        }
    }

    #[cold]
    fn write_contended(&self) {
        tracing::trace!("write lock contended");
        let mut state = self.spin(is_unlocked);

        loop {
            if is_unlocked(state) {
                // Keep the WAITING bit, parked threads still need a wake on unlock.
                match self.state.compare_exchange_weak(
                    state,
                    state | WRITE_LOCKED,
                    Acquire,
                    Relaxed,
                ) {
                    Ok(_) => return, // Locked!
                    Err(s) => {
                        state = s;
                        continue;
                    }
                }
            }

            if !self.mark_waiting(&mut state) {
                continue;
            }

            atomic_wait::wait(&self.state, state | WAITING);

            state = self.spin(is_unlocked);
        }
    }

    /// Sets the WAITING bit before parking. Returns false if the state moved
    /// underneath us, in which case `state` holds the fresh value.
    fn mark_waiting(&self, state: &mut u32) -> bool {
        if *state & WAITING != 0 {
            return true;
        }
        match self
            .state
            .compare_exchange(*state, *state | WAITING, Relaxed, Relaxed)
        {
            Ok(_) => true,
            Err(s) => {
                *state = s;
                false
            }
        }
    }

    fn spin(&self, ready: impl Fn(u32) -> bool) -> u32 {
        let mut spin = 100;
        loop {
            // We only use `load` while spinning, to be easier on the caches.
            let state = self.state.load(Relaxed);

            // Stop once the lock can be taken, or once somebody is already parked.
            if ready(state) || state & WAITING != 0 || spin == 0 {
                return state;
            }

            std::hint::spin_loop();
            spin -= 1;
        }
    }

    #[inline]
    fn read_unlock(&self) {
        let state = self.state.fetch_sub(READ_LOCKED, Release) - READ_LOCKED;

        // Last reader out with parked threads. If another thread got in first, the
        // WAITING bit survives and its unlock takes care of the wake.
        if state == WAITING && self.state.compare_exchange(WAITING, 0, Relaxed, Relaxed).is_ok() {
            self.wake();
        }
    }

    #[inline]
    fn write_unlock(&self) {
        if self.state.swap(0, Release) & WAITING != 0 {
            self.wake();
        }
    }

    #[cold]
    fn wake(&self) {
        // Readers and writers park on the same word, so wake them all and let
        // them race for it again.
        atomic_wait::wake_all(&self.state);
    }
}

/// RAII shared hold on a `RwLock`.
pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: a shared hold excludes every writer.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.read_unlock();
    }
}

/// RAII exclusive hold on a `RwLock`.
pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: an exclusive hold excludes every other guard.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: an exclusive hold excludes every other guard.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.write_unlock();
    }
}
