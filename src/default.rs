//! The process-wide default collector and the thread local handles attached
//! to it.
//!
//! This module provides an explicit lifecycle: the collector is created once
//! near the start of `main` via [`construct`], every thread that
//! touches a lock-free container attaches itself via [`attach_thread`] and
//! detaches again before terminating, and [`destruct`] tears everything down
//! at process shutdown.

use core::ptr::{self, NonNull};
use core::sync::atomic::{
    AtomicPtr,
    Ordering::{Acquire, Relaxed, Release},
};

use crate::collector::Collector;
use crate::config::Config;
use crate::error::Error;
use crate::guard::{Guard, GuardArray};
use crate::local::Local;

/// The process-wide collector instance, null until [`construct`] is called.
static COLLECTOR: AtomicPtr<Collector> = AtomicPtr::new(ptr::null_mut());

thread_local!(static LOCAL: Local<'static> = Local::new(instance()));

/// Creates the process-wide default [`Collector`].
///
/// Returns `true` if the collector was created by this call and `false` if
/// one already existed (in which case `config` is discarded and the existing
/// instance is left untouched).
#[inline]
pub fn construct(config: Config) -> bool {
    let collector = Box::into_raw(Box::new(Collector::new(config)));

    // (GLO:1) this `Release` CAS synchronizes-with the `Acquire` loads (GLO:2) and (GLO:3)
    match COLLECTOR.compare_exchange(ptr::null_mut(), collector, Release, Relaxed) {
        Ok(_) => true,
        Err(_) => {
            drop(unsafe { Box::from_raw(collector) });
            false
        }
    }
}

/// Destroys the process-wide default [`Collector`], disposing all still
/// pending retired records.
///
/// With `detach_all`, every thread record that is still attached is forcibly
/// released first; this is an escape hatch for threads whose termination the
/// caller does not control, not a substitute for orderly detaching.
/// Returns `false` (and does nothing) if no collector exists.
///
/// # Safety
///
/// All references into the collector handed out earlier (guards, the
/// thread local handles behind this module's functions) are invalidated.
/// The caller must guarantee that every attached thread has either detached
/// or terminated, and that no thread uses the default collector API again
/// unless [`construct`] is called anew.
#[inline]
pub unsafe fn destruct(detach_all: bool) -> bool {
    // (GLO:3) this `Acquire` swap synchronizes-with the `Release` CAS (GLO:1)
    let collector = COLLECTOR.swap(ptr::null_mut(), Acquire);
    if collector.is_null() {
        return false;
    }

    let collector = Box::from_raw(collector);
    if detach_all {
        collector.detach_all();
    }

    drop(collector);
    true
}

/// Returns `true` if the process-wide collector currently exists.
#[inline]
pub fn is_constructed() -> bool {
    !COLLECTOR.load(Acquire).is_null()
}

/// Returns a reference to the process-wide collector.
///
/// # Panics
///
/// Panics if no collector has been constructed.
#[inline]
pub fn instance() -> &'static Collector {
    // (GLO:2) this `Acquire` load synchronizes-with the `Release` CAS (GLO:1)
    let collector = COLLECTOR.load(Acquire);
    if collector.is_null() {
        panic!("{}", Error::NotConstructed);
    }

    unsafe { &*collector }
}

/// Attaches the current thread to the process-wide collector.
///
/// Attachment is reference counted, see [`Local::init`].
#[inline]
pub fn attach_thread() {
    LOCAL.with(|local| local.init());
}

/// Detaches the current thread from the process-wide collector.
///
/// # Panics
///
/// Panics if the thread is not attached.
#[inline]
pub fn detach_thread() {
    LOCAL.with(|local| local.fini());
}

/// Acquires a hazard pointer slot for the current thread, see
/// [`Local::guard`].
#[inline]
pub fn guard() -> Guard<'static> {
    LOCAL.with(|local| local.guard())
}

/// Fallible variant of [`guard`].
#[inline]
pub fn try_guard() -> Result<Guard<'static>, Error> {
    LOCAL.with(|local| local.try_guard())
}

/// Acquires `N` hazard pointer slots for the current thread, see
/// [`Local::guard_array`].
#[inline]
pub fn guard_array<const N: usize>() -> GuardArray<'static, N> {
    LOCAL.with(|local| local.guard_array())
}

/// Retires the given record with the default `Box` disposer, see
/// [`Local::retire`].
///
/// # Safety
///
/// See [`Local::retire`].
#[inline]
pub unsafe fn retire<T>(record: NonNull<T>) {
    LOCAL.with(|local| local.retire(record));
}

/// Retires the given record with a caller supplied disposer, see
/// [`Local::retire_with`].
///
/// # Safety
///
/// See [`Local::retire_with`].
#[inline]
pub unsafe fn retire_with<T>(record: NonNull<T>, dispose: unsafe fn(*mut T)) {
    LOCAL.with(|local| local.retire_with(record, dispose));
}

/// Forces a scan (plus help scan) on the current thread, see
/// [`Local::scan`].
#[inline]
pub fn scan() {
    LOCAL.with(|local| local.scan());
}
