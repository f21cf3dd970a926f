//! RAII types for acquiring and releasing hazard pointer slots.

use core::sync::atomic::{
    AtomicPtr,
    Ordering::{Relaxed, SeqCst},
};

use crate::hazard::{HazardArray, HazardSlot};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Guard
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An RAII guard around one hazard pointer slot.
///
/// The slot is acquired from the thread's record on creation and released
/// (and cleared) again when the guard is dropped, on every exit path.
/// The guard borrows the collector, not the [`Local`][crate::Local] it was
/// acquired from, so the collector cannot be dropped while guards are live;
/// detaching the thread while guards are still held is a protocol violation
/// caught by a debug assertion in [`fini`][crate::Local::fini].
#[derive(Debug)]
#[must_use]
pub struct Guard<'c> {
    hazards: &'c HazardArray,
    index: usize,
}

/***** impl inherent ******************************************************************************/

impl<'c> Guard<'c> {
    #[inline]
    pub(crate) fn new(hazards: &'c HazardArray, index: usize) -> Self {
        Self { hazards, index }
    }

    /// Loads the value of `src` and publishes it in the guard's hazard slot,
    /// retrying until the published value is certain to have been observed in
    /// `src` *after* the protection became visible to all threads.
    ///
    /// Once this returns, the loaded pointer can be safely dereferenced for
    /// as long as the guard is neither dropped, cleared nor re-assigned, even
    /// if it is concurrently unlinked and retired.
    #[inline]
    pub fn protect<T>(&self, src: &AtomicPtr<T>) -> *mut T {
        let mut protected = src.load(Relaxed);
        loop {
            self.slot().protect(protected.cast());

            // (GRD:1) this `SeqCst` load is ordered after the `SeqCst` slot
            // store (HAZ:1); observing `protected` still in `src` proves the
            // value was live while the protection was already visible, which
            // closes the race with a concurrent scan
            let current = src.load(SeqCst);
            if current == protected {
                return current;
            }

            protected = current;
        }
    }

    /// Publishes `ptr` in the guard's hazard slot without validation.
    ///
    /// This only guarantees protection if `ptr` is known to be reachable
    /// (and hence not yet retired) at the time of the call, e.g. because it
    /// is already protected by another guard of the same thread.
    #[inline]
    pub fn assign<T>(&self, ptr: *mut T) {
        self.slot().protect(ptr.cast());
    }

    /// Resets the guard's hazard slot, ending the protection early.
    #[inline]
    pub fn clear(&self) {
        self.slot().clear();
    }

    #[inline]
    fn slot(&self) -> &'c HazardSlot {
        self.hazards.slot(self.index)
    }
}

/***** impl Drop **********************************************************************************/

impl Drop for Guard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.hazards.free(self.index);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// GuardArray
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An array of `N` [`Guard`]s acquired and released together.
///
/// Used by algorithms that must hold multiple hazard pointers at once, e.g.
/// protecting both the predecessor and the current node of a list traversal.
#[derive(Debug)]
#[must_use]
pub struct GuardArray<'c, const N: usize> {
    guards: [Guard<'c>; N],
}

/***** impl inherent ******************************************************************************/

impl<'c, const N: usize> GuardArray<'c, N> {
    #[inline]
    pub(crate) fn new(guards: [Guard<'c>; N]) -> Self {
        Self { guards }
    }

    /// Equivalent to [`Guard::protect`] on the guard at `index`.
    #[inline]
    pub fn protect<T>(&self, index: usize, src: &AtomicPtr<T>) -> *mut T {
        self.guards[index].protect(src)
    }

    /// Equivalent to [`Guard::assign`] on the guard at `index`.
    #[inline]
    pub fn assign<T>(&self, index: usize, ptr: *mut T) {
        self.guards[index].assign(ptr);
    }

    /// Resets all hazard slots of the array.
    #[inline]
    pub fn clear_all(&self) {
        for guard in &self.guards {
            guard.clear();
        }
    }
}

/***** impl Index *********************************************************************************/

impl<'c, const N: usize> core::ops::Index<usize> for GuardArray<'c, N> {
    type Output = Guard<'c>;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.guards[index]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::ptr;
    use std::sync::atomic::AtomicPtr;

    use crate::collector::Collector;
    use crate::config::ConfigBuilder;

    #[test]
    fn roundtrip_leaves_clean_slot() {
        let collector = Collector::new(ConfigBuilder::new().hazard_pointers(1).build());
        let local = collector.attach();

        let mut value = 1;
        let src = AtomicPtr::new(&mut value as *mut i32);

        let guard = local.guard();
        let loaded = guard.protect(&src);
        assert_eq!(loaded, src.load(std::sync::atomic::Ordering::Relaxed));

        let (hazards, index) = (guard.hazards, guard.index);
        assert!(!hazards.slot(index).get().is_null());
        drop(guard);

        let guard = local.guard();
        assert_eq!(guard.index, index);
        assert!(hazards.slot(index).get().is_null());
    }

    #[test]
    fn protect_follows_updates() {
        let collector = Collector::new(ConfigBuilder::new().build());
        let local = collector.attach();
        let guard = local.guard();

        let mut values = [1, 2];
        let src = AtomicPtr::new(&mut values[0] as *mut i32);
        assert_eq!(guard.protect(&src), &mut values[0] as *mut i32);

        src.store(&mut values[1], std::sync::atomic::Ordering::Relaxed);
        assert_eq!(guard.protect(&src), &mut values[1] as *mut i32);

        guard.clear();
        assert!(guard.slot().get().is_null());
    }

    #[test]
    fn array_uses_distinct_slots() {
        let collector = Collector::new(ConfigBuilder::new().hazard_pointers(4).build());
        let local = collector.attach();

        let array = local.guard_array::<3>();
        let mut value = 1;
        array.assign(0, &mut value as *mut i32);
        array.assign(1, &mut value as *mut i32);
        array.protect(2, &AtomicPtr::new(ptr::null_mut::<i32>()));

        let slots: HashSet<_> = (0..3).map(|i| array[i].index).collect();
        assert_eq!(slots.len(), 3);

        array.clear_all();
        assert!((0..3).all(|i| array[i].slot().get().is_null()));
    }

    #[test]
    fn exhausted_slots_fail() {
        let collector = Collector::new(ConfigBuilder::new().hazard_pointers(2).build());
        let local = collector.attach();

        let _a = local.guard();
        let _b = local.guard();
        assert!(local.try_guard().is_err());
    }

    #[test]
    #[should_panic(expected = "not enough hazard pointers")]
    fn oversized_array_fails() {
        let collector = Collector::new(ConfigBuilder::new().hazard_pointers(2).build());
        let local = collector.attach();
        let _ = local.guard_array::<3>();
    }
}
