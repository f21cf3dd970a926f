//! The collector owning the thread record registry and implementing the
//! scan and help-scan reclamation passes.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use crate::config::Config;
use crate::local::Local;
use crate::record::{Registry, ThreadRecord};

/// Monotonic source of owner tokens for claimed thread records, shared by all
/// collectors in the process (0 is reserved for "unowned").
static OWNER_TOKEN: AtomicUsize = AtomicUsize::new(1);

////////////////////////////////////////////////////////////////////////////////////////////////////
// Collector
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A hazard pointer collector.
///
/// The collector owns one thread record per attached thread and reconciles
/// the threads' retired pointers against the union of all currently published
/// hazard pointers: a retired record is only ever disposed once no hazard
/// slot in any record holds its address at the moment of the check.
///
/// Threads interact with the collector exclusively through their
/// [`Local`] handle, obtained from [`attach`][Collector::attach].
///
/// # Examples
///
/// ```
/// use std::ptr::NonNull;
/// use std::sync::atomic::{AtomicPtr, Ordering::Relaxed};
///
/// use hazptr::{Collector, Config};
///
/// let collector = Collector::new(Config::new());
/// let local = collector.attach();
///
/// let shared = AtomicPtr::new(Box::into_raw(Box::new(1)));
///
/// let guard = local.guard();
/// let ptr = guard.protect(&shared);
/// assert_eq!(unsafe { *ptr }, 1);
/// drop(guard);
///
/// // unlink and retire the value, then force its reclamation
/// let unlinked = shared.swap(core::ptr::null_mut(), Relaxed);
/// unsafe { local.retire(NonNull::new(unlinked).unwrap()) };
/// local.scan();
/// ```
#[derive(Debug)]
pub struct Collector {
    registry: Registry,
    config: Config,
}

/***** impl inherent ******************************************************************************/

impl Collector {
    /// Creates a new [`Collector`] for the given `config`.
    ///
    /// All automatically chosen parameters are resolved at this point, see
    /// [`Config`] for the rules.
    #[inline]
    pub fn new(config: Config) -> Self {
        Self { registry: Registry::new(), config: config.resolve() }
    }

    /// Returns the resolved [`Config`] of this collector.
    #[inline]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Attaches the calling thread and returns its [`Local`] handle.
    #[inline]
    pub fn attach(&self) -> Local<'_> {
        let local = Local::new(self);
        local.init();
        local
    }

    /// Claims a thread record for the calling thread.
    #[inline]
    pub(crate) fn acquire_record(&self) -> &ThreadRecord {
        let owner = OWNER_TOKEN.fetch_add(1, Relaxed);
        self.registry.acquire(owner, &self.config)
    }

    /// Releases `record` back into the free pool, with all hazard slots
    /// cleared but any pending retired pointers left in place.
    #[inline]
    pub(crate) fn release_record(&self, record: &ThreadRecord) {
        self.registry.release(record);
    }

    /// Returns the snapshot size the configuration is sized for.
    #[inline]
    pub(crate) fn snapshot_capacity(&self) -> usize {
        self.config.hazard_pointers() * self.config.max_threads()
    }

    /// Runs the scan algorithm for `record`, reclaiming every retired record
    /// that is not currently protected by any thread.
    ///
    /// `snapshot` is the storage for the collected hazard pointer values; the
    /// scan strategy of the caller decides whether it is freshly allocated or
    /// a reused per-thread buffer.
    pub(crate) fn scan_with(&self, record: &ThreadRecord, snapshot: &mut Vec<usize>) {
        // collect phase: gather all currently published hazard pointers,
        // including those of free records (their slots are guaranteed clear)
        // and our own
        snapshot.clear();
        for other in self.registry.iter() {
            for slot in other.hazards().iter() {
                let protected = slot.get();
                if !protected.is_null() {
                    snapshot.push(protected as usize);
                }
            }
        }

        snapshot.sort_unstable();

        // partition phase: operate on the detached buffer so that disposers
        // which themselves retire records push into the (emptied) live list
        // instead of aliasing the one being partitioned
        let mut entries = unsafe { record.retired_mut() }.take_all();
        let mut index = 0;
        while index < entries.len() {
            if snapshot.binary_search(&entries[index].address()).is_ok() {
                // still protected, keep for the next scan
                index += 1;
            } else {
                let unprotected = entries.swap_remove(index);
                unsafe { unprotected.dispose() };
            }
        }

        // replace phase: survivors plus anything retired by disposers become
        // the thread's new retired buffer
        unsafe { record.retired_mut() }.replace(entries);
    }

    /// Adopts the pending retired pointers of parked (detached) records into
    /// `record`'s own buffer, so they keep being reconciled instead of being
    /// stranded until collector teardown.
    ///
    /// This is best-effort in the same way the scan trigger is: a parked
    /// record is visited by the next capacity-triggered or forced scan of any
    /// live thread, but no fixed bound on the number of scan cycles is
    /// guaranteed.
    pub(crate) fn help_scan(&self, record: &ThreadRecord, snapshot: &mut Vec<usize>) {
        for other in self.registry.iter() {
            if ptr::eq(other, record) {
                continue;
            }

            // claim the parked record so neither an attaching thread nor
            // another helper can touch its buffer while it is drained
            if !other.is_free() || !other.try_claim(record.owner()) {
                continue;
            }

            loop {
                let adopted = unsafe { other.retired_mut() }.pop();
                let retired = match adopted {
                    Some(retired) => retired,
                    None => break,
                };

                let full = {
                    let mine = unsafe { record.retired_mut() };
                    mine.push(retired);
                    mine.is_full()
                };
                if full {
                    self.scan_with(record, snapshot);
                }
            }

            other.release();
        }
    }

    /// Forcibly detaches every still attached thread.
    ///
    /// Teardown escape hatch for threads whose termination the caller does
    /// not control; all hazard slots are cleared in the process.
    pub(crate) fn detach_all(&self) {
        for record in self.registry.iter() {
            if !record.is_free() {
                self.registry.release(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;
    use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
    use std::sync::Arc;

    use super::Collector;
    use crate::config::ConfigBuilder;
    use crate::retired::Retired;

    struct DropCount(Arc<AtomicUsize>);
    impl Drop for DropCount {
        fn drop(&mut self) {
            self.0.fetch_add(1, Relaxed);
        }
    }

    fn retire_counted(counter: &Arc<AtomicUsize>) -> (NonNull<DropCount>, Retired) {
        let ptr = NonNull::from(Box::leak(Box::new(DropCount(Arc::clone(counter)))));
        (ptr, unsafe { Retired::new(ptr) })
    }

    #[test]
    fn scan_keeps_protected() {
        let collector =
            Collector::new(ConfigBuilder::new().hazard_pointers(1).max_threads(2).build());
        let reader = collector.acquire_record();
        let writer = collector.acquire_record();

        let disposed = Arc::new(AtomicUsize::new(0));
        let (ptr, retired) = retire_counted(&disposed);

        let slot = reader.hazards().alloc().unwrap();
        reader.hazards().slot(slot).protect(ptr.as_ptr().cast());
        unsafe { writer.retired_mut() }.push(retired);

        let mut snapshot = Vec::new();
        collector.scan_with(writer, &mut snapshot);
        assert_eq!(disposed.load(Relaxed), 0);
        assert_eq!(unsafe { writer.retired_mut() }.len(), 1);

        // releasing the guard makes the next scan dispose the record
        reader.hazards().free(slot);
        collector.scan_with(writer, &mut snapshot);
        assert_eq!(disposed.load(Relaxed), 1);
        assert!(unsafe { writer.retired_mut() }.is_empty());

        collector.release_record(reader);
        collector.release_record(writer);
    }

    #[test]
    fn help_scan_adopts_parked_leftovers() {
        let collector =
            Collector::new(ConfigBuilder::new().hazard_pointers(2).max_threads(2).build());
        let parked = collector.acquire_record();
        let helper = collector.acquire_record();

        let disposed = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let (_, retired) = retire_counted(&disposed);
            unsafe { parked.retired_mut() }.push(retired);
        }
        collector.release_record(parked);

        let mut snapshot = Vec::new();
        collector.help_scan(helper, &mut snapshot);
        assert_eq!(unsafe { helper.retired_mut() }.len(), 3);
        assert!(unsafe { parked.retired_mut() }.is_empty());

        collector.scan_with(helper, &mut snapshot);
        assert_eq!(disposed.load(Relaxed), 3);

        collector.release_record(helper);
    }

    #[test]
    fn scan_with_reused_snapshot() {
        // the inplace strategy reuses one buffer across scans; consecutive
        // scans over changing hazard sets must not observe stale entries
        let collector =
            Collector::new(ConfigBuilder::new().hazard_pointers(2).max_threads(2).build());
        let reader = collector.acquire_record();
        let writer = collector.acquire_record();

        let disposed = Arc::new(AtomicUsize::new(0));
        let mut snapshot = Vec::with_capacity(collector.snapshot_capacity());

        let (first, retired) = retire_counted(&disposed);
        let slot = reader.hazards().alloc().unwrap();
        reader.hazards().slot(slot).protect(first.as_ptr().cast());
        unsafe { writer.retired_mut() }.push(retired);

        collector.scan_with(writer, &mut snapshot);
        assert_eq!(disposed.load(Relaxed), 0);

        // protection moves to a different record; the old one must now be
        // reclaimed even though the buffer still contains its old snapshot
        let (second, retired) = retire_counted(&disposed);
        reader.hazards().slot(slot).protect(second.as_ptr().cast());
        unsafe { writer.retired_mut() }.push(retired);

        collector.scan_with(writer, &mut snapshot);
        assert_eq!(disposed.load(Relaxed), 1);
        assert_eq!(unsafe { writer.retired_mut() }.len(), 1);

        reader.hazards().free(slot);
        collector.scan_with(writer, &mut snapshot);
        assert_eq!(disposed.load(Relaxed), 2);

        collector.release_record(reader);
        collector.release_record(writer);
    }
}
