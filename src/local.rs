//! Thread local state: the per-thread handle through which containers
//! interact with a collector.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::cell::{Cell, RefCell};
use core::ptr::NonNull;

use crate::collector::Collector;
use crate::config::ScanType;
use crate::error::Error;
use crate::guard::{Guard, GuardArray};
use crate::record::ThreadRecord;
use crate::retired::Retired;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Local
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The thread local handle binding one thread to one [`Collector`].
///
/// A [`Local`] is attached to the collector through a claimed thread
/// record; attachment is reference counted, so nested
/// [`init`][Local::init]/[`fini`][Local::fini] pairs (e.g. several containers
/// sharing one thread) are safe.
/// Dropping an attached [`Local`] detaches it.
#[derive(Debug)]
pub struct Local<'c> {
    collector: &'c Collector,
    record: Cell<Option<&'c ThreadRecord>>,
    init_count: Cell<usize>,
    /// The reused snapshot buffer of the inplace scan strategy.
    scan_cache: RefCell<Vec<usize>>,
    /// Set for the duration of a scan so that retire calls made by running
    /// disposers do not trigger nested scans.
    scanning: Cell<bool>,
}

/***** impl inherent ******************************************************************************/

impl<'c> Local<'c> {
    /// Creates a new detached [`Local`] for `collector`.
    #[inline]
    pub fn new(collector: &'c Collector) -> Self {
        Self {
            collector,
            record: Cell::new(None),
            init_count: Cell::new(0),
            scan_cache: RefCell::new(Vec::new()),
            scanning: Cell::new(false),
        }
    }

    /// Returns the [`Collector`] this handle belongs to.
    #[inline]
    pub fn collector(&self) -> &'c Collector {
        self.collector
    }

    /// Returns `true` if the handle is currently attached.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.init_count.get() > 0
    }

    /// Attaches the handle to its collector, claiming a thread record on the
    /// first call.
    ///
    /// Calls can be nested; each one must be matched by a
    /// [`fini`][Local::fini] call.
    #[inline]
    pub fn init(&self) {
        let count = self.init_count.get();
        if count == 0 {
            let record = self.collector.acquire_record();
            if self.collector.config().scan_type() == ScanType::Inplace {
                // the inplace strategy pays its one allocation here instead
                // of on every scan
                self.scan_cache.borrow_mut().reserve(self.collector.snapshot_capacity());
            }
            self.record.set(Some(record));
        }

        self.init_count.set(count + 1);
    }

    /// Detaches the handle once the innermost of the nested
    /// [`init`][Local::init] calls is balanced.
    ///
    /// The final call clears all hazard slots, runs one last scan and then
    /// releases the thread record for reuse; retired pointers that are still
    /// protected at this point stay with the parked record until another
    /// thread's help scan adopts them.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not attached.
    #[inline]
    pub fn fini(&self) {
        let count = self.init_count.get();
        if count == 0 {
            panic!("{}", Error::AlreadyDetached);
        }

        if count == 1 {
            let record = self.record();
            debug_assert_eq!(record.hazards().occupied(), 0, "thread detached with live guards");

            record.hazards().clear_all();
            self.scan();
            self.collector.release_record(record);
            self.record.set(None);
        }

        self.init_count.set(count - 1);
    }

    /// Acquires a hazard pointer slot, wrapped in an RAII [`Guard`].
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached or all of its configured hazard
    /// pointers are already in use.
    #[inline]
    pub fn guard(&self) -> Guard<'c> {
        match self.try_guard() {
            Ok(guard) => guard,
            Err(err) => panic!("{}", err),
        }
    }

    /// Fallible variant of [`guard`][Local::guard].
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached.
    #[inline]
    pub fn try_guard(&self) -> Result<Guard<'c>, Error> {
        let hazards = self.record().hazards();
        match hazards.alloc() {
            Some(index) => Ok(Guard::new(hazards, index)),
            None => Err(Error::TooFewHazardPointers),
        }
    }

    /// Acquires `N` hazard pointer slots at once, for algorithms that must
    /// hold several hazard pointers simultaneously.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached or `N` exceeds the configured
    /// number of hazard pointers per thread.
    #[inline]
    pub fn guard_array<const N: usize>(&self) -> GuardArray<'c, N> {
        if N > self.collector.config().hazard_pointers() {
            panic!("{}", Error::TooFewHazardPointers);
        }

        GuardArray::new(core::array::from_fn(|_| self.guard()))
    }

    /// Retires the given `record`, deferring its reclamation until no thread
    /// holds a hazard pointer to it anymore, at which point it is dropped as
    /// a `Box<T>`.
    ///
    /// If the thread's retired buffer is full afterwards, a scan (plus help
    /// scan) runs before this call returns.
    ///
    /// # Safety
    ///
    /// `record` must have been allocated as a `Box<T>` and must have been
    /// made unreachable for all threads before this call.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached.
    #[inline]
    pub unsafe fn retire<T>(&self, record: NonNull<T>) {
        self.retire_erased(Retired::new(record));
    }

    /// Retires the given `record` with a caller supplied disposer instead of
    /// the default `Box` drop.
    ///
    /// # Safety
    ///
    /// `record` must have been made unreachable for all threads before this
    /// call and `dispose` must be safe to invoke with it from any thread.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached.
    #[inline]
    pub unsafe fn retire_with<T>(&self, record: NonNull<T>, dispose: unsafe fn(*mut T)) {
        self.retire_erased(Retired::with_disposer(record, dispose));
    }

    /// Forces a scan (plus help scan) regardless of the retired buffer's
    /// fill level.
    ///
    /// Containers use this at destruction time to guarantee disposal
    /// ordering; it is otherwise triggered automatically by
    /// [`retire`][Local::retire].
    ///
    /// # Panics
    ///
    /// Panics if the thread is not attached.
    pub fn scan(&self) {
        let record = self.record();
        if self.scanning.replace(true) {
            // a running disposer retired enough records to fill the buffer
            // again; the enclosing scan will pick them up
            return;
        }

        match self.collector.config().scan_type() {
            ScanType::Classic => {
                let mut snapshot = Vec::with_capacity(self.collector.snapshot_capacity());
                self.collector.scan_with(record, &mut snapshot);
                self.collector.help_scan(record, &mut snapshot);
            }
            ScanType::Inplace => {
                let mut snapshot = self.scan_cache.borrow_mut();
                self.collector.scan_with(record, &mut snapshot);
                self.collector.help_scan(record, &mut snapshot);
            }
        }

        self.scanning.set(false);
    }

    #[inline]
    fn retire_erased(&self, retired: Retired) {
        let record = self.record();
        let full = {
            let list = unsafe { record.retired_mut() };
            list.push(retired);
            list.is_full()
        };

        if full {
            self.scan();
        }
    }

    #[inline]
    fn record(&self) -> &'c ThreadRecord {
        match self.record.get() {
            Some(record) => record,
            None => panic!("{}", Error::NotAttached),
        }
    }
}

/***** impl Drop **********************************************************************************/

impl Drop for Local<'_> {
    #[inline]
    fn drop(&mut self) {
        if self.init_count.get() > 0 {
            self.init_count.set(1);
            self.fini();
        }
    }
}
