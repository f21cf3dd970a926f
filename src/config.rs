//! Collector configuration.

use core::fmt;

include!(concat!(env!("OUT_DIR"), "/build_constants.rs"));

const DEFAULT_MAX_THREADS: usize = 100;

////////////////////////////////////////////////////////////////////////////////////////////////////
// ScanType
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The snapshot storage strategy used by the scan algorithm.
///
/// Both strategies run the same collect/partition/replace algorithm and differ
/// only in where the snapshot of currently protected pointers is kept.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScanType {
    /// A fresh buffer is allocated for every scan and dropped afterwards.
    Classic,
    /// A per-thread buffer sized for the worst case
    /// (`hazard_pointers * max_threads`) is allocated once when the thread
    /// attaches and reused for every scan, so scanning itself never
    /// allocates.
    Inplace,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Config
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A type containing the tunable parameters of a [`Collector`][crate::Collector].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    hazard_pointers: usize,
    max_threads: usize,
    max_retired: usize,
    scan_type: ScanType,
}

/***** impl Default *******************************************************************************/

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/***** impl inherent ******************************************************************************/

impl Config {
    /// Creates a new default [`Config`].
    ///
    /// The default hazard pointer count can be overridden at build time
    /// through the `HAZPTR_DEFAULT_HAZARD_POINTERS` environment variable.
    #[inline]
    pub const fn new() -> Self {
        Self {
            hazard_pointers: DEFAULT_HAZARD_POINTERS,
            max_threads: DEFAULT_MAX_THREADS,
            max_retired: 0,
            scan_type: ScanType::Inplace,
        }
    }

    /// Returns the number of hazard pointers available to each thread.
    #[inline]
    pub fn hazard_pointers(&self) -> usize {
        self.hazard_pointers
    }

    /// Returns the number of threads the collector is sized for.
    ///
    /// This is a sizing promise rather than an enforced limit: the registry
    /// grows beyond it if more threads attach simultaneously, but the bound
    /// on un-reclaimed memory only holds while the promise does.
    #[inline]
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Returns the capacity of each thread's retired pointer buffer.
    #[inline]
    pub fn max_retired(&self) -> usize {
        self.max_retired
    }

    /// Returns the configured [`ScanType`].
    #[inline]
    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    /// Resolves all automatically chosen parameters into concrete values.
    ///
    /// The retired buffer capacity must exceed `hazard_pointers * max_threads`
    /// or a scan of a full buffer could fail to reclaim anything; any smaller
    /// (or unset) value is replaced by twice that product.
    #[inline]
    pub(crate) fn resolve(mut self) -> Self {
        if self.hazard_pointers == 0 {
            self.hazard_pointers = DEFAULT_HAZARD_POINTERS;
        }

        if self.max_threads == 0 {
            self.max_threads = DEFAULT_MAX_THREADS;
        }

        let floor = self.hazard_pointers * self.max_threads;
        if self.max_retired <= floor {
            self.max_retired = 2 * floor;
        }

        self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ConfigBuilder
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A builder type for gradually initializing a [`Config`].
#[derive(Copy, Clone, Debug, Default)]
pub struct ConfigBuilder {
    hazard_pointers: Option<usize>,
    max_threads: Option<usize>,
    max_retired: Option<usize>,
    scan_type: Option<ScanType>,
}

/***** impl inherent ******************************************************************************/

impl ConfigBuilder {
    /// Creates a new [`ConfigBuilder`] with all parameters unset.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of hazard pointers available to each thread.
    #[inline]
    pub fn hazard_pointers(mut self, count: usize) -> Self {
        self.hazard_pointers = Some(count);
        self
    }

    /// Sets the number of threads the collector is sized for.
    #[inline]
    pub fn max_threads(mut self, count: usize) -> Self {
        self.max_threads = Some(count);
        self
    }

    /// Sets the capacity of each thread's retired pointer buffer.
    ///
    /// Values not exceeding `hazard_pointers * max_threads` are replaced by
    /// twice that product when the collector is created.
    #[inline]
    pub fn max_retired(mut self, count: usize) -> Self {
        self.max_retired = Some(count);
        self
    }

    /// Sets the [`ScanType`].
    #[inline]
    pub fn scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = Some(scan_type);
        self
    }

    /// Consumes the builder and returns the resulting [`Config`].
    #[inline]
    pub fn build(self) -> Config {
        let default = Config::new();
        Config {
            hazard_pointers: self.hazard_pointers.unwrap_or(default.hazard_pointers),
            max_threads: self.max_threads.unwrap_or(default.max_threads),
            max_retired: self.max_retired.unwrap_or(default.max_retired),
            scan_type: self.scan_type.unwrap_or(default.scan_type),
        }
    }
}

/***** impl Display *******************************************************************************/

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hazard pointers x {} threads, {} retired (scan: {:?})",
            self.hazard_pointers, self.max_threads, self.max_retired, self.scan_type
        )
    }
}
