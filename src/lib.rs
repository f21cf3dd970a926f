//! Hazard pointer based safe memory reclamation for lock-free data
//! structures.
//!
//! Lock-free containers unlink nodes that other threads may still be
//! dereferencing, so freeing them immediately would be unsound. With hazard
//! pointers, every reader *publishes* the address it is about to dereference
//! in one of its slots and re-validates the source afterwards; writers
//! *retire* unlinked nodes into a thread local buffer and, once that buffer
//! is full, *scan* the published hazard pointers of all threads, disposing
//! exactly those retired nodes no one protects.
//!
//! The crate offers the scheme in two flavors:
//!
//! - owned [`Collector`] instances, with threads attaching explicitly via
//!   [`Collector::attach`], and
//! - a process-wide collector in the [`default`] module (requires the `std`
//!   feature), set up once via [`construct`] and torn down via
//!   [`destruct`][default::destruct], with all per-thread state kept in
//!   thread local storage.
//!
//! # Examples
//!
//! ```
//! use std::ptr::NonNull;
//! use std::sync::atomic::{AtomicPtr, Ordering::Relaxed};
//!
//! hazptr::construct(hazptr::Config::new());
//! hazptr::attach_thread();
//!
//! let shared = AtomicPtr::new(Box::into_raw(Box::new("alive")));
//!
//! {
//!     // the loaded pointer is safe to dereference for the lifetime of the
//!     // guard, even if it is concurrently unlinked and retired
//!     let guard = hazptr::default::guard();
//!     let ptr = guard.protect(&shared);
//!     assert_eq!(unsafe { *ptr }, "alive");
//! }
//!
//! let unlinked = shared.swap(std::ptr::null_mut(), Relaxed);
//! unsafe { hazptr::default::retire(NonNull::new(unlinked).unwrap()) };
//!
//! hazptr::default::scan();
//! hazptr::detach_thread();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod collector;
mod config;
mod error;
mod guard;
mod hazard;
mod local;
mod record;
mod retired;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        pub mod default;
        pub use crate::default::{attach_thread, construct, detach_thread};
    }
}

pub use crate::collector::Collector;
pub use crate::config::{Config, ConfigBuilder, ScanType};
pub use crate::error::Error;
pub use crate::guard::{Guard, GuardArray};
pub use crate::local::Local;
