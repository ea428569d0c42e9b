#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![doc = include_str!("../README.md")]

mod atomic;
pub use atomic::{Atomic, AtomicRcptr, AtomicWeakRcptr};

mod cast;
pub use cast::AsAny;

mod descriptor;
pub use descriptor::{Disposer, DropInPlace};

mod marked_ptr;
pub use marked_ptr::MarkedPtr;

mod rcptr;
pub use rcptr::{RawParts, Rcptr};

mod rcref;
pub use rcref::Rcref;

mod weak;
pub use weak::WeakRcptr;

mod compare;
mod raw;
mod reclaim;

#[cfg(feature = "loom")]
mod maybe_std {
    pub(crate) use loom::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicUsize};
}

#[cfg(not(feature = "loom"))]
mod maybe_std {
    pub(crate) use std::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicUsize};
}

#[cfg(test)]
mod tests;
