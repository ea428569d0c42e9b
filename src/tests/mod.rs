use std::cell::Cell;

thread_local! {
    /// The number of descriptors deallocated by the current thread.
    pub(crate) static DEALLOCATED: Cell<usize> = const { Cell::new(0) };
}

#[cfg(feature = "loom")]
mod models;
