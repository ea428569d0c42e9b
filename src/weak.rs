use std::fmt;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::ptr::NonNull;

use super::raw::ownership::Weak;
use super::raw::RawHandle;
use super::Rcptr;

/// [`WeakRcptr`] observes a value without keeping it alive.
///
/// It has to be upgraded to an [`Rcptr`] before the value can be accessed, and the upgrade
/// fails once the last strong reference has been dropped. The descriptor outlives the value
/// as long as there are weak handles, so that they can observe the value is gone.
///
/// # Examples
///
/// ```
/// use rcd::{Rcptr, Rcref};
///
/// let r = Rcref::new(String::from("cache entry"));
/// let weak = Rcref::downgrade(&r);
/// assert_eq!(Rcptr::get(&weak.upgrade()).unwrap(), "cache entry");
///
/// drop(r);
/// assert!(weak.is_expired());
/// assert!(Rcptr::is_empty(&weak.upgrade()));
/// ```
pub struct WeakRcptr<T: ?Sized> {
    raw: RawHandle<T, Weak>,
}

impl<T: ?Sized> WeakRcptr<T> {
    /// Creates an empty [`WeakRcptr`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{Rcptr, WeakRcptr};
    ///
    /// let weak: WeakRcptr<usize> = WeakRcptr::new();
    /// assert!(weak.is_empty());
    /// assert!(Rcptr::is_empty(&weak.upgrade()));
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawHandle::empty(),
        }
    }

    /// Tries to create a strong handle to the value.
    ///
    /// Returns an empty [`Rcptr`] if the value has been disposed of or if `self` is empty.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Rcptr<T> {
        Rcptr::from_raw_handle(self.raw.upgrade())
    }

    /// Returns `true` if the [`WeakRcptr`] has never referred to a value.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns `true` if [`upgrade`](Self::upgrade) is bound to fail.
    ///
    /// `false` is only a snapshot: the last strong reference may be dropped right after.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.raw.is_empty() || self.raw.descriptor().is_some_and(|d| d.strong_count() == 0)
    }

    /// Returns the last known pointer to the value.
    ///
    /// The pointer must not be dereferenced unless the value is kept alive otherwise.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.raw.ptr()
    }

    /// Returns the number of strong references.
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.raw.descriptor().map_or(0, |d| d.strong_count())
    }

    /// Returns the number of weak references.
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.descriptor().map_or(0, |d| d.weak_count())
    }

    /// Drops the weak reference, leaving the [`WeakRcptr`] empty.
    ///
    /// Returns `true` if the descriptor was deallocated.
    #[inline]
    pub fn release(&mut self) -> bool {
        self.raw.release()
    }

    /// Returns `true` if both refer to the same address through the same descriptor.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.is_same(&other.raw)
    }

    #[inline]
    pub(super) const fn from_raw_handle(raw: RawHandle<T, Weak>) -> Self {
        Self { raw }
    }

    #[inline]
    pub(super) fn into_raw_handle(self) -> RawHandle<T, Weak> {
        self.raw
    }

    #[inline]
    pub(super) fn raw_handle(&self) -> &RawHandle<T, Weak> {
        &self.raw
    }
}

impl<T: ?Sized> Clone for WeakRcptr<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.copy(),
        }
    }

    #[inline]
    fn clone_from(&mut self, source: &Self) {
        self.raw.assign(&source.raw);
    }
}

impl<T: ?Sized> fmt::Debug for WeakRcptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakRcptr)")
    }
}

impl<T: ?Sized> Default for WeakRcptr<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<T: ?Sized + Send + Sync> Send for WeakRcptr<T> {}

unsafe impl<T: ?Sized + Send + Sync> Sync for WeakRcptr<T> {}

impl<T: ?Sized + RefUnwindSafe> UnwindSafe for WeakRcptr<T> {}
