use std::fmt;
use std::mem;
use std::ops::Deref;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::ptr::NonNull;

use super::descriptor::{Descriptor, Disposer};
use super::raw::ownership::Strong;
use super::raw::RawHandle;
use super::{Rcref, WeakRcptr};

/// [`Rcptr`] is a reference-counted handle that may be empty.
///
/// Dereferencing an empty [`Rcptr`] panics; use [`Rcptr::get`] to branch on emptiness.
///
/// # Examples
///
/// ```
/// use rcd::{Rcptr, Rcref};
///
/// let mut p: Rcptr<usize> = Rcptr::default();
/// assert!(Rcptr::is_empty(&p));
///
/// p = Rcref::new(19).into();
/// assert_eq!(*p, 19);
///
/// let taken = Rcptr::take(&mut p);
/// assert!(Rcptr::is_empty(&p));
/// assert_eq!(Rcptr::get(&taken), Some(&19));
/// ```
pub struct Rcptr<T: ?Sized> {
    raw: RawHandle<T, Strong>,
}

/// [`RawParts`] is a reference detached from its handle.
///
/// Dropping [`RawParts`] leaks the reference.
#[must_use = "the reference is leaked unless passed to `from_raw_parts`"]
pub struct RawParts<T: ?Sized> {
    ptr: Option<NonNull<T>>,
    descriptor: Option<NonNull<Descriptor>>,
}

impl<T> Rcptr<T> {
    /// Allocates a new value together with its descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcptr;
    ///
    /// let p = Rcptr::new(23);
    /// assert_eq!(*p, 23);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Rcref::new(value).into()
    }

    /// Allocates a new value that is handed to `disposer` when the last strong reference is
    /// dropped.
    #[inline]
    pub fn with_disposer<D: Disposer<T> + 'static>(value: T, disposer: D) -> Self {
        Rcref::with_disposer(value, disposer).into()
    }
}

impl<T: ?Sized> Rcptr<T> {
    /// Creates an empty [`Rcptr`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcptr;
    ///
    /// let p: Rcptr<str> = Rcptr::null();
    /// assert!(Rcptr::is_empty(&p));
    /// ```
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self {
            raw: RawHandle::empty(),
        }
    }

    /// Takes over the reference from [`RawParts`].
    ///
    /// # Safety
    ///
    /// `parts` must have been obtained from [`Rcref::into_raw_parts`] or
    /// [`Rcptr::into_raw_parts`].
    #[inline]
    pub unsafe fn from_raw_parts(parts: RawParts<T>) -> Self {
        Self {
            raw: unsafe { parts.into_raw_handle() },
        }
    }

    /// Releases the reference without dropping it, leaving the [`Rcptr`] empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcptr;
    ///
    /// let mut p = Rcptr::new(29);
    /// let parts = Rcptr::into_raw_parts(&mut p);
    /// assert!(Rcptr::is_empty(&p));
    ///
    /// let p = unsafe { Rcptr::from_raw_parts(parts) };
    /// assert_eq!(*p, 29);
    /// assert_eq!(Rcptr::strong_count(&p), 1);
    /// ```
    #[inline]
    pub fn into_raw_parts(this: &mut Self) -> RawParts<T> {
        let (ptr, descriptor) = this.raw.disown();
        RawParts { ptr, descriptor }
    }

    /// Returns `true` if the [`Rcptr`] is empty.
    #[inline]
    pub const fn is_empty(this: &Self) -> bool {
        this.raw.is_empty()
    }

    /// Returns a reference to the value, or `None` if the [`Rcptr`] is empty.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.raw.as_ref()
    }

    /// Returns a pointer to the value, or `None` if the [`Rcptr`] is empty.
    #[inline]
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.raw.ptr()
    }

    /// Drops the reference, leaving the [`Rcptr`] empty.
    ///
    /// Returns `true` if the last strong reference was dropped and the value was disposed of.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcptr;
    ///
    /// let mut p = Rcptr::new(String::from("task"));
    /// let mut p_clone = p.clone();
    /// assert!(!Rcptr::release(&mut p));
    /// assert!(Rcptr::is_empty(&p));
    /// assert!(Rcptr::release(&mut p_clone));
    /// assert!(!Rcptr::release(&mut p_clone));
    /// ```
    #[inline]
    pub fn release(this: &mut Self) -> bool {
        this.raw.release()
    }

    /// Moves the reference out, leaving the [`Rcptr`] empty.
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        mem::take(this)
    }

    /// Replaces the reference, returning the previous one.
    #[inline]
    pub fn replace(this: &mut Self, other: Self) -> Self {
        mem::replace(this, other)
    }

    /// Converts the [`Rcptr`] into an [`Rcref`], or `None` if it is empty.
    #[inline]
    pub fn into_rcref(this: Self) -> Option<Rcref<T>> {
        Rcref::try_from(this).ok()
    }

    /// Returns the number of strong references.
    #[inline]
    pub fn strong_count(this: &Self) -> usize {
        this.raw.descriptor().map_or(0, |d| d.strong_count())
    }

    /// Returns the number of weak references.
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        this.raw.descriptor().map_or(0, |d| d.weak_count())
    }

    /// Returns `true` if both refer to the same address through the same descriptor.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.is_same(&other.raw)
    }

    /// Returns a mutable reference to the value if there are no other references to it.
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        this.raw.get_mut()
    }

    /// Creates a weak handle to the value.
    ///
    /// The weak handle of an empty [`Rcptr`] is empty forever.
    #[inline]
    pub fn downgrade(this: &Self) -> WeakRcptr<T> {
        WeakRcptr::from_raw_handle(this.raw.downgrade())
    }

    #[inline]
    pub(super) const fn from_raw_handle(raw: RawHandle<T, Strong>) -> Self {
        Self { raw }
    }

    #[inline]
    pub(super) fn into_raw_handle(self) -> RawHandle<T, Strong> {
        self.raw
    }

    #[inline]
    pub(super) fn raw_handle(&self) -> &RawHandle<T, Strong> {
        &self.raw
    }
}

impl<T: ?Sized> RawParts<T> {
    /// Returns the pointer to the value.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Returns `true` if there is no reference.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline]
    pub(super) fn from_raw_handle(raw: RawHandle<T, Strong>) -> Self {
        let (ptr, descriptor) = raw.into_parts();
        Self { ptr, descriptor }
    }

    /// # Safety
    ///
    /// `self` must carry a strong reference.
    #[inline]
    pub(super) unsafe fn into_raw_handle(self) -> RawHandle<T, Strong> {
        unsafe { RawHandle::from_parts(self.ptr, self.descriptor) }
    }
}

impl<T: ?Sized> Clone for Rcptr<T> {
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

impl<T: ?Sized + fmt::Debug> fmt::Debug for Rcptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => f.debug_tuple("Rcptr").field(&value).finish(),
            None => f.write_str("Rcptr(null)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Rcptr<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.raw.address(), f)
    }
}

impl<T: ?Sized> Default for Rcptr<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for Rcptr<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the [`Rcptr`] is empty.
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self.raw.as_ref() {
            Some(value) => value,
            None => panic!("dereferenced an empty Rcptr"),
        }
    }
}

impl<T: ?Sized> From<Rcref<T>> for Rcptr<T> {
    #[inline]
    fn from(rcref: Rcref<T>) -> Self {
        Self::from_raw_handle(rcref.into_raw_handle())
    }
}

impl<T: ?Sized> From<Option<Rcref<T>>> for Rcptr<T> {
    #[inline]
    fn from(rcref: Option<Rcref<T>>) -> Self {
        rcref.map_or_else(Self::null, Self::from)
    }
}

unsafe impl<T: ?Sized + Send + Sync> Send for Rcptr<T> {}

unsafe impl<T: ?Sized + Send + Sync> Sync for Rcptr<T> {}

impl<T: ?Sized + RefUnwindSafe> UnwindSafe for Rcptr<T> {}

unsafe impl<T: ?Sized + Send + Sync> Send for RawParts<T> {}
