use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::ptr::NonNull;

use super::descriptor::{Combined, Disposer, DropInPlace, External};
use super::raw::ownership::Strong;
use super::raw::RawHandle;
use super::{RawParts, Rcptr, WeakRcptr};

/// [`Rcref`] is a reference-counted handle that always refers to a value.
///
/// Cloning an [`Rcref`] adds a strong reference to the shared descriptor; the value is
/// disposed of exactly once, when the last strong reference is dropped. Methods are associated
/// functions, e.g., `Rcref::strong_count(&r)`, so that they never shadow methods of `T`.
///
/// # Examples
///
/// ```
/// use rcd::Rcref;
///
/// let r = Rcref::new(String::from("pane"));
/// let r_clone = r.clone();
/// assert_eq!(*r_clone, "pane");
/// assert_eq!(Rcref::strong_count(&r), 2);
///
/// drop(r);
/// assert_eq!(Rcref::strong_count(&r_clone), 1);
/// ```
pub struct Rcref<T: ?Sized> {
    raw: RawHandle<T, Strong>,
}

impl<T> Rcref<T> {
    /// Allocates a new value together with its descriptor.
    ///
    /// The value is dropped on the thread that releases the last strong reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    ///
    /// let r = Rcref::new(31);
    /// assert_eq!(*r, 31);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Self::with_disposer(value, DropInPlace)
    }

    /// Allocates a new value that is handed to `disposer` when the last strong reference is
    /// dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    /// use std::sync::atomic::AtomicUsize;
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// static DISPOSED: AtomicUsize = AtomicUsize::new(0);
    ///
    /// let r = Rcref::with_disposer(7_usize, |v: usize| {
    ///     DISPOSED.fetch_add(v, Relaxed);
    /// });
    /// assert_eq!(DISPOSED.load(Relaxed), 0);
    /// assert!(Rcref::release(r));
    /// assert_eq!(DISPOSED.load(Relaxed), 7);
    /// ```
    #[inline]
    pub fn with_disposer<D: Disposer<T> + 'static>(value: T, disposer: D) -> Self {
        let (ptr, descriptor) = Combined::allocate(value, disposer);
        Self {
            raw: unsafe { RawHandle::from_parts(Some(ptr), Some(descriptor)) },
        }
    }
}

impl<T: ?Sized> Rcref<T> {
    /// Creates an [`Rcref`] to a value that is not reference counted.
    ///
    /// Counts of such a handle are always `0`, and weak handles derived from it never expire.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{Rcptr, Rcref};
    ///
    /// static CONFIG: &str = "static";
    ///
    /// let r: Rcref<str> = Rcref::from_static(CONFIG);
    /// assert_eq!(&*r, "static");
    /// assert_eq!(Rcref::strong_count(&r), 0);
    /// assert!(!Rcptr::is_empty(&Rcref::downgrade(&r).upgrade()));
    /// ```
    #[inline]
    pub fn from_static(value: &'static T) -> Self {
        Self {
            raw: unsafe { RawHandle::from_parts(Some(NonNull::from(value)), None) },
        }
    }

    /// Creates an [`Rcref`] to a value owned by someone else.
    ///
    /// A descriptor is allocated to count references, but it never drops the value; instead,
    /// `on_released` is invoked when the last strong reference is dropped.
    ///
    /// # Safety
    ///
    /// The value must stay valid and must not be mutated through other means until
    /// `on_released` is invoked.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    /// use std::ptr::NonNull;
    /// use std::sync::atomic::AtomicBool;
    /// use std::sync::atomic::Ordering::Relaxed;
    ///
    /// static RELEASED: AtomicBool = AtomicBool::new(false);
    ///
    /// let value = Box::new(17);
    /// let r = unsafe {
    ///     Rcref::from_external(NonNull::from(&*value), || RELEASED.store(true, Relaxed))
    /// };
    /// assert_eq!(*r, 17);
    /// drop(r);
    /// assert!(RELEASED.load(Relaxed));
    /// assert_eq!(*value, 17);
    /// ```
    #[inline]
    pub unsafe fn from_external<F: FnOnce() + Send + 'static>(
        ptr: NonNull<T>,
        on_released: F,
    ) -> Self {
        let descriptor = External::allocate(on_released);
        Self {
            raw: unsafe { RawHandle::from_parts(Some(ptr), Some(descriptor)) },
        }
    }

    /// Takes over the reference from [`RawParts`].
    ///
    /// # Safety
    ///
    /// `parts` must have been obtained from [`Rcref::into_raw_parts`] or
    /// [`Rcptr::into_raw_parts`].
    ///
    /// # Panics
    ///
    /// Panics if `parts` is empty.
    #[inline]
    pub unsafe fn from_raw_parts(parts: RawParts<T>) -> Self {
        let raw = unsafe { parts.into_raw_handle() };
        assert!(!raw.is_empty(), "empty raw parts");
        Self { raw }
    }

    /// Releases the reference without dropping it.
    ///
    /// The reference is leaked unless the returned [`RawParts`] are passed to
    /// [`Rcref::from_raw_parts`] or [`Rcptr::from_raw_parts`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    ///
    /// let r = Rcref::new(3);
    /// let parts = Rcref::into_raw_parts(r);
    /// let r = unsafe { Rcref::from_raw_parts(parts) };
    /// assert_eq!(Rcref::strong_count(&r), 1);
    /// ```
    #[inline]
    pub fn into_raw_parts(this: Self) -> RawParts<T> {
        RawParts::from_raw_handle(this.raw)
    }

    /// Drops the reference.
    ///
    /// Returns `true` if the last strong reference was dropped and the value was disposed of.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    ///
    /// let r = Rcref::new(5);
    /// let r_clone = r.clone();
    /// assert!(!Rcref::release(r));
    /// assert!(Rcref::release(r_clone));
    /// ```
    #[inline]
    #[must_use = "use `drop` if the result is not needed"]
    pub fn release(mut this: Self) -> bool {
        this.raw.release()
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

    /// Returns a pointer to the value.
    ///
    /// [`Rcptr::as_ptr`] and [`WeakRcptr::as_ptr`] return the same pointer wrapped in an
    /// [`Option`].
    #[inline]
    pub fn as_ptr(this: &Self) -> NonNull<T> {
        match this.raw.ptr() {
            Some(ptr) => ptr,
            None => unreachable!("Rcref is never empty"),
        }
    }

    /// Returns `true` if both refer to the same address through the same descriptor.
    ///
    /// `==` only compares addresses.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.is_same(&other.raw)
    }

    /// Returns a mutable reference to the value if there are no other references to it.
    ///
    /// Always `None` for values that the descriptor does not own, and for handles derived
    /// through [`Rcref::map`] or [`Rcref::project`] that point anywhere but the value itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    ///
    /// let mut r = Rcref::new(1);
    /// *Rcref::get_mut(&mut r).unwrap() += 1;
    /// assert_eq!(*r, 2);
    ///
    /// let weak = Rcref::downgrade(&r);
    /// assert!(Rcref::get_mut(&mut r).is_none());
    /// drop(weak);
    /// assert!(Rcref::get_mut(&mut r).is_some());
    /// ```
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        this.raw.get_mut()
    }

    /// Creates a weak handle to the value.
    #[inline]
    pub fn downgrade(this: &Self) -> WeakRcptr<T> {
        WeakRcptr::from_raw_handle(this.raw.downgrade())
    }

    #[inline]
    pub(super) fn from_raw_handle(raw: RawHandle<T, Strong>) -> Self {
        debug_assert!(!raw.is_empty());
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

impl<T: ?Sized> AsRef<T> for Rcref<T> {
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Borrow<T> for Rcref<T> {
    #[inline]
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Clone for Rcref<T> {
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

impl<T: ?Sized + fmt::Debug> fmt::Debug for Rcref<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Rcref<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized> fmt::Pointer for Rcref<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::as_ptr(self), f)
    }
}

impl<T: ?Sized> Deref for Rcref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { Self::as_ptr(self).as_ref() }
    }
}

impl<T: ?Sized> TryFrom<Rcptr<T>> for Rcref<T> {
    type Error = Rcptr<T>;

    #[inline]
    fn try_from(rcptr: Rcptr<T>) -> Result<Self, Self::Error> {
        if Rcptr::is_empty(&rcptr) {
            Err(rcptr)
        } else {
            Ok(Self::from_raw_handle(rcptr.into_raw_handle()))
        }
    }
}

unsafe impl<T: ?Sized + Send + Sync> Send for Rcref<T> {}

unsafe impl<T: ?Sized + Send + Sync> Sync for Rcref<T> {}

impl<T: ?Sized + RefUnwindSafe> UnwindSafe for Rcref<T> {}
