use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use super::descriptor::Descriptor;

pub mod ownership {
    //! The kind of reference a handle owns.

    use std::ptr::NonNull;

    use crate::descriptor::Descriptor;

    pub(crate) trait Kind {
        /// `true` if the handle keeps the value alive.
        const IS_STRONG: bool;

        /// Adds a reference of this kind; the caller owns one already.
        fn acquire(descriptor: &Descriptor);

        /// Tries to add a reference of this kind without owning one.
        ///
        /// Fails if no reference of this kind can be created anymore.
        fn try_acquire(descriptor: &Descriptor) -> bool;

        /// Drops a reference of this kind.
        ///
        /// Returns `true` if it was the last one.
        unsafe fn release(descriptor: NonNull<Descriptor>) -> bool;
    }

    /// A reference that keeps the value alive.
    pub struct Strong;

    impl Kind for Strong {
        const IS_STRONG: bool = true;

        #[inline]
        fn acquire(descriptor: &Descriptor) {
            descriptor.add_strong();
        }

        #[inline]
        fn try_acquire(descriptor: &Descriptor) -> bool {
            descriptor.try_upgrade()
        }

        #[inline]
        unsafe fn release(descriptor: NonNull<Descriptor>) -> bool {
            unsafe { Descriptor::release_strong(descriptor) }
        }
    }

    /// A reference that observes the value without keeping it alive.
    pub struct Weak;

    impl Kind for Weak {
        const IS_STRONG: bool = false;

        #[inline]
        fn acquire(descriptor: &Descriptor) {
            descriptor.add_weak();
        }

        #[inline]
        fn try_acquire(descriptor: &Descriptor) -> bool {
            descriptor.try_add_weak()
        }

        #[inline]
        unsafe fn release(descriptor: NonNull<Descriptor>) -> bool {
            unsafe { Descriptor::release_weak(descriptor) }
        }
    }
}

use ownership::{Kind, Strong, Weak};

/// [`RawHandle`] is the pair of pointers every handle type is built on.
///
/// A handle without a [`Descriptor`] refers to a value that is not reference counted, or to
/// nothing if the pointer to the value is also absent. A handle with a [`Descriptor`] owns one
/// reference of kind `K`.
pub(super) struct RawHandle<T: ?Sized, K: Kind> {
    ptr: Option<NonNull<T>>,
    descriptor: Option<NonNull<Descriptor>>,
    _phantom: PhantomData<(K, T)>,
}

impl<T: ?Sized, K: Kind> RawHandle<T, K> {
    /// Creates an empty [`RawHandle`].
    #[inline]
    pub(super) const fn empty() -> Self {
        Self {
            ptr: None,
            descriptor: None,
            _phantom: PhantomData,
        }
    }

    /// Takes over a reference without adding to the count.
    ///
    /// # Safety
    ///
    /// If `descriptor` is `Some`, the caller must transfer one reference of kind `K` to it, and
    /// `ptr` must stay valid as long as the value the descriptor manages.
    #[inline]
    pub(super) const unsafe fn from_parts(
        ptr: Option<NonNull<T>>,
        descriptor: Option<NonNull<Descriptor>>,
    ) -> Self {
        Self {
            ptr,
            descriptor,
            _phantom: PhantomData,
        }
    }

    /// Returns the pointer to the value.
    #[inline]
    pub(super) const fn ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Returns the address of the value, or null.
    #[inline]
    pub(super) fn address(&self) -> *const () {
        self.ptr
            .map_or(std::ptr::null(), |p| p.as_ptr().cast_const().cast::<()>())
    }

    /// Returns a reference to the [`Descriptor`].
    #[inline]
    pub(super) fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.map(|d| unsafe { d.as_ref() })
    }

    /// Returns `true` if the [`RawHandle`] does not point to anything.
    #[inline]
    pub(super) const fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Returns `true` if both point to the same value and share the same [`Descriptor`].
    #[inline]
    pub(super) fn is_same<U: ?Sized, L: Kind>(&self, other: &RawHandle<U, L>) -> bool {
        self.address() == other.address() && self.descriptor == other.descriptor
    }

    /// Creates another reference of the same kind.
    #[inline]
    pub(super) fn copy(&self) -> Self {
        if let Some(descriptor) = self.descriptor() {
            K::acquire(descriptor);
        }
        Self {
            ptr: self.ptr,
            descriptor: self.descriptor,
            _phantom: PhantomData,
        }
    }

    /// Makes `self` refer to what `other` refers to.
    ///
    /// The new reference is added before the old one is dropped, so assigning a handle to
    /// itself or to another handle sharing the descriptor never lets the count touch zero.
    #[inline]
    pub(super) fn assign(&mut self, other: &Self) {
        let mut copied = other.copy();
        mem::swap(self, &mut copied);
        drop(copied);
    }

    /// Drops the reference and empties the [`RawHandle`].
    ///
    /// Returns `true` if it was the last reference of its kind.
    #[inline]
    pub(super) fn release(&mut self) -> bool {
        self.ptr = None;
        if let Some(descriptor) = self.descriptor.take() {
            unsafe { K::release(descriptor) }
        } else {
            false
        }
    }

    /// Empties the [`RawHandle`] without dropping the reference.
    ///
    /// The returned pair is to be passed to [`RawHandle::from_parts`].
    #[inline]
    pub(super) fn disown(&mut self) -> (Option<NonNull<T>>, Option<NonNull<Descriptor>>) {
        (self.ptr.take(), self.descriptor.take())
    }

    /// Consumes the [`RawHandle`] without dropping the reference.
    #[inline]
    pub(super) fn into_parts(mut self) -> (Option<NonNull<T>>, Option<NonNull<Descriptor>>) {
        self.disown()
    }

    /// Creates a reference to `ptr` that shares the [`Descriptor`] of `self`.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid as long as the value `self` refers to.
    #[inline]
    pub(super) unsafe fn project<U: ?Sized>(&self, ptr: Option<NonNull<U>>) -> RawHandle<U, K> {
        let copied = self.copy();
        unsafe { copied.into_projected(ptr) }
    }

    /// Converts `self` into a reference to `ptr` sharing the same [`Descriptor`].
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid as long as the value `self` refers to.
    #[inline]
    pub(super) unsafe fn into_projected<U: ?Sized>(
        self,
        ptr: Option<NonNull<U>>,
    ) -> RawHandle<U, K> {
        let (_, descriptor) = self.into_parts();
        if ptr.is_none() {
            // A reference to nothing must not keep anything alive.
            if let Some(descriptor) = descriptor {
                unsafe {
                    K::release(descriptor);
                }
            }
            return RawHandle::empty();
        }
        unsafe { RawHandle::from_parts(ptr, descriptor) }
    }
}

impl<T: ?Sized> RawHandle<T, Strong> {
    /// Creates a weak reference to the same value.
    #[inline]
    pub(super) fn downgrade(&self) -> RawHandle<T, Weak> {
        if let Some(descriptor) = self.descriptor() {
            descriptor.add_weak();
        }
        unsafe { RawHandle::from_parts(self.ptr, self.descriptor) }
    }

    /// Returns a mutable reference if `self` is the only reference to an owned value, and
    /// points to the value itself rather than to something the value refers to.
    #[inline]
    pub(super) fn get_mut(&mut self) -> Option<&mut T> {
        match (self.ptr, self.descriptor) {
            (Some(mut ptr), Some(descriptor))
                if Descriptor::is_unique(descriptor, self.address()) =>
            {
                Some(unsafe { ptr.as_mut() })
            }
            _ => None,
        }
    }

    /// Returns a shared reference to the value.
    #[inline]
    pub(super) fn as_ref(&self) -> Option<&T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }
}

impl<T: ?Sized> RawHandle<T, Weak> {
    /// Tries to create a strong reference to the same value.
    ///
    /// A weak reference to a value that is not reference counted always succeeds.
    #[inline]
    pub(super) fn upgrade(&self) -> RawHandle<T, Strong> {
        match self.descriptor() {
            Some(descriptor) if !descriptor.try_upgrade() => RawHandle::empty(),
            _ => unsafe { RawHandle::from_parts(self.ptr, self.descriptor) },
        }
    }
}

impl<T: ?Sized, K: Kind> Drop for RawHandle<T, K> {
    #[inline]
    fn drop(&mut self) {
        self.release();
    }
}
