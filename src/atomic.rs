use std::fmt;
use std::marker::PhantomData;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

use sdd::Guard;

use super::descriptor::Descriptor;
use super::maybe_std::AtomicPtr;
use super::raw::ownership::{Kind, Strong, Weak};
use super::raw::RawHandle;
use super::reclaim;
use super::{Rcptr, Rcref, WeakRcptr};

/// [`AtomicRcptr`] is an [`Rcptr`] that can be replaced and read by multiple threads at once.
pub type AtomicRcptr<T> = Atomic<T, Strong>;

/// [`AtomicWeakRcptr`] is a [`WeakRcptr`] that can be replaced and read by multiple threads at
/// once.
pub type AtomicWeakRcptr<T> = Atomic<T, Weak>;

#[allow(private_bounds)]
/// [`Atomic`] owns a reference, and allows threads to atomically exchange it without any
/// external synchronization.
///
/// The pointer to the value and the pointer to the descriptor are boxed together into an
/// immutable node, and the [`Atomic`] holds a pointer to the node, so every update is a single
/// compare-and-swap. Readers pin a [`Guard`] while they look into the node; a replaced node is
/// freed only after every such reader is gone, and so is the memory of a descriptor that has
/// ever been stored in an [`Atomic`].
pub struct Atomic<T: ?Sized, K: Kind> {
    node: AtomicPtr<Node<T>>,
    _phantom: PhantomData<(K, T)>,
}

/// [`Node`] is the reference an [`Atomic`] holds; a null node pointer stands for nothing.
struct Node<T: ?Sized> {
    ptr: NonNull<T>,
    descriptor: Option<NonNull<Descriptor>>,
}

#[allow(private_bounds)]
impl<T: ?Sized, K: Kind> Atomic<T, K> {
    /// Creates a null [`Atomic`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, AtomicWeakRcptr};
    ///
    /// let atomic_rcptr: AtomicRcptr<usize> = AtomicRcptr::null();
    /// let atomic_weak: AtomicWeakRcptr<usize> = AtomicWeakRcptr::null();
    /// assert!(atomic_rcptr.is_null());
    /// assert!(atomic_weak.is_null());
    /// ```
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self {
            node: AtomicPtr::new(ptr::null_mut()),
            _phantom: PhantomData,
        }
    }

    /// Returns `true` if the [`Atomic`] is null.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.node.load(Acquire).is_null()
    }

    /// Exchanges the references held by `self` and `other`.
    ///
    /// Each of them is updated atomically, but not both at once: another thread may observe
    /// the reference `self` held in both before the swap completes.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, Rcptr};
    ///
    /// let first = AtomicRcptr::new(1);
    /// let second = AtomicRcptr::new(2);
    /// first.swap(&second);
    /// assert_eq!(*first.load(), 2);
    /// assert_eq!(*second.load(), 1);
    ///
    /// let empty = AtomicRcptr::null();
    /// first.swap(&empty);
    /// assert!(first.is_null());
    /// assert_eq!(Rcptr::strong_count(&empty.load()), 2);
    /// ```
    #[inline]
    pub fn swap(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        let held = self.load_as::<K>();
        let displaced = other.exchange_raw(held);
        drop(self.exchange_raw(displaced));
    }

    #[inline]
    fn from_raw_handle(raw: RawHandle<T, K>) -> Self {
        Self {
            node: AtomicPtr::new(Node::publish(raw)),
            _phantom: PhantomData,
        }
    }

    #[inline]
    fn into_raw_handle(self) -> RawHandle<T, K> {
        let node = self.node.swap(ptr::null_mut(), Relaxed);
        drop(self);
        unsafe { Node::reclaim(node) }
    }

    /// Creates a new reference of kind `L` to the value.
    ///
    /// A node that fails to give out a reference has either been replaced, in which case the
    /// new node is tried, or refers to a value that is gone.
    #[inline]
    fn load_as<L: Kind>(&self) -> RawHandle<T, L> {
        let _guard = Guard::new();
        let mut current = self.node.load(Acquire);
        loop {
            let Some(node) = (unsafe { current.as_ref() }) else {
                return RawHandle::empty();
            };
            if node.descriptor.map_or(true, |d| L::try_acquire(unsafe { d.as_ref() })) {
                return unsafe { RawHandle::from_parts(Some(node.ptr), node.descriptor) };
            }

            // `current` cannot be reused while the guard is alive.
            let actual = self.node.load(Acquire);
            if actual == current {
                return RawHandle::empty();
            }
            current = actual;
        }
    }

    #[inline]
    fn exchange_raw(&self, new: RawHandle<T, K>) -> RawHandle<T, K> {
        let new = Node::publish(new);
        let guard = Guard::new();
        let old = self.node.swap(new, AcqRel);
        unsafe { Node::retire(old, &guard) }
    }

    #[inline]
    fn compare_exchange_raw(
        &self,
        current: *const (),
        new: RawHandle<T, K>,
    ) -> Result<RawHandle<T, K>, RawHandle<T, K>> {
        let new = Node::publish(new);
        let guard = Guard::new();
        let mut observed = self.node.load(Acquire);
        loop {
            if unsafe { Node::address(observed) } != current {
                // `new` has never been visible to other threads.
                return Err(unsafe { Node::reclaim(new) });
            }
            match self
                .node
                .compare_exchange_weak(observed, new, AcqRel, Acquire)
            {
                Ok(_) => return Ok(unsafe { Node::retire(observed, &guard) }),
                Err(actual) => {
                    observed = actual;
                }
            }
        }
    }
}

impl<T> AtomicRcptr<T> {
    /// Creates a new [`AtomicRcptr`] from an instance of `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::AtomicRcptr;
    ///
    /// let atomic_rcptr = AtomicRcptr::new(10);
    /// assert_eq!(*atomic_rcptr.load(), 10);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from(Rcptr::new(value))
    }
}

impl<T: ?Sized> AtomicRcptr<T> {
    /// Returns a new strong handle to the value.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, Rcptr};
    ///
    /// let atomic_rcptr = AtomicRcptr::new(String::from("queue"));
    /// let rcptr = atomic_rcptr.load();
    /// assert_eq!(*rcptr, "queue");
    /// assert_eq!(Rcptr::strong_count(&rcptr), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn load(&self) -> Rcptr<T> {
        Rcptr::from_raw_handle(self.load_as::<Strong>())
    }

    /// Replaces the reference, dropping the previous one.
    #[inline]
    pub fn store(&self, new: Rcptr<T>) {
        drop(self.exchange(new));
    }

    /// Replaces the reference and returns the previous one.
    ///
    /// The reference `new` owns is transferred to the [`AtomicRcptr`], and the reference the
    /// [`AtomicRcptr`] owned is transferred to the returned [`Rcptr`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, Rcptr};
    ///
    /// let atomic_rcptr = AtomicRcptr::new(14);
    /// let old = atomic_rcptr.exchange(Rcptr::new(15));
    /// assert_eq!(*old, 14);
    /// assert_eq!(Rcptr::strong_count(&old), 1);
    ///
    /// let old = atomic_rcptr.exchange(Rcptr::null());
    /// assert_eq!(*old, 15);
    /// assert!(atomic_rcptr.is_null());
    /// ```
    #[inline]
    pub fn exchange(&self, new: Rcptr<T>) -> Rcptr<T> {
        Rcptr::from_raw_handle(self.exchange_raw(new.into_raw_handle()))
    }

    /// Stores `new` if the [`AtomicRcptr`] refers to the same address as `current`.
    ///
    /// Returns the previously held reference, which the caller may keep or drop.
    ///
    /// Holding `current` keeps its value alive, so its address cannot be reused by another
    /// value while the comparison is pending.
    ///
    /// # Errors
    ///
    /// Returns `new` back if the addresses differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, Rcptr};
    ///
    /// let atomic_rcptr = AtomicRcptr::new(17);
    /// let current = atomic_rcptr.load();
    ///
    /// let not_current = Rcptr::new(17);
    /// let new = atomic_rcptr.compare_exchange(&not_current, Rcptr::new(18)).unwrap_err();
    /// assert_eq!(*new, 18);
    ///
    /// let old = atomic_rcptr.compare_exchange(&current, new).unwrap();
    /// assert!(old == current);
    /// assert_eq!(Rcptr::strong_count(&current), 2);
    /// assert_eq!(*atomic_rcptr.load(), 18);
    /// ```
    #[inline]
    pub fn compare_exchange(
        &self,
        current: &Rcptr<T>,
        new: Rcptr<T>,
    ) -> Result<Rcptr<T>, Rcptr<T>> {
        self.compare_exchange_raw(current.raw_handle().address(), new.into_raw_handle())
            .map(Rcptr::from_raw_handle)
            .map_err(Rcptr::from_raw_handle)
    }

    /// Stores `new` if the [`AtomicRcptr`] refers to the same address as `current`.
    ///
    /// Returns `true` if `new` was stored; the previously held reference is dropped. `new` is
    /// dropped if it was not stored.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, Rcptr};
    ///
    /// let atomic_rcptr: AtomicRcptr<usize> = AtomicRcptr::null();
    /// assert!(atomic_rcptr.compare_and_set(&Rcptr::null(), Rcptr::new(1)));
    /// assert!(!atomic_rcptr.compare_and_set(&Rcptr::null(), Rcptr::new(2)));
    /// assert_eq!(*atomic_rcptr.load(), 1);
    /// ```
    #[inline]
    pub fn compare_and_set(&self, current: &Rcptr<T>, new: Rcptr<T>) -> bool {
        self.compare_exchange(current, new).is_ok()
    }

    /// Moves the reference out, leaving the [`AtomicRcptr`] null.
    #[inline]
    #[must_use]
    pub fn take(&self) -> Rcptr<T> {
        self.exchange(Rcptr::null())
    }

    /// Creates a weak handle to the value.
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakRcptr<T> {
        WeakRcptr::from_raw_handle(self.load_as::<Weak>())
    }

    /// Converts `self` into an [`Rcptr`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicRcptr, Rcptr};
    ///
    /// let atomic_rcptr = AtomicRcptr::new(55);
    /// let rcptr = atomic_rcptr.into_rcptr();
    /// assert_eq!(*rcptr, 55);
    /// assert_eq!(Rcptr::strong_count(&rcptr), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn into_rcptr(self) -> Rcptr<T> {
        Rcptr::from_raw_handle(self.into_raw_handle())
    }
}

impl<T: ?Sized> AtomicWeakRcptr<T> {
    /// Returns a new weak handle to the value.
    #[inline]
    #[must_use]
    pub fn load(&self) -> WeakRcptr<T> {
        WeakRcptr::from_raw_handle(self.load_as::<Weak>())
    }

    /// Tries to create a strong handle to the value.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::{AtomicWeakRcptr, Rcptr, Rcref};
    ///
    /// let r = Rcref::new(3);
    /// let atomic_weak = AtomicWeakRcptr::from(Rcref::downgrade(&r));
    /// assert_eq!(*atomic_weak.upgrade(), 3);
    ///
    /// drop(r);
    /// assert!(Rcptr::is_empty(&atomic_weak.upgrade()));
    /// ```
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Rcptr<T> {
        Rcptr::from_raw_handle(self.load_as::<Strong>())
    }

    /// Replaces the reference, dropping the previous one.
    #[inline]
    pub fn store(&self, new: WeakRcptr<T>) {
        drop(self.exchange(new));
    }

    /// Replaces the reference and returns the previous one.
    #[inline]
    pub fn exchange(&self, new: WeakRcptr<T>) -> WeakRcptr<T> {
        WeakRcptr::from_raw_handle(self.exchange_raw(new.into_raw_handle()))
    }

    /// Stores `new` if the [`AtomicWeakRcptr`] refers to the same address as `current`.
    ///
    /// Returns the previously held reference.
    ///
    /// # Errors
    ///
    /// Returns `new` back if the addresses differ.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: &WeakRcptr<T>,
        new: WeakRcptr<T>,
    ) -> Result<WeakRcptr<T>, WeakRcptr<T>> {
        self.compare_exchange_raw(current.raw_handle().address(), new.into_raw_handle())
            .map(WeakRcptr::from_raw_handle)
            .map_err(WeakRcptr::from_raw_handle)
    }

    /// Stores `new` if the [`AtomicWeakRcptr`] refers to the same address as `current`.
    ///
    /// Returns `true` if `new` was stored.
    #[inline]
    pub fn compare_and_set(&self, current: &WeakRcptr<T>, new: WeakRcptr<T>) -> bool {
        self.compare_exchange(current, new).is_ok()
    }

    /// Moves the reference out, leaving the [`AtomicWeakRcptr`] null.
    #[inline]
    #[must_use]
    pub fn take(&self) -> WeakRcptr<T> {
        self.exchange(WeakRcptr::new())
    }

    /// Converts `self` into a [`WeakRcptr`].
    #[inline]
    #[must_use]
    pub fn into_weak(self) -> WeakRcptr<T> {
        WeakRcptr::from_raw_handle(self.into_raw_handle())
    }
}

impl<T: ?Sized> Node<T> {
    /// Boxes the reference `raw` owns; the node owns the reference from then on.
    #[inline]
    fn publish<K: Kind>(raw: RawHandle<T, K>) -> *mut Self {
        let (ptr, descriptor) = raw.into_parts();
        let Some(ptr) = ptr else {
            debug_assert!(descriptor.is_none());
            return ptr::null_mut();
        };
        if let Some(descriptor) = descriptor {
            unsafe { descriptor.as_ref() }.publish();
        }
        Box::into_raw(Box::new(Self { ptr, descriptor }))
    }

    /// Returns the address of the value, or null.
    ///
    /// # Safety
    ///
    /// `node` must be null or kept from being reclaimed by a [`Guard`].
    #[inline]
    unsafe fn address(node: *const Self) -> *const () {
        unsafe { node.as_ref() }.map_or(ptr::null(), |n| n.ptr.as_ptr().cast_const().cast())
    }

    /// Takes over the reference, and frees the node right away.
    ///
    /// # Safety
    ///
    /// `node` must be null or returned by [`Node::publish`], and no other thread may be
    /// looking into it.
    #[inline]
    unsafe fn reclaim<K: Kind>(node: *mut Self) -> RawHandle<T, K> {
        if node.is_null() {
            return RawHandle::empty();
        }
        let node = unsafe { Box::from_raw(node) };
        unsafe { RawHandle::from_parts(Some(node.ptr), node.descriptor) }
    }

    /// Takes over the reference, and frees the node after readers that may have found it are
    /// gone.
    ///
    /// # Safety
    ///
    /// `node` must be null or returned by [`Node::publish`], and unreachable from the
    /// [`Atomic`].
    #[inline]
    unsafe fn retire<K: Kind>(node: *mut Self, guard: &Guard) -> RawHandle<T, K> {
        let Some(node) = NonNull::new(node) else {
            return RawHandle::empty();
        };
        let (ptr, descriptor) = unsafe { (node.as_ref().ptr, node.as_ref().descriptor) };
        unsafe {
            reclaim::defer_in(guard, node.cast::<()>(), Self::free);
            RawHandle::from_parts(Some(ptr), descriptor)
        }
    }

    unsafe fn free(node: NonNull<()>) {
        drop(unsafe { Box::from_raw(node.cast::<Self>().as_ptr()) });
    }
}

impl<T: ?Sized, K: Kind> fmt::Debug for Atomic<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _guard = Guard::new();
        let address = unsafe { Node::address(self.node.load(Acquire)) };
        f.debug_tuple(if K::IS_STRONG {
            "AtomicRcptr"
        } else {
            "AtomicWeakRcptr"
        })
        .field(&address)
        .finish()
    }
}

impl<T: ?Sized, K: Kind> Default for Atomic<T, K> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Rcptr<T>> for AtomicRcptr<T> {
    #[inline]
    fn from(rcptr: Rcptr<T>) -> Self {
        Self::from_raw_handle(rcptr.into_raw_handle())
    }
}

impl<T: ?Sized> From<Rcref<T>> for AtomicRcptr<T> {
    #[inline]
    fn from(rcref: Rcref<T>) -> Self {
        Self::from_raw_handle(rcref.into_raw_handle())
    }
}

impl<T: ?Sized> From<WeakRcptr<T>> for AtomicWeakRcptr<T> {
    #[inline]
    fn from(weak: WeakRcptr<T>) -> Self {
        Self::from_raw_handle(weak.into_raw_handle())
    }
}

impl<T: ?Sized, K: Kind> Drop for Atomic<T, K> {
    #[inline]
    fn drop(&mut self) {
        let node = self.node.swap(ptr::null_mut(), Relaxed);
        drop(unsafe { Node::reclaim::<K>(node) });
    }
}

unsafe impl<T: ?Sized + Send + Sync, K: Kind> Send for Atomic<T, K> {}

unsafe impl<T: ?Sized + Send + Sync, K: Kind> Sync for Atomic<T, K> {}

impl<T: ?Sized + RefUnwindSafe, K: Kind> UnwindSafe for Atomic<T, K> {}

impl<T: ?Sized + RefUnwindSafe, K: Kind> RefUnwindSafe for Atomic<T, K> {}
