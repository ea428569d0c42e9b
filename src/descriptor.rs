use std::any::type_name;
use std::mem::ManuallyDrop;
use std::ptr::{self, addr_of, addr_of_mut, NonNull};
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use super::maybe_std::{fence, AtomicBool, AtomicUsize};
use super::reclaim;

/// A count beyond this value aborts the process rather than risk wrapping around.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// The unit of `weak` held by all the strong references together.
const GROUP: usize = 1;

/// The unit of `weak` held by each weak reference.
const WEAK: usize = 2;

/// [`Disposer`] receives the managed value when its last strong reference is released.
///
/// The disposer runs on whichever thread releases the last strong reference. A disposer can
/// forward the value to another thread when the value has to be torn down there, e.g., native
/// resources owned by a UI thread.
///
/// # Examples
///
/// ```
/// use rcd::Rcref;
/// use std::sync::mpsc::channel;
///
/// let (sender, receiver) = channel();
/// let window = Rcref::with_disposer(String::from("window"), move |w: String| {
///     sender.send(w).unwrap();
/// });
/// let window_clone = window.clone();
///
/// drop(window);
/// assert!(receiver.try_recv().is_err());
///
/// drop(window_clone);
/// assert_eq!(receiver.recv().unwrap(), "window");
/// ```
pub trait Disposer<T>: Send {
    /// Disposes of the value.
    fn dispose(self, value: T);

    /// Disposes of the value where it lives.
    ///
    /// The default implementation moves the value out and passes it to [`Disposer::dispose`].
    ///
    /// # Safety
    ///
    /// `value` must point to a valid value that is never used again.
    #[inline]
    unsafe fn dispose_at(self, value: *mut T)
    where
        Self: Sized,
    {
        self.dispose(unsafe { ptr::read(value) });
    }
}

/// [`DropInPlace`] drops the value at its address, on the thread that released the last strong
/// reference.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropInPlace;

impl<T> Disposer<T> for DropInPlace {
    #[inline]
    fn dispose(self, value: T) {
        drop(value);
    }

    #[inline]
    unsafe fn dispose_at(self, value: *mut T) {
        unsafe {
            ptr::drop_in_place(value);
        }
    }
}

impl<T, F: FnOnce(T) + Send> Disposer<T> for F {
    #[inline]
    fn dispose(self, value: T) {
        self(value);
    }
}

/// [`Descriptor`] is the control block shared by every handle to one managed object.
///
/// The lowest bit of `weak` is held on behalf of all the strong references together; it is
/// cleared right after the value is disposed of, and the descriptor is deallocated when `weak`
/// drops to zero. Every weak reference adds [`WEAK`], so the number of weak references can be
/// read at any time, including while the value is being disposed of.
#[repr(C)]
pub(super) struct Descriptor {
    strong: AtomicUsize,
    weak: AtomicUsize,
    published: AtomicBool,
    vtable: &'static VTable,
}

/// Type-erased routines of the allocation headed by a [`Descriptor`].
pub(super) struct VTable {
    dispose: unsafe fn(NonNull<Descriptor>),
    deallocate: unsafe fn(NonNull<Descriptor>),
    /// Returns the address of the value, if the allocation owns it.
    value: Option<unsafe fn(NonNull<Descriptor>) -> *const ()>,
}

/// [`Combined`] allocates the value right after its [`Descriptor`].
#[repr(C)]
pub(super) struct Combined<T, D: Disposer<T>> {
    descriptor: Descriptor,
    disposer: ManuallyDrop<D>,
    value: ManuallyDrop<T>,
}

/// [`External`] is a [`Descriptor`] for a value that it does not own.
#[repr(C)]
pub(super) struct External<F: FnOnce() + Send> {
    descriptor: Descriptor,
    on_released: ManuallyDrop<F>,
}

impl Descriptor {
    #[inline]
    fn new(vtable: &'static VTable) -> Self {
        Self {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(GROUP),
            published: AtomicBool::new(false),
            vtable,
        }
    }

    /// Returns the number of strong references.
    #[inline]
    pub(super) fn strong_count(&self) -> usize {
        self.strong.load(Acquire)
    }

    /// Returns the number of weak references.
    ///
    /// The value may be stale if other threads are concurrently releasing references.
    #[inline]
    pub(super) fn weak_count(&self) -> usize {
        self.weak.load(Acquire) / WEAK
    }

    /// Returns `true` if `address` is the address of the value the descriptor owns, and the
    /// caller holds the only reference to it.
    ///
    /// The caller must own one of the strong references exclusively.
    #[inline]
    pub(super) fn is_unique(this: NonNull<Self>, address: *const ()) -> bool {
        let descriptor = unsafe { this.as_ref() };
        descriptor
            .vtable
            .value
            .is_some_and(|value| unsafe { value(this) } == address)
            && descriptor.weak.load(Acquire) == GROUP
            && descriptor.strong.load(Acquire) == 1
    }

    /// Makes the descriptor outlive every reader that may have found it in an atomic cell.
    ///
    /// Must be called before the descriptor is made reachable from an atomic cell.
    #[inline]
    pub(super) fn publish(&self) {
        if !self.published.load(Relaxed) {
            self.published.store(true, Relaxed);
        }
    }

    /// Adds a strong reference.
    ///
    /// The caller must already own a strong reference.
    #[inline]
    pub(super) fn add_strong(&self) {
        let previous = self.strong.fetch_add(1, Relaxed);
        debug_assert_ne!(previous, 0, "strong reference added to a disposed value");
        if previous > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Tries to add a strong reference, failing if the value has been disposed of.
    ///
    /// The count is never raised from zero; the loop gives up as soon as it reads zero.
    #[inline]
    pub(super) fn try_upgrade(&self) -> bool {
        let mut current = self.strong.load(Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            match self
                .strong
                .compare_exchange_weak(current, current + 1, Acquire, Relaxed)
            {
                Ok(_) => return true,
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }

    /// Adds a weak reference.
    ///
    /// The caller must already own a strong or a weak reference.
    #[inline]
    pub(super) fn add_weak(&self) {
        let previous = self.weak.fetch_add(WEAK, Relaxed);
        debug_assert_ne!(previous, 0, "weak reference added to a deallocated descriptor");
        if previous > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Tries to add a weak reference, failing if the descriptor is about to be deallocated.
    ///
    /// The caller must keep the memory of the descriptor from being reclaimed.
    #[inline]
    pub(super) fn try_add_weak(&self) -> bool {
        let mut current = self.weak.load(Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            match self
                .weak
                .compare_exchange_weak(current, current + WEAK, Acquire, Relaxed)
            {
                Ok(_) => return true,
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }

    /// Drops a strong reference.
    ///
    /// Returns `true` if the last strong reference was dropped and the value was disposed of.
    ///
    /// # Safety
    ///
    /// The caller must own a strong reference to `this`, and must not use it afterwards.
    #[inline]
    pub(super) unsafe fn release_strong(this: NonNull<Self>) -> bool {
        let (previous, vtable) = {
            let descriptor = unsafe { this.as_ref() };
            (descriptor.strong.fetch_sub(1, Release), descriptor.vtable)
        };
        debug_assert_ne!(previous, 0, "strong reference released twice");
        if previous != 1 {
            return false;
        }

        // Every write made through other strong references happens before the disposal.
        fence(Acquire);
        unsafe {
            (vtable.dispose)(this);
            Self::release_units(this, GROUP);
        }
        true
    }

    /// Drops a weak reference.
    ///
    /// Returns `true` if the descriptor was deallocated.
    ///
    /// # Safety
    ///
    /// The caller must own a weak reference to `this`, and must not use it afterwards.
    #[inline]
    pub(super) unsafe fn release_weak(this: NonNull<Self>) -> bool {
        unsafe { Self::release_units(this, WEAK) }
    }

    #[inline]
    unsafe fn release_units(this: NonNull<Self>, units: usize) -> bool {
        let previous = unsafe { this.as_ref() }.weak.fetch_sub(units, Release);
        debug_assert!(previous >= units, "weak reference released twice");
        if previous != units {
            return false;
        }

        fence(Acquire);
        if unsafe { this.as_ref() }.published.load(Relaxed) {
            // Readers of an atomic cell may still be looking at the counters.
            unsafe {
                reclaim::defer(this, Self::deallocate);
            }
        } else {
            unsafe {
                Self::deallocate(this);
            }
        }
        true
    }

    unsafe fn deallocate(this: NonNull<Self>) {
        unsafe {
            (this.as_ref().vtable.deallocate)(this);
        }

        #[cfg(test)]
        super::tests::DEALLOCATED.with(|cnt| cnt.set(cnt.get() + 1));
    }
}

impl<T, D: Disposer<T>> Combined<T, D> {
    const VTABLE: VTable = VTable {
        dispose: Self::dispose,
        deallocate: Self::deallocate,
        value: Some(Self::value),
    };

    /// Allocates a new [`Descriptor`] together with the value.
    ///
    /// Returns a pointer to the value and a pointer to the descriptor owning one strong
    /// reference.
    #[inline]
    pub(super) fn allocate(value: T, disposer: D) -> (NonNull<T>, NonNull<Descriptor>) {
        let boxed = Box::new(Self {
            descriptor: Descriptor::new(&Self::VTABLE),
            disposer: ManuallyDrop::new(disposer),
            value: ManuallyDrop::new(value),
        });
        let this = Box::into_raw(boxed);
        unsafe {
            let value_ptr = addr_of_mut!((*this).value).cast::<T>();
            (
                NonNull::new_unchecked(value_ptr),
                NonNull::new_unchecked(this).cast::<Descriptor>(),
            )
        }
    }

    unsafe fn dispose(descriptor: NonNull<Descriptor>) {
        let this = descriptor.cast::<Self>().as_ptr();
        let disposer = unsafe { ManuallyDrop::into_inner(ptr::read(addr_of!((*this).disposer))) };
        log::trace!("disposing of {}", type_name::<T>());
        unsafe {
            disposer.dispose_at(addr_of_mut!((*this).value).cast::<T>());
        }
    }

    unsafe fn deallocate(descriptor: NonNull<Descriptor>) {
        log::trace!("deallocating the descriptor of {}", type_name::<T>());
        drop(unsafe { Box::from_raw(descriptor.cast::<Self>().as_ptr()) });
    }

    unsafe fn value(descriptor: NonNull<Descriptor>) -> *const () {
        let this = descriptor.cast::<Self>().as_ptr();
        unsafe { addr_of!((*this).value).cast::<()>() }
    }
}

impl<F: FnOnce() + Send> External<F> {
    const VTABLE: VTable = VTable {
        dispose: Self::dispose,
        deallocate: Self::deallocate,
        value: None,
    };

    /// Allocates a new [`Descriptor`] for a value living somewhere else.
    ///
    /// `on_released` is invoked when the last strong reference is dropped.
    #[inline]
    pub(super) fn allocate(on_released: F) -> NonNull<Descriptor> {
        let boxed = Box::new(Self {
            descriptor: Descriptor::new(&Self::VTABLE),
            on_released: ManuallyDrop::new(on_released),
        });
        unsafe { NonNull::new_unchecked(Box::into_raw(boxed)).cast::<Descriptor>() }
    }

    unsafe fn dispose(descriptor: NonNull<Descriptor>) {
        let this = descriptor.cast::<Self>().as_ptr();
        let on_released =
            unsafe { ManuallyDrop::into_inner(ptr::read(addr_of!((*this).on_released))) };
        log::trace!("releasing an external value");
        on_released();
    }

    unsafe fn deallocate(descriptor: NonNull<Descriptor>) {
        drop(unsafe { Box::from_raw(descriptor.cast::<Self>().as_ptr()) });
    }
}
