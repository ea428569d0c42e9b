//! Memory that lock-free readers of an atomic cell may still be looking at is handed to the
//! epoch-based reclaimer of [`sdd`], and freed once every [`Guard`] that could have observed it
//! is dropped.

use std::ptr::NonNull;

use sdd::Guard;

/// [`Retired`] is a pointer waiting to be reclaimed.
struct Retired<P> {
    ptr: NonNull<P>,
    reclaim: unsafe fn(NonNull<P>),
}

impl<P> Retired<P> {
    #[inline]
    unsafe fn reclaim(self) {
        unsafe {
            (self.reclaim)(self.ptr);
        }
    }
}

// The pointer is exclusively owned by the retired instance.
unsafe impl<P> Send for Retired<P> {}

/// Reclaims `ptr` after every [`Guard`] alive at the moment is dropped.
///
/// # Safety
///
/// `ptr` must be unreachable for readers that have not pinned a [`Guard`] yet, and `reclaim`
/// must be safe to call on it exactly once.
#[inline]
pub(super) unsafe fn defer<P: 'static>(ptr: NonNull<P>, reclaim: unsafe fn(NonNull<P>)) {
    unsafe {
        defer_in(&Guard::new(), ptr, reclaim);
    }
}

/// Reclaims `ptr` through an existing [`Guard`].
///
/// # Safety
///
/// See [`defer`].
#[inline]
pub(super) unsafe fn defer_in<P: 'static>(
    guard: &Guard,
    ptr: NonNull<P>,
    reclaim: unsafe fn(NonNull<P>),
) {
    let retired = Retired { ptr, reclaim };
    guard.defer_execute(move || unsafe { retired.reclaim() });
}
