//! Handles compare by the address of the value, never by the value itself.
//!
//! A handle obtained by projecting a value onto its first field is equal to a handle to the
//! value; the descriptor and pointer metadata take no part in comparisons.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use super::{Rcptr, Rcref, WeakRcptr};

/// [`Address`] returns the address a handle refers to, or null.
trait Address {
    fn address(&self) -> *const ();
}

impl<T: ?Sized> Address for Rcref<T> {
    #[inline]
    fn address(&self) -> *const () {
        self.raw_handle().address()
    }
}

impl<T: ?Sized> Address for Rcptr<T> {
    #[inline]
    fn address(&self) -> *const () {
        self.raw_handle().address()
    }
}

impl<T: ?Sized> Address for WeakRcptr<T> {
    #[inline]
    fn address(&self) -> *const () {
        self.raw_handle().address()
    }
}

macro_rules! impl_cmp_between {
    ($lhs:ident, $rhs:ident) => {
        impl<T: ?Sized, U: ?Sized> PartialEq<$rhs<U>> for $lhs<T> {
            #[inline]
            fn eq(&self, other: &$rhs<U>) -> bool {
                self.address() == other.address()
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialOrd<$rhs<U>> for $lhs<T> {
            #[inline]
            fn partial_cmp(&self, other: &$rhs<U>) -> Option<Ordering> {
                self.address().partial_cmp(&other.address())
            }
        }
    };
}

macro_rules! impl_cmp {
    ($handle:ident) => {
        impl_cmp_between!($handle, Rcref);
        impl_cmp_between!($handle, Rcptr);
        impl_cmp_between!($handle, WeakRcptr);

        impl<T: ?Sized> Eq for $handle<T> {}

        impl<T: ?Sized> Ord for $handle<T> {
            #[inline]
            fn cmp(&self, other: &Self) -> Ordering {
                self.address().cmp(&other.address())
            }
        }

        impl<T: ?Sized> Hash for $handle<T> {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.address().hash(state);
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialEq<*const U> for $handle<T> {
            #[inline]
            fn eq(&self, other: &*const U) -> bool {
                self.address() == other.cast::<()>()
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialEq<*mut U> for $handle<T> {
            #[inline]
            fn eq(&self, other: &*mut U) -> bool {
                self.address() == other.cast_const().cast::<()>()
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialOrd<*const U> for $handle<T> {
            #[inline]
            fn partial_cmp(&self, other: &*const U) -> Option<Ordering> {
                self.address().partial_cmp(&other.cast::<()>())
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialOrd<*mut U> for $handle<T> {
            #[inline]
            fn partial_cmp(&self, other: &*mut U) -> Option<Ordering> {
                self.address().partial_cmp(&other.cast_const().cast::<()>())
            }
        }
    };
}

impl_cmp!(Rcref);
impl_cmp!(Rcptr);
impl_cmp!(WeakRcptr);
