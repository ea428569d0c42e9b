use std::any::{type_name, Any};
use std::ptr::NonNull;

use super::{Rcptr, Rcref, WeakRcptr};

/// [`AsAny`] exposes the concrete type behind a trait object to [`Rcref::downcast`] and
/// [`Rcptr::downcast`].
///
/// It is implemented for every sized `'static` type and for `dyn Any`; a trait opts its trait
/// objects in by naming [`AsAny`] as a supertrait.
///
/// # Examples
///
/// ```
/// use rcd::{AsAny, Rcptr, Rcref};
///
/// trait Pane: AsAny {
///     fn title(&self) -> &str;
/// }
///
/// struct Button(&'static str);
/// impl Pane for Button {
///     fn title(&self) -> &str {
///         self.0
///     }
/// }
///
/// struct Label;
///
/// let button = Rcref::new(Button("OK"));
/// let pane: Rcref<dyn Pane> = Rcref::map(&button, |b| b as &dyn Pane);
/// assert_eq!(pane.title(), "OK");
///
/// assert!(Rcref::downcast::<Button>(&pane) == button);
/// assert!(Rcptr::is_empty(&Rcref::downcast::<Label>(&pane)));
/// ```
pub trait AsAny: Any {
    /// Returns `self` as [`Any`].
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AsAny for dyn Any {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AsAny for dyn Any + Send {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AsAny for dyn Any + Send + Sync {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: ?Sized> Rcref<T> {
    /// Creates an [`Rcref`] to a view of the value that shares the descriptor.
    ///
    /// The view can be anything reachable from `&T` for as long as the value lives: a field,
    /// a trait object, or a `'static` value. The new handle keeps the whole value alive.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    /// use std::fmt::Debug;
    ///
    /// struct Window {
    ///     title: String,
    ///     id: u32,
    /// }
    ///
    /// let window = Rcref::new(Window { title: String::from("main"), id: 3 });
    /// let title: Rcref<str> = Rcref::map(&window, |w| w.title.as_str());
    /// let id: Rcref<dyn Debug> = Rcref::map(&window, |w| &w.id as &dyn Debug);
    /// assert_eq!(Rcref::strong_count(&window), 3);
    ///
    /// drop(window);
    /// assert_eq!(&*title, "main");
    /// assert_eq!(format!("{id:?}"), "3");
    /// ```
    #[inline]
    pub fn map<U: ?Sized, F: FnOnce(&T) -> &U>(this: &Self, f: F) -> Rcref<U> {
        let ptr = NonNull::from(f(&**this));
        Rcref::from_raw_handle(unsafe { this.raw_handle().project(Some(ptr)) })
    }

    /// Converts the [`Rcref`] into an [`Rcref`] to a view of the value.
    ///
    /// The reference is transferred to the returned handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    ///
    /// let pair = Rcref::new((String::from("left"), String::from("right")));
    /// let right = Rcref::into_map(pair, |p| &p.1);
    /// assert_eq!(*right, "right");
    /// assert_eq!(Rcref::strong_count(&right), 1);
    /// ```
    #[inline]
    pub fn into_map<U: ?Sized, F: FnOnce(&T) -> &U>(this: Self, f: F) -> Rcref<U> {
        let ptr = NonNull::from(f(&*this));
        Rcref::from_raw_handle(unsafe { this.into_raw_handle().into_projected(Some(ptr)) })
    }

    /// Creates an [`Rcref`] to `member` that shares the descriptor of `this`.
    ///
    /// # Safety
    ///
    /// `member` must point to a value that stays valid and unaliased by mutable references for
    /// as long as the value `this` refers to, typically a field of it.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcref;
    /// use std::ptr::NonNull;
    ///
    /// let array = Rcref::new([1, 2, 3]);
    /// let last = unsafe { Rcref::project(&array, NonNull::from(&array[2])) };
    /// drop(array);
    /// assert_eq!(*last, 3);
    /// ```
    #[inline]
    pub unsafe fn project<U: ?Sized>(this: &Self, member: NonNull<U>) -> Rcref<U> {
        Rcref::from_raw_handle(unsafe { this.raw_handle().project(Some(member)) })
    }

    /// Reinterprets the [`Rcref`] as an [`Rcref`] to `U`.
    ///
    /// # Safety
    ///
    /// The value must be a valid `U`, e.g., `T` and `U` are `#[repr(transparent)]` wrappers of
    /// the same type.
    #[inline]
    pub unsafe fn cast<U>(this: &Self) -> Rcref<U> {
        let ptr = Self::as_ptr(this).cast::<U>();
        Rcref::from_raw_handle(unsafe { this.raw_handle().project(Some(ptr)) })
    }

    /// Returns a mutable reference to the value regardless of other references.
    ///
    /// # Safety
    ///
    /// No other reference to the value may be used while the returned reference is alive.
    #[inline]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        unsafe { &mut *Self::as_ptr(this).as_ptr() }
    }
}

impl<T: ?Sized + AsAny> Rcref<T> {
    /// Creates an [`Rcptr`] to the value if its concrete type is `U`.
    ///
    /// Returns an empty [`Rcptr`] that owns no reference if the type does not match.
    #[inline]
    pub fn downcast<U: Any>(this: &Self) -> Rcptr<U> {
        match <T as AsAny>::as_any(&**this).downcast_ref::<U>() {
            Some(value) => {
                let ptr = NonNull::from(value);
                Rcptr::from_raw_handle(unsafe { this.raw_handle().project(Some(ptr)) })
            }
            None => {
                log::debug!("{} is not {}", type_name::<T>(), type_name::<U>());
                Rcptr::null()
            }
        }
    }
}

impl<T: ?Sized> Rcptr<T> {
    /// Creates an [`Rcptr`] to a view of the value that shares the descriptor.
    ///
    /// Returns an empty [`Rcptr`] if `this` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcptr;
    ///
    /// let p = Rcptr::new((1, String::from("second")));
    /// let second = Rcptr::map(&p, |v| &v.1);
    /// assert_eq!(*second, "second");
    ///
    /// let empty: Rcptr<(u8, String)> = Rcptr::null();
    /// assert!(Rcptr::is_empty(&Rcptr::map(&empty, |v| &v.1)));
    /// ```
    #[inline]
    pub fn map<U: ?Sized, F: FnOnce(&T) -> &U>(this: &Self, f: F) -> Rcptr<U> {
        let ptr = Self::get(this).map(|value| NonNull::from(f(value)));
        Rcptr::from_raw_handle(unsafe { this.raw_handle().project(ptr) })
    }

    /// Converts the [`Rcptr`] into an [`Rcptr`] to a view of the value.
    ///
    /// The reference is transferred to the returned handle.
    #[inline]
    pub fn into_map<U: ?Sized, F: FnOnce(&T) -> &U>(this: Self, f: F) -> Rcptr<U> {
        let ptr = Self::get(&this).map(|value| NonNull::from(f(value)));
        Rcptr::from_raw_handle(unsafe { this.into_raw_handle().into_projected(ptr) })
    }

    /// Creates an [`Rcptr`] to `member` that shares the descriptor of `this`.
    ///
    /// Returns an empty [`Rcptr`] if `this` is empty.
    ///
    /// # Safety
    ///
    /// See [`Rcref::project`].
    #[inline]
    pub unsafe fn project<U: ?Sized>(this: &Self, member: NonNull<U>) -> Rcptr<U> {
        let ptr = (!Self::is_empty(this)).then_some(member);
        Rcptr::from_raw_handle(unsafe { this.raw_handle().project(ptr) })
    }

    /// Reinterprets the [`Rcptr`] as an [`Rcptr`] to `U`.
    ///
    /// # Safety
    ///
    /// See [`Rcref::cast`].
    #[inline]
    pub unsafe fn cast<U>(this: &Self) -> Rcptr<U> {
        let ptr = Self::as_ptr(this).map(NonNull::cast::<U>);
        Rcptr::from_raw_handle(unsafe { this.raw_handle().project(ptr) })
    }

    /// Returns a mutable reference to the value regardless of other references.
    ///
    /// # Safety
    ///
    /// See [`Rcref::get_mut_unchecked`].
    ///
    /// # Panics
    ///
    /// Panics if the [`Rcptr`] is empty.
    #[inline]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        match Self::as_ptr(this) {
            Some(ptr) => unsafe { &mut *ptr.as_ptr() },
            None => panic!("dereferenced an empty Rcptr"),
        }
    }
}

impl<T: ?Sized + AsAny> Rcptr<T> {
    /// Creates an [`Rcptr`] to the value if its concrete type is `U`.
    ///
    /// Returns an empty [`Rcptr`] that owns no reference if `this` is empty or the type does
    /// not match.
    ///
    /// # Examples
    ///
    /// ```
    /// use rcd::Rcptr;
    /// use std::any::Any;
    ///
    /// let p = Rcptr::new(5_u32);
    /// let any: Rcptr<dyn Any + Send + Sync> = Rcptr::map(&p, |v| v as &(dyn Any + Send + Sync));
    /// assert_eq!(*Rcptr::downcast::<u32>(&any), 5);
    /// assert!(Rcptr::is_empty(&Rcptr::downcast::<i64>(&any)));
    /// assert_eq!(Rcptr::strong_count(&p), 2);
    /// ```
    #[inline]
    pub fn downcast<U: Any>(this: &Self) -> Rcptr<U> {
        let Some(value) = Self::get(this) else {
            return Rcptr::null();
        };
        match <T as AsAny>::as_any(value).downcast_ref::<U>() {
            Some(value) => {
                let ptr = NonNull::from(value);
                Rcptr::from_raw_handle(unsafe { this.raw_handle().project(Some(ptr)) })
            }
            None => {
                log::debug!("{} is not {}", type_name::<T>(), type_name::<U>());
                Rcptr::null()
            }
        }
    }
}

impl<T: ?Sized> WeakRcptr<T> {
    /// Reinterprets the [`WeakRcptr`] as a [`WeakRcptr`] to `U`.
    ///
    /// Other conversions require [`upgrade`](Self::upgrade) since they need to access the
    /// value.
    ///
    /// # Safety
    ///
    /// See [`Rcref::cast`].
    #[inline]
    pub unsafe fn cast<U>(&self) -> WeakRcptr<U> {
        let ptr = self.as_ptr().map(NonNull::cast::<U>);
        WeakRcptr::from_raw_handle(unsafe { self.raw_handle().project(ptr) })
    }
}
