use std::fmt;
use std::mem::align_of;

/// [`MarkedPtr`] is a raw pointer that stores a small integer, the mark, in its least
/// significant bits.
///
/// The number of available bits is derived from the alignment of `T`: a pointer to a type
/// aligned to `8` bytes has three mark bits. Marking never changes the object the pointer
/// designates, which lets lock-free algorithms swap a pointer and its state in one atomic word.
///
/// # Examples
///
/// ```
/// use rcd::MarkedPtr;
///
/// #[repr(align(8))]
/// struct Node(u8);
///
/// let mut node = Node(11);
/// let node_ptr: *mut Node = &mut node;
/// let mut ptr = MarkedPtr::new(node_ptr);
/// assert_eq!(MarkedPtr::<Node>::mark_bits(), 3);
///
/// ptr.set_mark(5);
/// assert_eq!(ptr.get_mark(), 5);
/// assert_eq!(ptr.get_unmarked(), node_ptr);
/// assert_eq!(unsafe { (*ptr.get_unmarked()).0 }, 11);
///
/// ptr.clear_mark();
/// assert_eq!(ptr.get_mark(), 0);
/// ```
pub struct MarkedPtr<T> {
    raw: *mut T,
}

impl<T> MarkedPtr<T> {
    /// Creates a new [`MarkedPtr`] from an unmarked pointer.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `ptr` is not aligned to `T`.
    #[inline]
    #[must_use]
    pub fn new(ptr: *mut T) -> Self {
        debug_assert_eq!(ptr as usize & Self::mark_mask(), 0, "misaligned pointer");
        Self { raw: ptr }
    }

    /// Creates a [`MarkedPtr`] from a pointer value that may already carry a mark.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: *mut T) -> Self {
        Self { raw }
    }

    /// Returns the pointer value including the mark.
    #[inline]
    #[must_use]
    pub const fn into_raw(self) -> *mut T {
        self.raw
    }

    /// Returns the number of bits available for the mark.
    #[inline]
    #[must_use]
    pub const fn mark_bits() -> u32 {
        align_of::<T>().trailing_zeros()
    }

    /// Returns the bit mask covering the mark.
    #[inline]
    #[must_use]
    pub const fn mark_mask() -> usize {
        align_of::<T>() - 1
    }

    /// Returns the mark.
    #[inline]
    #[must_use]
    pub fn get_mark(self) -> usize {
        self.raw as usize & Self::mark_mask()
    }

    /// Returns the pointer without the mark.
    #[inline]
    #[must_use]
    pub fn get_unmarked(self) -> *mut T {
        self.raw.cast::<u8>().wrapping_sub(self.get_mark()).cast::<T>()
    }

    /// Returns the pointer value carrying `mark` instead of the current mark.
    ///
    /// Bits of `mark` outside [`mark_mask`](Self::mark_mask) are discarded.
    #[inline]
    #[must_use]
    pub fn get_marked(self, mark: usize) -> *mut T {
        debug_assert_eq!(mark & !Self::mark_mask(), 0, "mark out of range");
        self.get_unmarked()
            .cast::<u8>()
            .wrapping_add(mark & Self::mark_mask())
            .cast::<T>()
    }

    /// Replaces the mark.
    #[inline]
    pub fn set_mark(&mut self, mark: usize) {
        self.raw = self.get_marked(mark);
    }

    /// Erases the mark.
    #[inline]
    pub fn clear_mark(&mut self) {
        self.raw = self.get_unmarked();
    }

    /// Returns `true` if the unmarked pointer is null.
    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.get_unmarked().is_null()
    }
}

impl<T> Clone for MarkedPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MarkedPtr<T> {}

impl<T> Eq for MarkedPtr<T> {}

impl<T> PartialEq for MarkedPtr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> fmt::Debug for MarkedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkedPtr")
            .field("ptr", &self.get_unmarked())
            .field("mark", &self.get_mark())
            .finish()
    }
}
