use std::ffi::c_int;

/// Views `len` values at `ptr`. Null pointers and non-positive lengths give
/// an empty slice.
///
/// # Safety
///
/// A non-null `ptr` must be valid for `len` reads for the lifetime `'a`.
pub(crate) unsafe fn slice<'a, T>(ptr: *const T, len: c_int) -> &'a [T] {
    if ptr.is_null() || len <= 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len as usize)
    }
}

/// Mutable counterpart of [`slice`].
///
/// # Safety
///
/// A non-null `ptr` must be valid for `len` writes and not aliased for `'a`.
pub(crate) unsafe fn slice_mut<'a, T>(ptr: *mut T, len: c_int) -> &'a mut [T] {
    if ptr.is_null() || len <= 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(ptr, len as usize)
    }
}

/// Reads an integer passed by reference, treating null as zero.
///
/// # Safety
///
/// A non-null `ptr` must point to a readable `c_int`.
pub(crate) unsafe fn read_int(ptr: *const c_int) -> c_int {
    if ptr.is_null() {
        0
    } else {
        *ptr
    }
}

/// Copies as many leading values of `src` as fit into `dst`.
pub(crate) fn copy_to<T: Copy>(dst: &mut [T], src: &[T]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *s;
    }
}
