//! Shared helpers for parallel writes

use std::marker::PhantomData;

/// Mutable slice that parallel workers write at disjoint positions
///
/// Segment kernels call `keep` exactly once per segment, and element
/// traversals visit each global index once, so writers never alias. The
/// wrapper carries the base address across the rayon closure boundary the
/// way the CPU kernels pass raw addresses, while tying it to the borrow of
/// the original slice.
pub(crate) struct DisjointSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: access goes through `unsafe` methods whose contract forbids two
// threads touching the same index.
unsafe impl<T: Send> Send for DisjointSlice<'_, T> {}
unsafe impl<T: Send> Sync for DisjointSlice<'_, T> {}

impl<'a, T> DisjointSlice<'a, T> {
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Store `value` at `idx`
    ///
    /// # Safety
    ///
    /// No other thread may read or write `idx` concurrently.
    #[inline]
    pub(crate) unsafe fn write(&self, idx: usize, value: T) {
        assert!(idx < self.len(), "index {idx} out of bounds for {}", self.len);
        unsafe { *self.ptr.add(idx) = value };
    }

    /// Exclusive reference to the slot at `idx`
    ///
    /// # Safety
    ///
    /// No other reference to `idx` may exist while the returned one lives.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self, idx: usize) -> &mut T {
        assert!(idx < self.len(), "index {idx} out of bounds for {}", self.len);
        unsafe { &mut *self.ptr.add(idx) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_writes() {
        let mut data = vec![0u32; 4];
        {
            let slots = DisjointSlice::new(&mut data);
            assert_eq!(slots.len(), 4);
            for i in 0..4 {
                unsafe { slots.write(i, (i * 10) as u32) };
            }
            unsafe { *slots.get_mut(1) += 1 };
        }
        assert_eq!(data, vec![0, 11, 20, 30]);
    }
}
