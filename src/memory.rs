//! Unmanaged memory primitives.
//!
//! Memory handed to a Cryptoki library has to come from the C heap, so this
//! module is a thin layer over `malloc`/`free`. It tracks no ownership: the
//! caller decides who frees what (see [`crate::owned::ForeignBuffer`]).
//!
//! # Example
//!
//! ```ignore
//! use ck_marshal::memory;
//!
//! let ptr = memory::allocate(4)?;
//! unsafe {
//!     memory::write(ptr, &[1, 2, 3, 4]);
//!     assert_eq!(memory::read(ptr, 4)?, vec![1, 2, 3, 4]);
//!     memory::free(ptr);
//! }
//! ```

use std::cell::Cell;
use std::ptr;

use crate::error::{MarshalError, MarshalResult};
use crate::logging::trace;

thread_local! {
    static ALLOCATED: Cell<usize> = const { Cell::new(0) };
    static FREED: Cell<usize> = const { Cell::new(0) };
}

/// Allocation counters for the current thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful non-empty allocations.
    pub allocated: usize,
    /// Non-null frees.
    pub freed: usize,
}

impl AllocStats {
    /// Allocations not yet freed.
    pub fn outstanding(&self) -> usize {
        self.allocated.saturating_sub(self.freed)
    }

    /// Counter deltas since an earlier snapshot.
    pub fn since(&self, earlier: AllocStats) -> AllocStats {
        AllocStats {
            allocated: self.allocated.saturating_sub(earlier.allocated),
            freed: self.freed.saturating_sub(earlier.freed),
        }
    }
}

/// Snapshot of the current thread's counters.
pub fn stats() -> AllocStats {
    AllocStats {
        allocated: ALLOCATED.with(Cell::get),
        freed: FREED.with(Cell::get),
    }
}

/// Allocate `size` bytes of foreign memory.
///
/// A zero-byte request returns a null pointer without touching the heap, so
/// an empty value is always represented as `{null, 0}`.
pub fn allocate(size: usize) -> MarshalResult<*mut u8> {
    if size == 0 {
        return Ok(ptr::null_mut());
    }
    // SAFETY: malloc has no preconditions; a null result is handled below.
    let ptr = unsafe { libc::malloc(size) }.cast::<u8>();
    if ptr.is_null() {
        return Err(MarshalError::AllocationFailure { size });
    }
    ALLOCATED.with(|c| c.set(c.get() + 1));
    trace!(size, ptr = ?ptr, "allocated foreign memory");
    Ok(ptr)
}

/// Allocate and fill with `bytes`.
pub fn allocate_with(bytes: &[u8]) -> MarshalResult<*mut u8> {
    let ptr = allocate(bytes.len())?;
    // SAFETY: `ptr` is either null with an empty slice or a fresh allocation
    // of exactly `bytes.len()` bytes.
    unsafe { write(ptr, bytes) };
    Ok(ptr)
}

/// Allocate `size` zeroed bytes.
pub fn allocate_zeroed(size: usize) -> MarshalResult<*mut u8> {
    let ptr = allocate(size)?;
    if !ptr.is_null() {
        // SAFETY: fresh allocation of `size` bytes.
        unsafe { ptr::write_bytes(ptr, 0, size) };
    }
    Ok(ptr)
}

/// Copy `bytes` to `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for `bytes.len()` writes. Empty slices are a no-op
/// and accept a null pointer.
pub unsafe fn write(ptr: *mut u8, bytes: &[u8]) {
    if bytes.is_empty() || ptr.is_null() {
        return;
    }
    // SAFETY: guaranteed by the caller.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
}

/// Copy `len` bytes out of foreign memory.
///
/// # Safety
///
/// `ptr` must be valid for `len` reads when non-null.
pub unsafe fn read(ptr: *const u8, len: usize) -> MarshalResult<Vec<u8>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if ptr.is_null() {
        return Err(MarshalError::ArgumentNull(format!(
            "pointer to {len} bytes"
        )));
    }
    // SAFETY: guaranteed by the caller.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
}

/// Release foreign memory. A null pointer is a no-op.
///
/// # Safety
///
/// `ptr` must be null or come from [`allocate`] and not have been freed.
pub unsafe fn free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    trace!(ptr = ?ptr, "freeing foreign memory");
    // SAFETY: guaranteed by the caller.
    unsafe { libc::free(ptr.cast::<libc::c_void>()) };
    FREED.with(|c| c.set(c.get() + 1));
}
