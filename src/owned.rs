//! Single-owner foreign allocations.
//!
//! [`ForeignBuffer`] binds one allocation from [`crate::memory`] to a Rust
//! value. It is `Live` from construction until [`ForeignBuffer::dispose`]
//! (or `Drop`) moves it to `Disposed`; release happens exactly once and
//! leaves a null pointer and zero length behind.

use std::ptr;

use crate::error::{MarshalError, MarshalResult};
use crate::memory;

/// An owned block of foreign memory.
#[derive(Debug)]
pub struct ForeignBuffer {
    ptr: *mut u8,
    len: usize,
    disposed: bool,
}

// SAFETY: the buffer is the unique owner of its allocation, and the C heap
// may be released from any thread.
unsafe impl Send for ForeignBuffer {}

impl ForeignBuffer {
    /// A live buffer that owns nothing (`{null, 0}`).
    pub fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
            disposed: false,
        }
    }

    /// Allocate `len` zeroed bytes.
    pub fn zeroed(len: usize) -> MarshalResult<Self> {
        Ok(Self {
            ptr: memory::allocate_zeroed(len)?,
            len,
            disposed: false,
        })
    }

    /// Allocate and copy `bytes`. Empty input yields an empty buffer.
    pub fn from_bytes(bytes: &[u8]) -> MarshalResult<Self> {
        Ok(Self {
            ptr: memory::allocate_with(bytes)?,
            len: bytes.len(),
            disposed: false,
        })
    }

    /// Take ownership of an allocation made by [`memory::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must be null (with `len == 0`) or a live allocation of at least
    /// `len` bytes that nothing else will free.
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        Self {
            ptr,
            len,
            disposed: false,
        }
    }

    fn live(&self) -> MarshalResult<()> {
        if self.disposed {
            return Err(MarshalError::DisposedObjectAccess("foreign buffer"));
        }
        Ok(())
    }

    /// Pointer to hand to native code.
    pub fn as_ptr(&self) -> MarshalResult<*mut u8> {
        self.live()?;
        Ok(self.ptr)
    }

    /// Byte length; zero once disposed.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes (including after disposal).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the pointer field is null (always true after disposal).
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Copy the current contents out.
    pub fn to_vec(&self) -> MarshalResult<Vec<u8>> {
        self.live()?;
        // SAFETY: a live buffer owns `len` readable bytes at `ptr`.
        unsafe { memory::read(self.ptr, self.len) }
    }

    /// Overwrite bytes starting at `offset`.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> MarshalResult<()> {
        self.live()?;
        offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.len)
            .ok_or(MarshalError::BufferTooSmall {
                needed: offset.saturating_add(bytes.len()),
                available: self.len,
            })?;
        if bytes.is_empty() {
            return Ok(());
        }
        // SAFETY: bounds checked above; `ptr` is non-null because len > 0.
        unsafe { memory::write(self.ptr.add(offset), bytes) };
        Ok(())
    }

    /// Give up ownership without freeing, e.g. when native code takes over.
    pub fn into_raw(mut self) -> MarshalResult<(*mut u8, usize)> {
        self.live()?;
        let parts = (self.ptr, self.len);
        self.ptr = ptr::null_mut();
        self.len = 0;
        self.disposed = true;
        Ok(parts)
    }

    /// Release the allocation. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let ptr = std::mem::replace(&mut self.ptr, ptr::null_mut());
        self.len = 0;
        // SAFETY: `ptr` was owned exclusively by this buffer and is now
        // unreachable through it.
        unsafe { memory::free(ptr) };
    }
}

impl Default for ForeignBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{stats, AllocStats};

    #[test]
    fn test_dispose_frees_once() {
        let before = stats();
        let mut buffer = ForeignBuffer::from_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(buffer.to_vec().unwrap(), vec![1, 2, 3]);

        buffer.dispose();
        buffer.dispose();
        drop(buffer);

        assert_eq!(stats().since(before), AllocStats { allocated: 1, freed: 1 });
    }

    #[test]
    fn test_access_after_dispose() {
        let mut buffer = ForeignBuffer::from_bytes(&[1]).unwrap();
        buffer.dispose();
        assert!(buffer.is_null());
        assert_eq!(buffer.len(), 0);
        assert_eq!(
            buffer.as_ptr(),
            Err(MarshalError::DisposedObjectAccess("foreign buffer"))
        );
        assert!(buffer.to_vec().is_err());
    }

    #[test]
    fn test_drop_releases() {
        let before = stats();
        {
            let _buffer = ForeignBuffer::zeroed(32).unwrap();
        }
        assert_eq!(stats().since(before).outstanding(), 0);
        assert_eq!(stats().since(before).freed, 1);
    }

    #[test]
    fn test_empty_buffer_never_allocates() {
        let before = stats();
        let mut buffer = ForeignBuffer::from_bytes(&[]).unwrap();
        assert!(buffer.is_null());
        buffer.dispose();
        assert_eq!(stats().since(before), AllocStats::default());
    }

    #[test]
    fn test_write_at_bounds() {
        let mut buffer = ForeignBuffer::zeroed(4).unwrap();
        buffer.write_at(2, &[7, 7]).unwrap();
        assert_eq!(buffer.to_vec().unwrap(), vec![0, 0, 7, 7]);
        assert!(matches!(
            buffer.write_at(3, &[1, 1]),
            Err(MarshalError::BufferTooSmall { needed: 5, available: 4 })
        ));
        assert!(matches!(
            buffer.write_at(usize::MAX, &[1]),
            Err(MarshalError::BufferTooSmall { needed: usize::MAX, available: 4 })
        ));
    }

    #[test]
    fn test_into_raw_transfers() {
        let before = stats();
        let buffer = ForeignBuffer::from_bytes(&[5]).unwrap();
        let (ptr, len) = buffer.into_raw().unwrap();
        assert_eq!(len, 1);
        assert_eq!(stats().since(before).freed, 0);
        unsafe { memory::free(ptr) };
        assert_eq!(stats().since(before).freed, 1);
    }
}
