//! Shared, copy-on-write binary buffer.

use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::DbError;

static EMPTY: LazyLock<Arc<BlobBuffer>> = LazyLock::new(|| {
    Arc::new(BlobBuffer {
        data: Vec::new(),
        frozen: true,
    })
});

/// Byte storage behind a [`Blob`]. The shared empty instance is frozen and
/// rejects in-place writes.
#[derive(Debug)]
struct BlobBuffer {
    data: Vec<u8>,
    frozen: bool,
}

impl Clone for BlobBuffer {
    // copies are always private and writable
    fn clone(&self) -> Self {
        BlobBuffer {
            data: self.data.clone(),
            frozen: false,
        }
    }
}

impl BlobBuffer {
    fn assign(&mut self, data: &[u8]) -> Result<(), DbError> {
        self.ensure_writable()?;
        self.data.clear();
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn reserve(&mut self, len: usize, shrink: bool) -> Result<(), DbError> {
        self.ensure_writable()?;
        if shrink && len == 0 {
            self.data = Vec::new();
            return Ok(());
        }
        if shrink {
            self.data.truncate(len);
            self.data.shrink_to(len);
        }
        if self.data.capacity() < len {
            self.data.reserve_exact(len - self.data.len());
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), DbError> {
        if self.frozen {
            Err(DbError::Usage(
                "the shared empty blob cannot be modified in place".into(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Reference-counted byte buffer.
///
/// Clones share storage. `assign` and `reserve` detach the handle onto a
/// private copy first whenever the storage is shared, so aliased blobs never
/// observe each other's writes:
/// ```rust
/// use sql_portal::Blob;
///
/// let mut a = Blob::new();
/// a.assign(b"hi");
/// let mut b = a.clone();
/// b.assign(b"yo");
/// assert_eq!(a.data(), b"hi");
/// assert_eq!(b.data(), b"yo");
/// ```
#[derive(Clone)]
pub struct Blob {
    buffer: Arc<BlobBuffer>,
}

impl Blob {
    /// An empty blob; shares the process-wide empty buffer and allocates nothing.
    #[must_use]
    pub fn new() -> Self {
        Blob {
            buffer: Arc::clone(&EMPTY),
        }
    }

    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        Blob {
            buffer: Arc::new(BlobBuffer {
                data: data.to_vec(),
                frozen: false,
            }),
        }
    }

    /// Replace the contents with `data`.
    pub fn assign(&mut self, data: &[u8]) {
        // a detached buffer is never frozen, so the write cannot fail
        let _ = Arc::make_mut(&mut self.buffer).assign(data);
    }

    /// Make room for `len` bytes. With `shrink`, contents beyond `len` are
    /// dropped and spare capacity is released; `reserve(0, true)` frees the
    /// buffer entirely.
    pub fn reserve(&mut self, len: usize, shrink: bool) {
        let _ = Arc::make_mut(&mut self.buffer).reserve(len, shrink);
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.buffer.data
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.data.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.data.capacity()
    }

    /// True when both handles point at the same storage.
    #[must_use]
    pub fn shares_buffer(&self, other: &Blob) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        match Arc::try_unwrap(self.buffer) {
            Ok(buffer) => buffer.data,
            Err(shared) => shared.data.clone(),
        }
    }
}

impl Default for Blob {
    fn default() -> Self {
        Blob::new()
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
    }
}

impl Eq for Blob {}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob").field("size", &self.size()).finish()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Blob {
            buffer: Arc::new(BlobBuffer {
                data,
                frozen: false,
            }),
        }
    }
}

impl From<&[u8]> for Blob {
    fn from(data: &[u8]) -> Self {
        Blob::from_slice(data)
    }
}
