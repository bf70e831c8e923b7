//! Keeps transient buffers (C strings, dynamic array storage) alive while a
//! native callee may still read the addresses written for them.
//!
//! Lifetime contract: buffers retained by one `flush()` are released at the
//! start of the next `flush()` on the same instance, not when native code is
//! done with them. Finish the native call that consumes a struct before
//! flushing it again, or take the buffers out with
//! [`StructInstance::pin_retained`](crate::StructInstance::pin_retained).

/// Buffers retained by the most recent flush of one instance.
#[derive(Debug, Default)]
pub struct Retention {
    buffers: Vec<Box<[u8]>>,
}

impl Retention {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `bytes` alive until the next reset. The returned slice never moves.
    pub fn retain(&mut self, bytes: Vec<u8>) -> &[u8] {
        self.buffers.push(bytes.into_boxed_slice());
        match self.buffers.last() {
            Some(kept) => kept,
            None => &[],
        }
    }

    /// Release everything retained so far. Returns how many buffers were dropped.
    pub fn reset(&mut self) -> usize {
        let released = self.buffers.len();
        self.buffers.clear();
        released
    }

    /// Move the buffers out so that the next reset does not release them.
    pub fn take(&mut self) -> PinnedBuffers {
        PinnedBuffers {
            buffers: std::mem::take(&mut self.buffers),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(|b| b.len()).sum()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.buffers.get(index).map(|b| &b[..])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.buffers.iter().map(|b| &b[..])
    }
}

/// Retained buffers detached from their instance. They stay valid until this
/// value is dropped (or [`release`](Self::release)d), regardless of later
/// flushes.
#[derive(Debug, Default)]
#[must_use = "dropping PinnedBuffers releases the memory native code may still read"]
pub struct PinnedBuffers {
    buffers: Vec<Box<[u8]>>,
}

impl PinnedBuffers {
    pub fn merge(&mut self, mut other: PinnedBuffers) {
        self.buffers.append(&mut other.buffers);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.buffers.iter().map(|b| &b[..])
    }

    /// Explicitly release the buffers.
    pub fn release(self) {}
}
