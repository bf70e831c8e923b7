use super::StructInstance;
use crate::error::StructError;

// ─── Raw byte transfer ──────────────────────────────────────────────────────
//
// These bypass the value store entirely; call `read()` afterwards to see the
// copied bytes as values.

impl StructInstance {
    /// Overwrite the start of the buffer with `source`.
    pub fn copy(&mut self, source: &[u8]) -> Result<(), StructError> {
        if source.len() > self.buffer.len() {
            return Err(StructError::OutOfBounds {
                start: 0,
                end: source.len(),
                size: self.buffer.len(),
            });
        }
        self.buffer[..source.len()].copy_from_slice(source);
        Ok(())
    }

    /// Copy `length` bytes starting at `start` into `dst`, stopping at the end
    /// of `dst`. Positions past the end of the buffer read as zero. Returns
    /// the number of bytes written to `dst`.
    pub fn copy_to(&self, dst: &mut [u8], start: usize, length: usize) -> usize {
        let n = length.min(dst.len());
        for (i, out) in dst[..n].iter_mut().enumerate() {
            *out = start
                .checked_add(i)
                .and_then(|at| self.buffer.get(at))
                .copied()
                .unwrap_or(0);
        }
        n
    }

    /// Write `length` bytes of `src` into the buffer at `start`. Missing
    /// source bytes write zero; bytes that would land past the end of the
    /// buffer are dropped. Returns the number of buffer bytes written.
    pub fn copy_from(&mut self, src: &[u8], start: usize, length: usize) -> Result<usize, StructError> {
        let size = self.buffer.len();
        if start > size {
            return Err(StructError::OutOfBounds {
                start,
                end: start.saturating_add(length),
                size,
            });
        }
        let n = length.min(size - start);
        for (i, slot) in self.buffer[start..start + n].iter_mut().enumerate() {
            *slot = src.get(i).copied().unwrap_or(0);
        }
        Ok(n)
    }
}
