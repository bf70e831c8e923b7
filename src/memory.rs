//! Address/byte-access seam between the engine and native memory.
//!
//! The engine never maps or dereferences memory itself. It asks a
//! [`NativeMemory`] for the address of a buffer it owns (to write into a
//! pointer slot) and for single bytes at foreign addresses (to copy pointees
//! during `read()`).

use crate::error::MemoryError;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

pub trait NativeMemory {
    /// Numeric address of `bytes`, as native code will see it.
    fn address_of(&self, bytes: &[u8]) -> u64;

    /// Byte at `address + index`.
    fn read_byte(&self, address: u64, index: usize) -> Result<u8, MemoryError>;
}

// ─── ProcessMemory ──────────────────────────────────────────────────────────

/// The running process's own address space.
#[derive(Debug)]
pub struct ProcessMemory {
    _private: (),
}

impl ProcessMemory {
    /// # Safety
    ///
    /// `read_byte` dereferences whatever address it is given. Every non-zero
    /// address reaching it (pointer slots, dynamic arrays, C strings in buffers
    /// handed back by native code) must point to live, readable memory of at
    /// least the size the schema implies.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl NativeMemory for ProcessMemory {
    #[inline]
    fn address_of(&self, bytes: &[u8]) -> u64 {
        bytes.as_ptr() as usize as u64
    }

    #[inline]
    fn read_byte(&self, address: u64, index: usize) -> Result<u8, MemoryError> {
        if address == 0 {
            return Err(MemoryError::NullAddress);
        }
        let ptr = (address as usize).wrapping_add(index) as *const u8;
        // SAFETY: upheld by the contract of `ProcessMemory::new`.
        Ok(unsafe { ptr.read() })
    }
}

// ─── ArenaMemory ────────────────────────────────────────────────────────────

/// First address handed out by [`ArenaMemory::insert`]. Above the 47-bit user
/// address space, so it never collides with a real buffer address.
const ARENA_BASE: u64 = 0xF000_0000_0000;

/// In-process stand-in for native memory, backed by plain byte arrays.
///
/// A test double. `address_of` snapshots the buffer under its real address,
/// so a struct flushed through this memory can be read back exactly as native
/// code would have seen it. `insert` and `write` simulate memory owned by the
/// foreign side.
///
/// Snapshots are never evicted, only replaced: a new snapshot drops every
/// older region that starts inside it, so heap addresses reused by the
/// allocator always read the latest bytes.
#[derive(Debug, Default)]
pub struct ArenaMemory {
    regions: RefCell<BTreeMap<u64, Box<[u8]>>>,
    next: Cell<u64>,
}

impl ArenaMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a foreign region holding `bytes`; returns its address.
    pub fn insert(&self, bytes: impl Into<Box<[u8]>>) -> u64 {
        let bytes = bytes.into();
        let address = ARENA_BASE + self.next.get();
        // Round up and leave a 16-byte gap so regions stay apart and aligned.
        self.next
            .set(self.next.get() + ((bytes.len() as u64 + 15) & !15) + 16);
        self.regions.borrow_mut().insert(address, bytes);
        address
    }

    /// Overwrite bytes inside a known region.
    pub fn write(&self, address: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let mut regions = self.regions.borrow_mut();
        let (base, region) = regions
            .range_mut(..=address)
            .next_back()
            .ok_or(MemoryError::Unmapped { address, index: 0 })?;
        let start = (address - *base) as usize;
        let end = start + bytes.len();
        if end > region.len() {
            return Err(MemoryError::Unmapped {
                address,
                index: bytes.len(),
            });
        }
        region[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `len` bytes starting at `address`.
    pub fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
        (0..len).map(|i| self.read_byte(address, i)).collect()
    }

    /// Read a NUL-terminated string (without the terminator).
    pub fn read_cstr(&self, address: u64) -> Result<String, MemoryError> {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_byte(address, bytes.len())?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn region_count(&self) -> usize {
        self.regions.borrow().len()
    }
}

impl NativeMemory for ArenaMemory {
    fn address_of(&self, bytes: &[u8]) -> u64 {
        let address = bytes.as_ptr() as usize as u64;
        let mut regions = self.regions.borrow_mut();
        let end = address.saturating_add(bytes.len() as u64);
        let stale: Vec<u64> = regions.range(address..end).map(|(base, _)| *base).collect();
        for base in stale {
            regions.remove(&base);
        }
        regions.insert(address, bytes.into());
        address
    }

    fn read_byte(&self, address: u64, index: usize) -> Result<u8, MemoryError> {
        if address == 0 {
            return Err(MemoryError::NullAddress);
        }
        let target = address.wrapping_add(index as u64);
        let regions = self.regions.borrow();
        let (base, region) = regions
            .range(..=target)
            .next_back()
            .ok_or(MemoryError::Unmapped { address, index })?;
        region
            .get((target - base) as usize)
            .copied()
            .ok_or(MemoryError::Unmapped { address, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_insert_and_read() {
        let arena = ArenaMemory::new();
        let a = arena.insert(vec![1u8, 2, 3]);
        let b = arena.insert(vec![9u8; 20]);
        assert_ne!(a, b);
        assert_eq!(arena.read(a, 3).unwrap(), [1, 2, 3]);
        assert_eq!(arena.read_byte(b, 19).unwrap(), 9);
        assert_eq!(arena.region_count(), 2);
    }

    #[test]
    fn test_arena_rejects_unknown_addresses() {
        let arena = ArenaMemory::new();
        let a = arena.insert(vec![1u8, 2]);
        assert_eq!(arena.read_byte(0, 0), Err(MemoryError::NullAddress));
        assert_eq!(
            arena.read_byte(a, 2),
            Err(MemoryError::Unmapped { address: a, index: 2 })
        );
        assert!(matches!(arena.read_byte(42, 0), Err(MemoryError::Unmapped { .. })));
    }

    #[test]
    fn test_arena_address_of_snapshots() {
        let arena = ArenaMemory::new();
        let mut buffer = vec![7u8, 8];
        let address = arena.address_of(&buffer);
        assert_eq!(address, buffer.as_ptr() as usize as u64);
        buffer[0] = 0;
        assert_eq!(arena.read_byte(address, 0).unwrap(), 7);
    }

    #[test]
    fn test_arena_snapshot_replaces_inner_regions() {
        let arena = ArenaMemory::new();
        let mut buffer = vec![1u8; 16];
        let inner = arena.address_of(&buffer[4..8]);
        buffer[4] = 9;
        let outer = arena.address_of(&buffer);

        assert_eq!(inner, outer + 4);
        assert_eq!(arena.read_byte(outer, 4).unwrap(), 9);
        assert_eq!(arena.read_byte(inner, 0).unwrap(), 9);
        assert_eq!(arena.region_count(), 1);
    }

    #[test]
    fn test_arena_write_and_cstr() {
        let arena = ArenaMemory::new();
        let a = arena.insert(b"hey\0".to_vec());
        assert_eq!(arena.read_cstr(a).unwrap(), "hey");
        arena.write(a + 1, b"o").unwrap();
        assert_eq!(arena.read_cstr(a).unwrap(), "hoy");
        assert!(arena.write(a + 3, b"xx").is_err());
    }

    #[test]
    fn test_process_memory_reads_own_bytes() {
        let bytes = [5u8, 6, 7];
        // SAFETY: only the address of `bytes` is read, and it outlives the reads.
        let memory = unsafe { ProcessMemory::new() };
        let address = memory.address_of(&bytes);
        assert_eq!(memory.read_byte(address, 2).unwrap(), 7);
        assert_eq!(memory.read_byte(0, 0), Err(MemoryError::NullAddress));
    }
}
