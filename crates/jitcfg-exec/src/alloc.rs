//! Pluggable executable-memory allocation.

use std::sync::atomic::{AtomicUsize, Ordering};

use memmap2::MmapMut;

use crate::error::{ExecError, Result};
use crate::region::CodeRegion;

/// Source of code regions.
///
/// Implementations must be callable concurrently from independent
/// compilation units.
pub trait ExecAllocator: Send + Sync {
    /// Allocate a writable region of at least `size` bytes.
    fn allocate_executable(&self, size: usize) -> Result<CodeRegion>;

    /// Return a region obtained from [`Self::allocate_executable`].
    fn release_executable(&self, region: CodeRegion) -> Result<()>;
}

/// Snapshot of an allocator's outstanding allocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub live_regions: usize,
    pub live_bytes: usize,
}

/// Default allocator: one anonymous mapping per region.
///
/// Lock-free; each call maps or unmaps its own pages.
#[derive(Debug, Default)]
pub struct MmapAllocator {
    live_regions: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl MmapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live_regions: self.live_regions.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
        }
    }
}

impl ExecAllocator for MmapAllocator {
    fn allocate_executable(&self, size: usize) -> Result<CodeRegion> {
        if size == 0 {
            return Err(ExecError::EmptyRegion);
        }
        let map = MmapMut::map_anon(size).map_err(|source| ExecError::Map { size, source })?;
        self.live_regions.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(size, Ordering::Relaxed);
        log::trace!("mapped {size} bytes of code memory at {:p}", map.as_ptr());
        Ok(CodeRegion::from_mmap(map))
    }

    fn release_executable(&self, region: CodeRegion) -> Result<()> {
        let size = region.allocated_len();
        log::trace!("unmapping {size} bytes of code memory at {:p}", region.as_ptr());
        drop(region);

        let unknown = || ExecError::UnknownRegion { len: size };
        self.live_regions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .map_err(|_| unknown())?;
        if self
            .live_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(size))
            .is_err()
        {
            self.live_regions.fetch_add(1, Ordering::Relaxed);
            return Err(unknown());
        }
        Ok(())
    }
}
