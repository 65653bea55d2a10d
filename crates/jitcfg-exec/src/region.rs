//! Code regions with separated writable and executable phases.
//!
//! A region starts out mapped read-write. [`CodeRegion::make_executable`]
//! synchronizes the instruction cache over every byte written since the
//! last switch and then remaps the pages read-execute. The pages are never
//! writable and executable at the same time; patching executable code means
//! switching back with [`CodeRegion::make_writable`] first.

use std::mem::size_of;
use std::ops::Range;

use jitcfg_target::TargetProfile;
use memmap2::{Mmap, MmapMut};

use crate::error::{ExecError, Result};
use crate::icache;

#[derive(Debug)]
enum Mapping {
    Writable(MmapMut),
    Executable(Mmap),
    Unmapped,
}

/// A block of code memory owned by one compilation unit.
#[derive(Debug)]
pub struct CodeRegion {
    mapping: Mapping,
    /// Size mapped at allocation. Survives loss of the mapping.
    size: usize,
    /// Bytes written during the current writable phase.
    dirty: Option<Range<usize>>,
}

impl CodeRegion {
    /// Wrap a writable mapping. Custom allocators use this to hand out
    /// regions backed by their own mappings.
    pub fn from_mmap(map: MmapMut) -> Self {
        Self {
            size: map.len(),
            mapping: Mapping::Writable(map),
            dirty: None,
        }
    }

    /// Bytes mapped when the region was created, even if the mapping has
    /// since been lost. Allocators account releases with this.
    pub fn allocated_len(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        match &self.mapping {
            Mapping::Writable(map) => map.len(),
            Mapping::Executable(map) => map.len(),
            Mapping::Unmapped => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::Writable(_))
    }

    pub fn is_executable(&self) -> bool {
        matches!(self.mapping, Mapping::Executable(_))
    }

    /// Start of the region, or null once the mapping is lost.
    pub fn as_ptr(&self) -> *const u8 {
        match &self.mapping {
            Mapping::Writable(map) => map.as_ptr(),
            Mapping::Executable(map) => map.as_ptr(),
            Mapping::Unmapped => std::ptr::null(),
        }
    }

    /// Range of bytes written since the region last became writable.
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Copy `bytes` into the region at `offset`.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let len = self.len();
        let map = match &mut self.mapping {
            Mapping::Writable(map) => map,
            Mapping::Executable(_) => return Err(ExecError::NotWritable),
            Mapping::Unmapped => return Err(ExecError::Unmapped),
        };
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= len)
            .ok_or(ExecError::OutOfBounds {
                start: offset,
                end: offset.saturating_add(bytes.len()),
                len,
            })?;
        map[offset..end].copy_from_slice(bytes);
        self.dirty = match self.dirty.take() {
            Some(prev) => Some(prev.start.min(offset)..prev.end.max(end)),
            None => Some(offset..end),
        };
        Ok(())
    }

    /// Synchronize the instruction cache over `range` of this region.
    pub fn synchronize(&self, profile: &TargetProfile, range: Range<usize>) -> Result<()> {
        let bytes = self.bytes()?;
        let slice = bytes.get(range.clone()).ok_or(ExecError::OutOfBounds {
            start: range.start,
            end: range.end,
            len: bytes.len(),
        })?;
        icache::synchronize_instruction_cache(profile, slice)
    }

    /// Finish the writable phase: synchronize everything written, then
    /// remap the region read-execute. A no-op if already executable.
    ///
    /// `profile` must describe the running machine; see
    /// [`TargetProfile::native`].
    pub fn make_executable(&mut self, profile: &TargetProfile) -> Result<()> {
        icache::ensure_native(profile)?;
        match std::mem::replace(&mut self.mapping, Mapping::Unmapped) {
            Mapping::Writable(map) => {
                if let Some(dirty) = self.dirty.clone() {
                    if let Err(err) = icache::synchronize_instruction_cache(profile, &map[dirty]) {
                        self.mapping = Mapping::Writable(map);
                        return Err(err);
                    }
                }
                let map = map.make_exec().map_err(|source| ExecError::Protect {
                    to: "executable",
                    source,
                })?;
                log::trace!("code region {:p} is now read-execute", map.as_ptr());
                self.mapping = Mapping::Executable(map);
                self.dirty = None;
                Ok(())
            }
            executable @ Mapping::Executable(_) => {
                self.mapping = executable;
                Ok(())
            }
            Mapping::Unmapped => Err(ExecError::Unmapped),
        }
    }

    /// Leave the executable phase so the region can be patched. A no-op if
    /// already writable.
    pub fn make_writable(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.mapping, Mapping::Unmapped) {
            Mapping::Executable(map) => {
                let map = map.make_mut().map_err(|source| ExecError::Protect {
                    to: "writable",
                    source,
                })?;
                self.mapping = Mapping::Writable(map);
                Ok(())
            }
            writable @ Mapping::Writable(_) => {
                self.mapping = writable;
                Ok(())
            }
            Mapping::Unmapped => Err(ExecError::Unmapped),
        }
    }

    /// Read-only view of the region's bytes in either phase.
    pub fn bytes(&self) -> Result<&[u8]> {
        match &self.mapping {
            Mapping::Writable(map) => Ok(&map[..]),
            Mapping::Executable(map) => Ok(&map[..]),
            Mapping::Unmapped => Err(ExecError::Unmapped),
        }
    }

    /// Address of the instruction at `offset`, once executable.
    pub fn entry_address(&self, offset: usize) -> Result<usize> {
        match &self.mapping {
            Mapping::Executable(map) if offset < map.len() => Ok(map.as_ptr() as usize + offset),
            Mapping::Executable(map) => Err(ExecError::OutOfBounds {
                start: offset,
                end: offset.saturating_add(1),
                len: map.len(),
            }),
            Mapping::Writable(_) => Err(ExecError::NotExecutable),
            Mapping::Unmapped => Err(ExecError::Unmapped),
        }
    }

    /// Reinterpret the instruction at `offset` as a function pointer `F`.
    ///
    /// # Safety
    ///
    /// `F` must be a function-pointer type whose signature and calling
    /// convention match the code at `offset`, and the region must outlive
    /// every use of the returned pointer.
    pub unsafe fn entry<F: Copy>(&self, offset: usize) -> Result<F> {
        const {
            assert!(
                size_of::<F>() == size_of::<usize>(),
                "entry type must be pointer-sized"
            )
        };
        let address = self.entry_address(offset)?;
        Ok(std::mem::transmute_copy::<usize, F>(&address))
    }
}

#[cfg(test)]
mod tests {
    use jitcfg_target::ArchFamily;

    use super::*;

    fn region(len: usize) -> CodeRegion {
        CodeRegion::from_mmap(MmapMut::map_anon(len).unwrap())
    }

    #[test]
    fn write_tracks_dirty_range() {
        let mut r = region(64);
        assert!(r.dirty_range().is_none());
        r.write(8, &[1, 2, 3]).unwrap();
        r.write(20, &[4]).unwrap();
        assert_eq!(r.dirty_range(), Some(8..21));
        assert_eq!(&r.bytes().unwrap()[8..11], &[1, 2, 3]);
    }

    #[test]
    fn write_out_of_bounds() {
        let mut r = region(16);
        let err = r.write(10, &[0; 8]).unwrap_err();
        assert!(matches!(err, ExecError::OutOfBounds { start: 10, end: 18, len: 16 }));
        assert!(matches!(
            r.write(usize::MAX, &[0; 2]).unwrap_err(),
            ExecError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn phases_are_exclusive() {
        let profile = TargetProfile::native();
        if !profile.is_supported() {
            return;
        }
        let mut r = region(32);
        assert!(r.is_writable());
        assert!(matches!(r.entry_address(0), Err(ExecError::NotExecutable)));

        r.write(0, &[0xC3]).unwrap();
        r.make_executable(profile).unwrap();
        assert!(r.is_executable() && !r.is_writable());
        assert!(r.dirty_range().is_none());
        assert!(matches!(r.write(0, &[0x90]), Err(ExecError::NotWritable)));
        assert_eq!(r.entry_address(0).unwrap(), r.as_ptr() as usize);

        r.make_writable().unwrap();
        r.write(0, &[0x90]).unwrap();
        assert_eq!(r.bytes().unwrap()[0], 0x90);
    }

    #[test]
    fn make_executable_is_idempotent() {
        let profile = TargetProfile::native();
        if !profile.is_supported() {
            return;
        }
        let mut r = region(16);
        r.make_executable(profile).unwrap();
        r.make_executable(profile).unwrap();
        assert!(r.is_executable());
    }

    #[test]
    fn unsupported_profile_keeps_region_writable() {
        let mut r = region(16);
        r.write(0, &[1]).unwrap();
        let unsupported = TargetProfile::resolve(ArchFamily::Unsupported);
        assert!(matches!(r.make_executable(&unsupported), Err(ExecError::Target(_))));
        assert!(r.is_writable());
        assert_eq!(r.dirty_range(), Some(0..1));
    }

    #[test]
    fn synchronize_checks_bounds() {
        let r = region(16);
        let profile = TargetProfile::native();
        assert!(matches!(
            r.synchronize(profile, 8..32),
            Err(ExecError::OutOfBounds { .. })
        ));
        if profile.is_supported() {
            r.synchronize(profile, 0..16).unwrap();
        }
    }

    #[test]
    fn foreign_profile_keeps_region_writable() {
        let native = TargetProfile::native().family();
        let foreign = if native == ArchFamily::Ppc64 {
            ArchFamily::X86_64
        } else {
            ArchFamily::Ppc64
        };
        let mut r = region(16);
        r.write(0, &[0x4e, 0x80, 0x00, 0x20]).unwrap();
        let err = r.make_executable(&TargetProfile::resolve(foreign)).unwrap_err();
        assert!(matches!(err, ExecError::ForeignTarget { profile, .. } if profile == foreign));
        assert!(r.is_writable() && !r.is_executable());
        assert_eq!(r.dirty_range(), Some(0..4));
    }

    #[test]
    fn lost_mapping_is_still_accounted() {
        use crate::alloc::{AllocatorStats, ExecAllocator, MmapAllocator};

        let alloc = MmapAllocator::new();
        let mut r = alloc.allocate_executable(24).unwrap();
        // What a failed protection change leaves behind.
        r.mapping = Mapping::Unmapped;
        assert_eq!(r.len(), 0);
        assert_eq!(r.allocated_len(), 24);
        assert!(matches!(r.bytes(), Err(ExecError::Unmapped)));
        alloc.release_executable(r).unwrap();
        assert_eq!(alloc.stats(), AllocatorStats::default());
    }

    #[test]
    fn allocated_len_is_recorded() {
        let r = region(48);
        assert_eq!(r.allocated_len(), 48);
        assert_eq!(r.len(), 48);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn execute_written_code() {
        let ret_code: u8 = 0x2c;
        let instructions: [u8; 6] = [
            0xb8, ret_code, 0x00, 0x00, 0x00, // mov eax, 0x2c
            0xc3, // ret
        ];
        let mut r = region(instructions.len());
        r.write(0, &instructions).unwrap();
        r.make_executable(TargetProfile::native()).unwrap();

        let func: jitcfg_target::host_fn!(fn() -> u8) = unsafe { r.entry(0).unwrap() };
        assert_eq!(func(), ret_code);
    }
}
