//! The capability bundle a code-generation engine is constructed with.

use std::fmt;
use std::sync::Arc;

use jitcfg_target::{CallTarget, TargetProfile};

use crate::alloc::{ExecAllocator, MmapAllocator};
use crate::error::Result;
use crate::icache;
use crate::region::CodeRegion;

/// A resolved profile plus the allocator code memory comes from.
///
/// Construction fails for an unsupported profile, so every consumer holding
/// an `ExecutionEnv` can read the profile's facts without checking again.
#[derive(Clone)]
pub struct ExecutionEnv {
    profile: TargetProfile,
    allocator: Arc<dyn ExecAllocator>,
}

impl fmt::Debug for ExecutionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEnv")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl ExecutionEnv {
    pub fn new(profile: TargetProfile, allocator: Arc<dyn ExecAllocator>) -> Result<Self> {
        profile.ensure_supported()?;
        log::debug!("execution environment for {}", profile.family());
        Ok(Self { profile, allocator })
    }

    /// The host profile with the default allocator. Honours a compile-time
    /// `JITCFG_TARGET` override, so the result may be unable to execute.
    pub fn host() -> Result<Self> {
        Self::new(*TargetProfile::host(), Arc::new(MmapAllocator::new()))
    }

    /// The running machine's profile with the default allocator.
    pub fn native() -> Result<Self> {
        Self::new(*TargetProfile::native(), Arc::new(MmapAllocator::new()))
    }

    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    pub fn allocate_executable(&self, size: usize) -> Result<CodeRegion> {
        self.allocator.allocate_executable(size)
    }

    pub fn release_executable(&self, region: CodeRegion) -> Result<()> {
        self.allocator.release_executable(region)
    }

    pub fn synchronize_instruction_cache(&self, code: &[u8]) -> Result<()> {
        icache::synchronize_instruction_cache(&self.profile, code)
    }

    /// Whether code generated for this profile can run on this machine.
    /// Compares against the detected machine, not the compile-time override.
    pub fn is_native(&self) -> bool {
        self.profile.family() == TargetProfile::native().family()
    }

    /// Switch `region` to its executable phase. Refuses when the profile
    /// describes a different machine.
    pub fn make_executable(&self, region: &mut CodeRegion) -> Result<()> {
        region.make_executable(&self.profile)
    }

    /// Allocate a region, copy `code` into it, and make it executable.
    pub fn install(&self, code: &[u8]) -> Result<CodeRegion> {
        let mut region = self.allocate_executable(code.len())?;
        let installed = region
            .write(0, code)
            .and_then(|()| self.make_executable(&mut region));
        match installed {
            Ok(()) => Ok(region),
            Err(err) => {
                self.release_executable(region)?;
                Err(err)
            }
        }
    }

    /// How host code calls the code at the start of `region`.
    pub fn call_target(&self, region: &CodeRegion, toc: u64) -> Result<CallTarget> {
        let entry = region.entry_address(0)? as u64;
        Ok(self.profile.call_target(entry, toc)?)
    }
}
