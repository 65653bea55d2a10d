//! Instruction-cache synchronization.
//!
//! Freshly written instructions must be synchronized before they execute.
//! On x86 the hardware keeps instruction fetch coherent and this is a no-op;
//! elsewhere it flushes the written range through the host's cache
//! maintenance primitive. A call covers only the bytes it is given: ranges
//! written by other threads need their own call.

use jitcfg_target::{CacheCoherency, TargetProfile};

use crate::error::{ExecError, Result};

/// Make `code` visible to instruction fetch.
///
/// `profile` must describe the machine running this process; code for any
/// other family is refused with [`ExecError::ForeignTarget`].
pub fn synchronize_instruction_cache(profile: &TargetProfile, code: &[u8]) -> Result<()> {
    ensure_native(profile)?;
    synchronize_with(profile, code, flush_host)
}

/// Fail unless `profile` is supported and describes the running machine,
/// independent of any compile-time override.
pub(crate) fn ensure_native(profile: &TargetProfile) -> Result<()> {
    profile.ensure_supported()?;
    let native = TargetProfile::native().family();
    if profile.family() != native {
        return Err(ExecError::ForeignTarget {
            profile: profile.family(),
            host: native,
        });
    }
    Ok(())
}

pub(crate) fn synchronize_with<F>(profile: &TargetProfile, code: &[u8], flush: F) -> Result<()>
where
    F: FnOnce(*const u8, *const u8) -> Result<()>,
{
    match profile.instruction_cache()? {
        CacheCoherency::Unified => Ok(()),
        CacheCoherency::Split => {
            if code.is_empty() {
                return Ok(());
            }
            let range = code.as_ptr_range();
            log::trace!("flushing instruction cache {:p}..{:p}", range.start, range.end);
            flush(range.start, range.end)
        }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn flush_host(_from: *const u8, _to: *const u8) -> Result<()> {
    Ok(())
}

#[cfg(all(unix, not(any(target_arch = "x86", target_arch = "x86_64"))))]
fn flush_host(from: *const u8, to: *const u8) -> Result<()> {
    use std::ffi::c_char;

    extern "C" {
        fn __clear_cache(start: *mut c_char, end: *mut c_char);
    }
    // SAFETY: callers pass the bounds of a live slice, so every address in
    // the range is mapped for the duration of the call.
    unsafe { __clear_cache(from as *mut c_char, to as *mut c_char) };
    Ok(())
}

#[cfg(not(any(unix, target_arch = "x86", target_arch = "x86_64")))]
fn flush_host(_from: *const u8, _to: *const u8) -> Result<()> {
    Err(ExecError::CacheSync {
        detail: format!(
            "no cache flush primitive for {} on {}",
            std::env::consts::ARCH,
            std::env::consts::OS
        ),
    })
}

#[cfg(test)]
mod tests {
    use jitcfg_target::ArchFamily;

    use super::*;

    #[test]
    fn x86_sync_has_no_side_effect() {
        let code = [0x90_u8, 0xC3];
        for family in [ArchFamily::X86_32, ArchFamily::X86_64] {
            let profile = TargetProfile::resolve(family);
            synchronize_with(&profile, &code, |_, _| {
                panic!("{family} must not flush the instruction cache")
            })
            .unwrap();
        }
        assert_eq!(code, [0x90, 0xC3]);
    }

    #[test]
    fn split_cache_flushes_exact_range() {
        let code = [0_u8; 16];
        let profile = TargetProfile::resolve(ArchFamily::ArmV7);
        let mut seen = None;
        synchronize_with(&profile, &code[4..12], |from, to| {
            seen = Some((from, to));
            Ok(())
        })
        .unwrap();
        let (from, to) = seen.unwrap();
        assert_eq!(from, code[4..].as_ptr());
        assert_eq!(to as usize - from as usize, 8);
    }

    #[test]
    fn empty_range_is_not_flushed() {
        let profile = TargetProfile::resolve(ArchFamily::Mips32);
        synchronize_with(&profile, &[], |_, _| panic!("empty range flushed")).unwrap();
    }

    #[test]
    fn unsupported_profile_is_rejected() {
        let profile = TargetProfile::resolve(ArchFamily::Unsupported);
        let err = synchronize_instruction_cache(&profile, &[0xC3]).unwrap_err();
        assert!(matches!(err, ExecError::Target(_)));
    }

    #[test]
    fn native_sync_succeeds() {
        let profile = TargetProfile::native();
        if profile.is_supported() {
            let code = vec![0_u8; 64];
            synchronize_instruction_cache(profile, &code).unwrap();
        }
    }

    #[test]
    fn foreign_profile_is_not_synchronized() {
        let native = TargetProfile::native().family();
        for family in ArchFamily::SUPPORTED {
            if family == native {
                continue;
            }
            let profile = TargetProfile::resolve(family);
            let err = synchronize_instruction_cache(&profile, &[0xC3]).unwrap_err();
            assert!(
                matches!(err, ExecError::ForeignTarget { profile: p, host } if p == family && host == native),
                "{family}: {err}"
            );
        }
    }
}
