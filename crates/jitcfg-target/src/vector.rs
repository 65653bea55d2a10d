//! Vector floating-point unit assumptions.

use serde::{Deserialize, Serialize};

use crate::arch::ArchFamily;

/// Whether generated code may use a SIMD floating-point unit for doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VectorFp {
    /// No vector FP unit is used; doubles go through the scalar FPU.
    Absent,
    /// The unit is part of the baseline ISA and is assumed present.
    Assumed,
    /// The unit is optional and must be probed once at process start.
    ProbeAtStartup,
}

impl VectorFp {
    /// Whether the unit is expected to be usable, pending a probe if one is
    /// required.
    pub const fn available(self) -> bool {
        !matches!(self, VectorFp::Absent)
    }

    pub const fn autodetect(self) -> bool {
        matches!(self, VectorFp::ProbeAtStartup)
    }
}

/// SSE2 is baseline on x86-64 and optional on x86-32.
pub const fn vector_fp(family: ArchFamily) -> Option<VectorFp> {
    match family {
        ArchFamily::X86_64 => Some(VectorFp::Assumed),
        ArchFamily::X86_32 => Some(VectorFp::ProbeAtStartup),
        ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Ppc64
        | ArchFamily::Mips32 => Some(VectorFp::Absent),
        ArchFamily::Unsupported => None,
    }
}

/// Run the process-start probe for the host's vector FP unit.
///
/// Returns `true` when SSE2 is present on an x86 host, `false` elsewhere.
pub fn probe_vector_fp() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        std::is_x86_feature_detected!("sse2")
    }
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_x86_uses_vector_fp() {
        for family in ArchFamily::SUPPORTED {
            let mode = vector_fp(family).unwrap();
            assert_eq!(mode.available(), family.is_x86(), "{family}");
            assert_eq!(mode.autodetect(), family == ArchFamily::X86_32, "{family}");
        }
        assert!(vector_fp(ArchFamily::Unsupported).is_none());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn sse2_is_always_present_on_x86_64() {
        assert!(probe_vector_fp());
    }
}
