//! Architecture family detection.
//!
//! Selects exactly one [`ArchFamily`] from build-time signals. Detection
//! never fails: a target that matches no family resolves to
//! [`ArchFamily::Unsupported`], and the failure surfaces the first time a
//! derived fact is read from the resulting profile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetError;
use crate::memory_model::Endianness;

/// Name of the compile-time environment variable that forces a family.
pub const OVERRIDE_ENV: &str = "JITCFG_TARGET";

/// Architecture families a JIT backend can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchFamily {
    #[serde(rename = "x86-32")]
    X86_32,
    #[serde(rename = "x86-64")]
    X86_64,
    #[serde(rename = "arm-v5")]
    ArmV5,
    #[serde(rename = "arm-v7")]
    ArmV7,
    #[serde(rename = "arm-thumb2")]
    ArmThumb2,
    #[serde(rename = "ppc-32")]
    Ppc32,
    #[serde(rename = "ppc-64")]
    Ppc64,
    #[serde(rename = "mips-32")]
    Mips32,
    /// No supported family matched. Every derived fact is unavailable.
    #[serde(rename = "unsupported")]
    Unsupported,
}

impl ArchFamily {
    /// All families that resolve to a usable profile.
    pub const SUPPORTED: [ArchFamily; 8] = [
        ArchFamily::X86_32,
        ArchFamily::X86_64,
        ArchFamily::ArmV5,
        ArchFamily::ArmV7,
        ArchFamily::ArmThumb2,
        ArchFamily::Ppc32,
        ArchFamily::Ppc64,
        ArchFamily::Mips32,
    ];

    /// Canonical names, in the same order as [`Self::SUPPORTED`], followed by
    /// the sentinel.
    pub const NAMES: [&'static str; 9] = [
        "x86-32",
        "x86-64",
        "arm-v5",
        "arm-v7",
        "arm-thumb2",
        "ppc-32",
        "ppc-64",
        "mips-32",
        "unsupported",
    ];

    /// Canonical kebab-case name.
    pub const fn name(self) -> &'static str {
        match self {
            ArchFamily::X86_32 => "x86-32",
            ArchFamily::X86_64 => "x86-64",
            ArchFamily::ArmV5 => "arm-v5",
            ArchFamily::ArmV7 => "arm-v7",
            ArchFamily::ArmThumb2 => "arm-thumb2",
            ArchFamily::Ppc32 => "ppc-32",
            ArchFamily::Ppc64 => "ppc-64",
            ArchFamily::Mips32 => "mips-32",
            ArchFamily::Unsupported => "unsupported",
        }
    }

    /// Short human description.
    pub const fn description(self) -> &'static str {
        match self {
            ArchFamily::X86_32 => "32-bit x86 (IA-32)",
            ArchFamily::X86_64 => "64-bit x86 (AMD64)",
            ArchFamily::ArmV5 => "ARM, ARMv5 instruction set (conservative default)",
            ArchFamily::ArmV7 => "ARM, ARMv7-A/R instruction set",
            ArchFamily::ArmThumb2 => "ARM, Thumb-2 instruction set",
            ArchFamily::Ppc32 => "32-bit PowerPC",
            ArchFamily::Ppc64 => "64-bit PowerPC",
            ArchFamily::Mips32 => "32-bit MIPS",
            ArchFamily::Unsupported => "no supported architecture detected",
        }
    }

    pub const fn is_supported(self) -> bool {
        !matches!(self, ArchFamily::Unsupported)
    }

    pub const fn is_x86(self) -> bool {
        matches!(self, ArchFamily::X86_32 | ArchFamily::X86_64)
    }

    pub const fn is_arm(self) -> bool {
        matches!(
            self,
            ArchFamily::ArmV5 | ArchFamily::ArmV7 | ArchFamily::ArmThumb2
        )
    }

    pub const fn is_ppc(self) -> bool {
        matches!(self, ArchFamily::Ppc32 | ArchFamily::Ppc64)
    }
}

impl fmt::Display for ArchFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArchFamily {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ArchFamily::SUPPORTED
            .into_iter()
            .chain([ArchFamily::Unsupported])
            .find(|family| family.name() == wanted)
            .ok_or_else(|| TargetError::UnknownFamily { name: s.into() })
    }
}

/// ARM instruction-set level reported by the toolchain.
///
/// Absence of this signal means a pre-v7 (or unknown) core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmIsaLevel {
    /// ARMv7-A application profile.
    V7A,
    /// ARMv7-R real-time profile.
    V7R,
    /// Any other ARMv7 profile (e.g. v7-M), which only runs Thumb-2.
    V7,
}

/// Build-time signals the detector chooses a family from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSignals {
    /// Explicit family selection. Always wins when present.
    pub explicit: Option<ArchFamily>,
    /// Architecture identity as spelled by `std::env::consts::ARCH`
    /// (`x86`, `x86_64`, `arm`, `powerpc`, `powerpc64`, `mips`, ...).
    pub arch: String,
    /// ARM instruction-set level, if the toolchain reports one.
    pub arm_isa: Option<ArmIsaLevel>,
    /// Byte order reported by the toolchain, if known.
    pub byte_order: Option<Endianness>,
    /// Pointer width in bits reported by the toolchain, if known. Separates
    /// ILP32 ABIs such as x32 from their 64-bit architecture.
    pub pointer_width: Option<u32>,
}

impl TargetSignals {
    /// Signals for an identity with no override and no secondary hints.
    pub fn for_arch(arch: impl Into<String>) -> Self {
        Self {
            explicit: None,
            arch: arch.into(),
            arm_isa: None,
            byte_order: None,
            pointer_width: None,
        }
    }

    /// Signals that force `family` regardless of identity.
    pub fn explicit(family: ArchFamily) -> Self {
        Self {
            explicit: Some(family),
            ..Self::for_arch("")
        }
    }

    /// Signals describing the machine this crate was compiled for,
    /// including any `JITCFG_TARGET` override present at compile time.
    pub fn host() -> Self {
        Self {
            explicit: build_override(),
            ..Self::host_identity()
        }
    }

    /// Host identity signals without the compile-time override.
    pub fn host_identity() -> Self {
        Self {
            explicit: None,
            arch: std::env::consts::ARCH.into(),
            arm_isa: host_arm_isa(),
            byte_order: Some(Endianness::host()),
            pointer_width: Some(usize::BITS),
        }
    }
}

/// Choose exactly one family from `signals`.
///
/// Probe order: explicit override, x86-32, x86-64, ARM (by ISA level),
/// PPC-64, PPC-32, MIPS-32. A byte-order signal that contradicts a family's
/// fixed byte order rejects that family.
pub fn detect(signals: &TargetSignals) -> ArchFamily {
    if let Some(family) = signals.explicit {
        log::debug!("architecture family forced to {family}");
        return family;
    }

    let arch = signals.arch.as_str();
    let candidate = if matches!(arch, "x86" | "i386" | "i586" | "i686") {
        ArchFamily::X86_32
    } else if arch == "x86_64" {
        ArchFamily::X86_64
    } else if arch == "arm" || arch.starts_with("armv") || arch.starts_with("thumbv") {
        match signals.arm_isa {
            Some(ArmIsaLevel::V7A) | Some(ArmIsaLevel::V7R) => ArchFamily::ArmV7,
            Some(ArmIsaLevel::V7) => ArchFamily::ArmThumb2,
            None => ArchFamily::ArmV5,
        }
    } else if matches!(arch, "powerpc64" | "ppc64") {
        ArchFamily::Ppc64
    } else if matches!(arch, "powerpc" | "ppc") {
        ArchFamily::Ppc32
    } else if arch == "mips" {
        ArchFamily::Mips32
    } else {
        ArchFamily::Unsupported
    };

    let family = match (signals.byte_order, crate::memory_model::byte_order(candidate)) {
        (Some(reported), Some(fixed)) if reported != fixed => {
            log::debug!(
                "{candidate} requires {fixed} byte order but the target is {reported}"
            );
            ArchFamily::Unsupported
        }
        _ => candidate,
    };
    let family = match (signals.pointer_width, crate::width::word_width(family)) {
        (Some(reported), Some(width)) if reported != width.bits() => {
            log::debug!(
                "{family} has {}-bit words but the target has {reported}-bit pointers",
                width.bits()
            );
            ArchFamily::Unsupported
        }
        _ => family,
    };
    log::debug!("detected architecture family {family} from arch '{arch}'");
    family
}

/// The family selected by `JITCFG_TARGET` when this crate was compiled.
///
/// An unparseable value selects [`ArchFamily::Unsupported`] rather than
/// being ignored.
pub fn build_override() -> Option<ArchFamily> {
    option_env!("JITCFG_TARGET").map(|value| {
        value.parse().unwrap_or_else(|err| {
            log::warn!("{OVERRIDE_ENV}: {err}");
            ArchFamily::Unsupported
        })
    })
}

fn host_arm_isa() -> Option<ArmIsaLevel> {
    if !cfg!(target_arch = "arm") || !cfg!(target_feature = "v7") {
        return None;
    }
    if cfg!(target_feature = "aclass") {
        Some(ArmIsaLevel::V7A)
    } else if cfg!(target_feature = "rclass") {
        Some(ArmIsaLevel::V7R)
    } else {
        Some(ArmIsaLevel::V7)
    }
}
