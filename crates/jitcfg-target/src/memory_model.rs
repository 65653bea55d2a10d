//! Byte order, unaligned access, and instruction-cache model of a family.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arch::ArchFamily;

/// Byte ordering of the target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine this crate was compiled for.
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Encode the low `bytes` bytes of `value` in this order. `None` when
    /// `bytes` exceeds the 8 bytes of a `u64`.
    pub fn encode(self, value: u64, bytes: usize) -> Option<Vec<u8>> {
        let width = std::mem::size_of::<u64>();
        if bytes > width {
            return None;
        }
        Some(match self {
            Endianness::Little => value.to_le_bytes()[..bytes].to_vec(),
            Endianness::Big => value.to_be_bytes()[width - bytes..].to_vec(),
        })
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => f.write_str("little-endian"),
            Endianness::Big => f.write_str("big-endian"),
        }
    }
}

/// How instruction fetch observes freshly written code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheCoherency {
    /// Hardware keeps instruction and data caches coherent.
    Unified,
    /// Written code must be flushed from the data cache and invalidated in
    /// the instruction cache before it is executed.
    Split,
}

/// Byte order for `family`. `None` for [`ArchFamily::Unsupported`].
pub const fn byte_order(family: ArchFamily) -> Option<Endianness> {
    match family {
        ArchFamily::Ppc32 | ArchFamily::Ppc64 => Some(Endianness::Big),
        ArchFamily::X86_32
        | ArchFamily::X86_64
        | ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Mips32 => Some(Endianness::Little),
        ArchFamily::Unsupported => None,
    }
}

/// Whether single-instruction misaligned integer loads/stores are permitted.
///
/// ARMv5 and MIPS-32 fault or silently rotate on misaligned access, so code
/// for them must split such accesses into aligned pieces.
pub const fn unaligned_access_allowed(family: ArchFamily) -> Option<bool> {
    match family {
        ArchFamily::X86_32
        | ArchFamily::X86_64
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Ppc64 => Some(true),
        ArchFamily::ArmV5 | ArchFamily::Mips32 => Some(false),
        ArchFamily::Unsupported => None,
    }
}

pub const fn cache_coherency(family: ArchFamily) -> Option<CacheCoherency> {
    match family {
        ArchFamily::X86_32 | ArchFamily::X86_64 => Some(CacheCoherency::Unified),
        ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Ppc64
        | ArchFamily::Mips32 => Some(CacheCoherency::Split),
        ArchFamily::Unsupported => None,
    }
}
