//! Byte and machine-word representations.
//!
//! The aliases here are the host's exact-width types; [`WordWidth`] describes
//! the word size of any resolved family, including cross targets.

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::arch::ArchFamily;

/// Signed byte.
pub type SByte = i8;
/// Unsigned byte.
pub type UByte = u8;
/// Signed machine word. Holds a pointer without truncation.
pub type SWord = isize;
/// Unsigned machine word. Holds a pointer without truncation.
pub type UWord = usize;

/// Shift that scales an index into an array of host machine words.
pub const WORD_SHIFT: u32 = size_of::<UWord>().trailing_zeros();

/// Shift that scales an index into an array of IEEE doubles.
pub const FLOAT_SHIFT: u32 = 3;

const _: () = assert!(size_of::<UWord>() == size_of::<*const u8>());
const _: () = assert!(size_of::<SWord>() == size_of::<UWord>());
const _: () = assert!(size_of::<UWord>() == 1 << WORD_SHIFT);
const _: () = assert!(size_of::<f64>() == 1 << FLOAT_SHIFT);

/// Machine-word width of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordWidth {
    #[serde(rename = "32")]
    W32,
    #[serde(rename = "64")]
    W64,
}

impl WordWidth {
    /// Width of the host's [`UWord`].
    pub const fn host() -> Self {
        if size_of::<UWord>() == 8 {
            WordWidth::W64
        } else {
            WordWidth::W32
        }
    }

    pub const fn bytes(self) -> u32 {
        1 << self.shift()
    }

    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// log2 of [`Self::bytes`].
    pub const fn shift(self) -> u32 {
        match self {
            WordWidth::W32 => 2,
            WordWidth::W64 => 3,
        }
    }

    /// Whether `value` is representable as a signed word of this width.
    pub const fn fits(self, value: i64) -> bool {
        match self {
            WordWidth::W32 => value >= i32::MIN as i64 && value <= i32::MAX as i64,
            WordWidth::W64 => true,
        }
    }

    /// Truncate `value` to this width and sign-extend it back to 64 bits.
    pub const fn truncate(self, value: i64) -> i64 {
        match self {
            WordWidth::W32 => value as i32 as i64,
            WordWidth::W64 => value,
        }
    }
}

/// Word width for `family`. `None` for [`ArchFamily::Unsupported`].
pub const fn word_width(family: ArchFamily) -> Option<WordWidth> {
    match family {
        ArchFamily::X86_64 | ArchFamily::Ppc64 => Some(WordWidth::W64),
        ArchFamily::X86_32
        | ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Mips32 => Some(WordWidth::W32),
        ArchFamily::Unsupported => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_matches_bytes() {
        for width in [WordWidth::W32, WordWidth::W64] {
            assert_eq!(width.bytes(), 1 << width.shift());
        }
        assert_eq!(WordWidth::W32.bytes(), 4);
        assert_eq!(WordWidth::W64.bits(), 64);
    }

    #[test]
    fn eight_byte_words_only_on_64_bit_families() {
        for family in ArchFamily::SUPPORTED {
            let width = word_width(family).unwrap();
            let expect_wide = matches!(family, ArchFamily::X86_64 | ArchFamily::Ppc64);
            assert_eq!(width == WordWidth::W64, expect_wide, "{family}");
        }
        assert!(word_width(ArchFamily::Unsupported).is_none());
    }

    #[test]
    fn host_width_matches_pointer() {
        assert_eq!(WordWidth::host().bytes() as usize, size_of::<*const ()>());
        assert_eq!(WordWidth::host().shift(), WORD_SHIFT);
    }

    #[test]
    fn narrow_constants() {
        assert!(WordWidth::W32.fits(-1));
        assert!(WordWidth::W32.fits(i32::MAX as i64));
        assert!(!WordWidth::W32.fits(i32::MAX as i64 + 1));
        assert!(WordWidth::W64.fits(i64::MIN));
        assert_eq!(WordWidth::W32.truncate(0x1_0000_0001), 1);
        assert_eq!(WordWidth::W32.truncate(0xFFFF_FFFF), -1);
        assert_eq!(WordWidth::W64.truncate(0xFFFF_FFFF), 0xFFFF_FFFF);
    }
}
