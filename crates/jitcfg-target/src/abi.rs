//! Calling convention and call-indirection model.
//!
//! Generated code and host code meet at two boundaries: host code calling
//! into generated code, and generated code calling back into the host. Both
//! use the convention selected here, and both must agree on whether a
//! function is addressed directly or through a descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arch::ArchFamily;

/// Calling convention used across the generated-code/host-code boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallingConvention {
    /// x86-32 register passing: first two integer arguments in ECX and EDX,
    /// callee pops the stack arguments.
    Fastcall,
    /// x86-32 stack passing, callee pops the arguments.
    Stdcall,
    /// The platform's C calling convention.
    PlatformDefault,
}

impl CallingConvention {
    /// The `extern` ABI string Rust uses for this convention.
    pub const fn rust_abi(self) -> &'static str {
        match self {
            CallingConvention::Fastcall => "fastcall",
            CallingConvention::Stdcall => "stdcall",
            CallingConvention::PlatformDefault => "C",
        }
    }

    /// Number of integer arguments passed in registers, when the convention
    /// fixes it independently of the platform.
    pub const fn register_arguments(self) -> Option<u32> {
        match self {
            CallingConvention::Fastcall => Some(2),
            CallingConvention::Stdcall => Some(0),
            CallingConvention::PlatformDefault => None,
        }
    }

    /// Whether the callee removes stack arguments before returning.
    pub const fn callee_cleans_stack(self) -> bool {
        matches!(self, CallingConvention::Fastcall | CallingConvention::Stdcall)
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConvention::Fastcall => f.write_str("fastcall"),
            CallingConvention::Stdcall => f.write_str("stdcall"),
            CallingConvention::PlatformDefault => f.write_str("platform default"),
        }
    }
}

/// What the host toolchain can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Toolchain {
    /// Whether the toolchain supports the x86-32 fastcall convention.
    pub fastcall_available: bool,
}

impl Default for Toolchain {
    fn default() -> Self {
        // rustc accepts `extern "fastcall"` on every x86-32 target.
        Self {
            fastcall_available: true,
        }
    }
}

/// Convention for `family`. `None` for [`ArchFamily::Unsupported`].
pub const fn calling_convention(
    family: ArchFamily,
    toolchain: Toolchain,
) -> Option<CallingConvention> {
    match family {
        ArchFamily::X86_32 if toolchain.fastcall_available => Some(CallingConvention::Fastcall),
        ArchFamily::X86_32 => Some(CallingConvention::Stdcall),
        ArchFamily::X86_64
        | ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Ppc64
        | ArchFamily::Mips32 => Some(CallingConvention::PlatformDefault),
        ArchFamily::Unsupported => None,
    }
}

/// The convention [`host_fn!`](crate::host_fn) spells when this crate is
/// compiled for `family`. Host call sites always use it, whatever the
/// toolchain settings say.
pub const fn host_fn_convention(family: ArchFamily) -> Option<CallingConvention> {
    match family {
        ArchFamily::X86_32 => Some(CallingConvention::Fastcall),
        ArchFamily::X86_64
        | ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Ppc64
        | ArchFamily::Mips32 => Some(CallingConvention::PlatformDefault),
        ArchFamily::Unsupported => None,
    }
}

/// Whether functions are addressed through a descriptor. Only PPC-64's
/// ELFv1 ABI does this.
pub const fn indirect_call_required(family: ArchFamily) -> Option<bool> {
    match family {
        ArchFamily::Ppc64 => Some(true),
        ArchFamily::X86_32
        | ArchFamily::X86_64
        | ArchFamily::ArmV5
        | ArchFamily::ArmV7
        | ArchFamily::ArmThumb2
        | ArchFamily::Ppc32
        | ArchFamily::Mips32 => Some(false),
        ArchFamily::Unsupported => None,
    }
}

/// A PPC-64 function descriptor: what a function pointer points at.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionDescriptor {
    /// Address of the first instruction.
    pub entry: u64,
    /// Table-of-contents base loaded into r2 before the call.
    pub toc: u64,
    /// Environment pointer loaded into r11.
    pub env: u64,
}

/// How host code reaches a piece of generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallTarget {
    /// The function pointer is the code address.
    Direct(u64),
    /// The function pointer is the address of this descriptor.
    Descriptor(FunctionDescriptor),
}

impl CallTarget {
    /// Build the call target for code starting at `entry`.
    ///
    /// `toc` is only meaningful when `indirect` is set.
    pub const fn for_code(indirect: bool, entry: u64, toc: u64) -> Self {
        if indirect {
            CallTarget::Descriptor(FunctionDescriptor { entry, toc, env: 0 })
        } else {
            CallTarget::Direct(entry)
        }
    }

    /// Address of the first instruction.
    pub const fn entry(&self) -> u64 {
        match self {
            CallTarget::Direct(entry) => *entry,
            CallTarget::Descriptor(descriptor) => descriptor.entry,
        }
    }
}

/// Spell a function-pointer type with the host's JIT calling convention.
///
/// ```
/// type Entry = jitcfg_target::host_fn!(fn(usize, usize) -> usize);
/// ```
#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! host_fn {
    (fn($($arg:ty),* $(,)?) $(-> $ret:ty)?) => {
        extern "fastcall" fn($($arg),*) $(-> $ret)?
    };
}

/// Spell a function-pointer type with the host's JIT calling convention.
///
/// ```
/// type Entry = jitcfg_target::host_fn!(fn(usize, usize) -> usize);
/// ```
#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! host_fn {
    (fn($($arg:ty),* $(,)?) $(-> $ret:ty)?) => {
        extern "C" fn($($arg),*) $(-> $ret)?
    };
}
