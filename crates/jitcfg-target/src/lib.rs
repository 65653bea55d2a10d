//! Target profile resolution for JIT backends.
//!
//! Resolves, once, the machine facts a code generator needs before it can
//! emit or run instructions:
//! - **Architecture family:** detected from build-time signals or forced
//! - **Word width:** word size and index shifts
//! - **ABI:** calling convention and call indirection
//! - **Memory model:** byte order, unaligned access, instruction cache
//!
//! The result is an immutable [`TargetProfile`]. Debug-only invariant checks
//! live in [`diag`].

pub mod abi;
pub mod arch;
pub mod config;
pub mod diag;
pub mod error;
pub mod memory_model;
pub mod profile;
pub mod vector;
pub mod width;

pub use abi::{CallTarget, CallingConvention, FunctionDescriptor, Toolchain};
pub use arch::{detect, ArchFamily, ArmIsaLevel, TargetSignals};
pub use error::{Result, TargetError};
pub use memory_model::{CacheCoherency, Endianness};
pub use profile::{TargetFacts, TargetProfile};
pub use vector::VectorFp;
pub use width::{SByte, SWord, UByte, UWord, WordWidth, FLOAT_SHIFT, WORD_SHIFT};
