//! Executable memory for JIT backends.
//!
//! Code memory moves through two phases: writable while instructions are
//! emitted, then read-execute once the instruction cache has been
//! synchronized over the written bytes. Allocation is pluggable through
//! [`ExecAllocator`]; [`ExecutionEnv`] bundles an allocator with the
//! resolved [`jitcfg_target::TargetProfile`] for injection into an engine.

pub mod alloc;
pub mod env;
pub mod error;
pub mod icache;
pub mod region;

pub use alloc::{AllocatorStats, ExecAllocator, MmapAllocator};
pub use env::ExecutionEnv;
pub use error::{ExecError, Result};
pub use icache::synchronize_instruction_cache;
pub use region::CodeRegion;
