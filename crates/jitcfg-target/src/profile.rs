//! The resolved target profile.
//!
//! A [`TargetProfile`] is built once from an [`ArchFamily`] and never
//! changes. Every derived fact is computed from the family by the resolvers
//! in [`crate::width`], [`crate::abi`], [`crate::memory_model`] and
//! [`crate::vector`]; nothing can be set independently of it.

use std::sync::OnceLock;

use serde::Serialize;

use crate::abi::{self, CallTarget, CallingConvention, Toolchain};
use crate::arch::{self, ArchFamily, TargetSignals};
use crate::error::{Result, TargetError};
use crate::memory_model::{self, CacheCoherency, Endianness};
use crate::vector::{self, VectorFp};
use crate::width::{self, WordWidth, FLOAT_SHIFT};

/// Facts derived from a supported family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetFacts {
    pub word_width_bytes: u32,
    /// log2 of `word_width_bytes`.
    pub word_shift: u32,
    /// Always 3: doubles are 8 bytes on every family.
    pub float_shift: u32,
    pub endianness: Endianness,
    pub calling_convention: CallingConvention,
    pub indirect_call_required: bool,
    pub unaligned_access_allowed: bool,
    pub instruction_cache: CacheCoherency,
    pub vector_fp: VectorFp,
}

impl TargetFacts {
    pub fn word_width(&self) -> WordWidth {
        if self.word_width_bytes == 8 {
            WordWidth::W64
        } else {
            WordWidth::W32
        }
    }

    pub fn vector_fp_unit_available(&self) -> bool {
        self.vector_fp.available()
    }

    pub fn vector_fp_autodetect(&self) -> bool {
        self.vector_fp.autodetect()
    }
}

/// An invariant a profile failed to satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyIssue {
    pub message: String,
}

/// Immutable description of the execution target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetProfile {
    family: ArchFamily,
    #[serde(flatten)]
    facts: Option<TargetFacts>,
}

static HOST: OnceLock<TargetProfile> = OnceLock::new();
static NATIVE: OnceLock<TargetProfile> = OnceLock::new();

impl TargetProfile {
    /// Resolve the profile for `family` with the default toolchain.
    pub fn resolve(family: ArchFamily) -> Self {
        Self::resolve_with(family, Toolchain::default())
    }

    /// Resolve the profile for `family`.
    ///
    /// Never fails: an unsupported family yields a profile whose facts are
    /// unavailable.
    pub fn resolve_with(family: ArchFamily, toolchain: Toolchain) -> Self {
        let facts = derive_facts(family, toolchain);
        let profile = Self { family, facts };
        crate::jit_assert!(
            profile.check_consistency().is_ok(),
            "inconsistent profile for {family}: {:?}",
            profile.check_consistency()
        );
        log::debug!("resolved target profile for {family}");
        profile
    }

    /// Detect the family from `signals` and resolve it.
    pub fn detect(signals: &TargetSignals, toolchain: Toolchain) -> Self {
        Self::resolve_with(arch::detect(signals), toolchain)
    }

    /// The profile of the machine this crate was compiled for.
    ///
    /// Resolved on first use and shared for the rest of the process.
    pub fn host() -> &'static TargetProfile {
        HOST.get_or_init(|| {
            let signals = TargetSignals::host();
            let profile = Self::detect(&signals, Toolchain::default());
            if signals.explicit.is_none() {
                if let Ok(facts) = profile.facts() {
                    crate::jit_assert!(
                        facts.word_width() == WordWidth::host(),
                        "host word is {} bits but {} resolved {} bits",
                        WordWidth::host().bits(),
                        profile.family,
                        facts.word_width().bits()
                    );
                }
            }
            profile
        })
    }

    /// The profile of the machine actually running this process, ignoring
    /// any compile-time override. Only code resolved for this family may be
    /// executed or have its instruction cache synchronized here.
    pub fn native() -> &'static TargetProfile {
        NATIVE.get_or_init(|| {
            Self::detect(&TargetSignals::host_identity(), Toolchain::default())
        })
    }

    pub fn family(&self) -> ArchFamily {
        self.family
    }

    pub fn is_supported(&self) -> bool {
        self.facts.is_some()
    }

    /// All derived facts, or [`TargetError::Unsupported`].
    pub fn facts(&self) -> Result<&TargetFacts> {
        self.require("target facts")
    }

    /// Fail unless the profile describes a supported family.
    pub fn ensure_supported(&self) -> Result<()> {
        self.require("target profile").map(|_| ())
    }

    pub fn word_width(&self) -> Result<WordWidth> {
        self.require("word width").map(TargetFacts::word_width)
    }

    pub fn word_width_bytes(&self) -> Result<u32> {
        self.require("word width").map(|f| f.word_width_bytes)
    }

    pub fn word_shift(&self) -> Result<u32> {
        self.require("word shift").map(|f| f.word_shift)
    }

    pub fn float_shift(&self) -> Result<u32> {
        self.require("float shift").map(|f| f.float_shift)
    }

    pub fn endianness(&self) -> Result<Endianness> {
        self.require("endianness").map(|f| f.endianness)
    }

    pub fn calling_convention(&self) -> Result<CallingConvention> {
        self.require("calling convention").map(|f| f.calling_convention)
    }

    pub fn indirect_call_required(&self) -> Result<bool> {
        self.require("indirect call requirement")
            .map(|f| f.indirect_call_required)
    }

    pub fn unaligned_access_allowed(&self) -> Result<bool> {
        self.require("unaligned access permission")
            .map(|f| f.unaligned_access_allowed)
    }

    pub fn instruction_cache(&self) -> Result<CacheCoherency> {
        self.require("instruction cache model")
            .map(|f| f.instruction_cache)
    }

    pub fn vector_fp(&self) -> Result<VectorFp> {
        self.require("vector FP mode").map(|f| f.vector_fp)
    }

    pub fn vector_fp_unit_available(&self) -> Result<bool> {
        self.vector_fp().map(VectorFp::available)
    }

    pub fn vector_fp_autodetect(&self) -> Result<bool> {
        self.vector_fp().map(VectorFp::autodetect)
    }

    /// Whether an access of `size` bytes at an address aligned to `align`
    /// must be split into aligned pieces.
    pub fn needs_split_access(&self, size: u32, align: u32) -> Result<bool> {
        let facts = self.require("unaligned access permission")?;
        Ok(!facts.unaligned_access_allowed && align < size)
    }

    /// How host code must call code that starts at `entry`.
    pub fn call_target(&self, entry: u64, toc: u64) -> Result<CallTarget> {
        let facts = self.require("indirect call requirement")?;
        Ok(CallTarget::for_code(facts.indirect_call_required, entry, toc))
    }

    /// Check the invariants that tie the derived facts to the family.
    pub fn check_consistency(&self) -> std::result::Result<(), Vec<ConsistencyIssue>> {
        let Some(facts) = &self.facts else {
            return Ok(());
        };
        let mut issues = Vec::new();
        let mut issue = |message: String| issues.push(ConsistencyIssue { message });

        if !matches!(facts.word_width_bytes, 4 | 8) {
            issue(format!("word width {} is not 4 or 8", facts.word_width_bytes));
        }
        if facts.word_width_bytes != 1 << facts.word_shift {
            issue(format!(
                "word width {} does not equal 1 << word shift {}",
                facts.word_width_bytes, facts.word_shift
            ));
        }
        if facts.float_shift != FLOAT_SHIFT {
            issue(format!("float shift {} is not {FLOAT_SHIFT}", facts.float_shift));
        }
        if (facts.endianness == Endianness::Big) != self.family.is_ppc() {
            issue(format!("{} cannot be {}", self.family, facts.endianness));
        }
        if facts.indirect_call_required != (self.family == ArchFamily::Ppc64) {
            issue(format!(
                "{} cannot {}require descriptor calls",
                self.family,
                if facts.indirect_call_required { "" } else { "not " }
            ));
        }
        if (facts.instruction_cache == CacheCoherency::Unified) != self.family.is_x86() {
            issue(format!(
                "{} cannot have a {:?} instruction cache",
                self.family, facts.instruction_cache
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    fn require(&self, fact: &'static str) -> Result<&TargetFacts> {
        self.facts.as_ref().ok_or(TargetError::Unsupported { fact })
    }
}

fn derive_facts(family: ArchFamily, toolchain: Toolchain) -> Option<TargetFacts> {
    let width = width::word_width(family)?;
    Some(TargetFacts {
        word_width_bytes: width.bytes(),
        word_shift: width.shift(),
        float_shift: FLOAT_SHIFT,
        endianness: memory_model::byte_order(family)?,
        calling_convention: abi::calling_convention(family, toolchain)?,
        indirect_call_required: abi::indirect_call_required(family)?,
        unaligned_access_allowed: memory_model::unaligned_access_allowed(family)?,
        instruction_cache: memory_model::cache_coherency(family)?,
        vector_fp: vector::vector_fp(family)?,
    })
}
