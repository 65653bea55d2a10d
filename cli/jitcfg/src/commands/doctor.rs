//! `jitcfg doctor`: host diagnostics.

use std::path::Path;

use anyhow::Result;
use jitcfg_exec::ExecutionEnv;
use jitcfg_target::arch::{self, OVERRIDE_ENV};
use jitcfg_target::config;
use jitcfg_target::vector::probe_vector_fp;
use jitcfg_target::{diag, TargetProfile, TargetSignals};

/// Print host detection results and try to run generated code.
pub fn run(cwd: &Path) -> Result<()> {
    println!("=== jitcfg Doctor ===");
    println!();

    println!("jitcfg version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Diagnostics:    {}",
        if diag::ENABLED { "enabled" } else { "disabled" }
    );
    println!();

    println!("--- Host ---");
    let identity = TargetSignals::host_identity();
    println!("  Arch:     {}", identity.arch);
    println!("  Detected: {}", arch::detect(&identity));
    match arch::build_override() {
        Some(family) => println!("  {OVERRIDE_ENV} (build time): {family}"),
        None => println!("  {OVERRIDE_ENV} (build time): not set"),
    }
    let profile = TargetProfile::host();
    println!("  Profile:  {}", profile.family());
    if profile.family() != TargetProfile::native().family() {
        println!("  Profile differs from this machine; generated code will not run here.");
    }
    println!();

    println!("--- Vector FP ---");
    match profile.vector_fp() {
        Ok(unit) if unit.autodetect() => {
            println!("  {unit:?}: probe says {}", present(probe_vector_fp()));
        }
        Ok(unit) => println!("  {unit:?}"),
        Err(e) => println!("  {e}"),
    }
    println!();

    println!("--- Configuration ---");
    match config::find_config(cwd) {
        Ok(Some((config, dir))) => {
            println!("  {}: found in {}", config::CONFIG_FILE, dir.display());
            println!("  Resolves to: {}", config.resolve(&TargetSignals::host()).family());
        }
        Ok(None) => println!("  {}: not found", config::CONFIG_FILE),
        Err(e) => println!("  {}: error: {e}", config::CONFIG_FILE),
    }
    println!();

    println!("--- Code Execution ---");
    match smoke_test() {
        Ok(Some(result)) => println!("  Generated code returned {result}: ok"),
        Ok(None) => println!(
            "  Skipped: no test sequence for {}",
            TargetProfile::native().family()
        ),
        Err(e) => println!("  Failed: {e}"),
    }

    Ok(())
}

fn present(found: bool) -> &'static str {
    if found {
        "present"
    } else {
        "absent"
    }
}

/// Install and call `mov eax, 42; ret`.
#[cfg(target_arch = "x86_64")]
fn smoke_test() -> jitcfg_exec::Result<Option<u32>> {
    let env = ExecutionEnv::native()?;
    let region = env.install(&[0xb8, 0x2a, 0x00, 0x00, 0x00, 0xc3])?;
    // SAFETY: the region holds a complete function with no arguments that
    // returns in eax, and it is released only after the call.
    let result = unsafe {
        let func: jitcfg_target::host_fn!(fn() -> u32) = region.entry(0)?;
        func()
    };
    env.release_executable(region)?;
    Ok(Some(result))
}

/// Allocation and protection changes are still exercised; nothing is called.
#[cfg(not(target_arch = "x86_64"))]
fn smoke_test() -> jitcfg_exec::Result<Option<u32>> {
    let env = ExecutionEnv::native()?;
    let mut region = env.allocate_executable(16)?;
    region.write(0, &[0; 16])?;
    env.make_executable(&mut region)?;
    env.release_executable(region)?;
    Ok(None)
}
