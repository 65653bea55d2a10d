//! `jitcfg.toml` parsing, serialization, validation, and discovery.
//!
//! The configuration file is the only runtime-visible way to select a
//! family explicitly. It carries an optional family override and toolchain
//! capabilities; everything else is derived from the family.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::abi::{self, Toolchain};
use crate::arch::{self, ArchFamily, TargetSignals};
use crate::error::{Result, TargetError};
use crate::profile::TargetProfile;

/// Conventional configuration file name.
pub const CONFIG_FILE: &str = "jitcfg.toml";

/// Contents of a `jitcfg.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub toolchain: ToolchainSection,
}

/// `[target]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TargetSection {
    /// Explicit family. Wins over every detected signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ArchFamily>,
}

/// `[toolchain]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolchainSection {
    /// Whether x86-32 fastcall may be used (default: true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastcall_available: Option<bool>,
}

impl TargetConfig {
    pub fn toolchain(&self) -> Toolchain {
        let default = Toolchain::default();
        Toolchain {
            fastcall_available: self
                .toolchain
                .fastcall_available
                .unwrap_or(default.fastcall_available),
        }
    }

    /// `base` with this configuration's override applied.
    pub fn apply(&self, base: &TargetSignals) -> TargetSignals {
        TargetSignals {
            explicit: self.target.family.or(base.explicit),
            ..base.clone()
        }
    }

    /// Resolve the profile these settings select on top of `base`.
    pub fn resolve(&self, base: &TargetSignals) -> TargetProfile {
        TargetProfile::detect(&self.apply(base), self.toolchain())
    }
}

/// A validation issue found in a configuration.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<TargetConfig> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse a configuration from a TOML string.
pub fn parse_config(toml_str: &str) -> Result<TargetConfig> {
    let config: TargetConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Serialize a configuration to pretty TOML.
pub fn config_to_toml(config: &TargetConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// Serialize a resolved profile to pretty TOML.
pub fn profile_to_toml(profile: &TargetProfile) -> Result<String> {
    Ok(toml::to_string_pretty(profile)?)
}

/// Serialize a resolved profile to pretty JSON.
pub fn profile_to_json(profile: &TargetProfile) -> Result<String> {
    Ok(serde_json::to_string_pretty(profile)?)
}

/// Validate a configuration against the identity of the machine it will be
/// used on.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
pub fn validate_config(
    config: &TargetConfig,
    host: &TargetSignals,
) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let effective = arch::detect(&config.apply(host));

    // 1. Selecting the sentinel explicitly disables the backend
    if config.target.family == Some(ArchFamily::Unsupported) {
        issues.push(ValidationIssue {
            severity: "error",
            message: "target family is explicitly set to 'unsupported'".into(),
        });
    } else if !effective.is_supported() {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "no supported family matches host arch '{}'; set [target] family",
                host.arch
            ),
        });
    }

    // 2. Toolchain capabilities only matter for x86-32
    if config.toolchain.fastcall_available.is_some() && effective != ArchFamily::X86_32 {
        issues.push(ValidationIssue {
            severity: "warning",
            message: format!("fastcall-available has no effect on {effective}"),
        });
    }

    let native = arch::detect(&TargetSignals {
        explicit: None,
        ..host.clone()
    });

    // 3. Native code is called through `host_fn!`, whose convention is fixed
    if effective == native {
        let resolved = abi::calling_convention(native, config.toolchain());
        let spelled = abi::host_fn_convention(native);
        if let (Some(resolved), Some(spelled)) = (resolved, spelled) {
            if resolved != spelled {
                issues.push(ValidationIssue {
                    severity: "error",
                    message: format!(
                        "toolchain settings select {resolved} on {native} but host call sites use {spelled}"
                    ),
                });
            }
        }
    }

    // 4. Cross configurations cannot execute what they generate
    if effective.is_supported() && native.is_supported() && effective != native {
        issues.push(ValidationIssue {
            severity: "warning",
            message: format!(
                "family {effective} differs from host family {native}; generated code cannot run here"
            ),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Generate a template `jitcfg.toml`, optionally pinned to `family`.
pub fn generate_template(family: Option<ArchFamily>) -> Result<String> {
    let config = TargetConfig {
        target: TargetSection { family },
        toolchain: ToolchainSection::default(),
    };
    let body = config_to_toml(&config)?;
    Ok(format!(
        "# JIT target configuration.\n\
         # [target] family: one of {}\n\
         # [toolchain] fastcall-available: x86-32 only\n\n{body}",
        ArchFamily::NAMES.join(", ")
    ))
}

/// Find `jitcfg.toml` in `start` or the nearest ancestor and load it.
///
/// Returns the configuration and the directory it was found in.
pub fn find_config(start: &Path) -> Result<Option<(TargetConfig, PathBuf)>> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            let config = load_config(&candidate)?;
            log::debug!("loaded {}", candidate.display());
            return Ok(Some((config, dir.to_path_buf())));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x86_64_host() -> TargetSignals {
        TargetSignals::for_arch("x86_64")
    }

    #[test]
    fn parse_family_override() {
        let config = parse_config(
            r#"
[target]
family = "arm-thumb2"
"#,
        )
        .unwrap();
        assert_eq!(config.target.family, Some(ArchFamily::ArmThumb2));
        let profile = config.resolve(&x86_64_host());
        assert_eq!(profile.family(), ArchFamily::ArmThumb2);
        assert_eq!(profile.word_width_bytes().unwrap(), 4);
    }

    #[test]
    fn empty_config_uses_detection() {
        let config = parse_config("").unwrap();
        assert_eq!(config, TargetConfig::default());
        assert_eq!(config.resolve(&x86_64_host()).family(), ArchFamily::X86_64);
    }

    #[test]
    fn toolchain_section_selects_stdcall() {
        let config = parse_config(
            r#"
[target]
family = "x86-32"

[toolchain]
fastcall-available = false
"#,
        )
        .unwrap();
        let profile = config.resolve(&x86_64_host());
        assert_eq!(
            profile.calling_convention().unwrap(),
            crate::abi::CallingConvention::Stdcall
        );
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(parse_config("this is not valid toml [[[").is_err());
    }

    #[test]
    fn parse_unknown_family_returns_error() {
        let err = parse_config("[target]\nfamily = \"sparc\"\n").unwrap_err();
        assert!(matches!(err, TargetError::Toml(_)));
    }

    #[test]
    fn parse_unknown_key_returns_error() {
        assert!(parse_config("[target]\nword-width = 8\n").is_err());
    }

    #[test]
    fn config_round_trip() {
        let config = TargetConfig {
            target: TargetSection {
                family: Some(ArchFamily::Mips32),
            },
            toolchain: ToolchainSection {
                fastcall_available: Some(true),
            },
        };
        let toml_str = config_to_toml(&config).unwrap();
        assert_eq!(parse_config(&toml_str).unwrap(), config);
    }

    #[test]
    fn profile_serializes_to_toml_and_json() {
        let profile = TargetProfile::resolve(ArchFamily::Ppc64);
        let toml_str = profile_to_toml(&profile).unwrap();
        assert!(toml_str.contains("family = \"ppc-64\""), "{toml_str}");
        assert!(toml_str.contains("indirect-call-required = true"), "{toml_str}");

        let json = profile_to_json(&profile).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["endianness"], "big");
    }

    #[test]
    fn validate_native_config() {
        assert!(validate_config(&TargetConfig::default(), &x86_64_host()).is_ok());
    }

    #[test]
    fn validate_explicit_unsupported() {
        let config = parse_config("[target]\nfamily = \"unsupported\"\n").unwrap();
        let issues = validate_config(&config, &x86_64_host()).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.severity == "error" && i.message.contains("explicitly")));
    }

    #[test]
    fn validate_undetectable_host() {
        let issues =
            validate_config(&TargetConfig::default(), &TargetSignals::for_arch("riscv64"))
                .unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("riscv64")));
    }

    #[test]
    fn validate_cross_and_useless_fastcall() {
        let config = parse_config(
            "[target]\nfamily = \"ppc-32\"\n[toolchain]\nfastcall-available = true\n",
        )
        .unwrap();
        let issues = validate_config(&config, &x86_64_host()).unwrap_err();
        assert!(issues.iter().all(|i| i.severity == "warning"));
        assert!(issues.iter().any(|i| i.message.contains("no effect")));
        assert!(issues.iter().any(|i| i.message.contains("cannot run here")));
    }

    #[test]
    fn validate_rejects_stdcall_on_native_x86_32() {
        let config = parse_config("[toolchain]\nfastcall-available = false\n").unwrap();
        let x86 = TargetSignals::for_arch("x86");
        assert_eq!(
            config.resolve(&x86).calling_convention().unwrap(),
            crate::abi::CallingConvention::Stdcall
        );
        let issues = validate_config(&config, &x86).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.severity == "error" && i.message.contains("host call sites")));

        let fastcall = parse_config("[toolchain]\nfastcall-available = true\n").unwrap();
        assert!(validate_config(&fastcall, &x86).is_ok());
    }

    #[test]
    fn stdcall_for_cross_x86_32_is_allowed() {
        let config = parse_config(
            "[target]\nfamily = \"x86-32\"\n[toolchain]\nfastcall-available = false\n",
        )
        .unwrap();
        let issues = validate_config(&config, &x86_64_host()).unwrap_err();
        assert!(issues.iter().all(|i| i.severity == "warning"));
    }

    #[test]
    fn generate_template_is_valid() {
        let toml_str = generate_template(Some(ArchFamily::ArmV7)).unwrap();
        let config = parse_config(&toml_str).unwrap();
        assert_eq!(config.target.family, Some(ArchFamily::ArmV7));

        let unpinned = parse_config(&generate_template(None).unwrap()).unwrap();
        assert_eq!(unpinned, TargetConfig::default());
    }

    #[test]
    fn load_not_found() {
        let result = load_config(Path::new("/nonexistent/jitcfg.toml"));
        assert!(matches!(result.unwrap_err(), TargetError::NotFound { .. }));
    }

    #[test]
    fn find_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            generate_template(Some(ArchFamily::Ppc32)).unwrap(),
        )
        .unwrap();

        let (config, found_in) = find_config(&nested).unwrap().unwrap();
        assert_eq!(found_in, dir.path());
        assert_eq!(config.target.family, Some(ArchFamily::Ppc32));
    }

    #[test]
    fn find_config_none() {
        let dir = tempfile::tempdir().unwrap();
        // A stray config above the temp dir would be found; only assert on
        // the no-file case when the walk cannot escape into one.
        if let Some((_, found_in)) = find_config(dir.path()).unwrap() {
            assert!(!found_in.starts_with(dir.path()));
        }
    }
}
