//! Data-driven chip profiles.
//!
//! A chip profile bundles everything that used to require one dedicated
//! executable/module specialization per chip family: toolchain selection
//! and installation-root variable, instruction-set flags, identifying
//! defines, the linker-script template with its memory window, and the
//! chip's HAL sources. One generic constructor consumes the profile and
//! assembles the executable's configuration tree.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Target;
use crate::container::{ConfigTree, NodeId, NodeKind, Scope, UnitLocator};
use crate::toolchain::{Toolchain, ToolchainConfig, ToolchainKind};

/// Per-chip build profile, loaded from `profiles/<chip>.toml`.
#[derive(Deserialize, Debug, Clone)]
pub struct ChipProfile {
    /// Chip name, also the value of `CONFIG_CHIP_NAME`.
    pub name: String,
    /// Chip family name; defaults to the chip name.
    #[serde(default)]
    pub family: Option<String>,
    /// Default toolchain family; `fw.toml` may override it with the
    /// `toolchain` parameter.
    pub toolchain: ToolchainKind,
    /// Installation-root environment variable per toolchain family. The
    /// variable travels with the resolved family, not with the profile's
    /// default, so overriding the family switches variables too.
    #[serde(default)]
    pub gcc_path_env: Option<String>,
    #[serde(default)]
    pub llvm_path_env: Option<String>,
    /// Instruction-set string, applied as `-march=` to both compile and
    /// link lines.
    pub march: String,
    /// Source-relative path of the linker-script template.
    #[serde(default)]
    pub linker_script: Option<String>,
    /// Memory window substituted into the linker script.
    #[serde(default)]
    pub mem_start: Option<String>,
    #[serde(default)]
    pub mem_size: Option<String>,
    /// Chip HAL sources compiled into every executable.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl ChipProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read chip profile {}", path.display()))?;
        let profile: ChipProfile = toml::from_str(&text)
            .with_context(|| format!("unable to parse chip profile {}", path.display()))?;
        Ok(profile)
    }

    /// Locate a chip profile: the project's `profiles/` directory first,
    /// then the modules home.
    pub fn find(chip: &str, home: &Path) -> Result<Self> {
        let file = format!("{chip}.toml");
        let candidates = [
            PathBuf::from("profiles").join(&file),
            home.join("profiles").join(&file),
        ];
        for candidate in &candidates {
            if candidate.exists() {
                return Self::load(candidate);
            }
        }
        bail!(
            "no chip profile found for '{}' (looked for profiles/{} here and under {})",
            chip,
            file,
            home.display()
        )
    }

    pub fn family(&self) -> &str {
        self.family.as_deref().unwrap_or(&self.name)
    }

    /// Installation-root variable for one toolchain family.
    pub fn path_env(&self, kind: ToolchainKind) -> Option<&str> {
        match kind {
            ToolchainKind::RiscvGcc => self.gcc_path_env.as_deref(),
            ToolchainKind::RiscvLlvm => self.llvm_path_env.as_deref(),
        }
    }

    /// `CONFIG_CHIP_<NAME>` identifying define, non-alphanumerics folded
    /// to underscores.
    fn chip_define(&self) -> String {
        let sanitized: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("CONFIG_CHIP_{sanitized}")
    }
}

fn toolchain_kind(name: &str) -> Result<ToolchainKind> {
    match name {
        "gcc" => Ok(ToolchainKind::RiscvGcc),
        "llvm" | "clang" => Ok(ToolchainKind::RiscvLlvm),
        other => bail!("unknown toolchain '{}' (expected gcc or llvm)", other),
    }
}

/// Create a fully configured executable for a chip profile.
///
/// The executable gets the profile's toolchain; an `os` module child
/// carries the chip-identifying defines, ISA flags, linker-script template
/// and HAL sources, then imports the firmware module tree from the target's
/// home directory.
pub fn new_executable(
    tree: &mut ConfigTree,
    name: &str,
    target: &Target,
    profile: &ChipProfile,
    units: &dyn UnitLocator,
) -> Result<NodeId> {
    let executable = tree.new_executable(name, &target.builddir);
    let mut scope = Scope::new(tree, executable, units);

    let kind = match target.param_str("toolchain") {
        Some(choice) => toolchain_kind(choice)?,
        None => profile.toolchain,
    };
    scope.set_toolchain(Toolchain::new(
        kind,
        ToolchainConfig {
            use_ccache: target.param_bool("toolchain.ccache", true),
            incremental: target.param_bool("toolchain.incremental", true),
            path_env: profile.path_env(kind).map(str::to_string),
        },
    ));

    let os = scope.add_child("os", NodeKind::Module)?;
    let mut os_scope = scope.at(os);

    os_scope.add_define("CONFIG_CHIP_NAME", Some(&profile.name));
    os_scope.add_define("CONFIG_CHIP_FAMILY_NAME", Some(profile.family()));
    os_scope.add_define(&profile.chip_define(), Some("1"));
    os_scope.add_define("__RV32__", Some("1"));

    if let Some(template) = &profile.linker_script {
        let script = os_scope.new_template_file(target, "linker_script", "link.ld", template);
        if let Some(mem_start) = &profile.mem_start {
            script.add_parameter("mem_start", mem_start);
        }
        if let Some(mem_size) = &profile.mem_size {
            script.add_parameter("mem_size", mem_size);
        }
        let script_path = script.output().to_path_buf();
        os_scope.add_ldflag(format!("-T{}", script_path.display()));
    }

    os_scope.add_cflag(format!("-march={}", profile.march));
    os_scope.add_ldflag(format!("-march={}", profile.march));

    os_scope.add_sources(profile.sources.iter().cloned());

    os_scope.import_subdirectory(&target.home, target)?;

    Ok(executable)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULP_OPEN: &str = r#"
name = "pulp_open"
toolchain = "gcc"
gcc_path_env = "PULP_OPEN_GCC_TOOLCHAIN"
march = "rv32imafc"
linker_script = "chips/pulp_open/link.ld"
mem_start = "0x1c000000"
mem_size = "0x80000"
sources = ["chips/pulp_open/kernel/hal.c"]
"#;

    #[test]
    fn test_parse_profile() {
        let profile: ChipProfile = toml::from_str(PULP_OPEN).unwrap();
        assert_eq!(profile.name, "pulp_open");
        assert_eq!(profile.family(), "pulp_open");
        assert_eq!(profile.toolchain, ToolchainKind::RiscvGcc);
        assert_eq!(profile.march, "rv32imafc");
        assert_eq!(profile.chip_define(), "CONFIG_CHIP_PULP_OPEN");
        assert_eq!(
            profile.path_env(ToolchainKind::RiscvGcc),
            Some("PULP_OPEN_GCC_TOOLCHAIN")
        );
        assert_eq!(profile.path_env(ToolchainKind::RiscvLlvm), None);
    }

    #[test]
    fn test_toolchain_override_switches_path_env() {
        let profile: ChipProfile = toml::from_str(
            r#"
name = "snitch/testbench"
toolchain = "llvm"
gcc_path_env = "SNITCH_GCC_TOOLCHAIN"
llvm_path_env = "SNITCH_LLVM_TOOLCHAIN"
march = "rv32imafdc"
"#,
        )
        .unwrap();

        let params: toml::Table = toml::from_str(r#"toolchain = "gcc""#).unwrap();
        let target = Target {
            name: "app".to_string(),
            platform: "gvsoc".to_string(),
            builddir: std::path::PathBuf::from("build"),
            home: std::path::PathBuf::from("/os"),
            params,
        };
        let units = crate::units::builtin_registry(&target.home);

        let mut tree = ConfigTree::new(Vec::new());
        let executable = new_executable(&mut tree, "app", &target, &profile, &units).unwrap();

        let toolchain = tree.toolchain(executable).unwrap();
        assert_eq!(toolchain.kind(), ToolchainKind::RiscvGcc);
        assert_eq!(
            toolchain.config().path_env.as_deref(),
            Some("SNITCH_GCC_TOOLCHAIN")
        );
    }

    #[test]
    fn test_chip_define_sanitizes_name() {
        let profile: ChipProfile = toml::from_str(
            r#"
name = "snitch/testbench"
toolchain = "llvm"
march = "rv32imafdc"
"#,
        )
        .unwrap();
        assert_eq!(profile.chip_define(), "CONFIG_CHIP_SNITCH_TESTBENCH");
    }

    #[test]
    fn test_unknown_toolchain_rejected() {
        assert!(toolchain_kind("msvc").is_err());
        assert_eq!(toolchain_kind("clang").unwrap(), ToolchainKind::RiscvLlvm);
    }
}
