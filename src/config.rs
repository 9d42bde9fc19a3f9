//! Configuration file parsing (`fw.toml`) and build target state.
//!
//! `fw.toml` names the executable, the chip profile, the platform and the
//! build directory, and carries a free-form `[params]` table that
//! declaration units read (log levels, crt0 selection, libc options).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing at the firmware module sources (kernel,
/// libc, chip support). Required to declare any executable.
pub const HOME_ENV: &str = "FWB_HOME";

/// Colon-separated extra source-search paths, threaded into the tree as
/// the outermost search-path ancestor.
pub const MODULES_ENV: &str = "FWB_MODULES";

#[derive(Deserialize, Debug, Default)]
pub struct FwConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub params: toml::Table,
}

#[derive(Deserialize, Debug, Default)]
pub struct TargetConfig {
    /// Name of the executable to build.
    pub name: String,
    /// Chip profile name, resolved to `profiles/<chip>.toml`.
    pub chip: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_builddir")]
    pub builddir: PathBuf,
}

fn default_platform() -> String {
    "gvsoc".to_string()
}

fn default_builddir() -> PathBuf {
    PathBuf::from("build")
}

/// Load `fw.toml` from the current directory.
pub fn load_config() -> Result<FwConfig> {
    if !Path::new("fw.toml").exists() {
        return Err(anyhow::anyhow!(
            "fw.toml not found in current directory.\n\n\
            Tip: create one with a [target] table naming the executable and chip."
        ));
    }
    let config_str =
        fs::read_to_string("fw.toml").context("Failed to read fw.toml - check file permissions")?;
    let config: FwConfig = toml::from_str(&config_str)
        .context("Failed to parse fw.toml - check for syntax errors (missing quotes, brackets)")?;
    Ok(config)
}

/// Read the modules home from [`HOME_ENV`]. Its absence is a fatal
/// configuration error.
pub fn modules_home() -> Result<PathBuf> {
    match std::env::var(HOME_ENV) {
        Ok(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => Err(anyhow::anyhow!(
            "{} is not defined, it must point to the firmware module sources",
            HOME_ENV
        )),
    }
}

/// Read the extra module search paths from [`MODULES_ENV`], empty when the
/// variable is unset. Read once at startup; the result is passed by value
/// so path resolution never consults hidden global state.
pub fn module_search_paths() -> Vec<PathBuf> {
    match std::env::var(MODULES_ENV) {
        Ok(paths) => paths
            .split(':')
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// The build target one configuration tree is declared for.
///
/// This is the read-only context handed to declaration units; they query
/// parameters from it and never mutate it.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub name: String,
    pub platform: String,
    /// Base build directory; executables extend it with their tree path.
    pub builddir: PathBuf,
    /// Modules home directory (from [`HOME_ENV`]).
    pub home: PathBuf,
    /// Free-form declaration parameters from `fw.toml`'s `[params]`.
    pub params: toml::Table,
}

impl Target {
    pub fn new(config: &FwConfig, home: PathBuf) -> Self {
        Target {
            name: config.target.name.clone(),
            platform: config.target.platform.clone(),
            builddir: config.target.builddir.clone(),
            home,
            params: config.params.clone(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&toml::Value> {
        self.params.get(key)
    }

    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        self.param(key).and_then(toml::Value::as_bool).unwrap_or(default)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(toml::Value::as_str)
    }

    /// A list-valued parameter; a missing key is an empty list.
    pub fn param_list(&self, key: &str) -> Vec<&str> {
        self.param(key)
            .and_then(toml::Value::as_array)
            .map(|values| values.iter().filter_map(toml::Value::as_str).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Target {
            name: "test".to_string(),
            platform: "gvsoc".to_string(),
            builddir: PathBuf::from("build"),
            home: PathBuf::from("/modules"),
            params: toml::Table::new(),
        }
    }
}
