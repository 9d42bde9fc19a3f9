//! Toolchain abstraction.
//!
//! Turns a resolved bundle of flags, includes and defines into concrete
//! compile and link command lines without exposing family-specific syntax
//! to callers. The driver executable is resolved from a configured
//! installation-root environment variable, or from the ambient search path
//! when no variable is configured.

pub mod types;

pub use types::{ToolchainConfig, ToolchainError, ToolchainKind};

use std::fs;
use std::path::{Path, PathBuf};

use crate::attrs::{Define, Include};

/// Everything needed to compile one source file.
#[derive(Debug, Clone)]
pub struct CompileSpec {
    pub builddir: PathBuf,
    /// Source name as declared (relative), used to derive the object path.
    pub source: String,
    /// Resolved path handed to the compiler.
    pub source_path: PathBuf,
    pub cflags: Vec<String>,
    pub includes: Vec<Include>,
    pub defines: Vec<Define>,
}

/// Everything needed to link one executable.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub builddir: PathBuf,
    pub binary: PathBuf,
    /// Declared sources with their resolved paths; objects are derived
    /// from the declared names.
    pub sources: Vec<(String, PathBuf)>,
    pub ldflags: Vec<String>,
    pub lib_includes: Vec<PathBuf>,
}

/// A configured toolchain instance attached to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    kind: ToolchainKind,
    config: ToolchainConfig,
}

/// Object path for a declared source: the source path with its extension
/// replaced by `.o`, under the build directory.
pub fn object_path(builddir: &Path, source: &str) -> PathBuf {
    builddir.join(Path::new(source).with_extension("o"))
}

impl Toolchain {
    pub fn new(kind: ToolchainKind, config: ToolchainConfig) -> Self {
        Toolchain { kind, config }
    }

    pub fn kind(&self) -> ToolchainKind {
        self.kind
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Resolve the driver executable. With a configured installation-root
    /// variable the driver lives under `$VAR/bin/`; the variable being
    /// unset is fatal. Without one, the bare name is left to the ambient
    /// search path.
    fn driver(&self) -> Result<String, ToolchainError> {
        match &self.config.path_env {
            Some(var) => {
                let root =
                    std::env::var(var).map_err(|_| ToolchainError::EnvUnset(var.clone()))?;
                Ok(format!("{}/bin/{}", root, self.kind.command()))
            }
            None => Ok(self.kind.command().to_string()),
        }
    }

    /// Build the compile command line for one source.
    ///
    /// Creates the object's destination directory as a side effect of
    /// command construction, so the external scheduler can run the command
    /// as-is.
    pub fn compile_command(&self, spec: &CompileSpec) -> Result<String, ToolchainError> {
        let cc = self.driver()?;

        let mut cflags = spec.cflags.clone();

        if self.config.incremental {
            cflags.push("-MMD".to_string());
            cflags.push("-MP".to_string());
        }

        for define in &spec.defines {
            match &define.value {
                Some(value) => cflags.push(format!("-D{}={}", define.name, value)),
                None => cflags.push(format!("-D{}", define.name)),
            }
        }

        for include in &spec.includes {
            cflags.push(format!("-I{}", include.path.display()));
        }

        if Path::new(&spec.source).extension().is_some_and(|ext| ext == "S") {
            cflags.push("-DLANGUAGE_ASSEMBLY".to_string());
        }

        let obj = object_path(&spec.builddir, &spec.source);
        if let Some(parent) = obj.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut cmd = Vec::new();
        if self.config.use_ccache {
            cmd.push("ccache".to_string());
        }
        cmd.push(cc);
        cmd.push(format!(
            "-c {} -o {} {}",
            spec.source_path.display(),
            obj.display(),
            cflags.join(" ")
        ));

        Ok(cmd.join(" "))
    }

    /// Build the link command line for one executable.
    pub fn link_command(&self, spec: &LinkSpec) -> Result<String, ToolchainError> {
        let ld = self.driver()?;

        let mut cmd = Vec::new();
        if self.config.use_ccache {
            cmd.push("ccache".to_string());
        }
        cmd.push(ld);

        for (source, _path) in &spec.sources {
            cmd.push(object_path(&spec.builddir, source).display().to_string());
        }

        for include in &spec.lib_includes {
            cmd.push(format!("-L{}", include.display()));
        }

        cmd.extend(spec.ldflags.iter().cloned());

        cmd.push(format!("-o {}", spec.binary.display()));

        Ok(cmd.join(" "))
    }
}
