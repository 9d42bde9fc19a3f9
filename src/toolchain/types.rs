use serde::{Deserialize, Serialize};

/// Supported cross-toolchain families.
///
/// Both families share the same command-assembly algorithm; they differ
/// only in the resolved executable name and in the family-specific default
/// flags the chip profile supplies (ISA string, relax/no-relax options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolchainKind {
    /// RISC-V GCC (riscv32-unknown-elf-gcc)
    #[serde(rename = "gcc")]
    RiscvGcc,
    /// RISC-V LLVM (clang)
    #[serde(rename = "llvm")]
    RiscvLlvm,
}

impl ToolchainKind {
    /// Bare name of the compiler/linker driver for this family.
    pub fn command(&self) -> &'static str {
        match self {
            ToolchainKind::RiscvGcc => "riscv32-unknown-elf-gcc",
            ToolchainKind::RiscvLlvm => "clang",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolchainKind::RiscvGcc => "riscv-gcc",
            ToolchainKind::RiscvLlvm => "riscv-llvm",
        }
    }
}

/// Overall toolchain behavior, independent of the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Prefix compile and link invocations with the ccache wrapper.
    pub use_ccache: bool,
    /// Emit dependency-tracking flags so the next planning pass can make
    /// per-header staleness decisions.
    pub incremental: bool,
    /// Environment variable holding the toolchain installation root. When
    /// set, the driver is resolved as `$VAR/bin/<command>` and the variable
    /// being unset is a fatal configuration error; when `None`, the bare
    /// command name is used and found on the ambient search path.
    pub path_env: Option<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        ToolchainConfig {
            use_ccache: true,
            incremental: true,
            path_env: None,
        }
    }
}

/// Error type for toolchain operations
#[derive(Debug)]
pub enum ToolchainError {
    /// A mandated installation-root environment variable is unset.
    EnvUnset(String),
    /// IO error while preparing the object destination.
    IoError(std::io::Error),
}

impl std::fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolchainError::EnvUnset(var) => {
                write!(f, "{} must be set to the toolchain installation root", var)
            }
            ToolchainError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ToolchainError {}

impl From<std::io::Error> for ToolchainError {
    fn from(e: std::io::Error) -> Self {
        ToolchainError::IoError(e)
    }
}
