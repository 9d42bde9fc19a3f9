//! # fwbuild - Declarative Firmware Build Planner
//!
//! fwbuild assembles cross-compiled firmware executables out of reusable
//! source modules (kernel, libc, chip support) declared as a hierarchical
//! configuration tree, and rebuilds only what changed.
//!
//! ## Features
//!
//! - **Declarative Configuration**: per-directory declaration units build
//!   one container tree per executable, then the tree is read-only
//! - **Attribute Propagation**: defines and include folders carry
//!   independent internal/external visibility; flags merge in declaration
//!   order
//! - **Conservative Incremental Builds**: compiler-emitted dependency
//!   records plus an equal-counts-as-stale timestamp rule
//! - **Toolchain Abstraction**: RISC-V GCC and LLVM families behind one
//!   command-assembly algorithm, optional ccache wrapping
//! - **Chip Profiles**: data-driven per-chip toolchain defaults, ISA flags
//!   and linker-script templates
//!
//! ## Module Organization
//!
//! - [`container`] - Configuration tree and declaration protocol
//! - [`attrs`] - Attribute resolution (internal/external views)
//! - [`build`] - Incremental planner, command graph, scheduler
//! - [`toolchain`] - Compile/link command construction
//! - [`profile`] - Chip profiles
//! - [`units`] - Built-in declaration units

/// Attribute resolution over the configuration tree.
pub mod attrs;

/// Incremental planning, command graph and execution.
pub mod build;

/// Configuration file parsing (`fw.toml`) and target state.
pub mod config;

/// The hierarchical configuration tree and declaration protocol.
pub mod container;

/// Data-driven chip profiles.
pub mod profile;

/// Idempotent template-file generation.
pub mod template;

/// Toolchain abstraction (compile/link command construction).
pub mod toolchain;

/// Configuration tree visualization.
pub mod tree;

/// Built-in declaration units for the firmware module tree.
pub mod units;
