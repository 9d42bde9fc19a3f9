//! Incremental planning, command-graph construction and execution.

pub mod graph;
pub mod planner;
pub mod runner;

pub use graph::{Command, CommandGraph, CommandId, CommandKind, build_graph, write_compile_commands};
pub use planner::{CompileOperation, pending_compiles};
pub use runner::run;

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

/// Remove the build directory.
pub fn clean(builddir: &Path) -> Result<()> {
    if builddir.exists() {
        fs::remove_dir_all(builddir).context("Failed to remove build directory")?;
        println!("{} Build directory cleaned", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}
