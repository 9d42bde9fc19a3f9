//! # fwbuild CLI Entry Point
//!
//! This is the main executable for the `fwb` command-line tool.
//! It parses CLI arguments using clap and routes commands to the
//! appropriate handlers.
//!
//! ## Command Structure
//!
//! - **Build**: `build`, `plan`, `clean`
//! - **Inspection**: `tree`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use fwbuild::build;
use fwbuild::config::{self, Target};
use fwbuild::container::{ConfigTree, NodeId};
use fwbuild::profile::{self, ChipProfile};
use fwbuild::tree;
use fwbuild::units;

#[derive(Parser)]
#[command(name = "fwb")]
#[command(about = "Declarative, incremental firmware build planner", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and run the incremental build of the configured executable
    Build {
        /// Show the command graph without executing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show which sources would be recompiled, without building
    Plan,
    /// Display the declared configuration tree
    Tree,
    /// Remove the build directory
    Clean,
}

/// Declare the configuration tree for the manifest in the current
/// directory.
fn configure() -> Result<(ConfigTree, NodeId, Target)> {
    let manifest = config::load_config()?;
    let home = config::modules_home()?;
    let chip_profile = ChipProfile::find(&manifest.target.chip, &home)?;
    let target = Target::new(&manifest, home.clone());

    let registry = units::builtin_registry(&home);
    let mut config_tree = ConfigTree::new(config::module_search_paths());
    let executable = profile::new_executable(
        &mut config_tree,
        &manifest.target.name,
        &target,
        &chip_profile,
        &registry,
    )?;

    Ok((config_tree, executable, target))
}

fn cmd_build(dry_run: bool) -> Result<()> {
    let (config_tree, executable, _target) = configure()?;

    let graph = build::build_graph(&config_tree, executable)?;

    if graph.is_empty() {
        println!("{} Up to date", "✓".green());
        return Ok(());
    }

    if dry_run {
        for command in &graph.commands {
            println!("{}", command.line);
        }
        for (from, to) in graph.edges() {
            println!("{} #{} triggers #{}", "·".dimmed(), from.0, to.0);
        }
        return Ok(());
    }

    build::write_compile_commands(&graph, std::path::Path::new("compile_commands.json"))?;

    build::run(&graph)?;
    println!("{} Build finished", "✓".green());
    Ok(())
}

fn cmd_plan() -> Result<()> {
    let (config_tree, executable, _target) = configure()?;

    let builddir = config_tree.builddir(executable)?.to_path_buf();
    let operations = build::pending_compiles(&config_tree, executable, &builddir)?;

    if operations.is_empty() {
        println!("{} Nothing to compile", "✓".green());
        return Ok(());
    }

    for operation in &operations {
        println!(
            "   {} {} {}",
            "CC".cyan(),
            operation.source_path.display(),
            format!("({})", config_tree.path(operation.node)).dimmed()
        );
    }
    println!("{} {} pending compiles", "→".cyan(), operations.len());
    Ok(())
}

fn cmd_tree() -> Result<()> {
    let (config_tree, executable, _target) = configure()?;
    tree::print_tree(&config_tree, executable);
    Ok(())
}

fn cmd_clean() -> Result<()> {
    let manifest = config::load_config()?;
    build::clean(&manifest.target.builddir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { dry_run } => cmd_build(dry_run).context("build failed"),
        Commands::Plan => cmd_plan(),
        Commands::Tree => cmd_tree(),
        Commands::Clean => cmd_clean(),
    }
}
