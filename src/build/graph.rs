//! Per-executable command graph.
//!
//! Turns the planner's pending compiles into concrete command descriptors
//! and wires every compile to the trailing link command with a "triggers"
//! edge. The graph only declares ordering; executing it, possibly in
//! parallel, is the scheduler's job (see [`crate::build::runner`]).

use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use crate::build::planner;
use crate::container::{ConfigTree, NodeId};
use crate::toolchain::{CompileSpec, LinkSpec};

/// Index of a command inside its [`CommandGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Compile { source: PathBuf },
    Link { binary: PathBuf },
}

/// One executable work item handed to the scheduler.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: CommandId,
    pub kind: CommandKind,
    /// Full command line.
    pub line: String,
    /// Directory to execute from, captured at graph construction so
    /// relative paths in flags keep meaning.
    pub cwd: PathBuf,
    /// Commands that become ready once this one completes.
    pub triggers: Vec<CommandId>,
}

/// The complete set of commands for one executable, plus ordering edges.
#[derive(Debug, Clone, Default)]
pub struct CommandGraph {
    pub commands: Vec<Command>,
}

impl CommandGraph {
    /// True when the executable is fully up to date: nothing to compile
    /// and nothing to link.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn compiles(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd.kind, CommandKind::Compile { .. }))
    }

    pub fn link(&self) -> Option<&Command> {
        self.commands
            .iter()
            .find(|cmd| matches!(cmd.kind, CommandKind::Link { .. }))
    }

    /// Flattened ordering edges, `(from, to)` pairs.
    pub fn edges(&self) -> Vec<(CommandId, CommandId)> {
        let mut edges = Vec::new();
        for command in &self.commands {
            for &to in &command.triggers {
                edges.push((command.id, to));
            }
        }
        edges
    }
}

/// Build the command graph for one executable container.
///
/// Skips the link entirely when there is nothing to compile and the binary
/// already exists. Otherwise exactly one link command is emitted, triggered
/// by every pending compile (or immediately ready when only the binary is
/// missing).
pub fn build_graph(tree: &ConfigTree, executable: NodeId) -> Result<CommandGraph> {
    let builddir = tree.builddir(executable)?;
    let binary = tree.binary(executable)?;

    // Fails early when no toolchain governs the link.
    let link_toolchain = tree.require_toolchain(executable)?;

    let operations = planner::pending_compiles(tree, executable, builddir)?;

    let cwd = std::env::current_dir().context("cannot determine the build working directory")?;

    let mut commands = Vec::new();
    for operation in &operations {
        let toolchain = tree.require_toolchain(operation.node)?;
        let line = toolchain
            .compile_command(&CompileSpec {
                builddir: builddir.to_path_buf(),
                source: operation.source.clone(),
                source_path: operation.source_path.clone(),
                cflags: operation.cflags.clone(),
                includes: operation.includes.clone(),
                defines: operation.defines.clone(),
            })
            .with_context(|| tree.title(operation.node))?;

        commands.push(Command {
            id: CommandId(commands.len()),
            kind: CommandKind::Compile {
                source: operation.source_path.clone(),
            },
            line,
            cwd: cwd.clone(),
            triggers: Vec::new(),
        });
    }

    let do_link = !commands.is_empty() || !binary.exists();
    if do_link {
        let line = link_toolchain
            .link_command(&LinkSpec {
                builddir: builddir.to_path_buf(),
                binary: binary.to_path_buf(),
                sources: tree.sources(executable),
                ldflags: tree.ldflags(executable),
                lib_includes: tree.lib_includes(executable),
            })
            .with_context(|| tree.title(executable))?;

        let link_id = CommandId(commands.len());
        for command in &mut commands {
            command.triggers.push(link_id);
        }
        commands.push(Command {
            id: link_id,
            kind: CommandKind::Link {
                binary: binary.to_path_buf(),
            },
            line,
            cwd,
            triggers: Vec::new(),
        });
    }

    Ok(CommandGraph { commands })
}

/// Export the graph's compile commands as `compile_commands.json` so
/// language servers can index the firmware sources.
pub fn write_compile_commands(graph: &CommandGraph, path: &Path) -> Result<()> {
    let entries: Vec<serde_json::Value> = graph
        .compiles()
        .map(|command| {
            let source = match &command.kind {
                CommandKind::Compile { source } => source.display().to_string(),
                CommandKind::Link { .. } => unreachable!("compiles() yields compile commands"),
            };
            json!({
                "directory": command.cwd.display().to_string(),
                "command": command.line,
                "file": source,
            })
        })
        .collect();

    let json_str = serde_json::to_string_pretty(&entries)?;
    fs::write(path, json_str)
        .with_context(|| format!("unable to write {}", path.display()))?;
    Ok(())
}
