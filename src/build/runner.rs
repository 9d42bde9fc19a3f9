//! A minimal scheduler for command graphs.
//!
//! The core only declares commands and ordering edges; this runner is the
//! external-builder collaborator that executes them. Commands with no
//! unfinished predecessor run as one parallel wave, then the commands they
//! trigger, until the graph drains. Any failure aborts the executable
//! build; there is no partial success.

use anyhow::{Context, Result, bail};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::process::Command as Process;

use crate::build::graph::{CommandGraph, CommandKind};

/// Execute the whole graph, honoring trigger edges.
pub fn run(graph: &CommandGraph) -> Result<()> {
    let total = graph.commands.len();
    if total == 0 {
        return Ok(());
    }

    // Predecessor counts from the trigger edges.
    let mut pending = vec![0usize; total];
    for command in &graph.commands {
        for &to in &command.triggers {
            pending[to.0] += 1;
        }
    }

    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("#>-");
    let progress = ProgressBar::new(total as u64);
    progress.set_style(style);

    let mut done = vec![false; total];
    let mut completed = 0;
    while completed < total {
        let wave: Vec<usize> = (0..total)
            .filter(|&index| !done[index] && pending[index] == 0)
            .collect();
        if wave.is_empty() {
            // Only possible with a malformed edge set.
            bail!("command graph contains a trigger cycle");
        }

        wave.par_iter()
            .map(|&index| {
                let command = &graph.commands[index];
                match &command.kind {
                    CommandKind::Compile { source } => {
                        progress.println(format!("   {} {}", "CC".cyan(), source.display()));
                    }
                    CommandKind::Link { binary } => {
                        progress.println(format!("   {} {}", "LD".cyan(), binary.display()));
                    }
                }
                let result = execute(&command.line, &command.cwd, &progress);
                progress.inc(1);
                result
            })
            .collect::<Result<Vec<_>>>()?;

        for &index in &wave {
            done[index] = true;
            completed += 1;
            for &to in &graph.commands[index].triggers {
                pending[to.0] -= 1;
            }
        }
    }

    progress.finish_with_message("done");
    Ok(())
}

fn execute(line: &str, cwd: &Path, progress: &ProgressBar) -> Result<()> {
    let mut parts = line.split_whitespace();
    let program = match parts.next() {
        Some(program) => program,
        None => bail!("empty command line"),
    };

    let output = Process::new(program)
        .args(parts)
        .current_dir(cwd)
        .output()
        .with_context(|| format!("failed to execute {}", program))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        progress.println(format!("{} {}\n{}", "x".red(), line, stderr));
        bail!("command failed: {}", line);
    }
    if !stderr.is_empty() {
        // Buffered so parallel compiles do not interleave their warnings.
        progress.println(format!("{} {}\n{}", "!".yellow(), line, stderr));
    }

    Ok(())
}
