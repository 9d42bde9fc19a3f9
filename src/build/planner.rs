//! Incremental-build decisions.
//!
//! For every declared source the planner resolves the object path, reads
//! the compiler-emitted dependency record if one exists, and decides from
//! on-disk timestamps whether the object must be rebuilt. All timestamp
//! reads for one invocation are taken once; races with concurrent external
//! modification are only tolerated between invocations.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::attrs::{Define, Include, View};
use crate::container::{ConfigTree, NodeId};
use crate::template;
use crate::toolchain::object_path;

/// One pending compilation, carrying the internal view of its owning
/// container. Ephemeral: built per planning pass, consumed by the command
/// graph.
#[derive(Debug, Clone)]
pub struct CompileOperation {
    /// Container owning the source.
    pub node: NodeId,
    /// Source name as declared.
    pub source: String,
    /// Resolved source path.
    pub source_path: PathBuf,
    /// Destination object file.
    pub object: PathBuf,
    pub cflags: Vec<String>,
    pub includes: Vec<Include>,
    pub defines: Vec<Define>,
}

/// Collect every stale source under `root` (depth-first, self before
/// children, declaration order) into an ordered list of pending compiles.
///
/// Visiting a container also generates its registered template files, so
/// generated inputs exist before their consumers are compiled.
pub fn pending_compiles(
    tree: &ConfigTree,
    root: NodeId,
    builddir: &Path,
) -> Result<Vec<CompileOperation>> {
    let mut operations = Vec::new();
    collect(tree, root, builddir, &mut operations)?;
    Ok(operations)
}

fn collect(
    tree: &ConfigTree,
    node: NodeId,
    builddir: &Path,
    operations: &mut Vec<CompileOperation>,
) -> Result<()> {
    template::generate_all(tree, node)?;

    for source in tree.node(node).sources() {
        let source_path = tree.resolve_source(node, source);
        let object = object_path(builddir, source);

        let record = object.with_extension("d");
        let dependencies = if record.exists() {
            let text = fs::read_to_string(&record).with_context(|| {
                format!(
                    "{}: unable to read dependency record {}",
                    tree.title(node),
                    record.display()
                )
            })?;
            parse_dependency_record(&text)
        } else {
            // No record yet: the source itself is the only known
            // dependency.
            vec![source_path.clone()]
        };

        if needs_compile(tree, node, &object, &dependencies)? {
            operations.push(CompileOperation {
                node,
                source: source.clone(),
                source_path,
                object,
                cflags: tree.cflags(node),
                includes: tree.includes(node, View::INTERNAL),
                defines: tree.defines(node, View::INTERNAL),
            });
        }
    }

    for &child in tree.children(node) {
        collect(tree, child, builddir, operations)?;
    }

    Ok(())
}

/// Parse a make-style dependency record: collapse backslash-newline
/// continuations, then for each `target: deps` rule keep the right-hand
/// side, whitespace-split. Phony rules emitted by `-MP` have an empty
/// right-hand side and contribute nothing.
pub fn parse_dependency_record(text: &str) -> Vec<PathBuf> {
    let flat = text.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut dependencies = Vec::new();
    for line in flat.lines() {
        if let Some((_target, rest)) = line.split_once(':') {
            dependencies.extend(rest.split_whitespace().map(PathBuf::from));
        }
    }
    dependencies
}

/// The conservative staleness rule: equal timestamps count as stale, so a
/// dependency written within the filesystem's timestamp granularity of the
/// object still forces a rebuild.
pub(crate) fn is_stale(dependency: SystemTime, object: SystemTime) -> bool {
    dependency >= object
}

fn needs_compile(
    tree: &ConfigTree,
    node: NodeId,
    object: &Path,
    dependencies: &[PathBuf],
) -> Result<bool> {
    if !object.exists() {
        return Ok(true);
    }

    let object_mtime = fs::metadata(object)
        .and_then(|meta| meta.modified())
        .with_context(|| {
            format!(
                "{}: unable to read timestamp of {}",
                tree.title(node),
                object.display()
            )
        })?;

    let mut stale = false;
    for dependency in dependencies {
        // A recorded dependency that vanished is a build error, not a
        // silent skip: the record proves the object was built from it.
        let dep_mtime = fs::metadata(dependency)
            .and_then(|meta| meta.modified())
            .with_context(|| {
                format!(
                    "{}: dependency {} no longer exists",
                    tree.title(node),
                    dependency.display()
                )
            })?;

        if is_stale(dep_mtime, object_mtime) {
            stale = true;
        }
    }

    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_record_single_rule() {
        let deps = parse_dependency_record("build/init.o: src/init.c include/kernel.h\n");
        assert_eq!(
            deps,
            vec![PathBuf::from("src/init.c"), PathBuf::from("include/kernel.h")]
        );
    }

    #[test]
    fn test_parse_record_continuations() {
        let text = "build/init.o: src/init.c \\\n include/kernel.h \\\r\n include/hal.h\n";
        let deps = parse_dependency_record(text);
        assert_eq!(
            deps,
            vec![
                PathBuf::from("src/init.c"),
                PathBuf::from("include/kernel.h"),
                PathBuf::from("include/hal.h"),
            ]
        );
    }

    #[test]
    fn test_parse_record_phony_rules_contribute_nothing() {
        // -MP appends empty rules for each header.
        let text = "build/init.o: src/init.c include/kernel.h\n\ninclude/kernel.h:\n";
        let deps = parse_dependency_record(text);
        assert_eq!(
            deps,
            vec![PathBuf::from("src/init.c"), PathBuf::from("include/kernel.h")]
        );
    }

    #[test]
    fn test_parse_record_skips_lines_without_colon() {
        assert!(parse_dependency_record("no rule here\n").is_empty());
    }

    #[test]
    fn test_equal_timestamps_are_stale() {
        let now = SystemTime::now();
        assert!(is_stale(now, now));
    }

    #[test]
    fn test_newer_object_is_fresh() {
        let dep = SystemTime::now();
        let obj = dep + Duration::from_millis(5);
        assert!(!is_stale(dep, obj));
        assert!(is_stale(obj, dep));
    }
}
