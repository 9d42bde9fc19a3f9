//! Attribute resolution over the configuration tree.
//!
//! Containers accumulate cflags, ldflags, defines, include folders and
//! source-search paths during declaration. This module computes the merged
//! view a compilation actually sees:
//!
//! - **internal** view: attributes applied when compiling the container's
//!   own sources.
//! - **external** view: attributes a container propagates to whoever
//!   imports it.
//!
//! Nothing is deduplicated. An attribute reaching a compilation through
//! several paths is emitted as many times as it accumulates; the supported
//! compiler families accept repeated `-D`/`-I`/flags.

use std::path::{Path, PathBuf};

use crate::container::{ConfigTree, NodeId};

/// A preprocessor define with independent internal/external visibility.
///
/// A define may be visible in both views at once, in only one, or in
/// neither (declared but inert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    /// `None` renders as `-DNAME`, `Some(v)` as `-DNAME=v`.
    pub value: Option<String>,
    /// Applied when compiling the owning container's own sources.
    pub internal: bool,
    /// Applied when compiling sources of containers importing this one.
    pub external: bool,
}

/// An include folder with independent internal/external visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    pub path: PathBuf,
    pub internal: bool,
    pub external: bool,
}

/// Which visibility classes a resolution request selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub internal: bool,
    pub external: bool,
}

impl View {
    /// The view used to compile a container's own sources.
    pub const INTERNAL: View = View {
        internal: true,
        external: false,
    };

    /// The view a container exposes to containers importing it.
    pub const EXTERNAL: View = View {
        internal: false,
        external: true,
    };
}

impl ConfigTree {
    /// Merged CFLAGS for a node: each child's full flag set in child order,
    /// then the node's own flags last, so the node's flags land rightmost
    /// on the command line and win under normal compiler precedence.
    pub fn cflags(&self, id: NodeId) -> Vec<String> {
        let mut flags = Vec::new();
        for &child in self.children(id) {
            flags.extend(self.cflags(child));
        }
        flags.extend(self.node(id).cflags.iter().cloned());
        flags
    }

    /// Merged LDFLAGS for a node. Same ordering rule as [`cflags`].
    ///
    /// [`cflags`]: ConfigTree::cflags
    pub fn ldflags(&self, id: NodeId) -> Vec<String> {
        let mut flags = Vec::new();
        for &child in self.children(id) {
            flags.extend(self.ldflags(child));
        }
        flags.extend(self.node(id).ldflags.iter().cloned());
        flags
    }

    /// Defines for a node under the requested view.
    ///
    /// Children only ever contribute their external-visible entries, in
    /// declaration order; the node's own entries are then filtered by the
    /// requested view and appended.
    pub fn defines(&self, id: NodeId, view: View) -> Vec<Define> {
        let mut defines = Vec::new();
        for &child in self.children(id) {
            defines.extend(self.defines(child, View::EXTERNAL));
        }
        for define in &self.node(id).defines {
            if define.internal && view.internal || define.external && view.external {
                defines.push(define.clone());
            }
        }
        defines
    }

    /// Include folders for a node under the requested view. Same
    /// accumulation rule as [`defines`].
    ///
    /// [`defines`]: ConfigTree::defines
    pub fn includes(&self, id: NodeId, view: View) -> Vec<Include> {
        let mut includes = Vec::new();
        for &child in self.children(id) {
            includes.extend(self.includes(child, View::EXTERNAL));
        }
        for include in &self.node(id).includes {
            if include.internal && view.internal || include.external && view.external {
                includes.push(include.clone());
            }
        }
        includes
    }

    /// Source-search paths for a node, ancestors first, the node's own
    /// paths last. The tree-wide module paths act as the outermost
    /// ancestor and come first.
    pub fn source_paths(&self, id: NodeId) -> Vec<PathBuf> {
        let mut paths = match self.node(id).parent {
            Some(parent) => self.source_paths(parent),
            None => self.module_paths().to_vec(),
        };
        paths.extend(self.node(id).source_paths.iter().cloned());
        paths
    }

    /// Resolve a source file against the node's search paths, first match
    /// wins. An unresolved source is returned as-is; the caller reports it
    /// as a missing file when it tries to read it.
    pub fn resolve_source(&self, id: NodeId, source: &str) -> PathBuf {
        let source_ref = Path::new(source);
        if source_ref.is_absolute() {
            return source_ref.to_path_buf();
        }

        for search_path in self.source_paths(id) {
            let path = search_path.join(source_ref);
            if path.exists() {
                return path;
            }
        }

        source_ref.to_path_buf()
    }

    /// All sources under a node (self first, then children depth-first),
    /// paired with their resolved paths. Used to assemble the link line.
    pub fn sources(&self, id: NodeId) -> Vec<(String, PathBuf)> {
        let mut sources = Vec::new();
        for source in &self.node(id).sources {
            sources.push((source.clone(), self.resolve_source(id, source)));
        }
        for &child in self.children(id) {
            sources.extend(self.sources(child));
        }
        sources
    }

    /// Library search folders for the link line. These do not propagate;
    /// only the executable's own entries apply.
    pub fn lib_includes(&self, id: NodeId) -> Vec<PathBuf> {
        self.node(id).lib_includes.clone()
    }
}
