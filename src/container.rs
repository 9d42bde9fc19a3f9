//! The hierarchical configuration tree and its declaration protocol.
//!
//! A build is declared once, depth-first, by *declaration units*: functions
//! invoked as `declare(target, scope)` that append sources, flags, defines
//! and nested imports to a container. After the declaration phase completes
//! the tree is read-only; planning and command-graph construction only
//! query it.
//!
//! Declaration units are looked up through an injected [`UnitLocator`]
//! instead of being loaded from disk at runtime, so the whole protocol is
//! testable without any dynamic code loading.

use anyhow::{Context, Result, anyhow, bail};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::attrs::{Define, Include};
use crate::config::Target;
use crate::template::TemplateFile;
use crate::toolchain::Toolchain;

/// Index of a container inside its [`ConfigTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// What a container represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A reusable source module (kernel, libc, chip support).
    Module,
    /// A linkable firmware executable; owns a build directory and binary.
    Executable,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::Executable => "Executable",
        }
    }
}

/// One node of the configuration tree.
///
/// All collections preserve declaration order; the attribute-resolution
/// rules in [`crate::attrs`] depend on it.
#[derive(Debug, Default)]
pub struct Container {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) toolchain: Option<Toolchain>,
    pub(crate) sources: Vec<String>,
    pub(crate) source_paths: Vec<PathBuf>,
    pub(crate) cflags: Vec<String>,
    pub(crate) ldflags: Vec<String>,
    pub(crate) lib_includes: Vec<PathBuf>,
    pub(crate) defines: Vec<Define>,
    pub(crate) includes: Vec<Include>,
    pub(crate) templates: BTreeMap<String, TemplateFile>,
    /// Executable-only: build directory and output binary.
    pub(crate) builddir: Option<PathBuf>,
    pub(crate) binary: Option<PathBuf>,
    /// Directories of the imports currently being declared. Active only
    /// during the declaration phase, empty afterwards.
    path_stack: Vec<PathBuf>,
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Module
    }
}

impl Container {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn defines(&self) -> &[Define] {
        &self.defines
    }

    pub fn toolchain(&self) -> Option<&Toolchain> {
        self.toolchain.as_ref()
    }
}

/// Arena holding every container of one build target.
///
/// The process-wide module search paths (from `FWB_MODULES`) are threaded
/// in at construction instead of read from the environment on demand, so
/// path resolution stays reproducible in tests.
#[derive(Debug, Default)]
pub struct ConfigTree {
    nodes: Vec<Container>,
    module_paths: Vec<PathBuf>,
}

impl ConfigTree {
    pub fn new(module_paths: Vec<PathBuf>) -> Self {
        ConfigTree {
            nodes: Vec::new(),
            module_paths,
        }
    }

    /// Create a parentless container (the top of a tree).
    pub fn new_root(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Container {
            name: name.to_string(),
            kind,
            ..Container::default()
        });
        id
    }

    /// Create a parentless executable container. Its build directory is
    /// the base build directory extended with the container's tree path,
    /// and the binary lands inside it under the executable's name.
    pub fn new_executable(&mut self, name: &str, base_builddir: &Path) -> NodeId {
        let id = self.new_root(name, NodeKind::Executable);
        let builddir = base_builddir.join(name);
        self.nodes[id.0].binary = Some(builddir.join(name));
        self.nodes[id.0].builddir = Some(builddir);
        id
    }

    /// Append a child container. Sibling names must be unique; they form
    /// the tree path used in diagnostics and build-directory layout.
    pub fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId> {
        let clash = self.nodes[parent.0]
            .children
            .iter()
            .any(|&child| self.nodes[child.0].name == name);
        if clash {
            bail!(
                "{}: a child container named '{}' already exists",
                self.title(parent),
                name
            );
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Container {
            name: name.to_string(),
            kind,
            parent: Some(parent),
            ..Container::default()
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> &Container {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Container {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub(crate) fn module_paths(&self) -> &[PathBuf] {
        &self.module_paths
    }

    /// Tree path of a node, `/top/os/kernel` style.
    pub fn path(&self, id: NodeId) -> String {
        match self.nodes[id.0].parent {
            Some(parent) => format!("{}/{}", self.path(parent), self.nodes[id.0].name),
            None => format!("/{}", self.nodes[id.0].name),
        }
    }

    /// Diagnostic title: tree path plus container kind. Every fatal error
    /// about a container carries this.
    pub fn title(&self, id: NodeId) -> String {
        format!("{}: {}", self.path(id), self.nodes[id.0].kind.label())
    }

    /// Nearest toolchain on the ancestor chain, starting at the node
    /// itself. Exactly one toolchain governs each compiled source.
    pub fn toolchain(&self, id: NodeId) -> Option<&Toolchain> {
        if let Some(toolchain) = &self.nodes[id.0].toolchain {
            return Some(toolchain);
        }
        self.nodes[id.0].parent.and_then(|parent| self.toolchain(parent))
    }

    /// Like [`toolchain`], but a missing toolchain is the fatal
    /// configuration error it always is at compile/link time.
    ///
    /// [`toolchain`]: ConfigTree::toolchain
    pub fn require_toolchain(&self, id: NodeId) -> Result<&Toolchain> {
        self.toolchain(id).ok_or_else(|| {
            anyhow!(
                "{}: trying to compile without any toolchain attached",
                self.title(id)
            )
        })
    }

    /// Build directory of an executable container.
    pub fn builddir(&self, id: NodeId) -> Result<&Path> {
        self.nodes[id.0]
            .builddir
            .as_deref()
            .ok_or_else(|| anyhow!("{}: not an executable, it has no build directory", self.title(id)))
    }

    /// Output binary of an executable container.
    pub fn binary(&self, id: NodeId) -> Result<&Path> {
        self.nodes[id.0]
            .binary
            .as_deref()
            .ok_or_else(|| anyhow!("{}: not an executable, it has no binary", self.title(id)))
    }
}

/// A declaration unit: mutates the container it is invoked on.
pub type DeclareFn = dyn Fn(&Target, &mut Scope<'_>) -> Result<()> + Send + Sync;

/// Resolves a configuration directory to its declaration unit.
pub trait UnitLocator {
    fn locate(&self, dir: &Path) -> Option<&DeclareFn>;
}

/// Registry-backed [`UnitLocator`].
///
/// Units register under paths relative to a root directory (the modules
/// home); lookups strip the root prefix first and fall back to the full
/// path, so absolute imports resolve too.
pub struct UnitRegistry {
    root: PathBuf,
    units: HashMap<PathBuf, Box<DeclareFn>>,
}

impl UnitRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UnitRegistry {
            root: root.into(),
            units: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, dir: impl Into<PathBuf>, declare: F)
    where
        F: Fn(&Target, &mut Scope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.units.insert(dir.into(), Box::new(declare));
    }
}

impl UnitLocator for UnitRegistry {
    fn locate(&self, dir: &Path) -> Option<&DeclareFn> {
        let key = dir.strip_prefix(&self.root).unwrap_or(dir);
        self.units
            .get(key)
            .or_else(|| self.units.get(dir))
            .map(|unit| unit.as_ref())
    }
}

/// Mutable handle a declaration unit uses to declare one container.
///
/// All mutators are append-only; nothing declared can be removed, which
/// keeps attribute-resolution order equal to declaration order.
pub struct Scope<'a> {
    tree: &'a mut ConfigTree,
    node: NodeId,
    units: &'a dyn UnitLocator,
}

impl<'a> Scope<'a> {
    pub fn new(tree: &'a mut ConfigTree, node: NodeId, units: &'a dyn UnitLocator) -> Self {
        Scope { tree, node, units }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn tree(&self) -> &ConfigTree {
        self.tree
    }

    /// Reborrow this scope at another node of the same tree.
    pub fn at(&mut self, node: NodeId) -> Scope<'_> {
        Scope {
            tree: self.tree,
            node,
            units: self.units,
        }
    }

    pub fn add_child(&mut self, name: &str, kind: NodeKind) -> Result<NodeId> {
        self.tree.add_child(self.node, name, kind)
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        self.tree.node_mut(self.node).sources.push(source.into());
    }

    pub fn add_sources<I, S>(&mut self, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for source in sources {
            self.add_source(source);
        }
    }

    pub fn add_source_path(&mut self, path: impl Into<PathBuf>) {
        self.tree.node_mut(self.node).source_paths.push(path.into());
    }

    pub fn add_cflag(&mut self, flag: impl Into<String>) {
        self.tree.node_mut(self.node).cflags.push(flag.into());
    }

    pub fn add_cflags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for flag in flags {
            self.add_cflag(flag);
        }
    }

    pub fn add_ldflag(&mut self, flag: impl Into<String>) {
        self.tree.node_mut(self.node).ldflags.push(flag.into());
    }

    pub fn add_ldflags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for flag in flags {
            self.add_ldflag(flag);
        }
    }

    pub fn add_lib_include(&mut self, path: impl Into<PathBuf>) {
        self.tree.node_mut(self.node).lib_includes.push(path.into());
    }

    /// Add a define visible in both the internal and external view, the
    /// common case.
    pub fn add_define(&mut self, name: &str, value: Option<&str>) {
        self.add_define_scoped(name, value, true, true);
    }

    pub fn add_define_scoped(
        &mut self,
        name: &str,
        value: Option<&str>,
        internal: bool,
        external: bool,
    ) {
        self.tree.node_mut(self.node).defines.push(Define {
            name: name.to_string(),
            value: value.map(str::to_string),
            internal,
            external,
        });
    }

    /// Add an include folder visible in both views.
    pub fn add_include(&mut self, path: impl Into<PathBuf>) {
        self.add_include_scoped(path, true, true);
    }

    pub fn add_includes<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.add_include(path);
        }
    }

    pub fn add_include_scoped(&mut self, path: impl Into<PathBuf>, internal: bool, external: bool) {
        self.tree.node_mut(self.node).includes.push(Include {
            path: path.into(),
            internal,
            external,
        });
    }

    /// Attach the toolchain compiling and linking every source under this
    /// container (unless a descendant overrides it).
    pub fn set_toolchain(&mut self, toolchain: Toolchain) {
        self.tree.node_mut(self.node).toolchain = Some(toolchain);
    }

    /// Register a template file generated into the target's build
    /// directory whenever this container is visited for compilation.
    /// Re-registering a name replaces the previous template.
    pub fn new_template_file(
        &mut self,
        target: &Target,
        name: &str,
        path: impl AsRef<Path>,
        template: impl Into<String>,
    ) -> &mut TemplateFile {
        let file = TemplateFile::new(target.builddir.join(path.as_ref()), template);
        let templates = &mut self.tree.node_mut(self.node).templates;
        templates.insert(name.to_string(), file);
        // Just inserted under this name.
        templates
            .get_mut(name)
            .expect("template registered under this name")
    }

    /// Import the declaration unit of a configuration subdirectory and run
    /// it against this container.
    ///
    /// A relative path resolves against the directory of the import
    /// currently being declared (tracked on a per-container stack), or the
    /// current working directory at the top level. The stack is popped
    /// unconditionally, also when the nested unit fails, so a failed
    /// import never skews the resolution of sibling imports.
    pub fn import_subdirectory(&mut self, path: impl AsRef<Path>, target: &Target) -> Result<()> {
        let path = path.as_ref();
        let dir = if path.is_absolute() {
            path.to_path_buf()
        } else {
            match self.tree.node(self.node).path_stack.last() {
                Some(top) => top.join(path),
                None => std::env::current_dir()
                    .context("cannot determine the current directory for a relative import")?
                    .join(path),
            }
        };

        let units = self.units;
        let unit = units.locate(&dir).ok_or_else(|| {
            anyhow!(
                "{}: unable to load the declaration unit for {}",
                self.tree.title(self.node),
                dir.display()
            )
        })?;

        self.tree.node_mut(self.node).path_stack.push(dir);
        let result = unit(target, self);
        self.tree.node_mut(self.node).path_stack.pop();
        result
    }
}
