//! Integration tests for the incremental-build decision engine.
//!
//! Each test lays out sources, objects and dependency records in a
//! temporary directory and checks which compiles the planner considers
//! pending, and when the graph builder emits (or skips) the link command.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use fwbuild::build;
use fwbuild::container::{ConfigTree, NodeId, NodeKind, Scope, UnitRegistry};
use fwbuild::toolchain::{Toolchain, ToolchainConfig, ToolchainKind};

/// Gap between writes so "older" files are strictly older even on coarse
/// filesystem timestamps.
const TICK: Duration = Duration::from_millis(20);

struct Fixture {
    _dir: tempfile::TempDir,
    src: PathBuf,
    tree: ConfigTree,
    executable: NodeId,
    builddir: PathBuf,
}

fn fixture(sources: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    for source in sources {
        fs::write(src.join(source), format!("int {};\n", source.replace(".c", ""))).unwrap();
    }

    let units = UnitRegistry::new(dir.path());
    let mut tree = ConfigTree::new(Vec::new());
    let executable = tree.new_executable("app", &dir.path().join("build"));
    let mut scope = Scope::new(&mut tree, executable, &units);
    scope.set_toolchain(Toolchain::new(
        ToolchainKind::RiscvGcc,
        ToolchainConfig {
            use_ccache: false,
            incremental: true,
            path_env: None,
        },
    ));
    scope.add_source_path(&src);
    scope.add_sources(sources.iter().copied());

    let builddir = tree.builddir(executable).unwrap().to_path_buf();
    Fixture {
        _dir: dir,
        src,
        tree,
        executable,
        builddir,
    }
}

impl Fixture {
    fn plan(&self) -> Vec<String> {
        build::pending_compiles(&self.tree, self.executable, &self.builddir)
            .unwrap()
            .into_iter()
            .map(|op| op.source)
            .collect()
    }

    /// Pretend the compiler ran: write every object file, strictly newer
    /// than the sources.
    fn touch_objects(&self, sources: &[&str]) {
        sleep(TICK);
        for source in sources {
            let object = self.builddir.join(Path::new(source).with_extension("o"));
            fs::create_dir_all(object.parent().unwrap()).unwrap();
            fs::write(&object, "obj").unwrap();
        }
    }

    fn touch_source(&self, source: &str) {
        sleep(TICK);
        fs::write(self.src.join(source), "int changed;\n").unwrap();
    }
}

#[test]
fn test_everything_pending_without_objects() {
    let fx = fixture(&["main.c", "hal.c"]);
    assert_eq!(fx.plan(), vec!["main.c", "hal.c"]);
}

#[test]
fn test_replanning_after_build_is_idempotent() {
    let fx = fixture(&["main.c", "hal.c"]);
    fx.touch_objects(&["main.c", "hal.c"]);
    assert!(fx.plan().is_empty());
    assert!(fx.plan().is_empty());
}

#[test]
fn test_missing_record_makes_source_the_only_dependency() {
    let fx = fixture(&["main.c", "hal.c"]);
    fx.touch_objects(&["main.c", "hal.c"]);

    fx.touch_source("main.c");
    assert_eq!(fx.plan(), vec!["main.c"]);
}

#[test]
fn test_record_dependency_forces_recompile() {
    let fx = fixture(&["main.c"]);
    let header = fx.src.join("kernel.h");
    fs::write(&header, "#define X\n").unwrap();
    fx.touch_objects(&["main.c"]);

    // Record: the object depends on the source and the header.
    fs::write(
        fx.builddir.join("main.d"),
        format!(
            "main.o: {} \\\n {}\n",
            fx.src.join("main.c").display(),
            header.display()
        ),
    )
    .unwrap();
    assert!(fx.plan().is_empty());

    sleep(TICK);
    fs::write(&header, "#define Y\n").unwrap();
    assert_eq!(fx.plan(), vec!["main.c"]);
}

#[test]
fn test_vanished_record_dependency_fails_the_build() {
    let fx = fixture(&["main.c"]);
    fx.touch_objects(&["main.c"]);

    let gone = fx.src.join("deleted.h");
    fs::write(
        fx.builddir.join("main.d"),
        format!("main.o: {} {}\n", fx.src.join("main.c").display(), gone.display()),
    )
    .unwrap();

    let err = build::pending_compiles(&fx.tree, fx.executable, &fx.builddir).unwrap_err();
    assert!(err.to_string().contains("deleted.h"));
    assert!(format!("{err:#}").contains("/app: Executable"));
}

#[test]
fn test_link_skipped_when_up_to_date() {
    let fx = fixture(&["main.c"]);
    fx.touch_objects(&["main.c"]);
    fs::write(fx.tree.binary(fx.executable).unwrap(), "elf").unwrap();

    let graph = build::build_graph(&fx.tree, fx.executable).unwrap();
    assert!(graph.is_empty());
}

#[test]
fn test_missing_binary_forces_a_bare_link() {
    let fx = fixture(&["main.c"]);
    fx.touch_objects(&["main.c"]);

    // No binary on disk: exactly one link command, ready immediately.
    let graph = build::build_graph(&fx.tree, fx.executable).unwrap();
    assert_eq!(graph.compiles().count(), 0);
    let link = graph.link().expect("a link command");
    assert!(link.triggers.is_empty());
    assert!(graph.edges().is_empty());
}

#[test]
fn test_pending_compiles_trigger_the_link() {
    let fx = fixture(&["main.c", "hal.c"]);

    let graph = build::build_graph(&fx.tree, fx.executable).unwrap();
    assert_eq!(graph.compiles().count(), 2);
    let link = graph.link().expect("a link command");
    for compile in graph.compiles() {
        assert_eq!(compile.triggers, vec![link.id]);
    }
}
