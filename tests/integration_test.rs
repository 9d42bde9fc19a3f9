//! Integration tests for the declare → plan → graph pipeline.
//!
//! These build a complete firmware module tree in a temporary directory,
//! declare an executable for a chip profile and verify what the planner
//! and the command-graph builder produce.

use std::fs;
use std::path::{Path, PathBuf};

use fwbuild::attrs::View;
use fwbuild::build;
use fwbuild::config::Target;
use fwbuild::container::ConfigTree;
use fwbuild::profile::{self, ChipProfile};
use fwbuild::units;

const PROFILE: &str = r#"
name = "pulp_open"
toolchain = "gcc"
march = "rv32imafc"
linker_script = "chips/pulp_open/link.ld"
mem_start = "0x1c000000"
mem_size = "0x80000"
sources = ["chips/pulp_open/kernel/hal.c"]
"#;

const LINKER_TEMPLATE: &str = "MEMORY { L2 : ORIGIN = @mem_start@, LENGTH = @mem_size@ }\n";

/// Lay out a minimal firmware module home: kernel, minimal libc, one chip.
fn create_module_home(root: &Path) -> PathBuf {
    let home = root.join("os");
    for dir in [
        "kernel",
        "lib/libc/minimal",
        "chips/pulp_open/kernel",
        "include",
    ] {
        fs::create_dir_all(home.join(dir)).expect("Failed to create module directory");
    }

    fs::write(home.join("kernel/crt0.S"), "nop\n").unwrap();
    fs::write(home.join("kernel/init.c"), "void init(void) {}\n").unwrap();
    fs::write(home.join("lib/libc/minimal/io.c"), "int io;\n").unwrap();
    fs::write(home.join("lib/libc/minimal/string.c"), "int s;\n").unwrap();
    fs::write(home.join("lib/libc/minimal/prf.c"), "int p;\n").unwrap();
    fs::write(home.join("lib/libc/minimal/fprintf.c"), "int f;\n").unwrap();
    fs::write(home.join("lib/libc/minimal/sprintf.c"), "int sp;\n").unwrap();
    fs::write(home.join("chips/pulp_open/kernel/hal.c"), "int hal;\n").unwrap();
    fs::write(home.join("chips/pulp_open/link.ld"), LINKER_TEMPLATE).unwrap();

    home
}

fn declare_executable(root: &Path) -> (ConfigTree, fwbuild::container::NodeId, Target) {
    let home = create_module_home(root);
    let target = Target {
        name: "hello".to_string(),
        platform: "gvsoc".to_string(),
        builddir: root.join("build"),
        home: home.clone(),
        params: toml::Table::new(),
    };
    let chip: ChipProfile = toml::from_str(PROFILE).unwrap();
    let registry = units::builtin_registry(&home);

    let mut tree = ConfigTree::new(Vec::new());
    let executable = profile::new_executable(&mut tree, "hello", &target, &chip, &registry)
        .expect("declaration failed");
    (tree, executable, target)
}

#[test]
fn test_declared_tree_carries_chip_and_module_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let (tree, executable, _target) = declare_executable(dir.path());

    assert_eq!(tree.path(executable), "/hello");

    let defines = tree.defines(executable, View::INTERNAL);
    let names: Vec<&str> = defines.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"CONFIG_CHIP_PULP_OPEN"));
    assert!(names.contains(&"__RV32__"));
    assert!(names.contains(&"__PLATFORM_GVSOC__"));
    assert!(names.contains(&"CONFIG_LIBC_MINIMAL"));

    let ldflags = tree.ldflags(executable);
    assert!(ldflags.iter().any(|f| f == "-march=rv32imafc"));
    assert!(ldflags.iter().any(|f| f.starts_with("-T")));
    assert!(ldflags.iter().any(|f| f == "-nostdlib"));

    // Chip HAL plus kernel and libc sources, all resolved under the home.
    let sources = tree.sources(executable);
    assert_eq!(sources.len(), 8);
    for (_name, path) in &sources {
        assert!(path.is_absolute(), "unresolved source: {}", path.display());
    }
}

#[test]
fn test_planning_generates_linker_script_once() {
    let dir = tempfile::tempdir().unwrap();
    let (tree, executable, target) = declare_executable(dir.path());
    let builddir = tree.builddir(executable).unwrap().to_path_buf();

    let operations = build::pending_compiles(&tree, executable, &builddir).unwrap();
    assert_eq!(operations.len(), 8);

    let script = target.builddir.join("link.ld");
    let content = fs::read_to_string(&script).unwrap();
    assert_eq!(content, "MEMORY { L2 : ORIGIN = 0x1c000000, LENGTH = 0x80000 }\n");

    // Regeneration with unchanged parameters must not rewrite the file.
    let mtime = fs::metadata(&script).unwrap().modified().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    build::pending_compiles(&tree, executable, &builddir).unwrap();
    assert_eq!(fs::metadata(&script).unwrap().modified().unwrap(), mtime);
}

#[test]
fn test_graph_wires_every_compile_to_the_link() {
    let dir = tempfile::tempdir().unwrap();
    let (tree, executable, _target) = declare_executable(dir.path());

    let graph = build::build_graph(&tree, executable).unwrap();
    assert_eq!(graph.compiles().count(), 8);
    let link = graph.link().expect("a link command");
    assert!(link.triggers.is_empty());

    let edges = graph.edges();
    assert_eq!(edges.len(), 8);
    assert!(edges.iter().all(|&(_, to)| to == link.id));

    // Command lines carry the resolved internal view.
    for compile in graph.compiles() {
        assert!(compile.line.contains("-march=rv32imafc"));
        assert!(compile.line.contains("-DCONFIG_CHIP_NAME=pulp_open"));
        assert!(compile.line.contains("-MMD -MP"));
    }
    assert!(link.line.contains("-march=rv32imafc"));
    assert!(link.line.ends_with(&format!(
        "-o {}",
        tree.binary(executable).unwrap().display()
    )));

    let json_path = dir.path().join("compile_commands.json");
    build::write_compile_commands(&graph, &json_path).unwrap();
    let entries: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 8);
}

#[test]
fn test_assembly_source_gets_language_marker() {
    let dir = tempfile::tempdir().unwrap();
    let (tree, executable, _target) = declare_executable(dir.path());

    let graph = build::build_graph(&tree, executable).unwrap();
    let crt0 = graph
        .compiles()
        .find(|c| c.line.contains("crt0"))
        .expect("crt0 compile command");
    assert!(crt0.line.contains("-DLANGUAGE_ASSEMBLY"));
    assert!(crt0.line.contains("kernel/crt0.o"));
}
