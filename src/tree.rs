//! Configuration tree visualization.
//!
//! This module provides the `fwb tree` command which displays the declared
//! container hierarchy in an ASCII tree format.
//!
//! ## Example Output
//!
//! ```text
//! hello (Executable, riscv-gcc)
//! └── os (Module)
//!     ├── 12 sources, 4 defines
//!     └── ...
//! ```

use colored::*;

use crate::container::{ConfigTree, NodeId, NodeKind};

/// Print the tree rooted at a node.
pub fn print_tree(tree: &ConfigTree, root: NodeId) {
    print_node(tree, root, "");
}

fn print_node(tree: &ConfigTree, id: NodeId, prefix: &str) {
    let node = tree.node(id);

    let kind = match node.kind() {
        NodeKind::Executable => "Executable".cyan(),
        NodeKind::Module => "Module".green(),
    };
    let toolchain = match node.toolchain() {
        Some(toolchain) => format!(", {}", toolchain.kind().label()),
        None => String::new(),
    };
    println!("{} ({}{})", node.name().bold(), kind, toolchain.dimmed());

    let mut details = Vec::new();
    if !node.sources().is_empty() {
        details.push(format!("{} sources", node.sources().len()));
    }
    if !node.defines().is_empty() {
        details.push(format!("{} defines", node.defines().len()));
    }

    let children = tree.children(id);
    let count = details.len() + children.len();
    let mut index = 0;

    for detail in &details {
        index += 1;
        let branch = if index == count { "└──" } else { "├──" };
        println!("{}{} {}", prefix, branch, detail.dimmed());
    }

    for &child in children {
        index += 1;
        let last = index == count;
        let branch = if last { "└──" } else { "├──" };
        print!("{}{} ", prefix, branch);
        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        print_node(tree, child, &child_prefix);
    }
}
