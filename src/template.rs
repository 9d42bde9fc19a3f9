//! Idempotent generation of build-time files from templates.
//!
//! A template is a plain text file containing `@name@` placeholder tokens.
//! Generation replaces every registered placeholder with its value and
//! writes the result only when it differs from what is already on disk, so
//! an unchanged template never bumps the output's modification time and
//! never forces downstream recompilation or relinking.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::container::{ConfigTree, NodeId};

/// A template registered on a container, plus its parameter values.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    output: PathBuf,
    template: String,
    parameters: BTreeMap<String, String>,
}

impl TemplateFile {
    /// `template` is a source-relative path resolved through the owning
    /// container's search paths at generation time.
    pub fn new(output: PathBuf, template: impl Into<String>) -> Self {
        TemplateFile {
            output,
            template: template.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Register a parameter: every `@name@` in the template is replaced by
    /// the stringified value.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl ToString) {
        self.parameters.insert(name.into(), value.to_string());
    }

    /// Path of the generated file, usable in flags before generation runs.
    pub fn output(&self) -> &Path {
        &self.output
    }
}

/// Generate every template registered on a container. Runs as a side step
/// whenever the container is visited for compilation.
pub fn generate_all(tree: &ConfigTree, node: NodeId) -> Result<()> {
    for (name, file) in &tree.node(node).templates {
        let template_path = tree.resolve_source(node, &file.template);
        let raw = fs::read_to_string(&template_path).with_context(|| {
            format!(
                "{}: unable to read template '{}' at {}",
                tree.title(node),
                name,
                template_path.display()
            )
        })?;

        let content = render(&raw, &file.parameters);
        write_if_changed(&file.output, &content).with_context(|| {
            format!(
                "{}: unable to generate {}",
                tree.title(node),
                file.output.display()
            )
        })?;
    }
    Ok(())
}

fn render(template: &str, parameters: &BTreeMap<String, String>) -> String {
    let mut content = template.to_string();
    for (name, value) in parameters {
        content = content.replace(&format!("@{name}@"), value);
    }
    content
}

/// Write only when the rendered content differs from the file on disk.
/// Creates the output directory if absent. Returns whether a write
/// happened.
fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let existing = match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(_) => None,
    };

    if existing.as_deref() == Some(content) {
        return Ok(false);
    }

    fs::write(path, content)?;
    Ok(true)
}
