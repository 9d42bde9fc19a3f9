//! Built-in declaration units for the firmware module tree.
//!
//! These mirror the per-directory configuration entry points of the OS
//! source layout (root, kernel, lib, libc, libc/minimal). Each unit is
//! invoked as `declare(target, scope)` against the container importing it
//! and appends sources, attributes and nested imports.

use anyhow::Result;

use crate::config::Target;
use crate::container::{Scope, UnitRegistry};

/// Registry of the built-in units, rooted at the modules home so relative
/// imports resolve under it.
pub fn builtin_registry(home: impl Into<std::path::PathBuf>) -> UnitRegistry {
    let mut registry = UnitRegistry::new(home);
    registry.register("", declare_root);
    registry.register("kernel", declare_kernel);
    registry.register("lib", declare_lib);
    registry.register("lib/libc", declare_libc);
    registry.register("lib/libc/minimal", declare_libc_minimal);
    registry
}

/// Top of the module tree: home folders, platform define, common flags,
/// log configuration, then the kernel and lib subtrees.
fn declare_root(target: &Target, scope: &mut Scope<'_>) -> Result<()> {
    declare_folders(target, scope);
    declare_flags(target, scope);
    declare_log(target, scope);

    for subdir in ["kernel", "lib"] {
        scope.import_subdirectory(subdir, target)?;
    }

    Ok(())
}

fn declare_folders(target: &Target, scope: &mut Scope<'_>) {
    scope.add_includes([target.home.join("include"), target.home.clone()]);
    scope.add_source_path(target.home.clone());
}

fn declare_flags(target: &Target, scope: &mut Scope<'_>) {
    scope.add_define(
        &format!("__PLATFORM_{}__", target.platform.to_uppercase()),
        Some("1"),
    );

    scope.add_cflags(["-fdata-sections", "-ffunction-sections", "-fno-jump-tables"]);

    scope.add_ldflags([
        "-lgcc",
        "-Wl,--gc-sections",
        "-Wl,--no-warn-rwx-segment",
        "-fno-eliminate-unused-debug-symbols",
        "-nostartfiles",
        "-nostdlib",
    ]);
}

fn declare_log(target: &Target, scope: &mut Scope<'_>) {
    for log in target.param_list("log") {
        scope.add_define(&format!("CONFIG_LOG_{}", log.to_uppercase()), Some("1"));
    }

    if target.param_bool("log.all", false) {
        scope.add_define("CONFIG_LOG_ALL", Some("1"));
    }

    let level = target.param_str("log.level").unwrap_or("error");
    scope.add_define(
        "CONFIG_LOG_LEVEL",
        Some(&format!("PI_LOG_{}", level.to_uppercase())),
    );
}

fn declare_kernel(target: &Target, scope: &mut Scope<'_>) -> Result<()> {
    if target.param_bool("crt0", true) {
        scope.add_source("kernel/crt0.S");
    }

    scope.add_source("kernel/init.c");

    Ok(())
}

fn declare_lib(target: &Target, scope: &mut Scope<'_>) -> Result<()> {
    if target.param_bool("libc.enabled", true) {
        scope.add_define("CONFIG_LIBC", Some("1"));
        scope.import_subdirectory("libc", target)?;
    }

    Ok(())
}

fn declare_libc(target: &Target, scope: &mut Scope<'_>) -> Result<()> {
    if target.param_bool("libc.minimal", true) {
        scope.import_subdirectory("minimal", target)?;
    }

    Ok(())
}

fn declare_libc_minimal(target: &Target, scope: &mut Scope<'_>) -> Result<()> {
    // With no configured device, RTL runs keep plain stdout (usually the
    // only one supported there) and simulation platforms get semihosting.
    let io_device = match target.param_str("libc.io_device") {
        Some(device) => device.to_string(),
        None if target.platform == "rtl" => "stdout".to_string(),
        None => "semihost".to_string(),
    };
    scope.add_define(&format!("CONFIG_LIBC_IO_{}", io_device.to_uppercase()), Some("1"));

    scope.add_include(target.home.join("include/pmsis/lib/libc/minimal"));
    scope.add_define("CONFIG_LIBC_MINIMAL", Some("1"));

    scope.add_sources(["lib/libc/minimal/io.c", "lib/libc/minimal/string.c"]);

    if target.param_bool("libc.printf", true) {
        scope.add_sources([
            "lib/libc/minimal/prf.c",
            "lib/libc/minimal/fprintf.c",
            "lib/libc/minimal/sprintf.c",
        ]);
    }

    Ok(())
}
