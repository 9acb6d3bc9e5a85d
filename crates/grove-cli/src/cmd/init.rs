use crate::output::print_json;
use anyhow::Context;
use grove_core::{
    bootstrap,
    config::{Config, WarnLevel},
    paths,
};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    // Re-running init against an existing config keeps whatever the user
    // customised; only a missing config gets the defaults written out.
    let cfg = Config::load_or_default(root).context("failed to load config")?;
    let report = bootstrap::bootstrap(root, &cfg).context("bootstrap failed")?;

    if json {
        return print_json(&report);
    }

    println!("Initializing grove in: {}", root.display());

    if report.config_created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    for dir in &report.created_dirs {
        println!("  created: {dir}/");
    }
    for entry in &report.moved {
        println!("  moved:   {entry} -> {}/{entry}", cfg.shared_dir);
    }
    for entry in &report.linked {
        println!("  linked:  {entry} -> {}/{entry}", cfg.shared_dir);
    }
    for entry in &report.seeded {
        println!("  seeded:  {}/{entry}", cfg.shared_dir);
    }
    for entry in &report.gitignore_added {
        println!("  ignored: {entry}");
    }
    for entry in &report.conflicts {
        println!(
            "  warning: {entry} exists at the root and in {}/; not touched, merge by hand",
            cfg.shared_dir
        );
    }

    for warning in cfg.validate() {
        let level = match warning.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        println!("  {level}: {}", warning.message);
    }

    if report.changed() {
        println!("\nGrove initialized.");
    } else {
        println!("\nNothing to do; grove is already set up.");
    }
    println!("Next: grove new <name> --source-branch {}", cfg.primary_branch);

    Ok(())
}
