//! Thin terminal-output helpers: formatting only, no decisions.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use zvm::VersionId;

pub fn installing_version(version: &VersionId) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("installing {version}"));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn set_global_version(version: &VersionId) {
    println!("{} {version}", style("now using").green());
}

pub fn unsupported_version(version: &VersionId) {
    println!("{} {version} is not a published version", style("error:").red());
}

pub fn version_not_found(version: &VersionId) {
    println!("{} {version} is not installed", style("error:").red());
}

pub fn current_version(version: Option<VersionId>) {
    match version {
        Some(v) => println!("{}: {v}", style("current").bold()),
        None => println!("{}: none", style("current").bold()),
    }
}

pub fn installed_versions(versions: &[VersionId]) {
    println!("{}", style("installed versions").bold());
    for v in versions {
        println!("  {v}");
    }
}

pub fn available_versions(versions: &[VersionId]) {
    println!("{}", style("available versions").bold());
    for v in versions {
        println!("  {v}");
    }
}
