use clap::Parser;
use dialoguer::Input;

use zvm::{ToolKind, VersionId, Zvm};

use crate::print;

/// Remove an installed version, or "all" to remove every installed version.
#[derive(Clone, Debug, Parser)]
pub struct RemoveCmd {
    /// Version to remove, or "all".
    pub version: String,
}

impl RemoveCmd {
    pub fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        if self.version.eq_ignore_ascii_case("all") {
            let current = zvm.get_global_version(tool)?;
            for version in zvm.installed_versions(tool)? {
                if Some(&version) == current.as_ref() {
                    continue;
                }
                zvm.remove_version(tool, &version)?;
            }
            return Ok(());
        }

        let installed_versions = zvm.installed_versions(tool)?;
        let version = VersionId::parse(&self.version)?;

        if !installed_versions.contains(&version) {
            print::version_not_found(&version);
            return Ok(());
        }

        let input: String = Input::new()
            .with_prompt("Are you sure?")
            .with_initial_text("Y")
            .default("N".into())
            .interact_text()?;
        if !matches!(input.as_str(), "y" | "Y" | "yes" | "Yes") {
            return Ok(());
        }

        zvm.remove_version(tool, &version)?;

        Ok(())
    }
}
