use clap::Parser;
use dialoguer::Input;

use zvm::{ToolKind, VersionId, Zvm};

use crate::print;

/// Set a version as the active default.
#[derive(Clone, Debug, Parser)]
pub struct UseCmd {
    /// Version to activate.
    pub version: String,
}

impl UseCmd {
    pub async fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        let version = VersionId::parse(&self.version)?;

        if zvm.is_installed(tool, &version) {
            zvm.set_global_version(tool, &version)?;
            print::set_global_version(&version);
            return Ok(());
        }

        let all_versions = zvm.all_versions(tool).await?;
        if !all_versions.contains(&version) {
            print::unsupported_version(&version);
            return Ok(());
        }

        println!("{tool} {version} is not installed");
        let input: String = Input::new()
            .with_prompt("Would you like to install it?")
            .with_initial_text("Y")
            .default("N".into())
            .interact_text()?;
        if matches!(input.as_str(), "y" | "Y" | "yes" | "Yes") {
            let spinner = print::installing_version(&version);
            zvm.install(tool, &version, true, |_| {}).await?;
            spinner.finish_with_message(format!("installed {tool} {version}"));
            print::set_global_version(&version);
        }

        Ok(())
    }
}
