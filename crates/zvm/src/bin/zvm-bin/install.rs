use clap::Parser;
use dialoguer::Input;

use zvm::{ToolKind, VersionId, Zvm};

use crate::print;

/// Install one or more versions.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
pub struct InstallCmd {
    /// Versions to install, or "master".
    pub versions: Vec<String>,
}

impl InstallCmd {
    pub async fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        let all_versions = zvm.all_versions(tool).await?;

        for raw in self.versions {
            let version = VersionId::parse(&raw)?;
            let current_version = zvm.get_global_version(tool)?;

            if zvm.is_installed(tool, &version) {
                println!("{tool} {version} is already installed");
                let input: String = Input::new()
                    .with_prompt("Would you like to set it as the global version?")
                    .with_initial_text("Y")
                    .default("N".into())
                    .interact_text()?;
                if matches!(input.as_str(), "y" | "Y" | "yes" | "Yes") {
                    zvm.set_global_version(tool, &version)?;
                    print::set_global_version(&version);
                }
            } else if all_versions.contains(&version) {
                let spinner = print::installing_version(&version);
                zvm.install(tool, &version, current_version.is_none(), |_| {})
                    .await?;
                spinner.finish_with_message(format!("installed {tool} {version}"));
                if current_version.is_none() {
                    print::set_global_version(&version);
                }
            } else {
                print::unsupported_version(&version);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_install() {
        let args: InstallCmd = InstallCmd::parse_from(["zvm", "0.13.0", "0.12.0"]);
        assert_eq!(
            args,
            InstallCmd {
                versions: vec!["0.13.0".into(), "0.12.0".into()]
            }
        );
    }
}
