use std::collections::HashSet;

use clap::Parser;
use itertools::Itertools;

use zvm::{ToolKind, VersionId, Zvm};

use crate::print;

/// List installed and available versions.
#[derive(Debug, Parser)]
pub struct ListCmd;

impl ListCmd {
    pub async fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        let all_versions = zvm.all_versions(tool).await?;
        let installed_versions = zvm.installed_versions(tool)?;
        let current_version = zvm.get_global_version(tool)?;

        let all: HashSet<VersionId> = all_versions.into_iter().collect();
        let installed: HashSet<VersionId> = installed_versions.iter().cloned().collect();
        let available: Vec<VersionId> = (&all - &installed).into_iter().sorted().collect();

        print::current_version(current_version);
        print::installed_versions(&installed_versions);
        print::available_versions(&available);

        Ok(())
    }
}
