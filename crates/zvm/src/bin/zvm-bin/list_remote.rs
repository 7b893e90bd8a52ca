use clap::Parser;
use itertools::Itertools;

use zvm::{ToolKind, Zvm};

use crate::print;

/// List every version published upstream, ignoring what's installed locally.
#[derive(Debug, Parser)]
pub struct ListRemoteCmd;

impl ListRemoteCmd {
    pub async fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        let versions = zvm.all_versions(tool).await?.into_iter().sorted().collect_vec();
        print::available_versions(&versions);
        Ok(())
    }
}
