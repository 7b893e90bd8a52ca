use clap::Parser;

use zvm::{ToolKind, Zvm};

use crate::print;

/// Print the active version.
#[derive(Debug, Parser)]
pub struct CurrentCmd;

impl CurrentCmd {
    pub fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        print::current_version(zvm.get_global_version(tool)?);
        Ok(())
    }
}
