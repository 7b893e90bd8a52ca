use clap::Parser;

use zvm::{ToolKind, Zvm};

/// Empty the download cache; with `--all`, also remove every installed
/// version except the active one.
#[derive(Debug, Parser)]
pub struct CleanCmd {
    /// Also remove every installed version, except the active one.
    #[clap(long)]
    pub all: bool,
}

impl CleanCmd {
    pub fn run(self, zvm: &Zvm, tool: ToolKind) -> anyhow::Result<()> {
        let removed = zvm.clean(tool, self.all)?;
        if self.all {
            println!("removed {removed} cached file(s) and version(s)");
        } else {
            println!("removed {removed} cached file(s)");
        }
        Ok(())
    }
}
