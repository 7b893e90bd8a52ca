use clap::Parser;

use zvm::Zvm;

/// Print a shell snippet that puts the shim directory on `PATH`.
#[derive(Debug, Parser)]
pub struct EnvCmd {
    /// Shell to emit for (bash, zsh, fish, powershell); detected from
    /// `$SHELL`/`%COMSPEC%` if omitted.
    #[clap(long)]
    pub shell: Option<String>,
}

impl EnvCmd {
    pub fn run(self, zvm: &Zvm) -> anyhow::Result<()> {
        let shims_dir = zvm.shims_dir();
        let shims_dir = shims_dir.display();
        match self.shell.unwrap_or_else(detect_shell).as_str() {
            "fish" => println!("set -gx PATH \"{shims_dir}\" $PATH"),
            "powershell" => println!("$env:PATH = \"{shims_dir};$env:PATH\""),
            _ => println!("export PATH=\"{shims_dir}:$PATH\""),
        }
        Ok(())
    }
}

fn detect_shell() -> String {
    if let Ok(comspec) = std::env::var("COMSPEC") {
        if comspec.to_ascii_lowercase().contains("powershell") {
            return "powershell".to_string();
        }
    }
    match std::env::var("SHELL") {
        Ok(shell) if shell.ends_with("fish") => "fish".to_string(),
        Ok(shell) if shell.ends_with("zsh") => "zsh".to_string(),
        _ => "bash".to_string(),
    }
}
