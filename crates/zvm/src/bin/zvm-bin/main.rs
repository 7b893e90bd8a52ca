//! Main zvm binary entry point.

#![warn(rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

use clap::Parser;

mod clean;
mod current;
mod env;
mod install;
mod list;
mod list_remote;
mod output;
mod print;
mod remove;
mod r#use;

/// Toolchain version manager for the compiler and its language server.
#[derive(Debug, Parser)]
#[clap(
    name = "zvm",
    version = zvm::VERSION_MESSAGE,
    next_display_order = None,
)]
struct Cli {
    /// Operate on the language server instead of the compiler.
    #[clap(long, global = true)]
    zls: bool,

    /// Emit errors as a single-line JSON object on stderr.
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Install(install::InstallCmd),
    Use(r#use::UseCmd),
    Remove(remove::RemoveCmd),
    List(list::ListCmd),
    ListRemote(list_remote::ListRemoteCmd),
    Current(current::CurrentCmd),
    Clean(clean::CleanCmd),
    Env(env::EnvCmd),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json || std::env::var("ZVM_OUTPUT").is_ok_and(|v| v == "json");

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        let exit_code = output::emit_error(&err, json);
        std::process::exit(exit_code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let tool = if cli.zls {
        zvm::ToolKind::LanguageServer
    } else {
        zvm::ToolKind::Compiler
    };

    let zvm = zvm::Zvm::new()?;
    zvm.setup_data_dir()?;
    zvm.ensure_shims_installed()?;

    match cli.command {
        Command::Install(cmd) => cmd.run(&zvm, tool).await,
        Command::Use(cmd) => cmd.run(&zvm, tool).await,
        Command::Remove(cmd) => cmd.run(&zvm, tool),
        Command::List(cmd) => cmd.run(&zvm, tool).await,
        Command::ListRemote(cmd) => cmd.run(&zvm, tool).await,
        Command::Current(cmd) => cmd.run(&zvm, tool),
        Command::Clean(cmd) => cmd.run(&zvm, tool),
        Command::Env(cmd) => cmd.run(&zvm),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
