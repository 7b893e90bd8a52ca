//! Proxy binary installed under `$ZVM_HOME/shims/`. Resolves which tool it
//! stands in for from its own file name, then hands off to the active
//! version's real binary: `execv` on unix (replaces this process, so exit
//! codes and signals pass through untouched), spawn-and-wait elsewhere.

use std::path::Path;

use zvm::{ToolKind, Zvm};

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("zvm-shim: {err:#}");
            127
        }
    };
    std::process::exit(exit_code);
}

fn run() -> anyhow::Result<i32> {
    let tool = detect_tool()?;
    let zvm = Zvm::new()?;
    let binary = zvm.current_binary(tool);
    if !binary.exists() {
        anyhow::bail!("no active {tool} version; run `zvm use <version>` first");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();

    #[cfg(unix)]
    {
        exec_unix(&binary, &args)
    }
    #[cfg(not(unix))]
    {
        spawn_and_wait(&binary, &args)
    }
}

fn detect_tool() -> anyhow::Result<ToolKind> {
    let exe = std::env::current_exe()?;
    let name = exe
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("could not determine the shim's own file name"))?;
    let stem = name.strip_suffix(".exe").unwrap_or(name);

    let compiler_stem = ToolKind::Compiler.binary_name().trim_end_matches(".exe");
    let lsp_stem = ToolKind::LanguageServer.binary_name().trim_end_matches(".exe");

    if stem == compiler_stem {
        Ok(ToolKind::Compiler)
    } else if stem == lsp_stem {
        Ok(ToolKind::LanguageServer)
    } else {
        anyhow::bail!("unrecognized shim name: {name}")
    }
}

#[cfg(unix)]
fn exec_unix(binary: &Path, args: &[String]) -> anyhow::Result<i32> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let program = CString::new(binary.as_os_str().as_bytes())?;
    let mut c_args: Vec<CString> = vec![program.clone()];
    for arg in args {
        c_args.push(CString::new(arg.as_bytes())?);
    }
    let mut arg_ptrs: Vec<*const libc::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
    arg_ptrs.push(std::ptr::null());

    unsafe {
        libc::execv(program.as_ptr(), arg_ptrs.as_ptr());
    }
    anyhow::bail!("execv failed for {}", binary.display())
}

#[cfg(not(unix))]
fn spawn_and_wait(binary: &Path, args: &[String]) -> anyhow::Result<i32> {
    let status = std::process::Command::new(binary).args(args).status()?;
    Ok(status.code().unwrap_or(1))
}
