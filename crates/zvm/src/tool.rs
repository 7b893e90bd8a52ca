use std::fmt;

use serde::{Deserialize, Serialize};

/// Which managed tool an operation concerns.
///
/// Determines the manifest URL, the active-link name, and the archive
/// layout: compiler archives contain a top-level directory to strip,
/// language-server archives do not (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Compiler,
    LanguageServer,
}

impl ToolKind {
    /// Directory/file name used under `versions/<tool>/`, `version/<tool>`,
    /// and `current/<tool>`.
    pub fn dir_name(self) -> &'static str {
        match self {
            ToolKind::Compiler => "compiler",
            ToolKind::LanguageServer => "lsp",
        }
    }

    /// The binary name to expect inside an installed version's directory.
    pub fn binary_name(self) -> &'static str {
        match self {
            ToolKind::Compiler => binary_with_exe_suffix("compiler"),
            ToolKind::LanguageServer => binary_with_exe_suffix("lsp"),
        }
    }

    /// The argv convention used to ask the managed binary for its version.
    /// Preserved verbatim per the Open Question in §9: the LSP uses
    /// `--version`, the compiler uses `version`; this is a contract of the
    /// managed tools, not something this system should normalize.
    pub fn version_check_args(self) -> &'static [&'static str] {
        match self {
            ToolKind::Compiler => &["version"],
            ToolKind::LanguageServer => &["--version"],
        }
    }

    /// Whether this tool's archives contain a single top-level directory
    /// that the extractor must strip (§4.7).
    pub fn strips_leading_component(self) -> bool {
        matches!(self, ToolKind::Compiler)
    }
}

fn binary_with_exe_suffix(stem: &'static str) -> &'static str {
    if cfg!(windows) {
        match stem {
            "compiler" => "compiler.exe",
            "lsp" => "lsp.exe",
            other => other,
        }
    } else {
        stem
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = crate::error::ZvmError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compiler" => Ok(ToolKind::Compiler),
            "lsp" | "zls" => Ok(ToolKind::LanguageServer),
            other => Err(crate::error::ZvmError::UsageError(format!(
                "unknown tool: {other}"
            ))),
        }
    }
}
