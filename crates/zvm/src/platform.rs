use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ToolKind;

/// Operating system component of a [`Platform`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Macos,
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Os::Linux => "linux",
            Os::Macos => "macos",
            Os::Windows => "windows",
        };
        f.write_str(s)
    }
}

/// Architecture component of a [`Platform`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    X86_64,
    Aarch64,
    Arm,
    Riscv64,
    Powerpc64le,
    Powerpc,
}

impl Arch {
    /// Stringification used by the compiler manifest for non-master
    /// releases (`armv7a` rather than `arm`).
    fn compiler_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Arm => "armv7a",
            Arch::Riscv64 => "riscv64",
            Arch::Powerpc64le => "powerpc64le",
            Arch::Powerpc => "powerpc",
        }
    }

    /// Stringification used by the `master` compiler manifest and by the
    /// language-server manifest, where `arm` (not `armv7a`) is used.
    fn plain_str(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            other => other.compiler_str(),
        }
    }
}

/// A concrete (os, arch) pair this process is running on, or that an
/// install is being resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The platform key format a compiler release manifest uses for a
    /// concrete (non-master) version: `<os>-<arch>`, `armv7a` spelled out.
    pub fn compiler_key(&self, version_is_master: bool) -> String {
        if version_is_master {
            format!("{}-{}", self.os, self.arch.plain_str())
        } else {
            format!("{}-{}", self.os, self.arch.compiler_str())
        }
    }

    /// The platform key format the language-server manifest uses:
    /// `<arch>-<os>`.
    pub fn lsp_key(&self) -> String {
        format!("{}-{}", self.arch.plain_str(), self.os)
    }

    /// The platform key for the given tool, per spec: compiler uses
    /// `os-arch` (with the master/non-master arch spelling distinction),
    /// the language server always uses `arch-os`.
    pub fn key_for(&self, tool: ToolKind, version_is_master: bool) -> String {
        match tool {
            ToolKind::Compiler => self.compiler_key(version_is_master),
            ToolKind::LanguageServer => self.lsp_key(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch.compiler_str())
    }
}

/// Detect the platform this binary was built for.
pub fn current() -> Option<Platform> {
    let os = if cfg!(target_os = "linux") {
        Os::Linux
    } else if cfg!(target_os = "macos") {
        Os::Macos
    } else if cfg!(target_os = "windows") {
        Os::Windows
    } else {
        return None;
    };

    let arch = if cfg!(target_arch = "x86_64") {
        Arch::X86_64
    } else if cfg!(target_arch = "aarch64") {
        Arch::Aarch64
    } else if cfg!(target_arch = "arm") {
        Arch::Arm
    } else if cfg!(target_arch = "riscv64") {
        Arch::Riscv64
    } else if cfg!(target_arch = "powerpc64") && cfg!(target_endian = "little") {
        Arch::Powerpc64le
    } else if cfg!(target_arch = "powerpc") {
        Arch::Powerpc
    } else {
        return None;
    };

    Some(Platform::new(os, arch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_key_uses_armv7a_for_concrete_versions() {
        let p = Platform::new(Os::Linux, Arch::Arm);
        assert_eq!(p.compiler_key(false), "linux-armv7a");
        assert_eq!(p.compiler_key(true), "linux-arm");
    }

    #[test]
    fn lsp_key_is_arch_then_os() {
        let p = Platform::new(Os::Macos, Arch::Aarch64);
        assert_eq!(p.lsp_key(), "aarch64-macos");
    }

    #[test]
    fn current_platform_is_detected_on_this_host() {
        assert!(current().is_some());
    }
}
