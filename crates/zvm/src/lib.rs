//! zvm: installs, selects, and removes side-by-side versions of a compiler
//! toolchain and its companion language server.

#![warn(rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

pub mod archive;
pub mod error;
pub mod hash;
pub mod http;
pub mod install;
pub mod manifest;
pub mod minisign;
pub mod mirror;
pub mod platform;
pub mod pool;
pub mod resolver;
pub mod store;
pub mod tool;
pub mod version;

pub use error::{Result, ZvmError};
pub use platform::Platform;
pub use tool::ToolKind;
pub use version::VersionId;

use std::path::{Path, PathBuf};

use install::{InstallReport, InstallSource, InstallState};
use minisign::PublicKey;
use mirror::Mirror;
use pool::Context;
use store::StoreLayout;

/// Shown by `--version`.
pub const VERSION_MESSAGE: &str = env!("CARGO_PKG_VERSION");

const COMPILER_INDEX_URL: &str = "https://releases.example.test/compiler/index.json";
const LSP_INDEX_URL: &str = "https://releases.example.test/lsp/index.json";

fn index_url(tool: ToolKind) -> &'static str {
    match tool {
        ToolKind::Compiler => COMPILER_INDEX_URL,
        ToolKind::LanguageServer => LSP_INDEX_URL,
    }
}

/// The trusted minisign public key, read from `ZVM_PUBLIC_KEY` (base64,
/// §4.6). Absent or malformed, signature verification is skipped entirely
/// rather than failing the install (only the compiler ships a signature).
fn configured_public_key() -> Option<PublicKey> {
    let encoded = std::env::var("ZVM_PUBLIC_KEY").ok()?;
    match PublicKey::decode(&encoded) {
        Ok(key) => Some(key),
        Err(error) => {
            tracing::warn!(%error, "ZVM_PUBLIC_KEY is set but not a valid minisign key, ignoring");
            None
        }
    }
}

/// Extra mirrors to race alongside the primary upstream, read from
/// `ZVM_MIRRORS` (§4.5): a comma-separated list of base URLs, each labeled by
/// its host.
fn configured_mirrors() -> Vec<Mirror> {
    let Ok(raw) = std::env::var("ZVM_MIRRORS") else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match url::Url::parse(s) {
            Ok(base_url) => {
                let label = base_url.host_str().unwrap_or(s).to_string();
                Some(Mirror { base_url, label })
            }
            Err(error) => {
                tracing::warn!(mirror = %s, %error, "ZVM_MIRRORS entry is not a valid URL, ignoring");
                None
            }
        })
        .collect()
}

/// The handle the CLI layer drives: a resolved `$ZVM_HOME`, the resource
/// pool, the store layout, and an HTTP client, bundled so callers don't
/// have to wire them by hand.
pub struct Zvm {
    ctx: Context,
    store: StoreLayout,
    client: http::HttpClient,
}

impl Zvm {
    pub fn new() -> Result<Self> {
        let ctx = Context::with_default_pool()?;
        let store = StoreLayout::new(ctx.get_zvm_home());
        let client = http::HttpClient::new()?;
        Ok(Self { ctx, store, client })
    }

    /// Build a `Zvm` rooted at an explicit directory, bypassing `$ZVM_HOME`
    /// resolution. Used by tests and by `--zvm-home` overrides.
    pub fn with_home(zvm_home: PathBuf) -> Result<Self> {
        let ctx = Context::with_home(zvm_home, pool::PoolConfig::default());
        let store = StoreLayout::new(ctx.get_zvm_home());
        let client = http::HttpClient::new()?;
        Ok(Self { ctx, store, client })
    }

    pub fn zvm_home(&self) -> &Path {
        self.ctx.get_zvm_home()
    }

    /// Create the on-disk layout if this is the first run.
    pub fn setup_data_dir(&self) -> Result<()> {
        for dir in ["versions", "version", "current"] {
            std::fs::create_dir_all(self.zvm_home().join(dir))?;
        }
        Ok(())
    }

    /// Every version the upstream manifest currently declares.
    pub async fn all_versions(&self, tool: ToolKind) -> Result<Vec<VersionId>> {
        let bytes = self.client.fetch(&self.ctx, index_url(tool)).await?;
        let index = manifest::parse_for(tool, &bytes)?;
        let mut versions: Vec<VersionId> = index.versions().cloned().collect();
        versions.sort();
        Ok(versions)
    }

    pub fn installed_versions(&self, tool: ToolKind) -> Result<Vec<VersionId>> {
        self.store.installed_versions(tool)
    }

    pub fn is_installed(&self, tool: ToolKind, version: &VersionId) -> bool {
        self.store.is_installed(tool, version)
    }

    pub fn get_global_version(&self, tool: ToolKind) -> Result<Option<VersionId>> {
        self.store.global_version(tool)
    }

    pub fn set_global_version(&self, tool: ToolKind, version: &VersionId) -> Result<()> {
        self.store.set_global_version(&self.ctx, tool, version)
    }

    pub fn unset_global_version(&self, tool: ToolKind) -> Result<()> {
        self.store.unset_global_version(tool)
    }

    pub fn remove_version(&self, tool: ToolKind, version: &VersionId) -> Result<()> {
        self.store.remove_version(tool, version)
    }

    /// Empty the shared download cache; with `all`, also remove every
    /// installed version of `tool` except the active one (§6). Returns how
    /// many cache files plus versions were removed.
    pub fn clean(&self, tool: ToolKind, all: bool) -> Result<usize> {
        let mut removed = self.store.clear_cache()?;
        if all {
            let current = self.get_global_version(tool)?;
            for version in self.installed_versions(tool)? {
                if Some(&version) == current.as_ref() {
                    continue;
                }
                self.remove_version(tool, &version)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn install(
        &self,
        tool: ToolKind,
        version: &VersionId,
        activate: bool,
        on_state: impl FnMut(InstallState),
    ) -> Result<InstallReport> {
        let source = InstallSource {
            manifest_url: index_url(tool).to_string(),
            mirrors: configured_mirrors(),
            public_key: configured_public_key(),
        };
        install::install(
            &self.ctx, &self.store, &self.client, tool, version, &source, activate, on_state,
        )
        .await
    }

    /// The binary the shim execs for `tool`, if one is active.
    pub fn current_binary(&self, tool: ToolKind) -> PathBuf {
        self.store.current_binary(tool)
    }

    /// Directory of small proxy executables that forward to the active
    /// version of each tool (the `env`/shim interface, §6).
    pub fn shims_dir(&self) -> PathBuf {
        self.zvm_home().join("shims")
    }

    /// Install (or refresh) the per-tool shim proxies. On unix these are
    /// symlinks to the `zvm-shim` binary next to this process; `zvm-shim`
    /// decides which tool it stands in for by looking at its own file name.
    pub fn ensure_shims_installed(&self) -> Result<()> {
        let shims_dir = self.shims_dir();
        std::fs::create_dir_all(&shims_dir)?;
        let shim_name = if cfg!(windows) { "zvm-shim.exe" } else { "zvm-shim" };
        let shim_exe = std::env::current_exe()?
            .parent()
            .map(|p| p.join(shim_name))
            .ok_or(ZvmError::HomeNotFound)?;

        for tool in [ToolKind::Compiler, ToolKind::LanguageServer] {
            let link = shims_dir.join(tool.binary_name());
            let _ = std::fs::remove_file(&link);

            #[cfg(unix)]
            std::os::unix::fs::symlink(&shim_exe, &link)?;
            #[cfg(not(unix))]
            std::fs::copy(&shim_exe, &link).map(|_| ())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_data_dir_creates_expected_layout() {
        let home = tempfile::tempdir().unwrap();
        let zvm = Zvm::with_home(home.path().to_path_buf()).unwrap();
        zvm.setup_data_dir().unwrap();
        assert!(home.path().join("versions").is_dir());
        assert!(home.path().join("version").is_dir());
        assert!(home.path().join("current").is_dir());
    }

    #[test]
    fn fresh_home_has_no_global_version() {
        let home = tempfile::tempdir().unwrap();
        let zvm = Zvm::with_home(home.path().to_path_buf()).unwrap();
        assert_eq!(zvm.get_global_version(ToolKind::Compiler).unwrap(), None);
        assert!(zvm.installed_versions(ToolKind::Compiler).unwrap().is_empty());
    }
}
