//! Install orchestrator (§4.8): resolve -> download -> verify -> extract ->
//! activate, as an explicit state machine rather than one long function.

use std::fs;
use std::path::PathBuf;

use fs4::FileExt;
use url::Url;

use crate::archive;
use crate::error::{Result, ZvmError};
use crate::hash;
use crate::http::HttpClient;
use crate::manifest::{self, ReleaseIndex};
use crate::minisign::{self, PublicKey, Signature};
use crate::mirror::{self, Mirror, MirrorList};
use crate::pool::Context;
use crate::resolver;
use crate::store::StoreLayout;
use crate::tool::ToolKind;
use crate::version::VersionId;

/// Where the install pipeline currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Resolving,
    Downloading,
    Verifying,
    Extracting,
    Activating,
    Done,
}

/// Where to fetch the release manifest and artifacts from, and the trusted
/// key to verify signatures against (compiler releases only; `None` skips
/// signature verification entirely).
pub struct InstallSource {
    pub manifest_url: String,
    pub mirrors: Vec<Mirror>,
    pub public_key: Option<PublicKey>,
}

pub struct InstallReport {
    pub version: VersionId,
    pub path: PathBuf,
    pub activated: bool,
}

/// Run the full pipeline for `requested`. Already-installed versions skip
/// straight to activation. `on_state` is called once per state transition,
/// purely for progress reporting.
pub async fn install(
    ctx: &Context,
    store: &StoreLayout,
    client: &HttpClient,
    tool: ToolKind,
    requested: &VersionId,
    source: &InstallSource,
    activate: bool,
    mut on_state: impl FnMut(InstallState),
) -> Result<InstallReport> {
    on_state(InstallState::Idle);

    if store.is_installed(tool, requested) {
        on_state(InstallState::Activating);
        if activate {
            store.set_global_version(ctx, tool, requested)?;
            check_installed_binary(store, tool, requested);
        }
        on_state(InstallState::Done);
        return Ok(InstallReport {
            version: requested.clone(),
            path: store.version_dir(tool, requested),
            activated: activate,
        });
    }

    let platform = crate::platform::current().ok_or(ZvmError::HomeNotFound)?;
    let manifest_url = Url::parse(&source.manifest_url)?;
    let manifest_mirrors = MirrorList::new(
        Mirror {
            base_url: manifest_url.clone(),
            label: "primary".to_string(),
        },
        source.mirrors.clone(),
    );
    let offset = mirror::starting_offset_from_env();

    on_state(InstallState::Resolving);
    let index: ReleaseIndex = mirror::try_mirrors(&manifest_mirrors, offset, |mirror| {
        let target = manifest_mirrors.candidate_url(mirror, &manifest_url);
        async move {
            let target = target?;
            let bytes = client.fetch(ctx, target.as_str()).await?;
            manifest::parse_for(tool, &bytes)
        }
    })
    .await?;

    let resolved = resolver::resolve(tool, requested, platform, &index)?;

    on_state(InstallState::Downloading);
    let cache_dir = store.cache_dir();
    fs::create_dir_all(&cache_dir)?;
    let artifact_path = cache_dir.join(&resolved.file_name);
    let lock_path = cache_dir.join(format!("{}.lock", resolved.file_name));
    let _download_lock = DownloadLock::acquire(lock_path)?;

    let declared_size = resolved.artifact.size;
    let already_cached = artifact_path.is_file()
        && hash::verify_size(Some(fs::metadata(&artifact_path)?.len()), declared_size).is_ok()
        && fs::read(&artifact_path)
            .ok()
            .is_some_and(|bytes| hash::verify_sha256(&requested.to_string(), &bytes, &resolved.artifact.sha256).is_ok());

    if !already_cached {
        let artifact_url = Url::parse(&resolved.artifact.url)?;
        let artifact_mirrors = MirrorList::new(
            Mirror {
                base_url: artifact_url.clone(),
                label: "primary".to_string(),
            },
            source.mirrors.clone(),
        );
        mirror::try_mirrors(&artifact_mirrors, offset, |mirror| {
            let target = artifact_mirrors.candidate_url(mirror, &artifact_url);
            let artifact_path = artifact_path.clone();
            async move {
                let target = target?;
                let written = client
                    .download_file(target.as_str(), &artifact_path, &|_, _| {})
                    .await?;
                hash::verify_size(Some(written), declared_size)
            }
        })
        .await?;
    } else {
        tracing::info!(file = %resolved.file_name, "artifact already cached, skipping download");
    }

    on_state(InstallState::Verifying);
    let artifact_bytes = fs::read(&artifact_path)?;
    hash::verify_sha256(&requested.to_string(), &artifact_bytes, &resolved.artifact.sha256)?;

    if let (Some(public_key), Some(signature_url)) =
        (&source.public_key, &resolved.artifact.signature_url)
    {
        let signature_bytes = client.fetch(ctx, signature_url).await?;
        let signature_text = std::str::from_utf8(&signature_bytes)
            .map_err(|e| ZvmError::InvalidEncoding(e.to_string()))?;
        let signature = Signature::decode(signature_text)?;
        minisign::verify(public_key, &signature, &artifact_bytes)?;
    }

    on_state(InstallState::Extracting);
    let version_dir = store.version_dir(tool, requested);
    archive::extract(ctx, &artifact_path, &version_dir, tool)?;

    on_state(InstallState::Activating);
    if activate {
        store.set_global_version(ctx, tool, requested)?;
        check_installed_binary(store, tool, requested);
    }

    on_state(InstallState::Done);
    Ok(InstallReport {
        version: requested.clone(),
        path: version_dir,
        activated: activate,
    })
}

/// Run the newly-activated binary with its version-check argv (§4.8 step 9)
/// and warn, without failing the install, if it can't be run or exits
/// non-zero. The managed tool's own version string is not parsed here; this
/// only confirms the binary the shim will now exec actually starts.
fn check_installed_binary(store: &StoreLayout, tool: ToolKind, version: &VersionId) {
    let binary = store.current_binary(tool);
    match std::process::Command::new(&binary)
        .args(tool.version_check_args())
        .output()
    {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            tracing::warn!(
                tool = %tool,
                version = %version,
                status = %output.status,
                "installed binary exited non-zero on its own version check"
            );
        }
        Err(error) => {
            tracing::warn!(
                tool = %tool,
                version = %version,
                %error,
                "could not run installed binary for its own version check"
            );
        }
    }
}

/// Guards the `cache/<file>.lock` file for the duration of one download,
/// so two invocations racing to populate the same cache entry serialize
/// rather than corrupt each other's partial write. Grounded in the
/// teacher's `LockFile`: exclusive-lock a handle, remove the path on drop.
struct DownloadLock {
    _file: fs::File,
    path: PathBuf,
}

impl DownloadLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file, path })
    }
}

impl Drop for DownloadLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sha256_hex(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn build_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write;
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, *data).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();
        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&tar_bytes).unwrap();
        gz.finish().unwrap()
    }

    #[tokio::test]
    async fn installs_and_activates_a_fresh_version() {
        let server = MockServer::start().await;
        let archive_bytes = build_tar_gz(&[("lsp-dir/lsp", b"binary")]);
        let digest = sha256_hex(&archive_bytes);

        let manifest = format!(
            r#"[{{"version": "0.13.0", "x86_64-linux": {{"tarball": "{}/artifact.tar.gz", "shasum": "{digest}", "size": {}}}}}]"#,
            server.uri(),
            archive_bytes.len(),
        );

        Mock::given(method("GET"))
            .and(path("/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifact.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive_bytes))
            .mount(&server)
            .await;

        let home = tempfile::tempdir().unwrap();
        let ctx = Context::with_home(home.path().to_path_buf(), PoolConfig::default());
        let store = StoreLayout::new(home.path());
        let client = HttpClient::new().unwrap();
        let source = InstallSource {
            manifest_url: format!("{}/index.json", server.uri()),
            mirrors: Vec::new(),
            public_key: None,
        };
        let version = VersionId::parse("0.13.0").unwrap();

        let mut states = Vec::new();
        let report = install(
            &ctx,
            &store,
            &client,
            ToolKind::LanguageServer,
            &version,
            &source,
            true,
            |s| states.push(s),
        )
        .await
        .unwrap();

        assert_eq!(report.version, version);
        assert!(report.activated);
        assert!(report.path.join("lsp-dir/lsp").exists());
        assert_eq!(
            store.global_version(ToolKind::LanguageServer).unwrap(),
            Some(version)
        );
        assert_eq!(states.first(), Some(&InstallState::Idle));
        assert_eq!(states.last(), Some(&InstallState::Done));
    }

    #[tokio::test]
    async fn already_installed_version_skips_the_network() {
        let home = tempfile::tempdir().unwrap();
        let ctx = Context::with_home(home.path().to_path_buf(), PoolConfig::default());
        let store = StoreLayout::new(home.path());
        let version = VersionId::parse("0.13.0").unwrap();
        fs::create_dir_all(store.version_dir(ToolKind::Compiler, &version)).unwrap();

        let client = HttpClient::new().unwrap();
        let source = InstallSource {
            manifest_url: "http://127.0.0.1:1/unreachable".to_string(),
            mirrors: Vec::new(),
            public_key: None,
        };

        let report = install(
            &ctx,
            &store,
            &client,
            ToolKind::Compiler,
            &version,
            &source,
            false,
            |_| {},
        )
        .await
        .unwrap();
        assert!(!report.activated);
    }

    #[tokio::test]
    async fn checksum_mismatch_aborts_before_extraction() {
        let server = MockServer::start().await;
        let archive_bytes = build_tar_gz(&[("lsp-dir/lsp", b"binary")]);

        let manifest = format!(
            r#"[{{"version": "0.13.0", "x86_64-linux": {{"tarball": "{}/artifact.tar.gz", "shasum": "0000000000000000000000000000000000000000000000000000000000000000", "size": {}}}}}]"#,
            server.uri(),
            archive_bytes.len(),
        );

        Mock::given(method("GET"))
            .and(path("/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifact.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive_bytes))
            .mount(&server)
            .await;

        let home = tempfile::tempdir().unwrap();
        let ctx = Context::with_home(home.path().to_path_buf(), PoolConfig::default());
        let store = StoreLayout::new(home.path());
        let client = HttpClient::new().unwrap();
        let source = InstallSource {
            manifest_url: format!("{}/index.json", server.uri()),
            mirrors: Vec::new(),
            public_key: None,
        };
        let version = VersionId::parse("0.13.0").unwrap();

        let err = install(
            &ctx,
            &store,
            &client,
            ToolKind::LanguageServer,
            &version,
            &source,
            false,
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ZvmError::HashMismatch { .. }));
        assert!(!store.is_installed(ToolKind::LanguageServer, &version));
    }
}
