//! Release index parsing (§4.2).
//!
//! Two manifest shapes come off the wire as JSON: the compiler index (a map
//! keyed by version, itself a map keyed by platform) and the language-server
//! index (a list of per-version entries). Both fold into the common
//! [`ReleaseIndex`], the type the resolver (§4.3) consumes.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Result, ZvmError};
use crate::version::VersionId;

/// Upper bound on the number of versions a manifest may declare, per §4.2.
pub const N_MAX: usize = 256;

/// One downloadable release artifact for a single (tool, version, platform)
/// triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub url: String,
    pub size: u64,
    pub sha256: String,
    pub signature_url: Option<String>,
}

impl Artifact {
    /// The URL's basename, used as the canonical cache file name.
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// The platform-keyed artifact table for one version, plus (for `master`)
/// the pinned concrete version string the manifest reports.
#[derive(Clone, Debug, Default)]
pub struct PlatformArtifacts {
    pub artifacts: BTreeMap<String, Artifact>,
    pub resolved_master_version: Option<String>,
}

/// A parsed, platform-agnostic release index: every version the manifest
/// declared, with the set of platform artifacts available for each.
#[derive(Clone, Debug, Default)]
pub struct ReleaseIndex {
    pub entries: BTreeMap<VersionId, PlatformArtifacts>,
}

impl ReleaseIndex {
    pub fn contains(&self, version: &VersionId) -> bool {
        self.entries.contains_key(version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &VersionId> {
        self.entries.keys()
    }

    pub fn artifact_for(&self, version: &VersionId, platform_key: &str) -> Option<&Artifact> {
        self.entries.get(version)?.artifacts.get(platform_key)
    }
}

// --- compiler manifest wire format ---

#[derive(Deserialize)]
struct CompilerArtifactJson {
    tarball: String,
    shasum: String,
    size: u64,
    #[serde(default)]
    signature: Option<String>,
}

/// Parse a compiler release manifest:
/// `{ "<version>": { "<os>-<arch>": {tarball,shasum,size}, ... }, "master": {"version": "...", "<os>-<arch>": {...}} }`
pub fn parse_compiler_index(bytes: &[u8]) -> Result<ReleaseIndex> {
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(bytes)?;
    let mut entries = BTreeMap::new();

    for (key, value) in raw {
        if entries.len() >= N_MAX {
            break;
        }
        let version = VersionId::parse(&key)?;
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => continue,
        };

        let resolved_master_version = if version.is_master() {
            obj.get("version").and_then(|v| v.as_str()).map(String::from)
        } else {
            None
        };

        let mut artifacts = BTreeMap::new();
        for (platform_key, artifact_value) in obj {
            // Unknown fields (e.g. master's "version" key, or anything
            // future-dated) are ignored rather than rejected, per §4.2.
            if platform_key == "version" {
                continue;
            }
            let Ok(parsed) = serde_json::from_value::<CompilerArtifactJson>(artifact_value.clone())
            else {
                continue;
            };
            artifacts.insert(
                platform_key.clone(),
                Artifact {
                    url: parsed.tarball,
                    size: parsed.size,
                    sha256: parsed.shasum,
                    signature_url: parsed.signature,
                },
            );
        }

        entries.insert(
            version,
            PlatformArtifacts {
                artifacts,
                resolved_master_version,
            },
        );
    }

    Ok(ReleaseIndex { entries })
}

// --- language-server manifest wire format ---

#[derive(Deserialize)]
struct LspArtifactJson {
    tarball: String,
    shasum: String,
    size: u64,
}

#[derive(Deserialize)]
struct LspReleaseJson {
    version: String,
    #[serde(flatten)]
    artifacts: BTreeMap<String, serde_json::Value>,
}

/// Parse a language-server release manifest: a list of per-version entries,
/// each keyed by `<arch>-<os>`.
pub fn parse_lsp_index(bytes: &[u8]) -> Result<ReleaseIndex> {
    let raw: Vec<LspReleaseJson> = serde_json::from_slice(bytes)?;
    let mut entries = BTreeMap::new();

    for release in raw.into_iter().take(N_MAX) {
        let version = VersionId::parse(&release.version)?;
        let mut artifacts = BTreeMap::new();
        for (platform_key, value) in release.artifacts {
            if platform_key == "version" {
                continue;
            }
            let Ok(parsed) = serde_json::from_value::<LspArtifactJson>(value) else {
                continue;
            };
            artifacts.insert(
                platform_key,
                Artifact {
                    url: parsed.tarball,
                    size: parsed.size,
                    sha256: parsed.shasum,
                    signature_url: None,
                },
            );
        }
        entries.insert(
            version,
            PlatformArtifacts {
                artifacts,
                resolved_master_version: None,
            },
        );
    }

    Ok(ReleaseIndex { entries })
}

pub fn parse_for(tool: crate::ToolKind, bytes: &[u8]) -> Result<ReleaseIndex> {
    match tool {
        crate::ToolKind::Compiler => parse_compiler_index(bytes),
        crate::ToolKind::LanguageServer => parse_lsp_index(bytes),
    }
}

/// Surfaced when a manifest byte stream exceeds the bound enforced by the
/// HTTP layer before parsing is even attempted.
pub fn ensure_within_response_limit(len: usize, limit: usize) -> Result<()> {
    if len > limit {
        return Err(ZvmError::ResponseTooLarge { limit });
    }
    Ok(())
}
