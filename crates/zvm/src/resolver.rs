//! Platform/version resolver (§4.3).

use crate::error::{Result, ZvmError};
use crate::manifest::{Artifact, ReleaseIndex};
use crate::platform::Platform;
use crate::tool::ToolKind;
use crate::version::VersionId;

/// The resolved artifact plus the canonical cache file name it should be
/// stored under.
pub struct Resolved {
    pub artifact: Artifact,
    pub file_name: String,
}

/// Resolve `(tool, requested version, platform)` against an already-fetched
/// release index, per §4.3 steps 2-5 (step 1, fetching the index, is the
/// caller's concern — see [`crate::install`]).
pub fn resolve(
    tool: ToolKind,
    requested: &VersionId,
    platform: Platform,
    index: &ReleaseIndex,
) -> Result<Resolved> {
    let entry = index
        .entries
        .get(requested)
        .ok_or_else(|| ZvmError::VersionNotFound(requested.to_string()))?;

    let platform_key = platform.key_for(tool, requested.is_master());
    let artifact = entry
        .artifacts
        .get(&platform_key)
        .cloned()
        .ok_or_else(|| ZvmError::UnsupportedPlatform {
            tool: tool_name(tool),
            version: requested.to_string(),
            platform: platform_key,
        })?;

    let file_name = artifact.file_name().to_string();
    Ok(Resolved { artifact, file_name })
}

/// The concrete version `master` currently points at, if the manifest
/// reported one.
pub fn resolved_master_version(index: &ReleaseIndex) -> Option<&str> {
    index
        .entries
        .get(&VersionId::Master)
        .and_then(|e| e.resolved_master_version.as_deref())
}

fn tool_name(tool: ToolKind) -> &'static str {
    match tool {
        ToolKind::Compiler => "compiler",
        ToolKind::LanguageServer => "language server",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_compiler_index;
    use crate::platform::{Arch, Os};

    const JSON: &str = r#"{
        "0.13.0": {
            "linux-x86_64": {"tarball": "https://example.test/linux-x86_64.tar.xz", "shasum": "ab", "size": 1}
        }
    }"#;

    #[test]
    fn resolves_known_version_and_platform() {
        let idx = parse_compiler_index(JSON.as_bytes()).unwrap();
        let v = VersionId::parse("0.13.0").unwrap();
        let platform = Platform::new(Os::Linux, Arch::X86_64);
        let resolved = resolve(ToolKind::Compiler, &v, platform, &idx).unwrap();
        assert_eq!(resolved.file_name, "linux-x86_64.tar.xz");
    }

    #[test]
    fn unknown_version_fails_version_not_found() {
        let idx = parse_compiler_index(JSON.as_bytes()).unwrap();
        let v = VersionId::parse("9.9.9").unwrap();
        let platform = Platform::new(Os::Linux, Arch::X86_64);
        let err = resolve(ToolKind::Compiler, &v, platform, &idx).unwrap_err();
        assert!(matches!(err, ZvmError::VersionNotFound(_)));
    }

    #[test]
    fn unsupported_platform_is_distinct_from_unknown_version() {
        let idx = parse_compiler_index(JSON.as_bytes()).unwrap();
        let v = VersionId::parse("0.13.0").unwrap();
        let platform = Platform::new(Os::Windows, Arch::Aarch64);
        let err = resolve(ToolKind::Compiler, &v, platform, &idx).unwrap_err();
        assert!(matches!(err, ZvmError::UnsupportedPlatform { .. }));
    }
}
