//! Content-addressed store & active-version selector (§4.8).
//!
//! Layout under `$ZVM_HOME`:
//! `versions/<tool>/<V>/` holds each installed version's extracted tree,
//! `version/<tool>` is a plain-text pointer file naming the active `<V>`,
//! `current/<tool>` is a symlink (POSIX) or a directory copy (Windows)
//! aimed at the active version's directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, ZvmError};
use crate::pool::Context;
use crate::tool::ToolKind;
use crate::version::VersionId;

pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(zvm_home: &Path) -> Self {
        Self {
            root: zvm_home.to_path_buf(),
        }
    }

    pub fn versions_dir(&self, tool: ToolKind) -> PathBuf {
        self.root.join("versions").join(tool.dir_name())
    }

    pub fn version_dir(&self, tool: ToolKind, version: &VersionId) -> PathBuf {
        self.versions_dir(tool).join(version.to_string())
    }

    pub fn version_pointer_file(&self, tool: ToolKind) -> PathBuf {
        self.root.join("version").join(tool.dir_name())
    }

    pub fn current_dir(&self, tool: ToolKind) -> PathBuf {
        self.root.join("current").join(tool.dir_name())
    }

    /// The shared download cache, emptied by the bare `clean` subcommand
    /// (§6) and reused across installs to skip re-downloading an artifact
    /// already on disk with the right checksum.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Remove every file cached under `cache_dir`, returning how many were
    /// removed.
    pub fn clear_cache(&self) -> Result<usize> {
        let dir = self.cache_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// The path the shim should exec, if a version is active and present.
    pub fn current_binary(&self, tool: ToolKind) -> PathBuf {
        self.current_dir(tool).join(tool.binary_name())
    }

    pub fn is_installed(&self, tool: ToolKind, version: &VersionId) -> bool {
        self.version_dir(tool, version).is_dir()
    }

    pub fn installed_versions(&self, tool: ToolKind) -> Result<Vec<VersionId>> {
        let dir = self.versions_dir(tool);
        let mut versions = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(v) = VersionId::parse(name) {
                    versions.push(v);
                }
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// The version named by the pointer file, if set.
    pub fn global_version(&self, tool: ToolKind) -> Result<Option<VersionId>> {
        let pointer = self.version_pointer_file(tool);
        let contents = match fs::read_to_string(&pointer) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(VersionId::parse(trimmed)?))
    }

    /// Point `current/<tool>` at `version` and persist the pointer file.
    /// The version must already be present under `versions/<tool>/`.
    pub fn set_global_version(&self, ctx: &Context, tool: ToolKind, version: &VersionId) -> Result<()> {
        let version_dir = self.version_dir(tool, version);
        if !version_dir.is_dir() {
            return Err(ZvmError::VersionNotFound(version.to_string()));
        }

        let pointer = self.version_pointer_file(tool);
        if let Some(parent) = pointer.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_buf = ctx.acquire_path_buffer()?;
        let tmp_pointer = tmp_buf.write_path(&pointer.with_extension("tmp"))?;
        fs::write(&tmp_pointer, version.to_string())?;
        fs::rename(&tmp_pointer, &pointer)?;

        self.repoint_current(ctx, tool, &version_dir)
    }

    pub fn unset_global_version(&self, tool: ToolKind) -> Result<()> {
        match fs::remove_file(self.version_pointer_file(tool)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        remove_current(&self.current_dir(tool))
    }

    /// Remove an installed version. Refuses if it is currently active (§6):
    /// callers must switch to another version first rather than silently
    /// losing the active pointer.
    pub fn remove_version(&self, tool: ToolKind, version: &VersionId) -> Result<()> {
        if self.global_version(tool)?.as_ref() == Some(version) {
            return Err(ZvmError::ActiveVersionInUse(version.to_string()));
        }
        match fs::remove_dir_all(self.version_dir(tool, version)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic on POSIX: a fresh symlink is built beside `current` and
    /// `rename`d over it, which POSIX guarantees replaces the old symlink
    /// in one step. Windows has no equivalent rename-over-symlink
    /// guarantee, so we fall back to delete-then-copy (§4.8, §9).
    fn repoint_current(&self, ctx: &Context, tool: ToolKind, version_dir: &Path) -> Result<()> {
        let current = self.current_dir(tool);
        if let Some(parent) = current.parent() {
            fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        {
            let mut tmp_buf = ctx.acquire_path_buffer()?;
            let tmp_link = tmp_buf.write_path(&current.with_extension("tmp-link"))?;
            let _ = fs::remove_file(&tmp_link);
            std::os::unix::fs::symlink(version_dir, &tmp_link)?;
            fs::rename(&tmp_link, &current)?;
            Ok(())
        }

        #[cfg(not(unix))]
        {
            let _ = ctx;
            remove_current(&current)?;
            copy_dir_recursive(version_dir, &current)
        }
    }
}

fn remove_current(current: &Path) -> Result<()> {
    match fs::remove_file(current) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(_) => {}
    }
    match fs::remove_dir_all(current) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;

    fn install_fake_version(store: &StoreLayout, tool: ToolKind, version: &VersionId) {
        let dir = store.version_dir(tool, version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(tool.binary_name()), b"#!/bin/sh\necho fake\n").unwrap();
    }

    #[test]
    fn set_global_version_writes_pointer_and_current() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        let ctx = Context::with_home(home.path().to_path_buf(), PoolConfig::default());
        let version = VersionId::parse("0.13.0").unwrap();
        install_fake_version(&store, ToolKind::Compiler, &version);

        store.set_global_version(&ctx, ToolKind::Compiler, &version).unwrap();

        assert_eq!(
            store.global_version(ToolKind::Compiler).unwrap(),
            Some(version.clone())
        );
        assert!(store.current_binary(ToolKind::Compiler).exists());
    }

    #[test]
    fn set_global_version_rejects_uninstalled_version() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        let ctx = Context::with_home(home.path().to_path_buf(), PoolConfig::default());
        let version = VersionId::parse("0.13.0").unwrap();
        let err = store
            .set_global_version(&ctx, ToolKind::Compiler, &version)
            .unwrap_err();
        assert!(matches!(err, ZvmError::VersionNotFound(_)));
    }

    #[test]
    fn remove_version_refuses_to_remove_the_active_version() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        let ctx = Context::with_home(home.path().to_path_buf(), PoolConfig::default());
        let version = VersionId::parse("0.13.0").unwrap();
        install_fake_version(&store, ToolKind::Compiler, &version);
        store.set_global_version(&ctx, ToolKind::Compiler, &version).unwrap();

        let err = store.remove_version(ToolKind::Compiler, &version).unwrap_err();

        assert!(matches!(err, ZvmError::ActiveVersionInUse(_)));
        assert!(store.is_installed(ToolKind::Compiler, &version));
        assert_eq!(store.global_version(ToolKind::Compiler).unwrap(), Some(version));
    }

    #[test]
    fn remove_version_deletes_a_non_active_version() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        let version = VersionId::parse("0.9.0").unwrap();
        install_fake_version(&store, ToolKind::Compiler, &version);

        store.remove_version(ToolKind::Compiler, &version).unwrap();

        assert!(!store.is_installed(ToolKind::Compiler, &version));
    }

    #[test]
    fn installed_versions_lists_sorted() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        let v1 = VersionId::parse("0.9.0").unwrap();
        let v2 = VersionId::parse("0.13.0").unwrap();
        install_fake_version(&store, ToolKind::Compiler, &v2);
        install_fake_version(&store, ToolKind::Compiler, &v1);

        let versions = store.installed_versions(ToolKind::Compiler).unwrap();
        assert_eq!(versions, vec![v1, v2]);
    }

    #[test]
    fn installed_versions_is_empty_before_anything_is_installed() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        assert!(store.installed_versions(ToolKind::LanguageServer).unwrap().is_empty());
    }

    #[test]
    fn clear_cache_removes_cached_files_and_reports_a_missing_dir_as_empty() {
        let home = tempfile::tempdir().unwrap();
        let store = StoreLayout::new(home.path());
        assert_eq!(store.clear_cache().unwrap(), 0);

        fs::create_dir_all(store.cache_dir()).unwrap();
        fs::write(store.cache_dir().join("artifact.tar.gz"), b"data").unwrap();
        fs::write(store.cache_dir().join("artifact.tar.gz.lock"), b"").unwrap();

        assert_eq!(store.clear_cache().unwrap(), 2);
        assert!(fs::read_dir(store.cache_dir()).unwrap().next().is_none());
    }
}
