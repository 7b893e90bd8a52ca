//! Archive extraction (§4.7).
//!
//! Dispatches on the artifact's file suffix, strips the tool-specific
//! leading path component, and guards every entry against escaping the
//! output root. Any failure during extraction removes the whole
//! destination directory rather than leaving a partial install behind.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ZvmError};
use crate::pool::{Context, ExtractOperation};
use crate::tool::ToolKind;

/// Extract `archive_path` into `dest_dir`, creating it fresh. The two scratch
/// path buffers used while walking entries come from `ctx`'s pool (§4.1)
/// rather than being allocated per entry.
pub fn extract(ctx: &Context, archive_path: &Path, dest_dir: &Path, tool: ToolKind) -> Result<()> {
    fs::create_dir_all(dest_dir)?;
    match try_extract(ctx, archive_path, dest_dir, tool) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::remove_dir_all(dest_dir);
            Err(err)
        }
    }
}

fn try_extract(ctx: &Context, archive_path: &Path, dest_dir: &Path, tool: ToolKind) -> Result<()> {
    let file_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let mut scratch = ctx.acquire_extract_operation()?;

    if file_name.ends_with(".tar.xz") {
        let file = fs::File::open(archive_path)?;
        extract_tar(xz2::read::XzDecoder::new(file), dest_dir, tool, &mut scratch)?;
    } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        let file = fs::File::open(archive_path)?;
        extract_tar(flate2::read::GzDecoder::new(file), dest_dir, tool, &mut scratch)?;
    } else if file_name.ends_with(".zip") {
        extract_zip(archive_path, dest_dir, tool, &mut scratch)?;
    } else {
        return Err(ZvmError::UnsupportedArchiveFormat(file_name.to_string()));
    }

    normalize_permissions(dest_dir, tool)
}

fn extract_tar<R: Read>(
    reader: R,
    dest_dir: &Path,
    tool: ToolKind,
    scratch: &mut ExtractOperation,
) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.into_owned();
        let Some(relative) = strip_leading_component(&raw_path, tool) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let relative = scratch.src.write_path(&relative)?;
        let out_path = safe_join(dest_dir, &relative)?;
        let out_path = scratch.dst.write_path(&out_path)?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&out_path)?;
    }
    Ok(())
}

#[cfg(windows)]
fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
    tool: ToolKind,
    scratch: &mut ExtractOperation,
) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ZvmError::ExtractFailed(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ZvmError::ExtractFailed(e.to_string()))?;
        let Some(raw_path) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let Some(relative) = strip_leading_component(&raw_path, tool) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let relative = scratch.src.write_path(&relative)?;
        let out_path = safe_join(dest_dir, &relative)?;
        if entry.is_dir() {
            let out_path = scratch.dst.write_path(&out_path)?;
            fs::create_dir_all(&out_path)?;
            continue;
        }
        let out_path = scratch.dst.write_path(&out_path)?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }
    Ok(())
}

#[cfg(not(windows))]
fn extract_zip(
    archive_path: &Path,
    _dest_dir: &Path,
    _tool: ToolKind,
    _scratch: &mut ExtractOperation,
) -> Result<()> {
    Err(ZvmError::UnsupportedArchiveFormat(
        archive_path.display().to_string(),
    ))
}

/// Compiler archives wrap everything in a single top-level directory that
/// gets dropped; language-server archives don't (§3, §4.7).
fn strip_leading_component(path: &Path, tool: ToolKind) -> Option<PathBuf> {
    if !tool.strips_leading_component() {
        return Some(path.to_path_buf());
    }
    let mut components = path.components();
    components.next()?;
    Some(components.collect())
}

/// Join `relative` onto `root`, rejecting anything that would place the
/// result outside `root` (`..`, an absolute path, a drive prefix).
fn safe_join(root: &Path, relative: &Path) -> Result<PathBuf> {
    let mut out = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ZvmError::PathEscape(relative.display().to_string()));
            }
        }
    }
    Ok(out)
}

#[cfg(unix)]
fn normalize_permissions(dest_dir: &Path, tool: ToolKind) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fn visit(dir: &Path, binary_name: &str) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                visit(&path, binary_name)?;
            } else if path.file_name().and_then(|n| n.to_str()) == Some(binary_name) {
                let mut perms = fs::metadata(&path)?.permissions();
                perms.set_mode(0o755);
                fs::set_permissions(&path, perms)?;
            }
        }
        Ok(())
    }

    visit(dest_dir, tool.binary_name())
}

#[cfg(not(unix))]
fn normalize_permissions(_dest_dir: &Path, _tool: ToolKind) -> Result<()> {
    Ok(())
}
