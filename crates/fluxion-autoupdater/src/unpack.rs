// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Release archive extraction into the staging directory

use crate::error::{Cause, Result, UpdaterError};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Detect the format from the file name suffix, ignoring case
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(Self::TarGz.suffix()) {
            Some(Self::TarGz)
        } else if name.ends_with(Self::Zip.suffix()) {
            Some(Self::Zip)
        } else {
            None
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }
}

/// File name of the archive without its format suffix
pub fn archive_base_name(path: &Path, kind: ArchiveKind) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let stem_len = name.len().checked_sub(kind.suffix().len())?;
    name.get(..stem_len)
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Directory the swap should promote
///
/// Archives that wrap their content in a folder named after themselves extract
/// to `<update_dir>/<base name>`; that folder is then the staging root.
pub fn effective_staging_dir(update_dir: &Path, archive: &Path, kind: ArchiveKind) -> PathBuf {
    if let Some(base) = archive_base_name(archive, kind) {
        let nested = update_dir.join(base);
        if nested.is_dir() {
            tracing::debug!("Archive extracted into nested folder {}", nested.display());
            return nested;
        }
    }
    update_dir.to_path_buf()
}

/// Extract `archive` into `update_dir` on the blocking pool
///
/// `on_progress` receives `(entries unpacked, total entries)`. Returns the
/// effective staging directory.
pub async fn unpack_archive<F>(
    archive: &Path,
    update_dir: &Path,
    on_progress: F,
) -> Result<PathBuf>
where
    F: FnMut(usize, usize) + Send + 'static,
{
    if archive.as_os_str().is_empty() {
        return Err(UpdaterError::PreconditionFailed(
            "must download first".to_string(),
        ));
    }
    let kind = ArchiveKind::detect(archive)
        .ok_or_else(|| UpdaterError::UnsupportedArchiveType(archive.to_path_buf()))?;

    tracing::info!(
        "Unpacking {} into {}",
        archive.display(),
        update_dir.display()
    );

    let archive_path = archive.to_path_buf();
    let dest = update_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract(&archive_path, &dest, kind, on_progress))
        .await
        .map_err(|e| {
            UpdaterError::unpack_failed(archive, "extraction task failed", Some(Box::new(e)))
        })??;

    Ok(effective_staging_dir(update_dir, archive, kind))
}

/// Blocking extraction of a recognized archive
pub fn extract<F>(
    archive: &Path,
    dest: &Path,
    kind: ArchiveKind,
    mut on_progress: F,
) -> Result<()>
where
    F: FnMut(usize, usize),
{
    let result = match kind {
        ArchiveKind::TarGz => extract_tar_gz(archive, dest, &mut on_progress),
        ArchiveKind::Zip => extract_zip(archive, dest, &mut on_progress),
    };

    result.map_err(|e| {
        let message = format!("cannot unpack {} package: {e}", kind.suffix());
        UpdaterError::unpack_failed(archive, message, Some(e))
    })
}

fn open_tar_gz(archive: &Path) -> io::Result<tar::Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive)?;
    Ok(tar::Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn extract_tar_gz<F>(
    archive: &Path,
    dest: &Path,
    on_progress: &mut F,
) -> std::result::Result<(), Cause>
where
    F: FnMut(usize, usize),
{
    // Counting pass, gzip streams carry no entry index
    let mut total = 0;
    for entry in open_tar_gz(archive)?.entries()? {
        entry?;
        total += 1;
    }

    fs::create_dir_all(dest)?;
    let mut tarball = open_tar_gz(archive)?;
    tarball.set_preserve_permissions(true);

    for (index, entry) in tarball.entries()?.enumerate() {
        let mut entry = entry?;
        if !entry.unpack_in(dest)? {
            tracing::warn!(
                "Skipped archive entry outside of staging dir: {}",
                entry.path()?.display()
            );
        }
        on_progress(index + 1, total);
    }

    Ok(())
}

fn extract_zip<F>(
    archive: &Path,
    dest: &Path,
    on_progress: &mut F,
) -> std::result::Result<(), Cause>
where
    F: FnMut(usize, usize),
{
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))?;
    let total = zip.len();
    fs::create_dir_all(dest)?;

    for index in 0..total {
        let mut entry = zip.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(
                "Skipped archive entry outside of staging dir: {}",
                entry.name()
            );
            on_progress(index + 1, total);
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else if entry.is_symlink() {
            // macOS bundles carry `Versions/Current` style links
            let mut target = String::new();
            entry.read_to_string(&mut target)?;
            if link_stays_inside(dest, &out_path, Path::new(&target)) {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                write_symlink(Path::new(&target), &out_path)?;
            } else {
                tracing::warn!(
                    "Skipped link {} pointing outside of staging dir: {target}",
                    entry.name()
                );
            }
            on_progress(index + 1, total);
            continue;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
        }

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))?;
        }

        on_progress(index + 1, total);
    }

    Ok(())
}

/// Whether `target`, relative to the directory of `link`, resolves inside `root`
fn link_stays_inside(root: &Path, link: &Path, target: &Path) -> bool {
    use std::path::Component;

    if target.has_root() {
        return false;
    }
    let Some(base) = link.parent() else {
        return false;
    };
    let Ok(relative_base) = base.strip_prefix(root) else {
        return false;
    };

    let mut depth: usize = 0;
    for component in relative_base.components().chain(target.components()) {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                let Some(up) = depth.checked_sub(1) else {
                    return false;
                };
                depth = up;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

#[cfg(unix)]
fn write_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn write_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = link.parent().unwrap_or(link).join(target);
    if resolved.is_dir() {
        crate::backup::copy_dir(&resolved, link).map_err(io::Error::other)
    } else {
        fs::copy(&resolved, link).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(bytes).unwrap();
                }
                None => zip.add_directory(*name, options).unwrap(),
            }
        }
        zip.finish().unwrap();
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(
            ArchiveKind::detect(Path::new("/tmp/app-1.1.0.tar.gz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("/tmp/APP.TAR.GZ")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("/tmp/App.Zip")),
            Some(ArchiveKind::Zip)
        );
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/app.tgz")), None);
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/app.gz")), None);
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/app.rar")), None);
    }

    #[test]
    fn test_archive_base_name() {
        assert_eq!(
            archive_base_name(Path::new("/tmp/app-1.1.0.tar.gz"), ArchiveKind::TarGz).as_deref(),
            Some("app-1.1.0")
        );
        assert_eq!(
            archive_base_name(Path::new("/tmp/App.ZIP"), ArchiveKind::Zip).as_deref(),
            Some("App")
        );
        assert_eq!(
            archive_base_name(Path::new("/tmp/.zip"), ArchiveKind::Zip),
            None
        );
    }

    #[tokio::test]
    async fn test_empty_path_requires_download() {
        let temp_dir = TempDir::new().unwrap();
        let result = unpack_archive(Path::new(""), temp_dir.path(), |_, _| {}).await;
        assert!(matches!(result, Err(UpdaterError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn test_unsupported_archive_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let update_dir = temp_dir.path().join("update");

        let result = unpack_archive(
            &temp_dir.path().join("app-1.1.0.rar"),
            &update_dir,
            |_, _| {},
        )
        .await;

        assert!(matches!(
            result,
            Err(UpdaterError::UnsupportedArchiveType(_))
        ));
        assert!(!update_dir.exists());
    }

    #[tokio::test]
    async fn test_zip_with_nested_folder_rebinds_staging() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("app-1.1.0.zip");
        let update_dir = temp_dir.path().join("update");
        write_zip(
            &archive,
            &[
                ("app-1.1.0/", None),
                ("app-1.1.0/fluxion", Some(b"new binary".as_slice())),
                ("app-1.1.0/resources/index.html", Some(b"<html></html>".as_slice())),
            ],
        );

        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        let staging = unpack_archive(&archive, &update_dir, move |done, total| {
            sink.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

        assert_eq!(staging, update_dir.join("app-1.1.0"));
        assert_eq!(fs::read(staging.join("fluxion")).unwrap(), b"new binary");
        assert!(staging.join("resources/index.html").exists());
        assert_eq!(progress.lock().unwrap().last(), Some(&(3, 3)));
    }

    #[tokio::test]
    async fn test_flat_tar_gz_keeps_update_dir() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("app-1.1.0.tar.gz");
        let update_dir = temp_dir.path().join("update");
        write_tar_gz(
            &archive,
            &[
                ("fluxion", b"new binary".as_slice()),
                ("package.json", br#"{"version":"1.1.0"}"#.as_slice()),
            ],
        );

        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        let staging = unpack_archive(&archive, &update_dir, move |done, total| {
            sink.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

        assert_eq!(staging, update_dir);
        assert_eq!(fs::read(update_dir.join("fluxion")).unwrap(), b"new binary");
        assert_eq!(*progress.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_corrupt_zip_reports_unpack_failure() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = unpack_archive(&archive, &temp_dir.path().join("update"), |_, _| {})
            .await
            .unwrap_err();

        match err {
            UpdaterError::UnpackFailed { path, source, .. } => {
                assert_eq!(path, archive);
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_gzip_tarball_reports_unpack_failure() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.tar.gz");
        fs::write(&archive, b"plain text, no gzip header").unwrap();

        let result = unpack_archive(&archive, &temp_dir.path().join("update"), |_, _| {}).await;
        assert!(matches!(result, Err(UpdaterError::UnpackFailed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_symlinks_are_recreated() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("Fluxion.app.zip");
        let dest = temp_dir.path().join("update");

        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        let options = SimpleFileOptions::default();
        zip.add_directory("Fluxion.framework/Versions/A/", options)
            .unwrap();
        zip.start_file("Fluxion.framework/Versions/A/Fluxion", options)
            .unwrap();
        zip.write_all(b"framework").unwrap();
        zip.add_symlink("Fluxion.framework/Versions/Current", "A", options)
            .unwrap();
        zip.add_symlink("Fluxion.framework/Fluxion", "Versions/Current/Fluxion", options)
            .unwrap();
        zip.add_symlink("Fluxion.framework/passwd", "../../../../etc/passwd", options)
            .unwrap();
        zip.finish().unwrap();

        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        extract(&archive, &dest, ArchiveKind::Zip, move |done, total| {
            sink.lock().unwrap().push((done, total));
        })
        .unwrap();

        let current = dest.join("Fluxion.framework/Versions/Current");
        assert!(fs::symlink_metadata(&current).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&current).unwrap(), PathBuf::from("A"));
        assert_eq!(
            fs::read(dest.join("Fluxion.framework/Fluxion")).unwrap(),
            b"framework"
        );
        assert!(fs::symlink_metadata(dest.join("Fluxion.framework/passwd")).is_err());
        assert_eq!(progress.lock().unwrap().last(), Some(&(5, 5)));
    }

    #[test]
    fn test_link_stays_inside() {
        let root = Path::new("/stage");
        let link = Path::new("/stage/Fw.framework/Versions/Current");
        assert!(link_stays_inside(root, link, Path::new("A")));
        assert!(link_stays_inside(root, link, Path::new("../Versions/A")));
        assert!(link_stays_inside(root, link, Path::new("../../Other")));
        assert!(!link_stays_inside(root, link, Path::new("../../../outside")));
        assert!(!link_stays_inside(root, link, Path::new("/etc/passwd")));
    }

    #[test]
    fn test_zip_entries_cannot_escape_staging() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        let dest = temp_dir.path().join("update");
        write_zip(
            &archive,
            &[("../escaped.txt", Some(b"x".as_slice())), ("ok.txt", Some(b"y".as_slice()))],
        );

        extract(&archive, &dest, ArchiveKind::Zip, |_, _| {}).unwrap();
        assert!(!temp_dir.path().join("escaped.txt").exists());
        assert!(dest.join("ok.txt").exists());
    }
}
