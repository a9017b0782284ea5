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

//! Backup module for pre-swap snapshots of the live installation

use crate::error::{Result, UpdaterError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Backup directory for an update cycle
///
/// With a cycle start time the directory name gets a `_<unix seconds>` suffix so
/// earlier backups are kept.
pub fn backup_dir_for(base: &Path, started_at: Option<DateTime<Utc>>) -> PathBuf {
    match started_at {
        Some(ts) => {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!("_{}", ts.timestamp()));
            PathBuf::from(name)
        }
        None => base.to_path_buf(),
    }
}

/// Move the live installation aside into `backup_dir`
///
/// A stale backup left at the same path is removed first.
pub fn move_to_backup(exec_dir: &Path, backup_dir: &Path) -> Result<()> {
    if !exec_dir.exists() {
        return Err(UpdaterError::SwapFailed(format!(
            "Live installation not found: {}",
            exec_dir.display()
        )));
    }

    remove_dir_if_exists(backup_dir)?;
    if let Some(parent) = backup_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::rename(exec_dir, backup_dir).map_err(|e| {
        UpdaterError::SwapFailed(format!(
            "Cannot back up {} to {}: {e}",
            exec_dir.display(),
            backup_dir.display()
        ))
    })?;

    tracing::info!("Created backup at {}", backup_dir.display());
    Ok(())
}

/// Put the backup back in place of the live installation
pub fn restore_backup(backup_dir: &Path, exec_dir: &Path) -> Result<()> {
    if !backup_dir.exists() {
        return Err(UpdaterError::SwapFailed(format!(
            "Backup directory not found: {}",
            backup_dir.display()
        )));
    }

    remove_dir_if_exists(exec_dir)?;
    fs::rename(backup_dir, exec_dir).map_err(|e| {
        UpdaterError::SwapFailed(format!(
            "Cannot restore backup {} to {}: {e}",
            backup_dir.display(),
            exec_dir.display()
        ))
    })?;

    tracing::warn!("Restored previous installation from {}", backup_dir.display());
    Ok(())
}

/// Remove a directory tree; absent paths are fine
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Whether a directory exists and has at least one entry
pub fn is_populated_dir(path: &Path) -> bool {
    path.is_dir()
        && fs::read_dir(path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
}

pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}
