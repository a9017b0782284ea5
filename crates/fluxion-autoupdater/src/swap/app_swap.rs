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

//! Whole application directory replacement

use super::{RelaunchInstruction, SwapStrategy, ensure_staged};
use crate::backup::{copy_dir, move_to_backup, remove_dir_if_exists, restore_backup};
use crate::config::{SwapStrategyKind, UpdaterConfig};
use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Replaces `exec_dir` with the staged release using directory renames
///
/// Steps:
/// 1. Move staging to `<exec_dir>.incoming` (copy when crossing filesystems)
/// 2. Rename `exec_dir` to `backup_dir`
/// 3. Rename `<exec_dir>.incoming` to `exec_dir`
///
/// Step 3 failing puts the backup back, so `exec_dir` always holds a complete
/// installation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppSwap;

#[async_trait]
impl SwapStrategy for AppSwap {
    fn kind(&self) -> SwapStrategyKind {
        SwapStrategyKind::AppSwap
    }

    async fn apply(
        &self,
        staging_dir: &Path,
        config: &UpdaterConfig,
    ) -> Result<RelaunchInstruction> {
        let staging = staging_dir.to_path_buf();
        let exec_dir = config.exec_dir.clone();
        let backup_dir = config.backup_dir.clone();

        tokio::task::spawn_blocking(move || swap_directories(&staging, &exec_dir, &backup_dir))
            .await
            .map_err(|e| UpdaterError::SwapFailed(format!("Swap task failed: {e}")))??;

        let executable = config.executable_path();
        #[cfg(unix)]
        ensure_executable(&executable);

        Ok(RelaunchInstruction::for_executable(&executable))
    }
}

fn incoming_dir(exec_dir: &Path) -> PathBuf {
    let mut name = exec_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "app".into());
    name.push(".incoming");
    exec_dir.with_file_name(name)
}

fn swap_directories(staging: &Path, exec_dir: &Path, backup_dir: &Path) -> Result<()> {
    swap_directories_with(staging, exec_dir, backup_dir, |from, to| fs::rename(from, to))
}

/// [`swap_directories`] with the final commit rename supplied by the caller
fn swap_directories_with<C>(
    staging: &Path,
    exec_dir: &Path,
    backup_dir: &Path,
    commit: C,
) -> Result<()>
where
    C: FnOnce(&Path, &Path) -> std::io::Result<()>,
{
    ensure_staged(staging)?;

    let incoming = incoming_dir(exec_dir);
    remove_dir_if_exists(&incoming)?;

    let moved = match fs::rename(staging, &incoming) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Rename of staging failed ({e}), copying instead");
            if let Err(e) = copy_dir(staging, &incoming) {
                let _ = remove_dir_if_exists(&incoming);
                return Err(UpdaterError::SwapFailed(format!(
                    "Cannot stage {} next to {}: {e}",
                    staging.display(),
                    exec_dir.display()
                )));
            }
            false
        }
    };

    if let Err(e) = move_to_backup(exec_dir, backup_dir) {
        // Live installation untouched
        hand_back(&incoming, staging, moved);
        return Err(e);
    }

    if let Err(e) = commit(&incoming, exec_dir) {
        tracing::error!("Commit of new installation failed: {e}");
        let restored = restore_backup(backup_dir, exec_dir);
        hand_back(&incoming, staging, moved);
        return match restored {
            Ok(()) => Err(UpdaterError::SwapFailed(format!(
                "Cannot move new installation into {}: {e}; previous installation restored",
                exec_dir.display()
            ))),
            Err(restore_err) => Err(UpdaterError::SwapFailed(format!(
                "Cannot move new installation into {}: {e}; restore failed: {restore_err}; \
                 previous installation is kept at {}",
                exec_dir.display(),
                backup_dir.display()
            ))),
        };
    }

    if !moved {
        remove_dir_if_exists(staging)?;
    }

    tracing::info!(
        "Swapped {} into place, previous installation at {}",
        exec_dir.display(),
        backup_dir.display()
    );
    Ok(())
}

/// Return the staged files to `staging` after an aborted swap
fn hand_back(incoming: &Path, staging: &Path, moved: bool) {
    if !incoming.exists() {
        return;
    }
    if moved {
        if let Err(e) = fs::rename(incoming, staging) {
            tracing::warn!("Cannot return staged files to {}: {e}", staging.display());
        }
    } else if let Err(e) = remove_dir_if_exists(incoming) {
        tracing::warn!("Cannot remove {}: {e}", incoming.display());
    }
}

#[cfg(unix)]
fn ensure_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path)
        && metadata.is_file()
    {
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o755);
        if let Err(e) = fs::set_permissions(path, perms) {
            tracing::warn!("Cannot mark {} executable: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdaterOptions;
    use crate::manifest::LocalManifest;
    use tempfile::TempDir;

    struct Layout {
        _temp_dir: TempDir,
        staging: PathBuf,
        exec_dir: PathBuf,
        backup_dir: PathBuf,
    }

    fn layout() -> Layout {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("update");
        let exec_dir = temp_dir.path().join("app");
        let backup_dir = temp_dir.path().join("app.bak");

        fs::create_dir_all(staging.join("resources")).unwrap();
        fs::write(staging.join("fluxion"), b"new binary").unwrap();
        fs::write(staging.join("resources/index.html"), b"new").unwrap();
        fs::create_dir_all(&exec_dir).unwrap();
        fs::write(exec_dir.join("fluxion"), b"old binary").unwrap();

        Layout {
            _temp_dir: temp_dir,
            staging,
            exec_dir,
            backup_dir,
        }
    }

    #[test]
    fn test_swap_directories_commits_and_backs_up() {
        let l = layout();

        swap_directories(&l.staging, &l.exec_dir, &l.backup_dir).unwrap();

        assert_eq!(fs::read(l.exec_dir.join("fluxion")).unwrap(), b"new binary");
        assert!(l.exec_dir.join("resources/index.html").exists());
        assert_eq!(fs::read(l.backup_dir.join("fluxion")).unwrap(), b"old binary");
        assert!(!l.staging.exists());
        assert!(!incoming_dir(&l.exec_dir).exists());
    }

    #[test]
    fn test_swap_refuses_empty_staging() {
        let l = layout();
        fs::remove_dir_all(&l.staging).unwrap();
        fs::create_dir_all(&l.staging).unwrap();

        let result = swap_directories(&l.staging, &l.exec_dir, &l.backup_dir);

        assert!(matches!(result, Err(UpdaterError::SwapFailed(_))));
        assert_eq!(fs::read(l.exec_dir.join("fluxion")).unwrap(), b"old binary");
        assert!(!l.backup_dir.exists());
    }

    #[test]
    fn test_swap_without_live_install_keeps_staging() {
        let l = layout();
        fs::remove_dir_all(&l.exec_dir).unwrap();

        let result = swap_directories(&l.staging, &l.exec_dir, &l.backup_dir);

        assert!(matches!(result, Err(UpdaterError::SwapFailed(_))));
        assert_eq!(fs::read(l.staging.join("fluxion")).unwrap(), b"new binary");
        assert!(!incoming_dir(&l.exec_dir).exists());
    }

    #[test]
    fn test_swap_replaces_stale_backup() {
        let l = layout();
        fs::create_dir_all(&l.backup_dir).unwrap();
        fs::write(l.backup_dir.join("stale"), b"from last cycle").unwrap();

        swap_directories(&l.staging, &l.exec_dir, &l.backup_dir).unwrap();

        assert!(!l.backup_dir.join("stale").exists());
        assert!(l.backup_dir.join("fluxion").exists());
    }

    #[test]
    fn test_failed_commit_restores_previous_installation() {
        let l = layout();

        let result = swap_directories_with(&l.staging, &l.exec_dir, &l.backup_dir, |_, _| {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "exec dir is busy",
            ))
        });

        match result {
            Err(UpdaterError::SwapFailed(message)) => {
                assert!(message.contains("previous installation restored"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fs::read(l.exec_dir.join("fluxion")).unwrap(), b"old binary");
        assert!(!l.backup_dir.exists());
        assert!(!incoming_dir(&l.exec_dir).exists());
        assert_eq!(fs::read(l.staging.join("fluxion")).unwrap(), b"new binary");
    }

    #[test]
    fn test_commit_failure_without_rename_leaves_exec_dir_whole() {
        let l = layout();

        // Commit half-applied: exec dir created empty before the failure
        let result = swap_directories_with(&l.staging, &l.exec_dir, &l.backup_dir, |_, to| {
            fs::create_dir_all(to)?;
            Err(std::io::Error::other("disk full"))
        });

        assert!(matches!(result, Err(UpdaterError::SwapFailed(_))));
        assert_eq!(fs::read(l.exec_dir.join("fluxion")).unwrap(), b"old binary");
        assert!(!l.exec_dir.join("resources").exists());
    }

    #[tokio::test]
    async fn test_apply_to_bundle_keeps_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let applications = temp_dir.path().join("Applications");
        let bundle = applications.join("Fluxion.app");
        let staging = temp_dir.path().join("update/Fluxion.app");
        fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
        fs::write(bundle.join("Contents/MacOS/fluxion"), b"old binary").unwrap();
        fs::create_dir_all(applications.join("Other.app")).unwrap();
        fs::create_dir_all(staging.join("Contents/MacOS")).unwrap();
        fs::write(staging.join("Contents/MacOS/fluxion"), b"new binary").unwrap();

        let config = UpdaterOptions {
            url: "https://releases.example.com/".to_string(),
            exec_dir: Some(bundle.clone()),
            update_dir: Some(staging.clone()),
            ..Default::default()
        }
        .resolve(&LocalManifest::new("fluxion", "1.0.0"))
        .unwrap();

        let instruction = AppSwap.apply(&staging, &config).await.unwrap();

        assert_eq!(
            fs::read(bundle.join("Contents/MacOS/fluxion")).unwrap(),
            b"new binary"
        );
        assert_eq!(
            fs::read(applications.join("Fluxion.app.bak/Contents/MacOS/fluxion")).unwrap(),
            b"old binary"
        );
        assert!(applications.join("Other.app").is_dir());
        if cfg!(target_os = "macos") {
            assert_eq!(instruction.args.last(), Some(&bundle.clone().into_os_string()));
        } else {
            assert_eq!(instruction.program, bundle);
        }
    }

    #[tokio::test]
    async fn test_apply_returns_relaunch_of_executable() {
        let l = layout();
        let config = UpdaterOptions {
            url: "https://releases.example.com/".to_string(),
            executable: Some("fluxion".to_string()),
            exec_dir: Some(l.exec_dir.clone()),
            backup_dir: Some(l.backup_dir.clone()),
            update_dir: Some(l.staging.clone()),
            ..Default::default()
        }
        .resolve(&LocalManifest::new("fluxion", "1.0.0"))
        .unwrap();

        let instruction = AppSwap.apply(&l.staging, &config).await.unwrap();

        assert!(instruction.exit_current);
        assert_eq!(instruction.program, l.exec_dir.join("fluxion"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(l.exec_dir.join("fluxion"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
