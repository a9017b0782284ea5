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

//! Swap performed by an external script after this process exits
//!
//! The script is called as
//! `<script> <staging-dir> <exec-dir> <backup-dir> <executable> <pid>` and is
//! expected to wait for `<pid>`, back up `exec-dir`, move the staged files in,
//! restore the backup on failure and relaunch. `scripts/swap.sh` is the
//! reference implementation.

use super::{RelaunchInstruction, SwapStrategy, ensure_staged};
use crate::config::{SwapStrategyKind, UpdaterConfig};
use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptSwap;

#[async_trait]
impl SwapStrategy for ScriptSwap {
    fn kind(&self) -> SwapStrategyKind {
        SwapStrategyKind::ScriptSwap
    }

    async fn apply(
        &self,
        staging_dir: &Path,
        config: &UpdaterConfig,
    ) -> Result<RelaunchInstruction> {
        let script = config.swap_script.as_deref().ok_or_else(|| {
            UpdaterError::Config("ScriptSwap strategy requires swapScript".to_string())
        })?;

        ensure_staged(staging_dir)?;
        if !script.is_file() {
            return Err(UpdaterError::SwapFailed(format!(
                "Swap script not found: {}",
                script.display()
            )));
        }

        let (program, mut args) = interpreter_for(script);
        #[cfg(unix)]
        if program.as_path() == script {
            mark_executable(script)?;
        }
        args.extend([
            staging_dir.as_os_str().to_os_string(),
            config.exec_dir.as_os_str().to_os_string(),
            config.backup_dir.as_os_str().to_os_string(),
            OsString::from(&config.executable),
            OsString::from(std::process::id().to_string()),
        ]);

        tracing::info!(
            "Handing swap of {} over to {}",
            config.exec_dir.display(),
            script.display()
        );

        Ok(RelaunchInstruction {
            program,
            args,
            // Outside of exec_dir, which the script moves away
            working_dir: Some(std::env::temp_dir()),
            exit_current: true,
        })
    }
}

/// Program and leading arguments needed to run `script`
fn interpreter_for(script: &Path) -> (PathBuf, Vec<OsString>) {
    let extension = script
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("sh") => (PathBuf::from("sh"), vec![script.as_os_str().to_os_string()]),
        Some("bat" | "cmd") => (
            PathBuf::from("cmd"),
            vec!["/C".into(), script.as_os_str().to_os_string()],
        ),
        _ => (script.to_path_buf(), Vec::new()),
    }
}

#[cfg(unix)]
fn mark_executable(script: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(script)?.permissions();
    if perms.mode() & 0o111 != 0o111 {
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(script, perms)?;
    }
    Ok(())
}
