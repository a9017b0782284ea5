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

//! Swap strategies promoting the staged release into the live installation
//!
//! Both strategies leave either the complete new installation or the complete
//! old one at `exec_dir`. The previous installation ends up in `backup_dir`.

mod app_swap;
mod launch;
mod script_swap;

pub use app_swap::AppSwap;
pub use launch::launch;
pub use script_swap::ScriptSwap;

use crate::backup::is_populated_dir;
use crate::config::{SwapStrategyKind, UpdaterConfig};
use crate::error::{Result, UpdaterError};
use crate::platform;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// What to start once the swap has been committed or handed off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchInstruction {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    /// The current process has to exit for the update to take effect
    pub exit_current: bool,
}

impl RelaunchInstruction {
    /// Start an installed executable
    ///
    /// macOS bundles are started through `open` so LaunchServices picks up the
    /// new bundle.
    pub fn for_executable(path: &Path) -> Self {
        if cfg!(target_os = "macos") && platform::is_app_bundle(path) {
            Self {
                program: PathBuf::from("open"),
                args: vec!["-n".into(), path.as_os_str().to_os_string()],
                working_dir: None,
                exit_current: true,
            }
        } else {
            Self {
                program: path.to_path_buf(),
                args: Vec::new(),
                working_dir: path.parent().map(Path::to_path_buf),
                exit_current: true,
            }
        }
    }
}

#[async_trait]
pub trait SwapStrategy: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> SwapStrategyKind;

    /// Promote `staging_dir` into `config.exec_dir`, keeping the previous
    /// installation recoverable in `config.backup_dir`
    async fn apply(&self, staging_dir: &Path, config: &UpdaterConfig)
    -> Result<RelaunchInstruction>;
}

/// The strategy bound to an updater for its whole lifetime
pub fn strategy_for(kind: SwapStrategyKind) -> Box<dyn SwapStrategy> {
    match kind {
        SwapStrategyKind::AppSwap => Box::new(AppSwap),
        SwapStrategyKind::ScriptSwap => Box::new(ScriptSwap),
    }
}

/// Live files may only be touched once a complete staging directory exists
pub(crate) fn ensure_staged(staging_dir: &Path) -> Result<()> {
    if is_populated_dir(staging_dir) {
        Ok(())
    } else {
        Err(UpdaterError::SwapFailed(format!(
            "Staging directory {} is missing or empty, unpack first",
            staging_dir.display()
        )))
    }
}
