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

//! Configuration module for the autoupdater

use crate::backup::backup_dir_for;
use crate::error::{Result, UpdaterError};
use crate::manifest::LocalManifest;
use crate::platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How staged files are promoted into the live installation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SwapStrategyKind {
    /// Replace the whole application directory
    #[default]
    AppSwap,
    /// Hand the swap over to an external script
    ScriptSwap,
}

/// Raw options as given by the embedding application or a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterOptions {
    /// Release base URL, `package.json` and artifacts live below it
    #[serde(default)]
    pub url: String,

    /// Override of the executable name inside `exec_dir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log resolved paths and options
    #[serde(default)]
    pub verbose: bool,

    /// Alias of `verbose`
    #[serde(default)]
    pub debug: bool,

    /// Required for [`SwapStrategyKind::ScriptSwap`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_script: Option<PathBuf>,

    #[serde(default)]
    pub strategy: SwapStrategyKind,

    /// Keep every backup, suffixed with the cycle start time
    #[serde(default)]
    pub accumulative_backup: bool,
}

/// Options resolved once at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Always ends with `/`
    pub base_url: String,
    pub executable: String,
    pub backup_dir: PathBuf,
    pub exec_dir: PathBuf,
    /// Staging directory; rebound after unpacking into a nested folder
    pub update_dir: PathBuf,
    pub log_path: PathBuf,
    pub verbose: bool,
    pub swap_script: Option<PathBuf>,
    pub strategy: SwapStrategyKind,
    pub accumulative_backup: bool,
}

impl UpdaterOptions {
    pub fn resolve(self, manifest: &LocalManifest) -> Result<UpdaterConfig> {
        self.resolve_at(manifest, Utc::now())
    }

    /// Resolve with an explicit cycle start time
    pub fn resolve_at(
        self,
        manifest: &LocalManifest,
        started_at: DateTime<Utc>,
    ) -> Result<UpdaterConfig> {
        if self.url.trim().is_empty() {
            return Err(UpdaterError::Config("Release url is required".to_string()));
        }
        if self.strategy == SwapStrategyKind::ScriptSwap && self.swap_script.is_none() {
            return Err(UpdaterError::Config(
                "ScriptSwap strategy requires swapScript".to_string(),
            ));
        }

        let exec_dir = platform::trim_trailing_separators(
            &self.exec_dir.unwrap_or_else(platform::exec_dir),
        );
        let backup_base = self
            .backup_dir
            .unwrap_or_else(|| platform::backup_dir(&exec_dir));
        let backup_dir = if self.accumulative_backup {
            backup_dir_for(&backup_base, Some(started_at))
        } else {
            backup_dir_for(&backup_base, None)
        };

        let base_url = if self.url.ends_with('/') {
            self.url
        } else {
            format!("{}/", self.url)
        };

        Ok(UpdaterConfig {
            base_url,
            executable: self
                .executable
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| platform::executable_name(&manifest.name)),
            backup_dir,
            exec_dir,
            update_dir: self.update_dir.unwrap_or_else(platform::update_dir),
            log_path: self.log_path.unwrap_or_else(platform::log_path),
            verbose: self.verbose || self.debug,
            swap_script: self.swap_script,
            strategy: self.strategy,
            accumulative_backup: self.accumulative_backup,
        })
    }
}

impl UpdaterConfig {
    /// Absolute URL of a file published under the release base URL
    pub fn release_url(&self, relative: &str) -> String {
        format!("{}{}", self.base_url, relative.trim_start_matches('/'))
    }

    /// Path of the executable inside the live installation
    ///
    /// An installation that is itself an `.app` bundle is launched as a whole.
    pub fn executable_path(&self) -> PathBuf {
        if platform::is_app_bundle(&self.exec_dir) {
            self.exec_dir.clone()
        } else {
            self.exec_dir.join(&self.executable)
        }
    }
}

/// Load options from a JSON file
pub fn load_options(path: &Path) -> Result<UpdaterOptions> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| UpdaterError::Config(format!("Failed to parse config: {e}")))
}
