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

//! Orchestrator of a single update cycle
//!
//! The stages are exposed individually and never chained internally. A typical
//! caller runs:
//!
//! ```no_run
//! # async fn cycle() -> fluxion_autoupdater::Result<()> {
//! use fluxion_autoupdater::{AutoUpdater, LocalManifest, UpdaterOptions};
//!
//! let options = UpdaterOptions {
//!     url: "https://releases.example.com/fluxion/".to_string(),
//!     ..Default::default()
//! };
//! let mut updater = AutoUpdater::new(LocalManifest::new("fluxion", "1.0.0"), options)?;
//!
//! let remote = updater.read_remote_manifest().await?;
//! if updater.check_new_version(&remote)? {
//!     let archive = updater.download(&remote, Default::default()).await?;
//!     updater.unpack(&archive, Default::default()).await?;
//!     let relaunch = updater.apply_swap().await?;
//!     fluxion_autoupdater::swap::launch(&relaunch, &updater.config().log_path)?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::backup::remove_dir_if_exists;
use crate::config::{SwapStrategyKind, UpdaterConfig, UpdaterOptions};
use crate::debounce::{DEFAULT_DEBOUNCE, Debouncer};
use crate::downloader::{build_client, download_to_file, fetch_manifest};
use crate::error::{Result, UpdaterError};
use crate::events::{EventBus, UpdateEvent};
use crate::manifest::{LocalManifest, RemoteManifest};
use crate::platform;
use crate::swap::{RelaunchInstruction, SwapStrategy, strategy_for};
use crate::unpack::unpack_archive;
use crate::version::is_newer;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

const REMOTE_MANIFEST: &str = "package.json";

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Minimum spacing of [`UpdateEvent::Download`] events
    pub debounce: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnpackOptions {
    /// Minimum spacing of [`UpdateEvent::Install`] events
    pub debounce: Duration,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug)]
pub struct AutoUpdater {
    config: UpdaterConfig,
    manifest: LocalManifest,
    client: reqwest::Client,
    events: EventBus,
    strategy: Box<dyn SwapStrategy>,
}

impl AutoUpdater {
    pub fn new(manifest: LocalManifest, options: UpdaterOptions) -> Result<Self> {
        let verbose = options.verbose || options.debug;
        let options_dump = verbose.then(|| serde_json::to_string(&options).unwrap_or_default());

        let config = options.resolve(&manifest)?;
        let strategy = strategy_for(config.strategy);

        if let Some(options_dump) = options_dump {
            info!("Platform: {}", platform::platform_full());
            info!("Exec dir: {}", config.exec_dir.display());
            info!("Executable: {}", config.executable);
            info!("Update dir: {}", config.update_dir.display());
            info!("Backup dir: {}", config.backup_dir.display());
            info!("Log path: {}", config.log_path.display());
            info!("Options: {options_dump}");
        }

        Ok(Self {
            config,
            manifest,
            client: build_client()?,
            events: EventBus::new(),
            strategy,
        })
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn manifest(&self) -> &LocalManifest {
        &self.manifest
    }

    pub fn strategy_kind(&self) -> SwapStrategyKind {
        self.strategy.kind()
    }

    /// Fetch `package.json` from the release base URL
    pub async fn read_remote_manifest(&self) -> Result<RemoteManifest> {
        let url = self.config.release_url(REMOTE_MANIFEST);
        debug!("Fetching remote manifest from {url}");

        let remote = fetch_manifest(&self.client, &url).await?;
        info!("Remote version: {}", remote.version);
        self.events.emit(UpdateEvent::ManifestFetched {
            version: remote.version.clone(),
        });
        Ok(remote)
    }

    /// Whether `remote` is newer than the installed version
    pub fn check_new_version(&self, remote: &RemoteManifest) -> Result<bool> {
        remote.validate()?;
        let newer = is_newer(&self.manifest.version, &remote.version)?;
        if newer {
            info!(
                "New version available: {} (current: {})",
                remote.version, self.manifest.version
            );
        } else {
            debug!("Already on latest version: {}", self.manifest.version);
        }
        Ok(newer)
    }

    /// Download the release artifact into the temp dir
    ///
    /// Clears `update_dir` first so a later unpack starts from an empty staging area.
    pub async fn download(
        &self,
        remote: &RemoteManifest,
        options: DownloadOptions,
    ) -> Result<PathBuf> {
        remote.validate()?;
        let url = self.config.release_url(&remote.artifact_file);

        if let Err(e) = remove_dir_if_exists(&self.config.update_dir) {
            return Err(UpdaterError::DownloadFailed {
                url,
                source: Box::new(e),
            });
        }

        let dest = std::env::temp_dir().join(remote.artifact_name());
        info!("Downloading {url} to {}", dest.display());

        let events = self.events.clone();
        let progress = Debouncer::spawn(options.debounce, move |bytes| {
            events.emit(UpdateEvent::Download { bytes });
        });

        let result = download_to_file(&self.client, &url, &dest, |bytes| progress.call(bytes)).await;
        progress.finish().await;
        result?;

        self.events.emit(UpdateEvent::Downloaded { path: dest.clone() });
        Ok(dest)
    }

    /// Extract a downloaded archive into `update_dir`
    ///
    /// Returns the effective staging directory, which also becomes the new
    /// `update_dir` when the archive wraps everything in a folder named after itself.
    pub async fn unpack(&mut self, archive: &Path, options: UnpackOptions) -> Result<PathBuf> {
        let events = self.events.clone();
        let progress = Debouncer::spawn(options.debounce, move |(unpacked, total)| {
            events.emit(UpdateEvent::Install { unpacked, total });
        });
        let trigger = progress.trigger();

        let result = unpack_archive(archive, &self.config.update_dir, move |unpacked, total| {
            trigger.call((unpacked, total));
        })
        .await;
        progress.finish().await;
        let staging = result?;

        if staging != self.config.update_dir {
            debug!("Staging directory rebound to {}", staging.display());
            self.config.update_dir = staging.clone();
        }
        self.events.emit(UpdateEvent::Unpacked {
            dir: staging.clone(),
        });
        Ok(staging)
    }

    /// Promote the staged release with the bound strategy
    ///
    /// For [`SwapStrategyKind::ScriptSwap`] the swap itself happens once the
    /// caller has launched the instruction and exited.
    pub async fn apply_swap(&self) -> Result<RelaunchInstruction> {
        info!(
            "Applying update from {} with {:?}",
            self.config.update_dir.display(),
            self.strategy.kind()
        );
        let instruction = self
            .strategy
            .apply(&self.config.update_dir, &self.config)
            .await?;

        self.events.emit(UpdateEvent::Swapped {
            backup_dir: self.config.backup_dir.clone(),
        });
        Ok(instruction)
    }
}
