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

//! FluxION Autoupdater - Self-update pipeline for packaged desktop builds
//!
//! Reads the release manifest published next to the artifacts, compares versions,
//! downloads and unpacks the new build into a staging directory and promotes it
//! into the installation directory with a swap strategy chosen at construction.
//! Progress is published as [`UpdateEvent`]s.

pub mod backup;
pub mod config;
pub mod debounce;
pub mod downloader;
pub mod error;
pub mod events;
pub mod manifest;
pub mod platform;
pub mod swap;
pub mod unpack;
pub mod updater;
pub mod version;

pub use config::{SwapStrategyKind, UpdaterConfig, UpdaterOptions, load_options};
pub use error::{Result, UpdaterError};
pub use events::UpdateEvent;
pub use manifest::{LocalManifest, RemoteManifest};
pub use swap::{RelaunchInstruction, SwapStrategy};
pub use updater::{AutoUpdater, DownloadOptions, UnpackOptions};
pub use version::{is_newer, parse_version};
