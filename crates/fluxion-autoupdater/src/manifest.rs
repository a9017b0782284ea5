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

//! Local and remote release manifests

use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest of the currently installed build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalManifest {
    /// Application name, used to derive the default executable name
    pub name: String,
    /// Installed version (semver string)
    pub version: String,
}

impl LocalManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Load the manifest shipped with the installed application (`package.json`)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            UpdaterError::Config(format!(
                "Failed to parse local manifest {}: {e}",
                path.display()
            ))
        })
    }
}

/// Manifest published next to the release artifacts
///
/// Missing fields deserialize to empty strings so that [`RemoteManifest::validate`]
/// reports them as an invalid manifest rather than a fetch failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteManifest {
    #[serde(default)]
    pub version: String,

    /// Artifact path relative to the release base URL
    #[serde(rename = "artifact-file", default)]
    pub artifact_file: String,
}

impl RemoteManifest {
    pub fn new(version: impl Into<String>, artifact_file: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            artifact_file: artifact_file.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.artifact_file.trim().is_empty() {
            return Err(UpdaterError::InvalidManifest(
                "missing artifact-file".to_string(),
            ));
        }
        if self.version.trim().is_empty() {
            return Err(UpdaterError::InvalidManifest("missing version".to_string()));
        }
        if matches!(self.artifact_name(), "" | "." | "..") {
            return Err(UpdaterError::InvalidManifest(format!(
                "artifact-file has no file name: {}",
                self.artifact_file
            )));
        }
        Ok(())
    }

    /// File name of the artifact (last segment of `artifact-file`)
    ///
    /// Both `/` and `\` separate segments, so the name never carries a directory
    /// part on any platform.
    pub fn artifact_name(&self) -> &str {
        self.artifact_file
            .rsplit(['/', '\\'])
            .find(|segment| !segment.trim().is_empty())
            .unwrap_or("")
    }
}
