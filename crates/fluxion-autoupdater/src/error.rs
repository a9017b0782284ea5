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

//! Error types for the autoupdater crate

use std::path::PathBuf;
use thiserror::Error;

/// Underlying collaborator failure kept for diagnostics
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("invalid manifest structure: {0}")]
    InvalidManifest(String),

    #[error("cannot read remote manifest from {url}")]
    ManifestFetchFailed {
        url: String,
        #[source]
        source: Cause,
    },

    #[error("cannot download package from {url}")]
    DownloadFailed {
        url: String,
        #[source]
        source: Cause,
    },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("release archive of unsupported type: {}", .0.display())]
    UnsupportedArchiveType(PathBuf),

    #[error("cannot unpack package {}: {message}", path.display())]
    UnpackFailed {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("swap failed: {0}")]
    SwapFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("version parse error: {0}")]
    VersionParse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpdaterError {
    pub(crate) fn unpack_failed(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Cause>,
    ) -> Self {
        Self::UnpackFailed {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Whether running the same cycle again could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ManifestFetchFailed { .. } | Self::DownloadFailed { .. } | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
