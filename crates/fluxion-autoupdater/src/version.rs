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

//! Version parsing and comparison module

use crate::error::{Result, UpdaterError};
use semver::Version;

/// Parse semver version strings (e.g., "1.2.0", "v1.2.0-beta.1")
pub fn parse_version(s: &str) -> Result<Version> {
    let trimmed = s.trim().trim_start_matches('v').trim_start_matches('V');
    Version::parse(trimmed)
        .map_err(|e| UpdaterError::VersionParse(format!("Invalid version {s}: {e}")))
}

/// Returns true if `remote` takes precedence over `local`
///
/// Build metadata does not participate in precedence.
pub fn is_newer(local: &str, remote: &str) -> Result<bool> {
    let local = parse_version(local)?;
    let remote = parse_version(remote)?;
    Ok(remote.cmp_precedence(&local).is_gt())
}
