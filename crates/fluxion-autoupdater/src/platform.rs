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

//! Platform default locations for the live install, staging and backups

use std::path::{Path, PathBuf};

const UPDATE_DIR_NAME: &str = "fluxion-autoupdater-update";
const LOG_FILE_NAME: &str = "fluxion-autoupdater.log";

#[cfg(target_os = "windows")]
pub const PLATFORM: &str = "win";
#[cfg(target_os = "macos")]
pub const PLATFORM: &str = "osx";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const PLATFORM: &str = "linux";

#[cfg(target_arch = "x86_64")]
pub const ARCH: &str = "x64";
#[cfg(target_arch = "aarch64")]
pub const ARCH: &str = "arm64";
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const ARCH: &str = "unknown";

/// Directory of the live installation
///
/// The `.app` bundle when running from one, otherwise the directory of the
/// running executable.
pub fn exec_dir() -> PathBuf {
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("./app"));
    exec_dir_from(&exe)
}

pub(crate) fn exec_dir_from(exe: &Path) -> PathBuf {
    let dir = exe.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    // <bundle>.app/Contents/MacOS/<exe>
    if dir.ends_with("Contents/MacOS")
        && let Some(bundle) = dir.ancestors().nth(2)
        && is_app_bundle(bundle)
    {
        return bundle.to_path_buf();
    }
    dir
}

/// Whether `path` names a macOS application bundle
pub fn is_app_bundle(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("app"))
}

pub fn update_dir() -> PathBuf {
    std::env::temp_dir().join(UPDATE_DIR_NAME)
}

/// `<exec_dir>.bak`, next to the live installation
pub fn backup_dir(exec_dir: &Path) -> PathBuf {
    let mut name = exec_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "app".into());
    name.push(".bak");
    exec_dir.with_file_name(name)
}

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE_NAME)
}

/// Executable file name for an application name on this platform
pub fn executable_name(app_name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{app_name}.exe")
    } else if cfg!(target_os = "macos") {
        format!("{app_name}.app")
    } else {
        app_name.to_string()
    }
}

/// Platform tag such as `linux-x64`, used in release artifact names
pub fn platform_full() -> String {
    format!("{PLATFORM}-{ARCH}")
}

/// Strip trailing path separators, keeping a bare root intact
pub fn trim_trailing_separators(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        path.to_path_buf()
    } else {
        PathBuf::from(trimmed)
    }
}
