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

use super::RelaunchInstruction;
use crate::error::{Result, UpdaterError};
use std::fs::OpenOptions;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Start the relaunch target detached from this process
///
/// stdout and stderr are appended to `log_path`. The child is not waited for;
/// dropping the returned handle leaves it running.
pub fn launch(instruction: &RelaunchInstruction, log_path: &Path) -> Result<Child> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let mut command = Command::new(&instruction.program);
    command
        .args(&instruction.args)
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log);
    if let Some(dir) = &instruction.working_dir {
        command.current_dir(dir);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so it survives our exit
        command.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = command.spawn().map_err(|e| {
        UpdaterError::SwapFailed(format!(
            "Failed to launch {}: {e}",
            instruction.program.display()
        ))
    })?;

    tracing::info!(
        "Launched {} (PID {}), output in {}",
        instruction.program.display(),
        child.id(),
        log_path.display()
    );
    Ok(child)
}
