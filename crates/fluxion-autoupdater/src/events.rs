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

//! Progress and lifecycle events published by the updater

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    ManifestFetched {
        version: String,
    },
    /// Bytes of the artifact received so far
    Download {
        bytes: u64,
    },
    Downloaded {
        path: PathBuf,
    },
    /// Archive entries extracted so far
    Install {
        unpacked: usize,
        total: usize,
    },
    Unpacked {
        dir: PathBuf,
    },
    Swapped {
        backup_dir: PathBuf,
    },
}

/// Fan-out of [`UpdateEvent`]s to any number of listeners
///
/// Dropping a receiver unsubscribes it. Slow listeners lose the oldest events
/// rather than blocking the pipeline.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<UpdateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: UpdateEvent) {
        tracing::trace!("Update event: {event:?}");
        // No listeners is fine
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
