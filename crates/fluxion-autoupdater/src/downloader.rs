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

//! Remote manifest fetching and streaming artifact download

use crate::error::{Cause, Result, UpdaterError};
use crate::manifest::RemoteManifest;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("fluxion-autoupdater/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| UpdaterError::Config(format!("Failed to build HTTP client: {e}")))
}

/// GET and parse the release manifest
pub async fn fetch_manifest(client: &reqwest::Client, url: &str) -> Result<RemoteManifest> {
    let fetch = async {
        let response = client.get(url).send().await?.error_for_status()?;
        let manifest = response.json::<RemoteManifest>().await?;
        Ok::<_, reqwest::Error>(manifest)
    };

    fetch
        .await
        .map_err(|e| UpdaterError::ManifestFetchFailed {
            url: url.to_string(),
            source: Box::new(e),
        })
}

/// Stream `url` into `dest`, reporting the number of bytes written so far
///
/// A partially written file is removed on failure.
pub async fn download_to_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    mut on_progress: F,
) -> Result<u64>
where
    F: FnMut(u64),
{
    match stream_to_file(client, url, dest, &mut on_progress).await {
        Ok(written) => {
            tracing::info!("Downloaded {written} bytes to {}", dest.display());
            Ok(written)
        }
        Err(source) => {
            if let Err(e) = tokio::fs::remove_file(dest).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!("Failed to remove partial download {}: {e}", dest.display());
            }
            Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                source,
            })
        }
    }
}

async fn stream_to_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    on_progress: &mut F,
) -> std::result::Result<u64, Cause>
where
    F: FnMut(u64),
{
    let response = client.get(url).send().await?.error_for_status()?;
    if let Some(length) = response.content_length() {
        tracing::debug!("Downloading {url} ({length} bytes)");
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        on_progress(written);
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
