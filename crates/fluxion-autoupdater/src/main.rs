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

//! FluxION Autoupdater - Entry point for the command line driver

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fluxion_autoupdater::swap::launch;
use fluxion_autoupdater::{
    AutoUpdater, LocalManifest, SwapStrategyKind, UpdateEvent, UpdaterOptions, load_options,
};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "fluxion-autoupdater")]
#[command(author, version, about = "FluxION self-update driver")]
#[command(
    long_about = "Checks a release server for a newer build, downloads and unpacks it and \
    swaps it into the installation directory.\n\
    \nExamples:\n  \
    fluxion-autoupdater check --manifest package.json --url https://releases.example.com/app/\n  \
    fluxion-autoupdater update --manifest package.json --config updater.json --apply"
)]
struct Cli {
    /// Log resolved paths and debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether a newer release is published
    Check(CommonArgs),

    /// Download and stage the newest release, optionally swapping it in
    Update(UpdateArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Manifest of the installed application
    #[arg(long, default_value = "package.json")]
    manifest: PathBuf,

    /// Release base URL, overrides the config file
    #[arg(long)]
    url: Option<String>,

    /// JSON file with updater options
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct UpdateArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Script performing the swap for the `script` strategy
    #[arg(long)]
    swap_script: Option<PathBuf>,

    /// Swap the staged release in and relaunch
    #[arg(long)]
    apply: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    App,
    Script,
}

impl From<StrategyArg> for SwapStrategyKind {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::App => SwapStrategyKind::AppSwap,
            StrategyArg::Script => SwapStrategyKind::ScriptSwap,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "fluxion_autoupdater=debug"
    } else {
        "fluxion_autoupdater=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    match cli.command {
        Commands::Check(args) => check(args, cli.verbose).await,
        Commands::Update(args) => update(args, cli.verbose).await,
    }
}

fn build_updater(
    args: &CommonArgs,
    verbose: bool,
    customize: impl FnOnce(&mut UpdaterOptions),
) -> anyhow::Result<AutoUpdater> {
    let manifest = LocalManifest::load(&args.manifest)
        .with_context(|| format!("Cannot read {}", args.manifest.display()))?;

    let mut options = match &args.config {
        Some(path) => load_options(path)
            .with_context(|| format!("Cannot load options from {}", path.display()))?,
        None => UpdaterOptions::default(),
    };
    if let Some(url) = &args.url {
        options.url = url.clone();
    }
    options.verbose |= verbose;
    customize(&mut options);

    Ok(AutoUpdater::new(manifest, options)?)
}

async fn check(args: CommonArgs, verbose: bool) -> anyhow::Result<()> {
    let updater = build_updater(&args, verbose, |_| {})?;
    let remote = updater.read_remote_manifest().await?;

    if updater.check_new_version(&remote)? {
        println!(
            "Update available: {} -> {}",
            updater.manifest().version,
            remote.version
        );
    } else {
        println!("Up to date ({})", updater.manifest().version);
    }
    Ok(())
}

async fn update(args: UpdateArgs, verbose: bool) -> anyhow::Result<()> {
    let mut updater = build_updater(&args.common, verbose, |options| {
        if let Some(strategy) = args.strategy {
            options.strategy = strategy.into();
        }
        if let Some(script) = &args.swap_script {
            options.swap_script = Some(script.clone());
        }
    })?;

    let reporter = tokio::spawn(report_events(updater.subscribe()));

    let remote = updater.read_remote_manifest().await?;
    if !updater.check_new_version(&remote)? {
        info!("Already on latest version: {}", updater.manifest().version);
        return Ok(());
    }

    let archive = updater.download(&remote, Default::default()).await?;
    let staging = updater.unpack(&archive, Default::default()).await?;

    if !args.apply {
        println!("Release {} staged in {}", remote.version, staging.display());
        return Ok(());
    }

    let instruction = updater.apply_swap().await?;
    let log_path = updater.config().log_path.clone();
    drop(updater);
    if let Err(e) = reporter.await {
        warn!("Event reporter failed: {e}");
    }

    let child = launch(&instruction, &log_path)?;
    debug!("Relaunch started with PID {}", child.id());
    if instruction.exit_current {
        info!("Exiting so the update can take effect");
        std::process::exit(0);
    }
    Ok(())
}

async fn report_events(mut events: broadcast::Receiver<UpdateEvent>) {
    loop {
        match events.recv().await {
            Ok(UpdateEvent::Download { bytes }) => info!("Downloaded {} KiB", bytes / 1024),
            Ok(UpdateEvent::Install { unpacked, total }) => {
                info!("Unpacked {unpacked}/{total} entries");
            }
            Ok(event) => debug!("{event:?}"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Skipped {skipped} progress events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
