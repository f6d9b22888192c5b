//! hondana command line.
//!
//! Wires configuration, the content graph, the extension loader and the
//! synchronizer together. Everything with invariants lives in the crates.

mod cli;
mod error;

use crate::cli::{Cli, Commands, ExtensionCommands};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use hondana_config::Config;
use hondana_extension::capability::NativeRegistry;
use hondana_extension::{HttpRepository, InstallOutcome, Loader};
use hondana_graph::Database;
use hondana_sync::{SyncOptions, SyncReport, Synchronizer, schedule};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "hondana=info,hondana_sync=info,hondana_extension=info,hondana_graph=warn";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.or_else(|| hondana_config::default_config_path().filter(|path| path.exists()));
    let config = Config::load(config_path.as_deref()).or_raise(|| ErrorKind::Config)?;
    let db = Database::connect(&config.database.path).await.or_raise(|| ErrorKind::Database)?;
    let result = match cli.command {
        Commands::Extensions { command } => extensions(&config, &db, command).await,
        Commands::Sync { watch } => sync(&config, &db, watch).await,
        Commands::Updates { all, mark_seen, limit } => updates(&db, all, mark_seen, limit).await,
    };
    db.close().await;
    result
}

fn loader(config: &Config, db: &Database) -> Result<Loader> {
    let client = reqwest::Client::builder()
        .timeout(config.extensions.timeout())
        .build()
        .or_raise(|| ErrorKind::Extension)?;
    let repository = HttpRepository::new(&config.extensions.repository_url, client.clone()).or_raise(|| ErrorKind::Extension)?;
    let store = Arc::new(db.descriptor_store());
    Ok(Loader::new(store, Arc::new(repository), NativeRegistry::new()).with_http_client(client))
}

async fn extensions(config: &Config, db: &Database, command: ExtensionCommands) -> Result<()> {
    let loader = loader(config, db)?;
    match command {
        ExtensionCommands::List => {
            loader.check_updates().await.or_raise(|| ErrorKind::Extension)?;
            for item in loader.catalog().await.or_raise(|| ErrorKind::Extension)? {
                let installed = item.installed.map(|version| format!(" (installed {version})")).unwrap_or_default();
                println!("{:<24} {:<10} {:<18}{installed}", item.entry.key, item.entry.version.to_string(), item.state.as_str());
            }
        },
        ExtensionCommands::Install { key } => {
            let item = loader
                .catalog()
                .await
                .or_raise(|| ErrorKind::Extension)?
                .into_iter()
                .find(|item| item.entry.key == key)
                .ok_or_raise(|| ErrorKind::UnknownExtension(key.clone()))?;
            let outcome = loader.install(&item.entry).await.or_raise(|| ErrorKind::Extension)?;
            report_install(&key, &outcome);
        },
        ExtensionCommands::Update { key: Some(key) } => {
            let outcome = loader.update(&key).await.or_raise(|| ErrorKind::Extension)?;
            report_install(&key, &outcome);
        },
        ExtensionCommands::Update { key: None } => {
            let keys = loader.check_updates().await.or_raise(|| ErrorKind::Extension)?;
            if keys.is_empty() {
                println!("All extensions are up to date.");
            }
            for key in keys {
                let outcome = loader.update(&key).await.or_raise(|| ErrorKind::Extension)?;
                report_install(&key, &outcome);
            }
        },
        ExtensionCommands::Uninstall { key, purge } => {
            loader.uninstall(&key).await.or_raise(|| ErrorKind::Extension)?;
            if purge {
                db.repository().purge_source(&key).await.or_raise(|| ErrorKind::Extension)?;
                println!("{key}: uninstalled and purged");
            } else {
                println!("{key}: uninstalled (library and history kept)");
            }
        },
    }
    Ok(())
}

fn report_install(key: &str, outcome: &InstallOutcome) {
    match outcome {
        InstallOutcome::Installed => println!("{key}: installed"),
        InstallOutcome::Updated { previous } => println!("{key}: updated from {previous}"),
        InstallOutcome::Unchanged => println!("{key}: already up to date"),
    }
}

async fn sync(config: &Config, db: &Database, watch: bool) -> Result<()> {
    let loader = Arc::new(loader(config, db)?);
    let loaded = loader.load_installed().await.or_raise(|| ErrorKind::Sync)?;
    info!(loaded, "loaded installed extensions");
    let synchronizer = Synchronizer::new(db.repository(), loader, SyncOptions::from(&config.sync));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; finishing in-flight work");
                cancel.cancel();
            }
        }
    });

    if watch {
        schedule::run_periodically(&synchronizer, config.sync.interval(), &cancel).await;
        return Ok(());
    }
    let report = synchronizer.run(&cancel).await.or_raise(|| ErrorKind::Sync)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    for source in &report.sources {
        match source.failure {
            Some(kind) => println!("{}: {kind}", source.source_key),
            None => println!("{}: {} checked, {} skipped", source.source_key, source.mangas.len(), source.skipped.len()),
        }
    }
    for (source, manga, kind) in report.failures() {
        if let Some(manga) = manga {
            println!("  {source}/{manga}: {kind}");
        }
    }
    let cancelled = if report.cancelled { ", cancelled" } else { "" };
    println!("{} new chapter(s); run {}{cancelled}", report.updates(), report.state);
}

async fn updates(db: &Database, all: bool, mark_seen: bool, limit: u32) -> Result<()> {
    let repo = db.repository();
    let updates = repo.list_updates(!all, limit).await.or_raise(|| ErrorKind::Updates)?;
    if updates.is_empty() {
        println!("No updates.");
        return Ok(());
    }
    for update in &updates {
        let seen = if update.seen { " " } else { "*" };
        let backfilled = if update.backfilled { " (backfilled)" } else { "" };
        println!("{seen} [{}] {} - {}{backfilled}", update.source_key, update.manga_title, update.chapter_title);
    }
    if mark_seen {
        let ids: Vec<_> = updates.iter().map(|update| update.id).collect();
        let marked = repo.mark_updates_seen(&ids).await.or_raise(|| ErrorKind::Updates)?;
        println!("Marked {marked} update(s) as seen.");
    }
    Ok(())
}
