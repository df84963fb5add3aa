//! `settingsctl`: operate a local settings store.
//!
//! Usage:
//!   settingsctl [--config <file>] [--data-dir <dir>] <command>
//!
//! Commands:
//!   paths                      list registered group paths
//!   query <path>               print the rows of a group
//!   update <path> k=v...       apply values to a group
//!   backup <archive>           write every group to a framed archive
//!   restore <archive>          apply an archive to the store

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use wear_kv::{KVStore, RedbStore};
use wear_settings::backup::{LocalConnector, StreamBackupInput, StreamBackupOutput};
use wear_settings::host::KvHostSettings;
use wear_settings::{
    BackupOutcome, ContentValues, HostServices, PropertiesMap, Row, SettingValue,
    SettingsBackupAgent, SettingsConfig, SettingsProvider, SignalBus, COLUMNS,
};

/// Wearable settings store tool.
#[derive(Parser, Debug)]
#[command(name = "settingsctl", about = "Inspect and back up the wearable settings store")]
struct Cli {
    /// TOML config file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file).
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered group paths.
    Paths,
    /// Print the rows of a group.
    Query { path: String },
    /// Apply `key=value` pairs to a group.
    Update {
        path: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Write every group to a framed archive.
    Backup { archive: PathBuf },
    /// Apply a framed archive to the store.
    Restore { archive: PathBuf },
}

/// `null`, booleans and integers are typed; anything else is a string.
fn parse_value(raw: &str) -> SettingValue {
    if raw == "null" {
        return SettingValue::Null;
    }
    if let Ok(b) = raw.parse::<bool>() {
        return SettingValue::Bool(b);
    }
    if let Ok(i) = raw.parse::<i32>() {
        return SettingValue::Int(i);
    }
    if let Ok(l) = raw.parse::<i64>() {
        return SettingValue::Long(l);
    }
    SettingValue::from(raw)
}

fn parse_values(pairs: &[String]) -> anyhow::Result<ContentValues> {
    let mut values = ContentValues::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{}'", pair))?;
        values.put(key, parse_value(raw));
    }
    Ok(values)
}

/// Tab-separated table with a header line.
fn format_rows(rows: &[Row]) -> String {
    let mut table = COLUMNS.join("\t");
    for row in rows {
        table.push_str(&format!("\n{}\t{}", row.key, row.value));
    }
    table
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SettingsConfig::load(path)?,
        None => SettingsConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }
    if let Some(dir) = &config.data_dir {
        std::fs::create_dir_all(dir)?;
    }

    let db_path = config.resolve_db_path();
    info!("Opening settings store at {}", db_path.display());
    let kv: Arc<dyn KVStore> = Arc::new(
        RedbStore::open(&db_path).map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let host = HostServices {
        settings: Arc::new(KvHostSettings::new(Arc::clone(&kv))),
        ..HostServices::in_memory()
    };

    let bus = Arc::new(SignalBus::new());
    let provider = SettingsProvider::new(
        config.authority.clone(),
        PropertiesMap::factory(kv, host),
        &bus,
    );

    match cli.command {
        Command::Paths => {
            for path in provider.registry().paths() {
                println!("{}", provider.uri_for(path));
            }
        }
        Command::Query { path } => {
            let rows = provider
                .query(&provider.uri_for(&path))?
                .with_context(|| format!("no settings group at '{}'", path))?;
            println!("{}", format_rows(&rows));
        }
        Command::Update { path, values } => {
            let values = parse_values(&values)?;
            let changed = provider
                .update(&provider.uri_for(&path), &values)?
                .with_context(|| format!("no settings group at '{}'", path))?;
            println!("{} row(s) changed", changed);
        }
        Command::Backup { archive } => {
            // Pending-change tracking is per process, so every run is a full pass.
            provider.dirty_flag().mark();
            let agent = Arc::new(
                SettingsBackupAgent::new(
                    Arc::clone(&provider),
                    Arc::new(LocalConnector::new(Arc::clone(&provider))),
                    Arc::clone(&bus),
                )
                .with_connect_timeout(config.connect_timeout()),
            );
            let file = File::create(&archive)
                .with_context(|| format!("creating {}", archive.display()))?;
            let (outcome, out) = agent
                .spawn_backup(StreamBackupOutput::new(BufWriter::new(file)))
                .await??;
            out.finish()?;
            if let BackupOutcome::Written { groups } = outcome {
                println!("wrote {} group(s) to {}", groups, archive.display());
            }
        }
        Command::Restore { archive } => {
            let agent = Arc::new(
                SettingsBackupAgent::new(
                    Arc::clone(&provider),
                    Arc::new(LocalConnector::new(Arc::clone(&provider))),
                    Arc::clone(&bus),
                )
                .with_connect_timeout(config.connect_timeout()),
            );
            let file = File::open(&archive)
                .with_context(|| format!("opening {}", archive.display()))?;
            let summary = agent
                .spawn_restore(StreamBackupInput::new(BufReader::new(file)))
                .await??;
            println!(
                "restored {} group(s), {} row(s) changed",
                summary.groups, summary.changed
            );
            for path in &summary.unknown_paths {
                println!("skipped unknown group '{}'", path);
            }
        }
    }

    Ok(())
}
