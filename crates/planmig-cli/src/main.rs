//! planmig - copy maintenance plans from a source store to a destination store.
//!
//! Credentials come from the environment, the model list and tuning knobs from
//! an optional JSON config file, and run-shaping flags from the command line.
//! Per-model failures are recorded in the checkpoint and report; only start-up
//! failures produce a non-zero exit.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use planmig_core::config::StoreCredentials;
use planmig_core::{
    dry_run_path, FileCheckpoint, FileSettings, MigrationConfig, MigrationOptions,
    MigrationReport, Migrator, RestClient, RestStore, Settings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "planmig")]
#[command(about = "Migrate maintenance plans between two stores")]
struct Args {
    /// Report what would be migrated without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Continue from the last checkpoint, skipping completed models
    #[arg(long)]
    resume: bool,

    /// Only migrate these models (comma-separated)
    #[arg(long, value_delimiter = ',')]
    models: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to migration.json; optional when --models is given)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Checkpoint file override
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Directory the report is written to
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

impl Args {
    /// `--models` with blanks trimmed and empty entries dropped.
    fn requested_models(&self) -> Vec<String> {
        self.models
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Default filter when `RUST_LOG` is unset. Verbose raises only our own
/// crates to debug; HTTP internals stay at info.
fn log_directive(verbose: bool) -> &'static str {
    if verbose {
        "planmig_core=debug,planmig=debug,info"
    } else {
        "info"
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(verbose)));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

/// An explicitly named config file must exist; the default one may be absent.
fn load_file_settings(config: Option<&Path>) -> Result<FileSettings> {
    match config {
        Some(path) => FileSettings::read(path)?
            .with_context(|| format!("Config file {} not found", path.display())),
        None => Ok(FileSettings::read(Path::new(MigrationConfig::CONFIG_FILE))?.unwrap_or_default()),
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let file = load_file_settings(args.config.as_deref())?;
    let mut settings = Settings::from_env(file)?;
    if let Some(path) = &args.checkpoint {
        settings.checkpoint_path = path.clone();
    }
    if let Some(dir) = &args.report_dir {
        settings.report_dir = dir.clone();
    }
    Ok(settings)
}

/// Report rows: every configured model, so ones outside this run still show
/// as Pending or Completed. Without a configured list, the selected models.
fn report_models(settings: &Settings, selected: &[String]) -> Vec<String> {
    if settings.models.is_empty() {
        selected.to_vec()
    } else {
        settings.models.clone()
    }
}

fn rest_store(label: &str, credentials: &StoreCredentials, settings: &Settings) -> Result<RestStore> {
    let client = RestClient::with_timeout(label, credentials, settings.request_timeout)
        .with_context(|| format!("Failed to set up {} client", label))?;
    Ok(RestStore::new(client, settings.tables.clone()))
}

async fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args)?;

    let selection = settings.select_models(&args.requested_models());
    for name in &selection.unknown {
        warn!("Model '{}' is not in the configured list; ignoring", name);
    }
    let models = selection.selected;
    if models.is_empty() {
        bail!(
            "No models to migrate: list them under \"models\" in {} or pass --models",
            MigrationConfig::CONFIG_FILE
        );
    }

    let checkpoint_path = if args.dry_run {
        dry_run_path(&settings.checkpoint_path)
    } else {
        settings.checkpoint_path.clone()
    };

    info!(
        "Starting {} migration of {} model(s)",
        if args.dry_run { "DRY RUN" } else { "LIVE" },
        models.len()
    );
    info!("Source: {}", settings.source.url);
    info!("Destination: {}", settings.destination.url);
    let checkpoint = FileCheckpoint::new(checkpoint_path).with_backup(true);
    info!("Checkpoint: {}", checkpoint.path().display());

    let options = MigrationOptions {
        dry_run: args.dry_run,
        batch_size: settings.batch_size,
        retry: settings.retry.clone(),
        ..Default::default()
    };
    let migrator = Migrator::new(
        Arc::new(rest_store("source", &settings.source, &settings)?),
        Arc::new(rest_store("destination", &settings.destination, &settings)?),
        Arc::new(checkpoint),
        options,
    );

    let progress = migrator
        .initial_progress(args.resume)
        .context("Failed to load checkpoint")?;
    let progress = migrator.run(&models, progress).await;

    let rows = report_models(&settings, &models);
    let report = MigrationReport::build(&progress, &rows, Utc::now());
    for line in report.summary_lines() {
        info!("{}", line);
    }
    match report.write_to(&settings.report_dir) {
        Ok(path) => info!("Report written to {}", path.display()),
        Err(e) => error!("Failed to write report: {}", e),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use planmig_core::{MigrationProgress, ModelOutcome, ModelStatus};

    fn settings_with(models: &[&str]) -> Settings {
        let file = FileSettings {
            models: models.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        Settings::from_parts(file, |var| match var {
            "SOURCE_SUPABASE_URL" => Some("https://source.supabase.co".to_string()),
            "DEST_SUPABASE_URL" => Some("https://dest.supabase.co".to_string()),
            _ => Some("service-key".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_report_lists_every_configured_model() {
        let settings = settings_with(&["BOM-PUTZMEISTER", "SCHWING-S36", "CIFA-K42"]);
        let args = Args::try_parse_from(["planmig", "--models=SCHWING-S36"]).unwrap();
        let selected = settings.select_models(&args.requested_models()).selected;
        assert_eq!(selected, vec!["SCHWING-S36"]);

        let mut progress = MigrationProgress::new(false);
        progress.record_outcome("SCHWING-S36", ModelOutcome::default());

        let rows = report_models(&settings, &selected);
        let report = MigrationReport::build(&progress, &rows, Utc::now());
        let statuses: Vec<(&str, ModelStatus)> = report
            .rows
            .iter()
            .map(|r| (r.model.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("BOM-PUTZMEISTER", ModelStatus::Pending),
                ("SCHWING-S36", ModelStatus::Completed),
                ("CIFA-K42", ModelStatus::Pending),
            ]
        );
    }

    #[test]
    fn test_report_falls_back_to_selection_without_config() {
        let settings = settings_with(&[]);
        let selected = vec!["CIFA-K42".to_string()];
        assert_eq!(report_models(&settings, &selected), selected);
    }

    #[test]
    fn test_verbose_keeps_http_internals_quiet() {
        assert_eq!(log_directive(false), "info");
        let verbose = log_directive(true);
        assert!(verbose.contains("planmig_core=debug"));
        assert!(verbose.ends_with(",info"));
        assert!(EnvFilter::try_new(verbose).is_ok());
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "planmig",
            "--dry-run",
            "--resume",
            "--models=BOM-PUTZMEISTER, CIFA-K42,,",
            "--checkpoint",
            "state/progress.json",
        ])
        .unwrap();

        assert!(args.dry_run);
        assert!(args.resume);
        assert!(!args.verbose);
        assert_eq!(args.requested_models(), vec!["BOM-PUTZMEISTER", "CIFA-K42"]);
        assert_eq!(args.checkpoint, Some(PathBuf::from("state/progress.json")));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_defaults_are_live_fresh_run() {
        let args = Args::try_parse_from(["planmig"]).unwrap();
        assert!(!args.dry_run);
        assert!(!args.resume);
        assert!(args.requested_models().is_empty());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        let err = load_file_settings(Some(missing.as_path())).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_config_file_is_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("migration.json");
        std::fs::write(
            &path,
            r#"{"models": ["BOM-PUTZMEISTER"], "batchSize": 25, "retry": {"maxAttempts": 5}}"#,
        )
        .unwrap();

        let file = load_file_settings(Some(path.as_path())).unwrap();
        assert_eq!(file.models, vec!["BOM-PUTZMEISTER"]);
        assert_eq!(file.batch_size, Some(25));
        assert_eq!(file.retry.max_attempts, Some(5));
    }
}
