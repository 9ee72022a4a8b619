//! NEHNES: a signature-based malware scanner for directory trees.
//!
//! This is the main entry point for the CLI application.

use nehnes_av::core::config::Config;
use nehnes_av::core::error::Result;
use nehnes_av::core::types::{DeletionReport, ScanRun};
use nehnes_av::detection::{EngineSelection, SignatureStore};
use nehnes_av::remediation::{DeletionCoordinator, InfectedSet};
use nehnes_av::scanner::{ConsoleProgressReporter, ScanOrchestrator, TreeWalker};
use nehnes_av::ui::cli::{Cli, Commands, ConfigAction, OutputFormat};
use nehnes_av::utils::logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let (config, config_error) = Config::load_or_default();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_config(&config)
    };
    init_logging(log_config)?;

    if let Some(e) = config_error {
        log::warn!("{} (using defaults)", e);
        if let Some(hint) = e.suggestion() {
            log::warn!("{}", hint);
        }
    }

    log::debug!("NEHNES v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Scan {
            path,
            basic,
            rules,
            delete_all,
            delete,
        }) => {
            let options = ScanOptions {
                basic,
                rules,
                delete_all,
                delete,
            };
            run_scan(&config, &path, options, cli.format).await
        }
        Some(Commands::Delete { paths }) => run_delete(&paths, cli.format),
        Some(Commands::Signatures) => run_signatures(&config, cli.format),
        Some(Commands::Config { action }) => run_config(action, &config),
        Some(Commands::Info) => run_info(&config),
        None => {
            println!("NEHNES - Malware Scanner");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  nehnes-av scan <DIR>               Scan a directory");
            println!("  nehnes-av scan <DIR> --delete-all  Scan and delete threats");
            println!("  nehnes-av signatures               List known signatures");
            Ok(())
        }
    }
}

struct ScanOptions {
    basic: bool,
    rules: Option<PathBuf>,
    delete_all: bool,
    delete: Vec<PathBuf>,
}

/// Scan a directory tree and optionally delete what was found.
async fn run_scan(
    config: &Config,
    root: &Path,
    options: ScanOptions,
    format: OutputFormat,
) -> Result<()> {
    let files = TreeWalker::new()
        .follow_symlinks(config.scan.follow_symlinks)
        .walk(root)?;

    let store = Arc::new(SignatureStore::load_with(&config.detection.extra_signatures));

    let mut detection = config.detection.clone();
    if options.basic {
        detection.advanced_engine = false;
    }
    if let Some(dir) = options.rules {
        detection.advanced_engine = true;
        detection.rules_dir = Some(dir);
    }

    let reporter = ConsoleProgressReporter::new();
    let mut selection = EngineSelection::from_config(&detection, store);
    if let Some(advisory) = selection.take_advisory() {
        reporter.notice(&format!("Notice: {}", advisory));
    }

    let orchestrator =
        ScanOrchestrator::new(selection.engine()).with_event_buffer(config.scan.event_buffer);
    let mut handle = orchestrator.spawn(files)?;
    let cancel = handle.cancel_token();

    let mut infected = InfectedSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => {
                    infected.apply(&event);
                    if format == OutputFormat::Text {
                        reporter.report(&event);
                    }
                }
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                log::warn!("Interrupted, stopping scan");
                cancel.cancel();
            }
        }
    }

    let run = handle.finish().await?;

    let coordinator = DeletionCoordinator::new();
    let deletion = if options.delete_all {
        Some(infected.delete_all(&coordinator))
    } else if !options.delete.is_empty() {
        let selection = options
            .delete
            .iter()
            .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
            .collect::<Vec<_>>();
        Some(infected.delete_selected(&coordinator, &selection))
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let status = run.status().to_string();
            let output = serde_json::json!({
                "scan": &run,
                "status": status,
                "deletion": deletion,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            print_scan_summary(&run);
            if let Some(report) = &deletion {
                print_deletion_report(report);
            } else if !infected.is_empty() {
                println!();
                println!("Re-run with --delete-all or --delete <PATH> to remove threats.");
            }
        }
    }

    Ok(())
}

fn print_scan_summary(run: &ScanRun) {
    println!();
    println!("=== Scan Complete ===");
    println!("Scan ID:         {}", run.scan_id);
    println!("Engine:          {}", run.engine);
    println!("Status:          {}", run.status());
    println!("Files Scanned:   {} of {}", run.scanned_count, run.total_files);
    println!("Threats Found:   {}", run.infected_count());
    if run.errors > 0 {
        println!("Unreadable:      {}", run.errors);
    }
    if let Some(ms) = run.duration_ms() {
        println!("Duration:        {} ms", ms);
    }

    if !run.detections.is_empty() {
        println!();
        println!("Infected files:");
        for detection in &run.detections {
            println!("  {} - {}", detection.threat_name, detection.path.display());
        }
    }
}

fn print_deletion_report(report: &DeletionReport) {
    println!();
    if report.is_nothing_to_do() {
        println!("Nothing to delete.");
        return;
    }

    println!("=== Deletion ===");
    for outcome in &report.outcomes {
        match &outcome.reason {
            None => println!("  deleted  {}", outcome.path.display()),
            Some(reason) => println!("  FAILED   {} ({})", outcome.path.display(), reason),
        }
    }
    println!(
        "Deleted: {}  Failed: {}",
        report.summary.deleted_count, report.summary.failed_count
    );
}

/// Delete the given files directly.
fn run_delete(paths: &[PathBuf], format: OutputFormat) -> Result<()> {
    let report = DeletionCoordinator::new().delete_all(paths);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_deletion_report(&report),
    }
    Ok(())
}

/// List the signatures the basic engine matches against.
fn run_signatures(config: &Config, format: OutputFormat) -> Result<()> {
    let store = SignatureStore::load_with(&config.detection.extra_signatures);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&store.to_signatures())?);
        }
        OutputFormat::Text => {
            println!("{} signature(s):", store.len());
            for (name, pattern) in store.iter() {
                println!("  {:<32} {} bytes", name, pattern.len());
            }
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                println!("This overwrites {}.", Config::default_config_path().display());
                println!("Re-run with --yes to confirm.");
                return Ok(());
            }
            log::info!("Resetting configuration to defaults...");
            Config::default().save(&Config::default_config_path())?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", Config::default_config_path().display());
        }
    }
    Ok(())
}

/// Show application information.
fn run_info(config: &Config) -> Result<()> {
    let store = SignatureStore::load_with(&config.detection.extra_signatures);

    println!("NEHNES - Malware Scanner");
    println!();
    println!("Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("Config Path:      {}", Config::default_config_path().display());
    println!("Data Directory:   {}", Config::data_dir().display());
    println!();
    println!("Detection Settings:");
    println!("  Advanced:       {}", config.detection.advanced_engine);
    println!("  Rules Dir:      {}", config.detection.rules_dir().display());
    println!("  Signatures:     {}", store.len());
    println!();
    println!("Scan Settings:");
    println!("  Follow Links:   {}", config.scan.follow_symlinks);
    println!("  Event Buffer:   {}", config.scan.event_buffer);
    Ok(())
}
