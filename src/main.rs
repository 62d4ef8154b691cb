use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use h5p_vt2er::{
    ArchiveStore, MigrationError, MigrationOutcome, MigrationPipeline, MigrationProfile, MigratorConfig,
    ReportFormat, TransformationReporter,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "h5p-vt2er")]
#[command(version, about = "Convert H5P Virtual Tour content into Escape Room content")]
struct Cli {
    /// YAML or JSON config file; flags override its values
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate one Virtual Tour .h5p file
    Migrate {
        /// Path or http(s) URL of the Virtual Tour .h5p file
        input: String,

        /// Directory the migrated archive is moved to
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Reject uploads larger than this many bytes
        #[arg(long, value_name = "BYTES")]
        size_limit: Option<u64>,

        /// Working directory root
        #[arg(long, value_name = "DIR")]
        uploads_dir: Option<PathBuf>,

        /// Bundled Escape Room libraries
        #[arg(long, value_name = "DIR")]
        assets_dir: Option<PathBuf>,

        /// Report format: console, json or yaml
        #[arg(long, value_name = "FORMAT", default_value = "console")]
        report: ReportFormat,
    },

    /// Remove stale working directories
    Sweep {
        /// Minimum age in seconds of directories to remove
        #[arg(long, value_name = "SECONDS")]
        max_age: Option<u64>,

        /// Keep sweeping at this interval until interrupted
        #[arg(long, value_name = "SECONDS")]
        every: Option<u64>,

        /// Working directory root
        #[arg(long, value_name = "DIR")]
        uploads_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => match MigratorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("\n❌ Error: {}", e);
                process::exit(1);
            }
        },
        None => MigratorConfig::default(),
    };

    let result = match cli.command {
        Commands::Migrate {
            input,
            output_dir,
            size_limit,
            uploads_dir,
            assets_dir,
            report,
        } => {
            if size_limit.is_some() {
                config.file_size_limit = size_limit;
            }
            if let Some(dir) = uploads_dir {
                config.uploads_path = dir;
            }
            if let Some(dir) = assets_dir {
                config.assets_path = dir;
            }
            run_migrate(config, &input, &output_dir, report).await
        }
        Commands::Sweep {
            max_age,
            every,
            uploads_dir,
        } => {
            if let Some(dir) = uploads_dir {
                config.uploads_path = dir;
            }
            run_sweep(&config, max_age, every).await
        }
    };

    if let Err(message) = result {
        eprintln!("\n❌ Error: {}", message);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_migrate(
    config: MigratorConfig,
    input: &str,
    output_dir: &Path,
    format: ReportFormat,
) -> Result<(), String> {
    println!("\n=== Virtual Tour → Escape Room ===");

    let pipeline = MigrationPipeline::new(config, MigrationProfile::default());
    let original_name = input_file_name(input);

    let outcome = if is_url(input) {
        println!("  ℹ Downloading {}", input);
        let bytes = fetch_input(input).await?;
        let name = original_name.clone();
        tokio::task::spawn_blocking(move || pipeline.migrate_bytes(&bytes, &name)).await
    } else {
        let path = PathBuf::from(input);
        let name = original_name.clone();
        tokio::task::spawn_blocking(move || pipeline.migrate_file(&path, &name)).await
    };

    let MigrationOutcome {
        archive_path,
        mut report,
    } = outcome
        .map_err(|e| format!("migration task failed: {}", e))?
        .map_err(|e: MigrationError| {
            debug!(error = ?e, "migration error detail");
            e.user_message()
        })?;

    let destination = move_to_output_dir(&archive_path, output_dir)
        .map_err(|e| format!("Could not move {} to {}: {}", archive_path.display(), output_dir.display(), e))?;
    report.archive_path = Some(destination.clone());

    let rendered = TransformationReporter::new()
        .with_format(format)
        .format_report(&report)
        .map_err(|e| e.to_string())?;

    if format == ReportFormat::Console {
        println!("\n{}", rendered.trim_end());
        println!("\n=== Conversion Complete ===");
        println!("  ✓ Output file: {}", destination.display());
    } else {
        println!("{}", rendered.trim_end());
    }

    Ok(())
}

async fn run_sweep(config: &MigratorConfig, max_age: Option<u64>, every: Option<u64>) -> Result<(), String> {
    let max_age = max_age.unwrap_or(config.stale_after_secs);
    let store = ArchiveStore::new(config.uploads_path.clone(), config.stale_after_secs);

    let Some(every) = every else {
        let removed = sweep_once(&store, max_age)?;
        println!("  ✓ Removed {} stale working director{}", removed, if removed == 1 { "y" } else { "ies" });
        return Ok(());
    };

    info!(root = %store.uploads_root().display(), every, max_age, "sweeping periodically");
    let mut interval = tokio::time::interval(Duration::from_secs(every.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sweep_once(&store, max_age) {
                    warn!(error = %e, "sweep failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("sweeper stopped");
                return Ok(());
            }
        }
    }
}

fn sweep_once(store: &ArchiveStore, max_age: u64) -> Result<usize, String> {
    let removed = store
        .purge_stale(max_age)
        .map_err(|e| format!("Failed to sweep {}: {}", store.uploads_root().display(), e))?;
    if removed > 0 {
        info!(removed, "removed stale working directories");
    }
    Ok(removed)
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// File name part of a path or URL, ignoring any query string or fragment
fn input_file_name(input: &str) -> String {
    let trimmed = if is_url(input) {
        input.split(['?', '#']).next().unwrap_or(input)
    } else {
        input
    };

    trimmed
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("content.h5p")
        .to_string()
}

async fn fetch_input(url: &str) -> Result<Vec<u8>, String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| format!("Failed to fetch {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| format!("Failed to fetch {}: {}", url, e))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("Failed to read {}: {}", url, e))?;
    Ok(bytes.to_vec())
}

/// First free `<stem>.h5p`, `<stem>-1.h5p`, ... in `dir`
fn unique_output_path(dir: &Path, file_name: &str) -> PathBuf {
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (file_name, None),
    };

    let mut count = 0;
    let mut candidate = dir.join(file_name);
    while candidate.exists() {
        count += 1;
        candidate = match extension {
            Some(extension) => dir.join(format!("{}-{}.{}", stem, count, extension)),
            None => dir.join(format!("{}-{}", stem, count)),
        };
    }
    candidate
}

/// Hand the built archive over to `output_dir`; the uploads copy is removed
fn move_to_output_dir(archive: &Path, output_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let file_name = archive
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "archive has no file name"))?;

    let destination = unique_output_path(output_dir, file_name);
    if fs::rename(archive, &destination).is_err() {
        fs::copy(archive, &destination)?;
        fs::remove_file(archive)?;
    }
    Ok(destination)
}
