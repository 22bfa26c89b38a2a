use clap::Parser;
use consolidate_bear_markdown::{batch, utils};
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Inline Bear.app note attachments into consolidated markdown files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing the Bear markdown export.
    #[arg(value_name = "SOURCE_DIR")]
    source_dir: Option<PathBuf>,

    /// Directory to write consolidated markdown files.
    #[arg(value_name = "DEST_DIR")]
    dest_dir: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/consolidate-bear-markdown/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Regenerate every note even if its output is up to date.
    #[arg(short, long)]
    force: bool,

    /// Print each file written or skipped.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress progress bar and summary.
    #[arg(short, long)]
    quiet: bool,

    /// Number of worker threads (1 processes notes sequentially).
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    log_level: Option<String>,
    jobs: Option<usize>,
    pandoc_path: Option<PathBuf>,
    pdftotext_path: Option<PathBuf>,
    openai_api_key: Option<String>,
    vision_model: Option<String>,
    cache_dir: Option<PathBuf>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("consolidate-bear-markdown/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.unwrap_or("warn"))
            .wrap_err_with(|| format!("Invalid log level: {}", level.unwrap_or_default()))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Logging (RUST_LOG > CLI > Config > warn)
    init_logging(cli.log_level.as_deref().or(file_cfg.log_level.as_deref()))?;

    // 3. Resolve directories (CLI > Config)
    let source_dir = cli.source_dir.or(file_cfg.input_dir).ok_or_else(|| {
        eyre!("No source directory.\nPass SOURCE_DIR or set input_dir in config.toml.")
    })?;
    let dest_dir = cli.dest_dir.or(file_cfg.output_dir).ok_or_else(|| {
        eyre!("No destination directory.\nPass DEST_DIR or set output_dir in config.toml.")
    })?;

    // 4. Vision credentials (Config > OPENAI_API_KEY)
    let openai_api_key = file_cfg
        .openai_api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.trim().is_empty());

    // 5. Build the run config
    let config = utils::ConsolidateConfig {
        source_dir,
        dest_dir,
        force: cli.force,
        verbose: cli.verbose,
        quiet: cli.quiet,
        jobs: cli.jobs.or(file_cfg.jobs).unwrap_or(1).max(1),
        pandoc_path: file_cfg.pandoc_path,
        pdftotext_path: file_cfg.pdftotext_path,
        openai_api_key,
        vision_model: file_cfg
            .vision_model
            .unwrap_or_else(|| utils::DEFAULT_VISION_MODEL.to_string()),
        cache_dir: file_cfg.cache_dir,
    };
    let quiet = config.quiet;

    // 6. Run
    let stats = batch::run(config)?;

    if !quiet {
        eprintln!("{}", stats);
    }

    Ok(if stats.has_file_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
