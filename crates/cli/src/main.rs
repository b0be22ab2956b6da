// smeta CLI - GGE cost-estimate rollups

mod exit_codes;
mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use smeta_rollup::{extract_document, ExtractOptions, PriceLevel, RollupError, SmetaConfig};

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_NO_DOCUMENTS, EXIT_SUCCESS, EXIT_USAGE, EXIT_WRITE};

#[derive(Parser)]
#[command(name = "smeta")]
#[command(about = "Roll up GGE construction cost estimates into Excel reports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only (overrides RUST_LOG)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a corpus and write the combined report
    #[command(after_help = "\
Examples:
  smeta run --config smeta.toml
  smeta run --input Объекты --output combined_output.xlsx
  smeta run --config smeta.toml --classification NLSR.xlsx --json")]
    Run(RunArgs),

    /// Print one document's header and rollup as JSON
    Inspect {
        /// GGE document
        file: PathBuf,

        /// Show the base price level instead of the current one
        #[arg(long)]
        base: bool,

        /// Material-code prefix of priced items
        #[arg(long, default_value = "ТЦ_")]
        item_prefix: String,
    },

    /// Parse and validate a config file
    Validate {
        /// Config file (TOML)
        file: PathBuf,
    },
}

/// `run` flags. Each one overrides the config file value.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Config file (TOML); relative paths in it resolve against its directory
    #[arg(long, short = 'c', env = "SMETA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Corpus root directory
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Combined report (.xlsx)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// NLSR keyword table (xlsx or csv)
    #[arg(long)]
    pub classification: Option<PathBuf>,

    /// TEP coefficient table (xlsx or csv)
    #[arg(long)]
    pub unit_economics: Option<PathBuf>,

    /// Write one workbook per document into this directory
    #[arg(long)]
    pub per_document_dir: Option<PathBuf>,

    /// Write the one-row-per-document LSR summary here (.xlsx)
    #[arg(long)]
    pub lsr_summary: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\nengine:  smeta-rollup ",
        env!("CARGO_PKG_VERSION"),
        "\nformats: gge (utf-8, windows-1251) -> xlsx",
    )
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args),
        Commands::Inspect {
            file,
            base,
            item_prefix,
        } => cmd_inspect(&file, base, item_prefix),
        Commands::Validate { file } => cmd_validate(&file),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self { code: EXIT_WRITE, message: msg.into(), hint: None }
    }

    /// Map an engine error to its exit code.
    pub fn rollup(err: RollupError) -> Self {
        match err {
            RollupError::NoDocuments => Self {
                code: EXIT_NO_DOCUMENTS,
                message: err.to_string(),
                hint: Some("check input_dir and skip_dirs".to_string()),
            },
            RollupError::ConfigParse(_) | RollupError::ConfigValidation(_) => {
                Self::config(err.to_string())
            }
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// config loading
// ============================================================================

/// Read and validate a config file, anchoring its relative paths at the
/// file's directory.
pub fn load_config(path: &Path) -> Result<SmetaConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::config(format!("cannot read {}: {e}", path.display())))?;
    let mut config = SmetaConfig::from_toml(&text).map_err(|e| {
        CliError::config(format!("{}: {e}", path.display()))
    })?;
    if let Some(dir) = path.parent() {
        config.resolve_paths(dir);
    }
    Ok(config)
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(file: &Path) -> Result<(), CliError> {
    let config = load_config(file)?;
    println!("ok: {}", file.display());
    println!("  input_dir: {}", config.input_dir.display());
    println!("  output:    {}", config.output.display());
    for (label, path) in [
        ("classification", &config.classification),
        ("unit_economics", &config.unit_economics),
        ("per_document_dir", &config.per_document_dir),
        ("lsr_summary", &config.lsr_summary),
    ] {
        if let Some(path) = path {
            println!("  {label}: {}", path.display());
        }
    }
    Ok(())
}

// ============================================================================
// inspect
// ============================================================================

fn cmd_inspect(file: &Path, base: bool, item_prefix: String) -> Result<(), CliError> {
    if !file.is_file() {
        return Err(CliError::usage(format!("no such file: {}", file.display())));
    }
    let root = file.parent().unwrap_or_else(|| Path::new(""));
    let input = smeta_io::load_document(root, file);
    let options = ExtractOptions { item_prefix };

    let summary = input
        .tree
        .and_then(|tree| extract_document(&tree, &input.source, &options))
        .map_err(|e| CliError::general(format!("{}: {e}", file.display())))?;

    let level = if base { PriceLevel::Base } else { PriceLevel::Current };
    let header: serde_json::Map<String, serde_json::Value> = summary
        .header
        .fields()
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
        .collect();
    let rollup: serde_json::Map<String, serde_json::Value> = summary
        .rollup(level)
        .labelled()
        .into_iter()
        .map(|(label, value)| (label.to_string(), serde_json::json!(value.to_f64())))
        .collect();

    let out = serde_json::json!({
        "file": summary.source.file_name,
        "price_level": level.to_string(),
        "header": header,
        "priced_items": summary.items.len(),
        "rollup": rollup,
        "lines": summary.lines,
    });
    let text = serde_json::to_string_pretty(&out)
        .map_err(|e| CliError::general(format!("JSON serialization failed: {e}")))?;
    println!("{text}");
    Ok(())
}
