use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use graftt_classfile::decode;
use graftt_core::{GraftConfig, Grafter};
use std::fs;
use std::path::{Path, PathBuf};

mod report;
mod scanner;
mod store;

use report::GraftOutput;
use scanner::ClassScanner;
use store::ClassDirectory;

#[derive(Parser)]
#[command(name = "graftt")]
#[command(about = "Fuse annotations from transplant classes onto compiled classes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML file with marker and batch settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every transplant found in a classes directory
    Graft(GraftArgs),

    /// Show the members and annotations of one class file
    Inspect(InspectArgs),
}

#[derive(Args)]
struct GraftArgs {
    /// Compiled classes root, e.g. target/classes
    classes_dir: PathBuf,

    /// Write rewritten classes under this directory instead of in place
    #[arg(long)]
    out: Option<PathBuf>,

    /// Run the batch and report, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Output JSON
    #[arg(long)]
    json: bool,

    /// Graft donors one at a time
    #[arg(long)]
    sequential: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to a .class file
    file: PathBuf,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // keep stdout clean for JSON
    let json_output = match &cli.command {
        Commands::Graft(args) => args.json,
        Commands::Inspect(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Graft(args) => run_graft(args, config),
        Commands::Inspect(args) => run_inspect(args, &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<GraftConfig> {
    let Some(path) = path else {
        return Ok(GraftConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: GraftConfig =
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn run_graft(args: GraftArgs, mut config: GraftConfig) -> Result<()> {
    let root = args
        .classes_dir
        .canonicalize()
        .with_context(|| format!("Invalid classes directory {}", args.classes_dir.display()))?;
    if args.sequential {
        config.parallel = false;
    }
    let grafter = Grafter::new(config).context("Invalid configuration")?;

    let donors = ClassScanner::new(&root).donors()?;
    let batch = grafter.run_batch(&donors, &ClassDirectory::new(&root));

    let written = if args.dry_run {
        0
    } else {
        let sink = ClassDirectory::new(args.out.as_deref().unwrap_or(root.as_path()));
        batch.emit(&sink)?
    };

    if args.json {
        let output = GraftOutput {
            dry_run: args.dry_run,
            written,
            summary: batch.summary(),
            attempts: &batch.attempts,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", report::render_batch(&batch, written, args.dry_run));
    }

    if batch.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_inspect(args: InspectArgs, config: &GraftConfig) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("Failed to read {}", args.file.display()))?;
    let artifact =
        decode(&bytes).with_context(|| format!("Failed to decode {}", args.file.display()))?;

    let view = report::inspect(&artifact, config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", report::render_inspect(&view));
    }
    Ok(())
}
