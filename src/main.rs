use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};

use linemark_core::{DiffBlock, LinemarkConfig, OutputFormat};
use linemark_difflens::{DiffEngine, DiffReport};
use linemark_gitbase::GitVersionProvider;
use linemark_sync::memory::{MemoryAnnotations, MemoryEditor, MemoryVersions, SharedText};
use linemark_sync::{
    AnnotationSynchronizer, DocumentId, EditorId, FileId, RecomputeOutcome, VersionProvider,
};

const CONFIG_FILE: &str = ".linemark.toml";

#[derive(Parser)]
#[command(
    name = "linemark",
    version,
    about = "Line-level diff annotations against a baseline",
    long_about = "Linemark compares a file with its baseline, usually the last committed\n\
                   version, and reports added, deleted and modified line blocks.\n\
                   Blocks can be accepted or rejected; rejecting restores the baseline lines.\n\n\
                   Examples:\n  \
                     linemark diff src/main.rs                    Diff against HEAD\n  \
                     linemark diff a.txt --against a.orig         Diff against another file\n  \
                     linemark reject src/main.rs --block diff_block_2\n  \
                     linemark init                                Create a .linemark.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .linemark.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listing (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging (LINEMARK_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Where the baseline of a file comes from.
#[derive(clap::Args)]
struct Source {
    /// File to compare
    path: PathBuf,

    /// Use this file as the baseline instead of git
    #[arg(long)]
    against: Option<PathBuf>,

    /// Repository to read the baseline from (default: discovered from path)
    #[arg(long, conflicts_with = "against")]
    repo: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show changed line blocks of a file
    #[command(long_about = "Show changed line blocks of a file.\n\n\
        The baseline is the file's blob at the configured revision (default HEAD),\n\
        or the file given with --against.\n\n\
        Examples:\n  linemark diff src/lib.rs\n  linemark diff notes.md --against notes.md.bak --format json")]
    Diff {
        #[command(flatten)]
        source: Source,
    },
    /// Revert one block of a file to its baseline lines
    #[command(long_about = "Revert one block of a file to its baseline lines.\n\n\
        The file on disk is rewritten; all other blocks are left as they are.\n\
        Block ids come from `linemark diff`.\n\n\
        Example:\n  linemark reject src/lib.rs --block diff_block_1")]
    Reject {
        #[command(flatten)]
        source: Source,

        /// Block id, e.g. diff_block_1
        #[arg(long)]
        block: String,
    },
    /// Keep one block of a file as it is
    Accept {
        #[command(flatten)]
        source: Source,

        /// Block id, e.g. diff_block_1
        #[arg(long)]
        block: String,
    },
    /// Create a default .linemark.toml configuration file
    #[command(long_about = "Create a default .linemark.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .linemark.toml already exists.")]
    Init,
}

const DEFAULT_CONFIG: &str = r#"# Linemark Configuration

[engine]
# algorithm = "myers"      # or "patience"
# max_lines = 200000
# deadline_ms = 250

[sync]
# quiet_period_ms = 500

[git]
# baseline_rev = "HEAD"
"#;

const DOC: DocumentId = DocumentId(1);
const EDITOR: EditorId = EditorId(1);

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("LINEMARK_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("linemark=debug,linemark_core=debug,linemark_difflens=debug,linemark_gitbase=debug,linemark_sync=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LinemarkConfig> {
    let config = match path {
        Some(path) => LinemarkConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                LinemarkConfig::from_file(default_path)?
            } else {
                LinemarkConfig::default()
            }
        }
    };
    Ok(config)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", path.display()))
}

/// Resolve the provider for `source` and the id the file is known by there.
fn open_provider(source: &Source, config: &LinemarkConfig) -> Result<(Box<dyn VersionProvider>, FileId)> {
    if !source.path.is_file() {
        return Err(linemark_core::LinemarkError::FileNotFound(source.path.clone()).into());
    }

    if let Some(against) = &source.against {
        let baseline = read_file(against)?;
        let current = read_file(&source.path)?;
        let file = FileId::new(&source.path);
        let versions = MemoryVersions::new();
        versions.track(file.clone(), Some(&baseline), SharedText::new(&current));
        return Ok((Box::new(versions), file));
    }

    let search_from = match &source.repo {
        Some(repo) => repo.clone(),
        None => source
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let provider = GitVersionProvider::discover(&search_from, &config.git.baseline_rev)?;
    let absolute = source
        .path
        .canonicalize()
        .into_diagnostic()
        .wrap_err(format!("resolving {}", source.path.display()))?;
    let file = FileId::new(absolute);
    if !provider.is_tracked(&file) {
        miette::bail!(miette::miette!(
            help = "Commit the file first, or compare with --against <file>",
            "{} has no baseline at {}",
            source.path.display(),
            provider.baseline_rev()
        ));
    }
    Ok((Box::new(provider), file))
}

fn compute_blocks(source: &Source, config: &LinemarkConfig) -> Result<Vec<DiffBlock>> {
    let (provider, file) = open_provider(source, config)?;
    let baseline = provider
        .baseline_content(&file)
        .ok_or_else(|| linemark_core::LinemarkError::InputUnavailable(format!("baseline of {file}")))?;
    let current = provider
        .current_content(&file)
        .ok_or_else(|| linemark_core::LinemarkError::InputUnavailable(format!("current version of {file}")))?;
    let engine = DiffEngine::new(config.engine.clone());
    Ok(engine.try_compute(&baseline, &current)?)
}

/// Load `source` into an in-memory editor with its annotations anchored.
fn open_annotated(
    source: &Source,
    config: &LinemarkConfig,
) -> Result<(AnnotationSynchronizer, MemoryEditor, MemoryAnnotations, SharedText)> {
    let (provider, file) = open_provider(source, config)?;
    let text = SharedText::new(&read_file(&source.path)?);
    let mut editor = MemoryEditor::new();
    editor.open(DOC, text.clone());
    let mut annotations = MemoryAnnotations::new();
    editor.watch(DOC, EDITOR, annotations.clone());

    let mut sync = AnnotationSynchronizer::new(EDITOR, DOC, file, DiffEngine::new(config.engine.clone()));
    match sync.recompute(provider.as_ref(), &editor, &mut annotations) {
        RecomputeOutcome::Applied { annotations: n, skipped } => {
            tracing::debug!(annotations = n, skipped, "Anchored diff blocks");
        }
        RecomputeOutcome::Cleared(reason) => {
            miette::bail!("{} has no changes ({reason})", source.path.display());
        }
        RecomputeOutcome::Stale => miette::bail!("diff of {} was superseded", source.path.display()),
    }
    Ok((sync, editor, annotations, text))
}

fn print_report(report: &DiffReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", report.to_markdown()),
        OutputFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, algorithm = %config.engine.algorithm, "Loaded configuration");

    match cli.command {
        Command::Diff { ref source } => {
            let blocks = compute_blocks(source, &config)?;
            let report = DiffReport::new(Some(source.path.clone()), blocks);
            print_report(&report, cli.format)?;
        }
        Command::Reject { ref source, ref block } => {
            let (mut sync, mut editor, mut annotations, text) = open_annotated(source, &config)?;
            let described = sync
                .annotations()
                .get(block)
                .map(|entry| entry.block().describe())
                .unwrap_or_default();
            sync.revert(block, &mut editor, &mut annotations)?;

            std::fs::write(&source.path, text.text())
                .into_diagnostic()
                .wrap_err(format!("writing {}", source.path.display()))?;
            println!("Rejected {block}: {described}");
        }
        Command::Accept { ref source, ref block } => {
            let (mut sync, _editor, mut annotations, _text) = open_annotated(source, &config)?;
            let described = sync
                .annotations()
                .get(block)
                .map(|entry| entry.block().describe())
                .unwrap_or_default();
            sync.accept(block, &mut annotations)?;
            println!("Accepted {block}: {described}");
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
    }

    Ok(())
}
