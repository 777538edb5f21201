//! crit-diff - lay out a file diff as review rows
//!
//! Usage: crit-diff [options] <diff.json>
//!        crit-diff --patch [options] <file.patch>

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use crit_diff::annotation::CoverageRange;
use crit_diff::config::load_config;
use crit_diff::diff::ParsedPatch;
use crit_diff::view::diff::ThreadMap;
use crit_diff::view::render_rows;
use crit_diff::{DiffInfo, DiffRenderer, DiffViewMode, Highlighter};

#[derive(Parser, Debug)]
#[command(name = "crit-diff")]
#[command(about = "Lay out a file diff as side-by-side or unified review rows", long_about = None)]
#[command(version)]
struct Cli {
    /// Diff JSON document, or a unified patch with --patch
    diff: PathBuf,

    /// Read DIFF as a unified patch
    #[arg(long)]
    patch: bool,

    /// File path used for comments and syntax detection
    #[arg(long)]
    path: Option<String>,

    /// JSON array of comment threads
    #[arg(long)]
    comments: Option<PathBuf>,

    /// JSON array of coverage ranges
    #[arg(long)]
    coverage: Option<PathBuf>,

    #[arg(value_enum, long)]
    mode: Option<ModeArg>,

    /// Viewport width in columns
    #[arg(long, default_value_t = 120)]
    width: u32,

    /// Context lines around changes, -1 for the whole file
    #[arg(long, allow_hyphen_values = true)]
    context: Option<i32>,

    /// Expand every context control that does not hide skipped content
    #[arg(long)]
    expand_all: bool,

    /// Print rows as JSON
    #[arg(long)]
    json: bool,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum ModeArg {
    SideBySide,
    Unified,
}

impl From<ModeArg> for DiffViewMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SideBySide => Self::SideBySide,
            ModeArg::Unified => Self::Unified,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(context) = cli.context {
        config.preferences.context = context;
    }

    let diff = load_diff(&cli.diff, cli.patch)?;
    let threads = match &cli.comments {
        Some(path) => ThreadMap::load(path)?,
        None => ThreadMap::new(),
    };

    let mut renderer = DiffRenderer::new(diff, &config)?.with_threads(threads);
    if let Some(path) = cli.path {
        renderer = renderer.with_path(path);
    }
    if config.preferences.syntax_highlighting {
        renderer = renderer.with_highlighter(&Highlighter::new());
    }
    if let Some(path) = &cli.coverage {
        renderer = renderer.with_coverage(load_coverage(path)?);
    }
    if let Some(mode) = cli.mode {
        renderer.set_mode(mode.into());
    }
    renderer.resize(cli.width);

    renderer.render_all();
    if cli.expand_all {
        let expanded = renderer.expand_all();
        debug!(expanded, "expanded context controls");
    }
    info!(
        path = renderer.path(),
        groups = renderer.groups().len(),
        rows = renderer.rows().len(),
        mode = ?renderer.mode(),
        "rendered diff"
    );

    let output = if cli.json {
        let mut json = serde_json::to_string_pretty(renderer.rows())
            .context("Failed to serialize rows")?;
        json.push('\n');
        json
    } else {
        render_rows(renderer.rows(), cli.width as usize)
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("Failed to write output")?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_diff(path: &Path, patch: bool) -> Result<DiffInfo> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read diff: {}", path.display()))?;
    if patch {
        let parsed = ParsedPatch::parse(&contents);
        debug!(hunks = parsed.hunks.len(), lines = parsed.total_lines(), "parsed patch");
        return Ok(parsed.to_diff_info());
    }
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse diff: {}", path.display()))
}

fn load_coverage(path: &Path) -> Result<Vec<CoverageRange>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse coverage: {}", path.display()))
}
