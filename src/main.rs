//! # note-copy CLI
//!
//! Copies translation notes between Danbooru and Gelbooru posts.
//!
//! ## Usage
//!
//! ```bash
//! note-copy --source <token> --destination <token>
//! note-copy --file <pairs.txt>
//! note-copy --inspect <token> [--mode read|write]
//! ```
//!
//! A token is a site code or domain followed by the post number:
//! `d1437880`, `g1525416`, `gelbooru.com1525416`.
//!
//! ## Examples
//!
//! ```bash
//! # Copy notes from a Danbooru post to the matching Gelbooru post
//! note-copy -s d1437880 -d g1525416
//!
//! # Both posts show the same image size, skip scaling
//! note-copy -s d1437880 -d g1525416 --same-size
//!
//! # Copy every pair listed in a file, one pair per line
//! note-copy -f pairs.txt --progress json
//! ```

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use note_copy::auth::{Authenticator, CredentialStore, TerminalPrompter};
use note_copy::batch;
use note_copy::config;
use note_copy::locator::locate;
use note_copy::models::Mode;
use note_copy::progress::ProgressMode;
use note_copy::traits::SiteRegistry;

const USAGE_ONE_POST: &str = "Specify two post numbers";
const USAGE_NOTHING: &str = "No post numbers or file specified";
const USAGE_BOTH: &str = "Specify either two post numbers or a file, not both";

/// Copy translation notes between imageboard posts.
///
/// Notes are read from the source post, rescaled to the destination image
/// and written to the destination post, whose tags are then updated to
/// mark it as translated.
#[derive(Parser)]
#[command(name = "note-copy", version, about)]
struct Cli {
    /// Post to copy notes from, e.g. `d1437880`.
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Post to copy notes to, e.g. `g1525416`.
    #[arg(short = 'd', long)]
    destination: Option<String>,

    /// File of `<source> <destination>` pairs, one per line.
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Copy coordinates verbatim instead of scaling them.
    #[arg(long)]
    same_size: bool,

    /// Print a post's dimensions, tags and notes, then exit.
    #[arg(long, value_name = "TOKEN", conflicts_with_all = ["source", "destination", "file"])]
    inspect: Option<String>,

    /// Backend mode used by `--inspect`: read or write.
    #[arg(long, default_value = "read")]
    mode: String,

    /// Path to configuration file (TOML).
    ///
    /// Defaults to `<config dir>/note-copy/config.toml` when that file exists.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding stored credentials. Overrides `auth_dir` in the config.
    #[arg(long)]
    auth_dir: Option<PathBuf>,

    /// Progress output on stderr. Defaults to human when stderr is a terminal.
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,
}

/// What the command line asks for, once usage has been checked.
enum Action {
    Inspect(String),
    Pair { source: String, destination: String },
    Batch(PathBuf),
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let action = resolve_action(&cli);

    let mut cfg = config::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.auth_dir {
        cfg.auth_dir = Some(dir.clone());
    }

    let auth = Rc::new(Authenticator::new(
        CredentialStore::new(cfg.auth_dir()),
        Box::new(TerminalPrompter),
    ));
    let registry = SiteRegistry::from_config(&cfg, auth)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match action {
        Action::Inspect(token) => {
            let mode: Mode = cli.mode.parse()?;
            inspect(&registry, &token, mode)?;
        }
        Action::Pair {
            source,
            destination,
        } => {
            batch::copy_pair(
                &registry,
                &source,
                &destination,
                cli.same_size,
                progress.as_ref(),
            )?;
        }
        Action::Batch(path) => {
            let pairs = batch::read_pairs(&path)
                .with_context(|| format!("failed to read pairs file {}", path.display()))?;
            if pairs.is_empty() {
                eprintln!("Warning: {} contains no pairs", path.display());
            }
            batch::run_batch(&registry, &pairs, cli.same_size, progress.as_ref())?;
        }
    }

    Ok(())
}

/// Check which of the mutually exclusive inputs were given. Exits with
/// status 1 on a usage error.
fn resolve_action(cli: &Cli) -> Action {
    if let Some(token) = &cli.inspect {
        return Action::Inspect(token.clone());
    }
    if cli.mode != "read" {
        eprintln!("Warning: --mode only applies to --inspect");
    }

    match (&cli.source, &cli.destination, &cli.file) {
        (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => usage_error(USAGE_BOTH),
        (None, None, Some(path)) => Action::Batch(path.clone()),
        (Some(source), Some(destination), None) => Action::Pair {
            source: source.clone(),
            destination: destination.clone(),
        },
        (Some(_), None, None) | (None, Some(_), None) => usage_error(USAGE_ONE_POST),
        (None, None, None) => usage_error(USAGE_NOTHING),
    }
}

fn inspect(registry: &SiteRegistry, token: &str, mode: Mode) -> anyhow::Result<()> {
    let mut post = locate(registry, token, mode)?;
    let dimensions = post.dimensions()?;
    let tags = post.tag_string()?;

    println!("{} ({} mode)", post, mode);
    println!("size: {}", dimensions);
    println!("tags: {}", tags.trim());

    let notes = post.notes()?;
    println!("notes: {}", notes.len());
    for note in notes {
        println!("  {}", note);
    }
    Ok(())
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
