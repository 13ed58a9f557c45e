use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use dirmirror_core::mirror::{MirrorOptions, execute_fetch, execute_listing, execute_mirror};
use dirmirror_core::report::{MirrorReport, ReportFormat, render_report, save_report};
use dirmirror_core::RetryPolicy;
use dirmirror_scanner::ExtensionFilter;
use dirmirror_scanner::fetch::DEFAULT_TIMEOUT_SECS;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Exit code for a run that finished but left permanent failures behind.
pub const EXIT_PARTIAL: i32 = 2;

/// Install the fmt subscriber. `RUST_LOG` wins over the default level.
pub fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    None
}

/// clap value parser for URL arguments; bare hosts get an http:// scheme.
pub fn parse_url_arg(raw: &str) -> std::result::Result<Url, String> {
    let candidate = parse_url_line(raw).ok_or_else(|| format!("'{}' is not a valid URL", raw))?;
    Url::parse(&candidate).map_err(|e| format!("'{}' is not a valid URL: {}", raw, e))
}

/// Collect `--ext` values, accepting both repeated flags and comma lists.
pub fn parse_extensions<'a, I>(values: Option<I>) -> ExtensionFilter
where
    I: Iterator<Item = &'a String>,
{
    match values {
        Some(values) => {
            let exts: Vec<&str> = values
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();
            if exts.is_empty() {
                ExtensionFilter::default()
            } else {
                ExtensionFilter::new(exts)
            }
        }
        None => ExtensionFilter::default(),
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Where `fetch` should write: into `dest` when it is an existing directory,
/// otherwise to `dest` itself.
pub fn resolve_fetch_destination(url: &Url, dest: &Path) -> PathBuf {
    if dest.is_dir() {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("index.html");
        dest.join(name)
    } else {
        dest.to_path_buf()
    }
}

fn get_usize(args: &ArgMatches, id: &str, default: usize) -> usize {
    args.get_one::<usize>(id).copied().unwrap_or(default)
}

fn get_u64(args: &ArgMatches, id: &str, default: u64) -> u64 {
    args.get_one::<u64>(id).copied().unwrap_or(default)
}

fn excludes_from(args: &ArgMatches) -> Vec<String> {
    args.get_many::<String>("exclude")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

/// Build crawl-side options shared by `mirror` and `list`.
fn base_options(args: &ArgMatches, destination: PathBuf) -> Result<MirrorOptions> {
    let url = args
        .get_one::<Url>("url")
        .context("--url is required")?;

    let mut options = MirrorOptions::new(url.as_str(), destination);
    options.base_prefix = args.get_one::<Url>("prefix").map(|p| p.to_string());
    options.extensions = parse_extensions(args.get_many::<String>("ext"));
    options.excludes = excludes_from(args);
    options.max_depth = get_usize(args, "max-depth", options.max_depth);
    options.timeout_secs = get_u64(args, "timeout", DEFAULT_TIMEOUT_SECS);
    Ok(options)
}

/// Translate `mirror` subcommand arguments into [`MirrorOptions`].
pub fn mirror_options_from_matches(args: &ArgMatches, quiet: bool) -> Result<MirrorOptions> {
    let dest = args
        .get_one::<String>("dest")
        .context("--dest is required")?;

    let mut options = base_options(args, expand_path(dest))?;
    options.chunk_size = get_usize(args, "chunk-size", options.chunk_size);
    options.workers = get_usize(args, "workers", 1);
    options.retry = RetryPolicy::new(
        args.get_one::<u32>("retries")
            .copied()
            .unwrap_or(options.retry.max_attempts),
        Duration::from_secs(get_u64(args, "retry-delay", options.retry.delay.as_secs())),
    );
    options.show_progress_bars = !quiet && !args.get_flag("no-progress");
    debug!(
        workers = options.workers,
        attempts = options.retry.max_attempts,
        "Parsed mirror options"
    );
    Ok(options)
}

pub async fn handle_mirror(args: &ArgMatches, quiet: bool) -> Result<i32> {
    let options = mirror_options_from_matches(args, quiet)?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    if !quiet {
        println!("{} Mirroring {}", "→".blue(), options.root_url.bright_white());
        println!(
            "{} Destination: {}",
            "→".blue(),
            options.destination.display().to_string().bright_white()
        );
        println!(
            "{} Extensions: {}",
            "→".blue(),
            options.extensions.extensions().join(", ")
        );
        println!(
            "{} Attempts per file: {} ({}s apart), workers: {}\n",
            "→".blue(),
            options.retry.max_attempts,
            options.retry.delay.as_secs(),
            options.workers
        );
    }

    let outcome = execute_mirror(options).await?;
    let report = MirrorReport::from(&outcome);
    let rendered = render_report(&report, format).context("failed to render report")?;

    if let Some(output) = args.get_one::<PathBuf>("output") {
        save_report(&rendered, output)
            .with_context(|| format!("failed to write report to {}", output.display()))?;
        println!(
            "{} Report saved to {}",
            "✓".green().bold(),
            output.display().to_string().bright_white()
        );
    } else {
        print!("{}", rendered);
    }

    if outcome.is_complete() {
        println!("\n{} Mirror complete!", "✓".green().bold());
        Ok(0)
    } else {
        eprintln!(
            "\n{} Mirror finished with {} permanent failure(s)",
            "⚠".yellow().bold(),
            outcome.failures.len()
        );
        Ok(EXIT_PARTIAL)
    }
}

pub async fn handle_fetch(args: &ArgMatches) -> Result<i32> {
    let url = args.get_one::<Url>("url").context("--url is required")?;
    let dest = args
        .get_one::<String>("dest")
        .context("--dest is required")?;
    let timeout = get_u64(args, "timeout", DEFAULT_TIMEOUT_SECS);

    let destination = resolve_fetch_destination(url, &expand_path(dest));
    let written = execute_fetch(url.as_str(), &destination, timeout).await?;

    println!(
        "{} {} ({} bytes)",
        "✓".green().bold(),
        destination.display().to_string().bright_white(),
        written.to_string().cyan()
    );
    Ok(0)
}

pub async fn handle_list(args: &ArgMatches) -> Result<i32> {
    let options = base_options(args, PathBuf::new())?;
    let inventory = execute_listing(&options).await?;

    println!("{}", "Directories".bright_blue().bold());
    for node in &inventory.visited {
        println!("{}{}", "  ".repeat(node.depth + 1), node.url);
    }
    println!();
    println!("{}", "Files".bright_blue().bold());
    for node in &inventory.files {
        println!("  {} {}", node.url, format!("(depth {})", node.depth).bright_black());
    }
    println!();
    println!(
        "{} {} directories, {} files",
        "✓".green().bold(),
        inventory.visited.len().to_string().cyan(),
        inventory.files.len().to_string().cyan()
    );
    Ok(0)
}
