//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use folio_core::{ContentCache, Engine, RunReport, workspace};
use folio_filters::{builtin_registry, default_registry, load_definitions};
use folio_shared::{
    AppConfig, CONFIG_FILE_NAME, Paths, init_config, load_config, load_config_from, load_spec,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Folio: build e-books from declarative specs.
#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Build e-books from declarative specs: fetch chapters, run filter chains, package the result.",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ./folio.toml.
    #[arg(long, env = "FOLIO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Project root; the configured directories resolve against it.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Output directory override.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Spec to build: a path, or a file name inside the specs directory.
    pub spec: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List every registered filter id.
    Filters,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "folio=info",
        1 => "folio=debug",
        _ => "folio=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match (&cli.command, &cli.spec) {
        (Some(Command::Filters), _) => cmd_filters(&cli),
        (Some(Command::Config { action }), _) => match action {
            ConfigAction::Init => cmd_config_init(&cli),
            ConfigAction::Show => cmd_config_show(&cli),
        },
        (None, Some(spec)) => cmd_build(&cli, spec).await,
        (None, None) => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Config file, then the `--root` and `--out` overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(root) = &cli.root {
        config.paths.root = root.to_string_lossy().into_owned();
    }
    if let Some(out) = &cli.out {
        config.paths.output_dir = out.to_string_lossy().into_owned();
    }

    Ok(config)
}

/// Accept an existing path as given, else look inside the specs directory
/// (with and without a `.json` extension).
fn resolve_spec_path(paths: &Paths, spec: &str) -> Result<PathBuf> {
    let direct = Path::new(spec);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let in_specs = paths.specs_dir.join(spec);
    let candidates = [in_specs.clone(), in_specs.with_extension("json")];
    candidates
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| {
            eyre!(
                "spec '{spec}' not found (looked in the working directory and {})",
                paths.specs_dir.display()
            )
        })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(cli: &Cli, spec_arg: &str) -> Result<()> {
    let config = resolve_config(cli)?;
    let paths = Paths::from(&config);

    workspace::bootstrap(&paths)?;
    let cache = ContentCache::snapshot(&paths.cache_dir)?;
    let registry = default_registry(&config, &paths)?;

    let spec_path = resolve_spec_path(&paths, spec_arg)?;
    let spec = load_spec(&spec_path)?;
    let title = spec.display_title().to_string();
    let output_dir = paths.output_dir.clone();

    info!(
        spec = %spec_path.display(),
        chapters = spec.contents.len(),
        cached = cache.len(),
        "building"
    );

    let engine = Engine::new(&registry, cache, paths, config.parser);

    let spinner = spinner(format!("Building {title}"));
    let result = engine.run(spec).await;
    spinner.finish_and_clear();

    print_summary(&title, &output_dir, &result?);
    Ok(())
}

fn print_summary(title: &str, output_dir: &Path, report: &RunReport) {
    println!();
    println!("  Book built successfully!");
    println!("  Title:    {title}");
    println!(
        "  Chapters: {} ({} sources)",
        report.chapters.len(),
        report.groups
    );
    println!("  Output:   {}", output_dir.display());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

/// Steady-ticking spinner shown while chains run.
fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn cmd_filters(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let paths = Paths::from(&config);

    let mut registry = builtin_registry(&config)?;
    let defined = load_definitions(&mut registry, &paths.filters_dir)?;

    for id in registry.ids() {
        let origin = if defined.iter().any(|d| d == id) {
            "definition"
        } else {
            "built-in"
        };
        println!("  {id:<16} {origin}");
    }
    Ok(())
}

fn cmd_config_init(cli: &Cli) -> Result<()> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    init_config(&path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use folio_shared::PathsConfig;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn parses_spec_and_subcommands() {
        let cli = Cli::try_parse_from(["folio", "-vv", "book.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.spec.as_deref(), Some("book.json"));
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["folio", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Show
            })
        ));

        let cli = Cli::try_parse_from(["folio"]).unwrap();
        assert!(cli.spec.is_none() && cli.command.is_none());
    }

    #[test]
    fn overrides_apply_to_paths() {
        let cli = Cli::try_parse_from(["folio", "--root", "/books", "--out", "dist", "x"]).unwrap();
        let mut config = AppConfig::default();
        config.paths.root = cli.root.as_ref().unwrap().to_string_lossy().into_owned();
        config.paths.output_dir = cli.out.as_ref().unwrap().to_string_lossy().into_owned();

        let paths = Paths::from(&config);
        assert_eq!(paths.output_dir, PathBuf::from("/books/dist"));
        assert_eq!(paths.specs_dir, PathBuf::from("/books/specs"));
    }

    #[test]
    fn spec_names_resolve_inside_specs_dir() {
        let root = std::env::temp_dir().join(format!("folio-cli-{}", Uuid::now_v7()));
        let paths = Paths::resolve(&PathsConfig::default(), &root);
        std::fs::create_dir_all(&paths.specs_dir).unwrap();
        std::fs::write(paths.specs_dir.join("novel.json"), "{}").unwrap();

        let expected = paths.specs_dir.join("novel.json");
        assert_eq!(resolve_spec_path(&paths, "novel.json").unwrap(), expected);
        assert_eq!(resolve_spec_path(&paths, "novel").unwrap(), expected);
        assert_eq!(
            resolve_spec_path(&paths, expected.to_str().unwrap()).unwrap(),
            expected
        );
        assert!(resolve_spec_path(&paths, "missing").is_err());

        let _ = std::fs::remove_dir_all(&root);
    }
}
