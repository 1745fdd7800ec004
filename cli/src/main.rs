use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use glyphcheck_core::locale::LOCALES;
use glyphcheck_core::{
    builtin_scenarios, parse_scenarios, validate_scenarios, ChromiumSessionFactory, Diagnostic,
    DiagnosticLevel, Executor, HarnessConfig, Runner, Scenario,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Checks that the payment plan calculator renders its Arabic locale"
)]
struct GlyphcheckCli {
    /// YAML file with harness settings
    #[arg(long, global = true, env = "GLYPHCHECK_CONFIG")]
    config: Option<PathBuf>,
    /// Base URL of the running calculator
    #[arg(long, global = true, env = "GLYPHCHECK_BASE_URL")]
    base_url: Option<String>,
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run scenarios in a browser (default when no subcommand is given)
    Run(RunArgs),
    /// Parse and validate scenarios without opening a browser
    Plan {
        #[command(flatten)]
        selection: Selection,
        /// Output JSON instead of a human-readable summary
        #[arg(long)]
        json: bool,
    },
    /// Print the glyphs expected for each supported locale
    Glyphs {
        #[arg(long, default_value_t = GlyphFormat::Text)]
        format: GlyphFormat,
    },
}

#[derive(Debug, Default, Args)]
struct Selection {
    /// Scenario file to load instead of the built-in scenarios. Repeat for multiple files.
    #[arg(long = "scenarios", value_name = "FILE", action = ArgAction::Append)]
    files: Vec<PathBuf>,
    /// Only keep the named scenario. Repeat for multiple names.
    #[arg(long, value_name = "NAME", action = ArgAction::Append)]
    only: Vec<String>,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    #[command(flatten)]
    selection: Selection,
    /// Output JSON instead of a human-readable report
    #[arg(long)]
    json: bool,
    /// Also write a JUnit XML report to this path
    #[arg(long, value_name = "PATH")]
    junit: Option<PathBuf>,
    /// Number of scenarios run at the same time
    #[arg(long, env = "GLYPHCHECK_CONCURRENCY")]
    concurrency: Option<usize>,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
    /// Chrome or Chromium executable
    #[arg(long, env = "CHROME")]
    chrome_path: Option<PathBuf>,
    /// Milliseconds to wait for each visibility assertion
    #[arg(long, value_name = "MS")]
    assert_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = GlyphcheckCli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        None => run(&cli.config, &cli.base_url, RunArgs::default()).await,
        Some(Command::Run(args)) => run(&cli.config, &cli.base_url, args).await,
        Some(Command::Plan { selection, json }) => {
            let config = load_config(&cli.config, &cli.base_url)?;
            let scenarios = load_scenarios(&selection, &config)?;
            let diagnostics = validate_scenarios(&scenarios);
            let has_errors = output_plan(&scenarios, &diagnostics, json)?;
            if has_errors {
                bail!("validation failed");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Glyphs { format }) => {
            output_glyphs(format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: tracing::Level = level.parse().context("invalid log level")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

async fn run(
    config_path: &Option<PathBuf>,
    base_url: &Option<String>,
    args: RunArgs,
) -> anyhow::Result<ExitCode> {
    let config = run_config(config_path, base_url, &args)?;
    let scenarios = load_scenarios(&args.selection, &config)?;
    let diagnostics = validate_scenarios(&scenarios);
    for diagnostic in &diagnostics {
        warn!(
            level = ?diagnostic.level,
            location = diagnostic.location.as_deref().unwrap_or("-"),
            "{}",
            diagnostic.message
        );
    }
    if diagnostics.iter().any(Diagnostic::is_error) {
        bail!("scenario validation failed");
    }

    info!(base_url = %config.base_url, headless = config.headless, "starting run");
    let runner = Runner::new(
        ChromiumSessionFactory::new(config.clone()),
        Executor::from_config(&config),
    )
    .with_concurrency(config.concurrency);
    let report = runner.run(&scenarios).await;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }
    if let Some(path) = &args.junit {
        write_file(path, &report.to_junit()?)?;
        info!(path = %path.display(), "junit report written");
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}

/// File settings with `run` flags applied on top, validated again afterwards.
fn run_config(
    config_path: &Option<PathBuf>,
    base_url: &Option<String>,
    args: &RunArgs,
) -> anyhow::Result<HarnessConfig> {
    let mut config = load_config(config_path, base_url)?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.headed {
        config.headless = false;
    }
    if let Some(path) = &args.chrome_path {
        config.chrome_path = Some(path.clone());
    }
    if let Some(timeout) = args.assert_timeout_ms {
        config.assert_timeout_ms = timeout;
    }
    config.validate()?;
    Ok(config)
}

fn load_config(
    path: &Option<PathBuf>,
    base_url: &Option<String>,
) -> anyhow::Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => HarnessConfig::default(),
    };
    if let Some(url) = base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    config.validate()?;
    Ok(config)
}

fn load_scenarios(
    selection: &Selection,
    config: &HarnessConfig,
) -> anyhow::Result<Vec<Scenario>> {
    let mut scenarios = if selection.files.is_empty() {
        builtin_scenarios(&config.base_url)
    } else {
        let mut loaded = Vec::new();
        for file in &selection.files {
            loaded.extend(load_scenario_file(file, &config.base_url)?);
        }
        loaded
    };

    if !selection.only.is_empty() {
        let known: HashSet<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        if let Some(missing) = selection.only.iter().find(|n| !known.contains(n.as_str())) {
            bail!("unknown scenario '{missing}'");
        }
        scenarios.retain(|s| selection.only.contains(&s.name));
    }
    Ok(scenarios)
}

fn load_scenario_file(path: &Path, base_url: &str) -> anyhow::Result<Vec<Scenario>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenarios {}", path.display()))?;
    parse_scenarios(&content, base_url).with_context(|| format!("in {}", path.display()))
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn output_plan(
    scenarios: &[Scenario],
    diagnostics: &[Diagnostic],
    json: bool,
) -> anyhow::Result<bool> {
    let has_errors = diagnostics.iter().any(Diagnostic::is_error);
    let summaries: Vec<_> = scenarios.iter().map(Scenario::summary).collect();

    if json {
        let payload = json!({
            "scenarios": summaries,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_diagnostics(diagnostics);
        for summary in &summaries {
            println!("{summary}");
        }
    }

    Ok(has_errors)
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GlyphFormat {
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for GlyphFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            GlyphFormat::Text => "text",
            GlyphFormat::Json => "json",
            GlyphFormat::Yaml => "yaml",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Serialize)]
struct GlyphListing {
    default_month: u8,
    locales: Vec<glyphcheck_core::Locale>,
}

fn output_glyphs(format: GlyphFormat) -> anyhow::Result<()> {
    let listing = GlyphListing {
        default_month: glyphcheck_core::locale::DEFAULT_MONTH,
        locales: LOCALES.iter().copied().collect(),
    };

    match format {
        GlyphFormat::Text => {
            for locale in &listing.locales {
                println!("{locale}");
            }
        }
        GlyphFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        GlyphFormat::Yaml => {
            let yaml = serde_yaml::to_string(&listing)?;
            print!("{yaml}");
        }
    }

    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    println!("Diagnostics:");
    for diagnostic in diagnostics {
        let level = match diagnostic.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warn",
        };
        match &diagnostic.location {
            Some(location) => println!("  - [{level}] {location}: {}", diagnostic.message),
            None => println!("  - [{level}] {}", diagnostic.message),
        }
    }
    println!();
}
