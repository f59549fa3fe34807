use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lattice_core::{GradeConfig, Grader, Isolation, PythonCommand, RunReport};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "LATTICE_LOG";

#[derive(Parser)]
#[command(name = "lattice")]
#[command(version)]
struct Cli {
    #[arg(default_value = "/code/problem")]
    problem: PathBuf,

    #[arg(default_value = "/code/solution.py")]
    solution: PathBuf,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[arg(long)]
    output: Option<PathBuf>,

    /// Per-call deadline; overrides the problem's `timeout_ms`.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    load_timeout_ms: Option<u64>,

    /// Interpreter that runs the candidate.
    #[arg(long, default_value = "python3")]
    python: PathBuf,

    #[arg(long, value_enum, default_value = "shared")]
    isolation: IsolationMode,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, ValueEnum)]
enum IsolationMode {
    /// One worker for every test case.
    Shared,
    /// Reload the candidate in a new worker for each test case.
    Fresh,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tool error: {err:#}");
            2
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let config = build_config(&cli);
    let report = Grader::new(config).run(&cli.problem, &cli.solution);
    let exit_code = if report.all_passed() { 0 } else { 1 };

    match cli.format {
        OutputFormat::Json => emit_json(&report, cli.output.as_deref()),
        OutputFormat::Text => emit_text(&report, cli.output.as_deref()),
    }?;

    Ok(exit_code)
}

fn build_config(cli: &Cli) -> GradeConfig {
    let mut config = GradeConfig {
        timeout: cli.timeout_ms.map(Duration::from_millis),
        python: PythonCommand::new(&cli.python),
        isolation: match cli.isolation {
            IsolationMode::Shared => Isolation::Shared,
            IsolationMode::Fresh => Isolation::Fresh,
        },
        ..GradeConfig::default()
    };
    if let Some(ms) = cli.load_timeout_ms {
        config.load_timeout = Duration::from_millis(ms);
    }
    config
}

fn emit_json(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let payload = serde_json::to_string_pretty(report).context("serialize report json")?;
    if let Some(path) = output {
        write_atomic(path, payload.as_bytes())?;
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{payload}").context("write report")?;
    Ok(())
}

fn emit_text(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let text = report.render_text();
    if let Some(path) = output {
        write_atomic(path, text.as_bytes())?;
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes()).context("write report")?;
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("rename {}", path.display()))?;
    Ok(())
}
