use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use jsonschema::JSONSchema;
use lattice_core::{GradeConfig, Grader, PythonCommand, RunReport};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Grades every problem's reference solution and reports regressions.
#[derive(Parser)]
struct Args {
    /// Directory searched recursively for `problem.yaml` files.
    #[arg(long, default_value = "problems")]
    root: PathBuf,
    #[arg(long, default_value = "schemas/problem.schema.json")]
    schema: PathBuf,
    #[arg(long, default_value = "solution.py")]
    solution_name: String,
    /// Only grade problems whose id matches one of these patterns.
    #[arg(long)]
    only: Vec<String>,
    #[arg(long)]
    list: bool,
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long, default_value = "python3")]
    python: PathBuf,
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

struct Problem {
    id: String,
    dir: PathBuf,
    solution: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum ProblemStatus {
    Pass,
    Fail,
}

#[derive(Serialize)]
struct ProblemRecord {
    id: String,
    dir: String,
    solution: String,
    solution_sha256: String,
    status: ProblemStatus,
    total: usize,
    passed: usize,
    failed: usize,
    error: Option<String>,
    duration_ms: u64,
}

#[derive(Serialize)]
struct Summary {
    schema_version: String,
    started_at: String,
    finished_at: String,
    total: usize,
    passed: usize,
    failed: usize,
    problems: Vec<ProblemRecord>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.jobs == 0 {
        anyhow::bail!("--jobs must be >= 1");
    }
    init_tracing();

    let schema = load_problem_schema(&args.schema)?;
    let mut problems = load_problems(&args.root, &args.solution_name, &schema)?;
    problems.sort_by(|a, b| a.id.cmp(&b.id));
    let filtered = filter_problems(&problems, &args.only)?;
    if args.list {
        for problem in &filtered {
            println!("{} {}", problem.id, problem.dir.display());
        }
        return Ok(());
    }

    let config = GradeConfig {
        timeout: args.timeout_ms.map(Duration::from_millis),
        python: PythonCommand::new(&args.python),
        ..GradeConfig::default()
    };
    let grader = Grader::new(config);
    let started_at = Utc::now();

    let records = if args.jobs == 1 {
        filtered
            .iter()
            .map(|problem| run_problem(&grader, problem))
            .collect::<Vec<_>>()
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(args.jobs)
            .build()
            .context("build thread pool")?;
        let mut indexed = pool.install(|| {
            filtered
                .par_iter()
                .enumerate()
                .map(|(idx, problem)| (idx, run_problem(&grader, problem)))
                .collect::<Vec<_>>()
        });
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, record)| record).collect()
    };

    let mut any_fail = false;
    for record in &records {
        match record.status {
            ProblemStatus::Pass => {
                println!("PASS {} ({}/{})", record.id, record.passed, record.total);
            }
            ProblemStatus::Fail => {
                any_fail = true;
                match &record.error {
                    Some(error) => println!("FAIL {}: {error}", record.id),
                    None => println!(
                        "FAIL {}: {} of {} test cases failed",
                        record.id, record.failed, record.total
                    ),
                }
            }
        }
    }

    if let Some(path) = &args.summary_json {
        let passed = records
            .iter()
            .filter(|record| matches!(record.status, ProblemStatus::Pass))
            .count();
        let summary = Summary {
            schema_version: "0.1".to_string(),
            started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total: records.len(),
            passed,
            failed: records.len() - passed,
            problems: records,
        };
        let payload = serde_json::to_string_pretty(&summary).context("serialize summary json")?;
        fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    }

    if any_fail {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let filter = tracing_subscriber::EnvFilter::try_from_env("LATTICE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_problem_schema(schema_path: &Path) -> Result<JSONSchema> {
    let schema_text = fs::read_to_string(schema_path)
        .with_context(|| format!("read {}", schema_path.display()))?;
    let schema_json: JsonValue =
        serde_json::from_str(&schema_text).context("parse problem schema")?;
    let schema_json = Box::leak(Box::new(schema_json));
    JSONSchema::compile(schema_json).context("compile problem schema")
}

fn load_problems(root: &Path, solution_name: &str, schema: &JSONSchema) -> Result<Vec<Problem>> {
    let mut problems = Vec::new();
    if root.exists() {
        collect_problems(root, root, solution_name, schema, &mut problems)?;
    }
    Ok(problems)
}

fn collect_problems(
    root: &Path,
    dir: &Path,
    solution_name: &str,
    schema: &JSONSchema,
    problems: &mut Vec<Problem>,
) -> Result<()> {
    let problem_yaml = dir.join("problem.yaml");
    let solution = dir.join(solution_name);
    if problem_yaml.is_file() && solution.is_file() {
        let text = fs::read_to_string(&problem_yaml)
            .with_context(|| format!("read {}", problem_yaml.display()))?;
        let raw_json: JsonValue =
            serde_yaml::from_str(&text).context("parse problem.yaml as json")?;
        if let Err(errors) = schema.validate(&raw_json) {
            let details: Vec<String> = errors.map(|err| err.to_string()).collect();
            anyhow::bail!(
                "problem schema validation failed: {}\n{}",
                problem_yaml.display(),
                details.join("\n")
            );
        }
        problems.push(Problem {
            id: problem_id(&raw_json, root, dir),
            dir: dir.to_path_buf(),
            solution,
        });
    }

    let mut children = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type()?.is_dir() && !hidden {
            children.push(entry.path());
        }
    }
    children.sort();
    for child in children {
        collect_problems(root, &child, solution_name, schema, problems)?;
    }
    Ok(())
}

fn problem_id(raw: &JsonValue, root: &Path, dir: &Path) -> String {
    match raw.get("id") {
        Some(JsonValue::String(id)) => id.clone(),
        Some(JsonValue::Number(id)) => id.to_string(),
        _ => dir
            .strip_prefix(root)
            .unwrap_or(dir)
            .display()
            .to_string(),
    }
}

fn filter_problems<'a>(problems: &'a [Problem], only: &[String]) -> Result<Vec<&'a Problem>> {
    if only.is_empty() {
        return Ok(problems.iter().collect());
    }
    let patterns = only
        .iter()
        .map(|pattern| Regex::new(pattern).with_context(|| format!("invalid --only regex {pattern}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(problems
        .iter()
        .filter(|problem| patterns.iter().any(|re| re.is_match(&problem.id)))
        .collect())
}

fn run_problem(grader: &Grader, problem: &Problem) -> ProblemRecord {
    let timer = Instant::now();
    let report: RunReport = grader.run(&problem.dir, &problem.solution);
    let status = if report.all_passed() {
        ProblemStatus::Pass
    } else {
        ProblemStatus::Fail
    };
    ProblemRecord {
        id: problem.id.clone(),
        dir: problem.dir.display().to_string(),
        solution: problem.solution.display().to_string(),
        solution_sha256: compute_sha256(&problem.solution).unwrap_or_else(|err| err),
        status,
        total: report.total,
        passed: report.passed,
        failed: report.failed,
        error: report.error,
        duration_ms: timer.elapsed().as_millis() as u64,
    }
}

fn compute_sha256(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|err| format!("read error: {err}"))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
