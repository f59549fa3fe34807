use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn write_problem(dir: &Path, yaml: &str, solution: &str) -> (PathBuf, PathBuf) {
    let problem = dir.join("problem");
    fs::create_dir_all(&problem).expect("problem dir");
    fs::write(problem.join("problem.yaml"), yaml).expect("problem yaml");
    let solution_path = dir.join("solution.py");
    fs::write(&solution_path, solution).expect("solution");
    (problem, solution_path)
}

#[test]
fn passing_solution_exits_zero() {
    cargo_bin_cmd!("lattice")
        .current_dir(repo_root())
        .args(["problems/cosine-similarity", "problems/cosine-similarity/solution.py"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("\"success\": true"));
}

#[test]
fn failing_case_exits_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (problem, solution) = write_problem(
        dir.path(),
        "test_cases:\n  - input: {a: 1, b: 2}\n    expected: 3\n",
        "def add(a, b):\n    return a - b\n",
    );
    let output = cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .output()
        .expect("run lattice");
    assert_eq!(output.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["failed"], 1);
    assert_eq!(report["results"][0]["output"], -1);
    assert_eq!(report["results"][0]["error"], Value::Null);
}

#[test]
fn load_failure_exits_one_with_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (problem, solution) = write_problem(
        dir.path(),
        "test_cases:\n  - input: {}\n    expected: 1\n",
        "from lattice_no_such_module import helper\ndef f():\n    return 1\n",
    );
    let output = cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .output()
        .expect("run lattice");
    assert_eq!(output.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(
        report["error"],
        "Error loading solution: ModuleNotFoundError: No module named 'lattice_no_such_module'"
    );
}

#[test]
fn text_format_lists_each_case() {
    cargo_bin_cmd!("lattice")
        .current_dir(repo_root())
        .args([
            "problems/two-sum",
            "problems/two-sum/solution.py",
            "--format",
            "text",
        ])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("PASS 1 ("))
        .stdout(predicate::str::contains("4 passed, 0 failed, 4 total"));
}

#[test]
fn output_flag_writes_report_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("report.json");
    cargo_bin_cmd!("lattice")
        .current_dir(repo_root())
        .args(["problems/two-sum", "problems/two-sum/solution.py", "--output"])
        .arg(&out)
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
    let report: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read report")).expect("json");
    assert_eq!(report["passed"], 4);
}

#[test]
fn prints_go_to_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (problem, solution) = write_problem(
        dir.path(),
        "test_cases:\n  - input: {x: 2}\n    expected: 4\n",
        "print('loading')\ndef square(x):\n    print('x =', x)\n    return x * x\n",
    );
    cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("loading"))
        .stderr(predicate::str::contains("x = 2"))
        .stdout(predicate::str::contains("loading").not());
}

#[test]
fn hung_call_is_killed_and_later_cases_still_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (problem, solution) = write_problem(
        dir.path(),
        "test_cases:\n  - id: hang\n    input: {}\n    expected: 1\n  - id: ok\n    input: {n: 1}\n    expected: 1\n",
        "def spin(n=0):\n    while n == 0:\n        pass\n    return n\n",
    );
    let started = Instant::now();
    let output = cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .args(["--timeout-ms", "200", "--load-timeout-ms", "5000"])
        .output()
        .expect("run lattice");
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(output.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(
        report["results"][0]["error"],
        "Timeout: execution exceeded 0.2 seconds"
    );
    assert_eq!(report["results"][1]["passed"], true);
}

#[test]
fn fresh_isolation_resets_module_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (problem, solution) = write_problem(
        dir.path(),
        "test_cases:\n  - input: {}\n    expected: 1\n  - input: {}\n    expected: 1\n",
        "calls = []\ndef count():\n    calls.append(None)\n    return len(calls)\n",
    );
    cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"passed\": 1,"));
    cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .args(["--isolation", "fresh"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("\"passed\": 2,"));
}

#[test]
fn missing_interpreter_is_reported_in_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (problem, solution) = write_problem(
        dir.path(),
        "test_cases:\n  - input: {}\n    expected: 1\n",
        "def f():\n    return 1\n",
    );
    let output = cargo_bin_cmd!("lattice")
        .args([&problem, &solution])
        .args(["--python", "/nonexistent/python3"])
        .output()
        .expect("run lattice");
    assert_eq!(output.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert!(report["error"]
        .as_str()
        .expect("error")
        .starts_with("Could not start Python runtime /nonexistent/python3"));
}
