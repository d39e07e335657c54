//! Integration tests for `peacock run`, `tokens` and `ast`.

use std::io::Write;
use std::process::{Command, Stdio};

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "peacock-cli", "--bin", "peacock", "--"]);
    cmd
}

fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }
    dir
}

#[test]
fn test_version() {
    let output = cargo_bin().arg("version").output().expect("Failed to run command");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("peacock "), "{stdout}");
}

#[test]
fn test_run_bundles_runtime() {
    let dir = project(&[("main.pea", "a := 3\n")]);
    let output = cargo_bin()
        .args(["run", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("class Schema"));
    assert!(stdout.contains("class MatchError"));
    assert!(stdout.ends_with("const a = 3;\n"));
}

#[test]
fn test_run_standalone() {
    let dir = project(&[("main.pea", "a := 3\n")]);
    let output = cargo_bin()
        .args(["run", "-s", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "const a = 3;\n");
}

#[test]
fn test_run_writes_output_file() {
    let dir = project(&[("main.pea", "def add(a, b) = a + b\n")]);
    let output = cargo_bin()
        .args(["run", "--standalone", "main.pea", "-o", "main.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let js = std::fs::read_to_string(dir.path().join("main.js")).unwrap();
    assert!(js.contains("return a.__plus__(b);"), "{js}");
}

#[test]
fn test_config_file_disables_bundling() {
    let dir = project(&[("main.pea", "a := 3\n"), ("peacock.json", r#"{"bundle": false}"#)]);
    let output = cargo_bin()
        .args(["run", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "const a = 3;\n");
}

#[test]
fn test_run_parse_error_exits_nonzero() {
    let dir = project(&[("main.pea", "a := 1\ndef = 2\n")]);
    let output = cargo_bin()
        .args(["run", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("(2:"), "stderr: {stderr}");
}

#[test]
fn test_run_json_success() {
    let source = "case function f\nwhen (x)\n  x\nwhen (1)\n  1\nend\n";
    let dir = project(&[("main.pea", source)]);
    let output = cargo_bin()
        .args(["--json", "run", "-s", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], true);
    assert!(json["code"].as_str().unwrap().contains("function f(...__args0)"));
    assert_eq!(json["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(json["warnings"][0]["line"], 4);
}

#[test]
fn test_run_json_error() {
    let dir = project(&[("main.pea", "x := \"open\n")]);
    let output = cargo_bin()
        .args(["--json", "run", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(!output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["line"], 1);
    assert!(json["error"]["message"].as_str().is_some());
    assert!(json.get("code").is_none());
}

#[test]
fn test_run_missing_file() {
    let dir = project(&[]);
    let output = cargo_bin()
        .args(["run", "nope.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.pea"));
}

#[test]
fn test_tokens_json() {
    let dir = project(&[("main.pea", "a := 3\n")]);
    let output = cargo_bin()
        .args(["--json", "tokens", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    let tokens = json.as_array().unwrap();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[0]["line"], 1);
    assert_eq!(tokens[3]["kind"], "Newline");
}

#[test]
fn test_ast_dump() {
    let dir = project(&[("main.pea", "a := 3\n")]);
    let output = cargo_bin()
        .args(["ast", "main.pea", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Assign"));
    assert!(stdout.contains("Int(\n"), "{stdout}");
}

#[cfg(unix)]
#[test]
fn test_repl_pipes_compiled_lines() {
    // `cat` stands in for node and echoes what the repl sends it
    let mut child = cargo_bin()
        .args(["repl", "--node", "cat"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run command");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"a := 3\ndef = oops\nexit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("class Schema"));
    assert!(stdout.contains("const a = 3;"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}
