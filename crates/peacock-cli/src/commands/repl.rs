//! `peacock repl` command implementation.
//!
//! Each line is compiled on its own and evaluated by a fresh Node.js process
//! with the runtime loaded in front of it. Nothing carries over between lines.

use miette::{IntoDiagnostic, Result};
use peacock_core::compiler::{compile, CompileOptions};
use peacock_core::runtime::RUNTIME;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

const PROMPT: &str = "pea> ";

pub fn run(node: Option<PathBuf>) -> Result<()> {
    let node = match node {
        Some(node) => node,
        None => which::which("node")
            .map_err(|_| miette::miette!("`node` not found in PATH; the repl needs Node.js"))?,
    };
    debug!(node = %node.display(), "starting repl");

    let options = CompileOptions::default().with_bundle(false);
    let stdin = io::stdin();
    prompt()?;

    for line in stdin.lock().lines() {
        let line = line.into_diagnostic()?;
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if !line.is_empty() {
            match compile(line, &options) {
                Ok(compiled) => evaluate(&node, &compiled.code),
                Err(err) => eprintln!("error: {}", err.message()),
            }
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{PROMPT}").into_diagnostic()?;
    stdout.flush().into_diagnostic()
}

/// Pipe the runtime and `code` into `node` and echo what it prints.
fn evaluate(node: &Path, code: &str) {
    let result = Command::new(node)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(RUNTIME.as_bytes())?;
                stdin.write_all(b"\n")?;
                stdin.write_all(code.as_bytes())?;
            }
            child.wait_with_output()
        });

    match result {
        Ok(output) if output.status.success() => {
            print!("{}", String::from_utf8_lossy(&output.stdout));
        }
        Ok(output) => {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "evaluation failed");
            eprintln!("error: something went wrong evaluating that line");
        }
        Err(err) => {
            debug!(error = %err, "could not run node");
            eprintln!("error: something went wrong evaluating that line");
        }
    }
}
