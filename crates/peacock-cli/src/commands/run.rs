//! `peacock run` command implementation.
//!
//! Compiles one file and prints the JavaScript, or writes it with `-o`.

use miette::Result;
use peacock_core::compiler::{compile, CompileOptions, WarningInfo};
use peacock_core::Config;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use super::{read_source, report};

/// Exit code for compile errors in JSON mode.
const EXIT_COMPILE_ERROR: i32 = 1;

/// Result for JSON output.
#[derive(Serialize)]
struct RunResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    warnings: Vec<WarningInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RunError>,
}

/// Error info for JSON output.
#[derive(Serialize)]
struct RunError {
    message: String,
    line: Option<u32>,
    column: Option<u32>,
}

pub fn run(config: &Config, file: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let (path, source) = read_source(config, file)?;
    let options = CompileOptions::from(config);
    debug!(file = %path.display(), bundle = options.bundle, indent = options.indent, "compiling");

    let compiled = match compile(&source, &options) {
        Ok(compiled) => compiled,
        Err(err) if json => {
            let location = err.location(&source);
            let result = RunResult {
                ok: false,
                code: None,
                warnings: Vec::new(),
                error: Some(RunError {
                    message: err.message(),
                    line: location.map(|(line, _)| line),
                    column: location.map(|(_, column)| column),
                }),
            };
            print_json(&result)?;
            std::process::exit(EXIT_COMPILE_ERROR);
        }
        Err(err) => return Err(report(err, &path, &source)),
    };

    if let Some(output) = output {
        let out_path = config.cwd.join(output);
        std::fs::write(&out_path, &compiled.code)
            .map_err(|e| miette::miette!("Failed to write {}: {}", out_path.display(), e))?;
        info!(file = %out_path.display(), bytes = compiled.code.len(), "wrote output");
    }

    if json {
        let result = RunResult {
            ok: true,
            warnings: compiled
                .warnings
                .iter()
                .map(|w| WarningInfo::new(w, &source))
                .collect(),
            code: Some(compiled.code),
            error: None,
        };
        print_json(&result)?;
    } else if output.is_none() {
        print!("{}", compiled.code);
    }
    Ok(())
}

fn print_json(result: &RunResult) -> Result<()> {
    let out = serde_json::to_string_pretty(result)
        .map_err(|e| miette::miette!("Failed to serialize result: {}", e))?;
    println!("{out}");
    Ok(())
}
