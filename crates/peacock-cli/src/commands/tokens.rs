//! `peacock tokens` command implementation.

use miette::Result;
use peacock_core::Config;
use peacock_lang::LineIndex;
use serde::Serialize;
use std::path::Path;

use super::{read_source, report};

/// One token in JSON output.
#[derive(Serialize)]
struct TokenInfo {
    kind: String,
    line: u32,
    column: u32,
    start: u32,
    end: u32,
}

pub fn run(config: &Config, file: &Path, json: bool) -> Result<()> {
    let (path, source) = read_source(config, file)?;
    let tokens = peacock_core::compiler::tokens(&source).map_err(|e| report(e, &path, &source))?;
    let index = LineIndex::new(&source);

    let infos: Vec<TokenInfo> = tokens
        .iter()
        .map(|token| {
            let (line, column) = index.line_col(token.span.start);
            TokenInfo {
                kind: format!("{:?}", token.kind),
                line,
                column,
                start: token.span.start,
                end: token.span.end,
            }
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&infos)
            .map_err(|e| miette::miette!("Failed to serialize tokens: {}", e))?;
        println!("{out}");
    } else {
        for info in &infos {
            println!("{}:{}\t{}", info.line, info.column, info.kind);
        }
    }
    Ok(())
}
