//! `peacock ast` command implementation.

use miette::Result;
use peacock_core::Config;
use std::path::Path;

use super::{read_source, report};

pub fn run(config: &Config, file: &Path) -> Result<()> {
    let (path, source) = read_source(config, file)?;
    let program = peacock_core::compiler::ast(&source).map_err(|e| report(e, &path, &source))?;
    for node in &program {
        println!("{node:#?}");
    }
    Ok(())
}
