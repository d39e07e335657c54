pub mod ast;
pub mod repl;
pub mod run;
pub mod tokens;
pub mod version;

use miette::Result;
use peacock_core::Config;
use std::path::{Path, PathBuf};

/// Resolve `file` against the working directory and read it.
pub fn read_source(config: &Config, file: &Path) -> Result<(PathBuf, String)> {
    let path = config.cwd.join(file);
    let source = std::fs::read_to_string(&path)
        .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))?;
    Ok((path, source))
}

/// Turn a compile error into a report that points into the source.
pub fn report(err: peacock_core::Error, path: &Path, source: &str) -> miette::Report {
    if err.span().is_some() {
        err.with_source(path.display().to_string(), source).into()
    } else {
        miette::miette!("{}", err)
    }
}
