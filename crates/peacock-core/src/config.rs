use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Name of the optional per-project config file.
pub const CONFIG_FILE: &str = "peacock.json";

/// Runtime configuration for the peacock CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Prepend the runtime to compiled output.
    pub bundle: bool,

    /// Spaces per indentation level in generated code.
    pub indent: usize,
}

/// Contents of `peacock.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub bundle: Option<bool>,
    pub indent: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            bundle: true,
            indent: 2,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Config for `cwd`, with `peacock.json` applied if it exists.
    pub fn load(cwd: PathBuf) -> Result<Self, Error> {
        let file = ConfigFile::read(&cwd.join(CONFIG_FILE))?;
        Ok(Self::new(cwd).with_file(file.unwrap_or_default()))
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set runtime bundling.
    #[must_use]
    pub fn with_bundle(mut self, bundle: bool) -> Self {
        self.bundle = bundle;
        self
    }

    /// Set indentation width.
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Apply the keys a config file sets.
    #[must_use]
    pub fn with_file(mut self, file: ConfigFile) -> Self {
        if let Some(bundle) = file.bundle {
            self.bundle = bundle;
        }
        if let Some(indent) = file.indent {
            self.indent = indent;
        }
        self
    }
}

impl ConfigFile {
    /// Read and parse `path`; `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, Error> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })
    }
}
