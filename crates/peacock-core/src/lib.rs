#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod runtime;
pub mod version;

pub use compiler::{compile, CompileOptions, CompileOutput};
pub use config::Config;
pub use error::{Error, SourceDiagnostic};
pub use version::VERSION;
