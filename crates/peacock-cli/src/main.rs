#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use peacock_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peacock")]
#[command(author, version, about = "Compile Peacock programs to JavaScript", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Compile a Peacock file and print the JavaScript
    Run {
        /// The .pea file to compile
        file: PathBuf,

        /// Emit only the compiled program, without the runtime
        #[arg(short, long)]
        standalone: bool,

        /// Write the output to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compile and evaluate one line at a time with Node.js
    Repl {
        /// JavaScript runtime to pipe compiled lines into
        #[arg(long, value_name = "PATH")]
        node: Option<PathBuf>,
    },

    /// Print the syntax tree of a file
    Ast {
        file: PathBuf,
    },

    /// Print the token stream of a file
    Tokens {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // Build config: peacock.json first, flags on top
    let config = Config::load(cwd)
        .map_err(|e| miette::miette!("{}", e))?
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Run {
            file,
            standalone,
            output,
        }) => {
            let config = if standalone {
                config.with_bundle(false)
            } else {
                config
            };
            commands::run::run(&config, &file, output.as_deref(), cli.json)
        }
        Some(Commands::Repl { node }) => commands::repl::run(node),
        Some(Commands::Ast { file }) => commands::ast::run(&config, &file),
        Some(Commands::Tokens { file }) => commands::tokens::run(&config, &file, cli.json),
    }
}
