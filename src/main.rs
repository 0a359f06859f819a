//! GlucoLink CLI
//!
//! Usage:
//!   glucolink compile [OPTIONS] --output-log <FILE>
//!   glucolink catalogue [OPTIONS]
//!
//! `compile` expands a catalogued configuration template for one purpose and
//! prints the final document; `catalogue` lists the registered
//! `(class, id)` bindings. Both accept `--manifest` to extend the builtin
//! catalogue from a TOML file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use glucolink::config::{build_config, Catalogue, MetaKind, Purpose};
use glucolink::engine::ONE_SECOND;

#[derive(Parser)]
#[command(name = "glucolink")]
#[command(about = "Configuration compiler for the glucose simulation game adapter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a configuration template and print the final document
    Compile {
        /// Configuration class
        #[arg(long, default_value_t = 0)]
        class: u16,

        /// Configuration id within the class
        #[arg(long, default_value_t = 0)]
        id: u16,

        /// Purpose the document is compiled for
        #[arg(long, value_enum, default_value_t = PurposeArg::Gameplay)]
        purpose: PurposeArg,

        /// Model stepping interval in milliseconds
        #[arg(long, default_value_t = 5000)]
        stepping_ms: u32,

        /// Recorded log to replay from (optimization and replay purposes)
        #[arg(long, default_value = "")]
        input_log: String,

        /// Log file the session writes to
        #[arg(long)]
        output_log: String,

        /// TOML manifest extending the builtin catalogue
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Print discovered parameter exports to stderr
        #[arg(long)]
        exports: bool,
    },

    /// List the (class, id) bindings known to the catalogue
    Catalogue {
        /// TOML manifest extending the builtin catalogue
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PurposeArg {
    Gameplay,
    Optimization,
    Replay,
}

impl From<PurposeArg> for Purpose {
    fn from(arg: PurposeArg) -> Self {
        match arg {
            PurposeArg::Gameplay => Purpose::Gameplay,
            PurposeArg::Optimization => Purpose::Optimization,
            PurposeArg::Replay => Purpose::Replay,
        }
    }
}

fn load_catalogue(manifest: Option<&PathBuf>) -> Result<Catalogue, String> {
    let mut catalogue = Catalogue::builtin();
    if let Some(path) = manifest {
        catalogue
            .load_manifest(path)
            .map_err(|e| format!("loading manifest '{}': {}", path.display(), e))?;
    }
    Ok(catalogue)
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Compile {
            class,
            id,
            purpose,
            stepping_ms,
            input_log,
            output_log,
            manifest,
            exports,
        } => {
            let catalogue = load_catalogue(manifest.as_ref())?;
            let stepping = ONE_SECOND * (stepping_ms as f64 / 1000.0);

            let mut on_export = |index: usize, kind: MetaKind, argument: &str| {
                if exports && kind == MetaKind::ParameterExport {
                    eprintln!("filter {index} exports parameter field '{argument}'");
                }
            };
            let document = build_config(
                &catalogue,
                class,
                id,
                stepping,
                &input_log,
                &output_log,
                purpose.into(),
                Some(&mut on_export),
            )
            .map_err(|e| e.to_string())?;

            print!("{document}");
            Ok(())
        }
        Command::Catalogue { manifest } => {
            let catalogue = load_catalogue(manifest.as_ref())?;
            for binding in catalogue.bindings() {
                println!(
                    "class {} id {}: base {} parameters {}",
                    binding.class, binding.id, binding.base, binding.parameters
                );
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
