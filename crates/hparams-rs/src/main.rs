//! Command-line inspector for component hyperparameters.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hparams_rs::config::raw;
use hparams_rs::{ConfigError, SchemaRegistry, builtin_registry, init_logging};
use log::{debug, info};
use std::io::{self, Write};
use std::path::PathBuf;

/// Command-line options for the hyperparameter inspector.
#[derive(Parser)]
#[command(name = "hparams", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered component types
    List,
    /// Print the default hyperparameters of a component
    Defaults {
        /// Component type, e.g. bert_classifier
        component: String,
    },
    /// Merge config files with a component's defaults and validate the result
    Check {
        /// Component type, e.g. bert_classifier
        component: String,
        /// JSON5 config files; later files override earlier ones
        #[arg(long = "config", value_name = "FILE")]
        configs: Vec<PathBuf>,
        /// Print the merged hyperparameters on success
        #[arg(long)]
        print: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let registry = builtin_registry().context("failed to register built-in components")?;
    let stdout = io::stdout();
    run(cli.command, &registry, &mut stdout.lock())
}

fn run(command: Command, registry: &SchemaRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::List => {
            for component in registry.component_types() {
                writeln!(out, "{component}")?;
            }
        }
        Command::Defaults { component } => {
            let schema = registry
                .schema_for(&component)
                .with_context(|| format!("unknown component {component}"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&schema.defaults())?)?;
        }
        Command::Check {
            component,
            configs,
            print,
        } => {
            info!(
                "checking hyperparameters (component={component}, layers={})",
                configs.len()
            );
            let raw = raw::load_layers(&configs).context("failed to load config files")?;
            debug!("raw config: {raw}");
            match registry.resolve(&component, Some(&raw)) {
                Ok(config) => {
                    if print {
                        writeln!(out, "{}", config.to_json_pretty()?)?;
                    } else {
                        writeln!(out, "{component}: ok")?;
                    }
                }
                Err(ConfigError::Validation(report)) => {
                    writeln!(out, "{component}: {} problem(s)", report.len())?;
                    writeln!(out, "{report}")?;
                    bail!("hyperparameters for {component} are invalid");
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to resolve {component}"));
                }
            }
        }
    }
    Ok(())
}
