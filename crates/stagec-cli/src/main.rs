//! stagec CLI: validate, explain and run stage documents.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, trace};

use stagec_core::config::CompilerConfig;
use stagec_exec::{CompiledStage, LocalExchange, StageCompiler};
use stagec_operators::Registry;
use stagec_planner::{parse_yaml_stage, CompileEnv, ParsedStage, StageConfig};

#[derive(Parser)]
#[command(name = "stagec")]
#[command(about = "Stage decomposition and shuffle codec compiler", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a stage document and report diagnostics
    Validate {
        /// Path to the stage YAML file
        #[arg(short, long)]
        stage: PathBuf,
    },

    /// Print units, segments, sinks and task flows of a stage (EXPLAIN)
    Explain {
        /// Path to the stage YAML file
        #[arg(short, long)]
        stage: PathBuf,

        /// Disable the combine task
        #[arg(long)]
        no_combine: bool,
    },

    /// Compile a stage and run its inline inputs through the local exchange
    Run {
        /// Path to the stage YAML file
        #[arg(short, long)]
        stage: PathBuf,

        /// Reduce partition count (overrides config)
        #[arg(long)]
        partitions: Option<u32>,

        /// Disable the combine task
        #[arg(long)]
        no_combine: bool,

        /// Cross-check object and byte comparators while sorting
        #[arg(long)]
        verify: bool,
    },
}

/// Overrides given on the command line; applied after env and document config.
#[derive(Debug, Default)]
struct Overrides {
    partitions: Option<u32>,
    no_combine: bool,
    verify: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    match cli.command {
        Commands::Validate { stage } => match compile_file(&stage, &Overrides::default()) {
            Ok((_, compiled)) => println!(
                "✓ Stage {} is valid ({} map units, {} reduce units, {} segments)",
                compiled.manifest.stage,
                compiled.manifest.map_units,
                compiled.manifest.reduce_units,
                compiled.manifest.segments
            ),
            Err(e) => {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Explain { stage, no_combine } => {
            let overrides = Overrides {
                no_combine,
                ..Default::default()
            };
            match compile_file(&stage, &overrides) {
                Ok((_, compiled)) => print!("{}", compiled.explain()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Run {
            stage,
            partitions,
            no_combine,
            verify,
        } => {
            let overrides = Overrides {
                partitions,
                no_combine,
                verify,
            };
            if let Err(e) = run_stage(&stage, &overrides) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_stage(path: &PathBuf, overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let (parsed, compiled) = compile_file(path, overrides)?;
    let output = LocalExchange::new(&compiled).run(&parsed.inputs)?;

    println!("{}", serde_json::to_string_pretty(&output.to_json())?);
    eprintln!("✓ Stage {} executed", compiled.manifest.stage);
    eprintln!(
        "  Records: {} in, {} shuffled, {} after combine, {} out",
        output.stats.input_records,
        output.stats.shuffled,
        output.stats.combined,
        output.stats.sink_records
    );
    eprintln!(
        "  Groups: {} over {} partitions",
        output.stats.groups, output.stats.partitions
    );
    eprintln!("  Fingerprint: {}", compiled.manifest.fingerprint());
    Ok(())
}

fn compile_file(
    path: &PathBuf,
    overrides: &Overrides,
) -> Result<(ParsedStage, CompiledStage), Box<dyn std::error::Error>> {
    let yaml = fs::read_to_string(path)?;
    let parsed = parse_yaml_stage(&yaml)?;

    let mut config = CompilerConfig::from_env();
    apply_config(&mut config, &parsed.config, overrides);
    debug!(?config, "compiling {}", path.display());

    let env = CompileEnv::new(
        config,
        Arc::new(Registry::with_builtins()),
        Arc::new(parsed.shapes.clone()),
    );
    let compiler = StageCompiler::new(env);
    match compiler.compile(parsed.stage.clone()) {
        Ok(compiled) => Ok((parsed, compiled)),
        Err(e) => {
            report_diagnostics(compiler.env());
            Err(e.into())
        }
    }
}

fn apply_config(config: &mut CompilerConfig, doc: &StageConfig, overrides: &Overrides) {
    doc.apply(config);
    if let Some(n) = overrides.partitions {
        config.partitions = n;
    }
    if overrides.no_combine {
        config.combine = false;
    }
    if overrides.verify {
        config.verify_comparators = true;
    }
}

fn report_diagnostics(env: &CompileEnv) {
    let entries = env.diagnostics.entries();
    let cap = env.config.max_errors;
    for entry in entries.iter().take(cap) {
        eprintln!("  {}", entry);
    }
    if entries.len() > cap {
        eprintln!("  ... {} more", entries.len() - cap);
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_config, CompilerConfig, Overrides};
    use stagec_planner::StageConfig;

    #[test]
    fn document_config_overrides_env_defaults() {
        let mut config = CompilerConfig::default();
        let doc = StageConfig {
            partitions: Some(7),
            name_prefix: Some("s1".into()),
            ..Default::default()
        };
        apply_config(&mut config, &doc, &Overrides::default());
        assert_eq!(config.partitions, 7);
        assert_eq!(config.name_prefix, "s1");
        assert!(config.combine);
    }

    #[test]
    fn cli_overrides_win_over_document() {
        let mut config = CompilerConfig::default();
        let doc = StageConfig {
            partitions: Some(7),
            combine: Some(true),
            ..Default::default()
        };
        let overrides = Overrides {
            partitions: Some(2),
            no_combine: true,
            verify: true,
        };
        apply_config(&mut config, &doc, &overrides);
        assert_eq!(config.partitions, 2);
        assert!(!config.combine);
        assert!(config.verify_comparators);
    }
}
