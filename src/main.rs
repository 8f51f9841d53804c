use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use aws_guardrail::runtime::{identity_strategies, region_strategies};
use aws_guardrail::{
    ConfigLoader, Guard, GuardSettings, PolicyStore, StrategyOutcome, ValidationMode, resolve,
    shell,
};

#[derive(Parser)]
#[command(name = "aws-guardrail")]
#[command(version)]
#[command(about = "Validate and run AWS CLI commands under a security policy", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Policy override document (TOML or JSON); defaults to AWS_GUARDRAIL_SECURITY_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Validation mode (strict, permissive); defaults to AWS_GUARDRAIL_SECURITY_MODE
    #[arg(long, global = true)]
    mode: Option<ValidationMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a command without running it
    Check {
        /// The command or pipeline to check
        command: String,
    },
    /// Validate and run a command
    Run {
        /// The command or pipeline to run
        command: String,

        /// Per-step timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how a command splits into pipe segments
    Split {
        /// The command line to split
        command: String,
    },
    /// Load the policy and print a summary
    Policy,
    /// List available regions
    Regions,
    /// Show the identity the CLI runs as
    Whoami,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive("info".parse().expect("valid log directive"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_guard(cli: &Cli) -> Guard {
    let mut settings = GuardSettings::from_env();
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    if let Some(path) = &cli.config {
        settings.policy_path = Some(path.clone());
    }
    let store = Arc::new(PolicyStore::new(ConfigLoader::new(
        settings.policy_path.clone(),
    )));
    Guard::new(store, settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Check { command } => {
            let guard = build_guard(&cli);
            match guard.prepare(command) {
                Ok(steps) => {
                    println!("allowed ({} step(s))", steps.len());
                    for step in steps {
                        println!("  [{}] {}", step.index(), step.argv().join(" "));
                    }
                }
                Err(e) => {
                    eprintln!("rejected: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Run {
            command,
            timeout,
            json,
        } => {
            let guard = build_guard(&cli);
            let timeout = timeout.map(Duration::from_secs);
            let result = match guard.execute(command, timeout).await {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("rejected: {}", e);
                    std::process::exit(1);
                }
            };

            if *json {
                let rendered =
                    serde_json::to_string_pretty(&result).context("failed to render result")?;
                println!("{}", rendered);
            } else if result.is_success() {
                print!("{}", result.output);
            } else {
                eprintln!("{}", result.output);
            }

            if !result.is_success() {
                error!(state = %result.state(), "command did not succeed");
                std::process::exit(1);
            }
        }
        Commands::Split { command } => {
            for segment in shell::split(command) {
                println!("{}", segment);
            }
        }
        Commands::Policy => {
            let loader = ConfigLoader::new(
                cli.config
                    .clone()
                    .or_else(|| GuardSettings::from_env().policy_path),
            );
            let policy = loader
                .try_load()
                .context("failed to load policy document")?;
            let summary = serde_json::to_string_pretty(&policy.summary())
                .context("failed to render policy summary")?;
            println!("{}", summary);
        }
        Commands::Regions | Commands::Whoami => {
            let guard = build_guard(&cli);
            let strategies = match cli.command {
                Commands::Regions => region_strategies(),
                _ => identity_strategies(),
            };
            match resolve(&guard, &strategies, guard.default_timeout()).await {
                StrategyOutcome::Resolved { value, .. } => {
                    for item in value.split_whitespace() {
                        println!("{}", item);
                    }
                }
                StrategyOutcome::Exhausted { attempts } => {
                    for attempt in attempts {
                        eprintln!("{:?}: {}", attempt.strategy, attempt.failure);
                    }
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
