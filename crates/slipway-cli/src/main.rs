mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_STATE_ERROR};
use slipway_core::Engine;
use slipway_provider::{select_platform, PlatformFactory, ProviderSettings};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "slipway",
    version,
    about = "Declarative local environments from dependency-ordered resources"
)]
struct Cli {
    /// Directory holding Slipway state and cluster credentials.
    #[arg(long, default_value = "~/.slipway", global = true)]
    state: String,

    /// Platform backend resources are created on.
    #[arg(long, default_value = "mock", global = true)]
    backend: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and resolve a configuration without touching state or platform.
    Validate {
        /// Configuration file, folder, or blueprint URI.
        #[arg(default_value = ".")]
        config: String,
    },
    /// Show the order resources would be applied in.
    Plan {
        /// Configuration file, folder, or blueprint URI.
        #[arg(default_value = ".")]
        config: String,
    },
    /// Create or converge every resource of a configuration.
    Apply {
        /// Configuration file, folder, or blueprint URI.
        #[arg(default_value = ".")]
        config: String,
        /// Apply independent resources concurrently on this many workers.
        #[arg(long, short = 'j', default_value_t = 1)]
        jobs: usize,
    },
    /// Destroy the recorded resources of a configuration.
    Destroy {
        /// Configuration file, folder, or blueprint URI.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        config: Option<String>,
        /// Destroy everything recorded in the state directory.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// List recorded resources.
    List,
    /// Show the recorded state of one resource.
    Inspect {
        /// Kind-qualified address, e.g. `container.consul`.
        address: String,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SLIPWAY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let state_path = expand_tilde(&cli.state);
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Validate { config } => commands::validate::run(&config, json_output),
        Commands::Plan { config } => open_engine(&state_path, &cli.backend)
            .and_then(|engine| commands::plan::run(&engine, &config, json_output)),
        Commands::Apply { config, jobs } => open_engine(&state_path, &cli.backend)
            .and_then(|engine| commands::apply::run(&engine, &config, jobs, json_output)),
        Commands::Destroy { config, all } => {
            open_engine(&state_path, &cli.backend).and_then(|engine| {
                commands::destroy::run(&engine, config.as_deref(), all, json_output)
            })
        }
        Commands::List => open_engine(&state_path, &cli.backend)
            .and_then(|engine| commands::list::run(&engine, json_output)),
        Commands::Inspect { address } => open_engine(&state_path, &cli.backend)
            .and_then(|engine| commands::inspect::run(&engine, &address, json_output)),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("configuration error:")
        || msg.starts_with("reference error:")
        || msg.starts_with("dependency cycle")
    {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("state error:") || msg.starts_with("state lock:") {
        EXIT_STATE_ERROR
    } else {
        EXIT_FAILURE
    }
}

fn open_engine(state_path: &Path, backend: &str) -> Result<Engine, String> {
    let client = select_platform(backend, state_path).map_err(|e| e.to_string())?;
    let work_dir = std::env::current_dir().map_err(|e| format!("current directory: {e}"))?;
    let factory = PlatformFactory::new(client, ProviderSettings::new(state_path, work_dir));
    Ok(Engine::new(state_path, Box::new(factory)))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(
            exit_code_for("configuration error: failed to parse configuration"),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(
            exit_code_for("reference error: 'container.app' references 'network.x'"),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(
            exit_code_for("dependency cycle involving 'ingress.a'"),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(exit_code_for("state error: state I/O error"), EXIT_STATE_ERROR);
        assert_eq!(exit_code_for("state lock: would block"), EXIT_STATE_ERROR);
        assert_eq!(exit_code_for("provider error on 'network.a'"), EXIT_FAILURE);
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/state"), PathBuf::from("/tmp/state"));
        assert_eq!(expand_tilde("relative"), PathBuf::from("relative"));
    }

    #[test]
    fn cli_parses_destroy_all() {
        let cli = Cli::try_parse_from(["slipway", "destroy", "--all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Destroy {
                config: None,
                all: true
            }
        ));
    }

    #[test]
    fn cli_requires_destroy_target() {
        assert!(Cli::try_parse_from(["slipway", "destroy"]).is_err());
    }

    #[test]
    fn cli_apply_jobs() {
        let cli = Cli::try_parse_from(["slipway", "apply", "stack", "--jobs", "4"]).unwrap();
        match cli.command {
            Commands::Apply { config, jobs } => {
                assert_eq!(config, "stack");
                assert_eq!(jobs, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
