use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dirvana::Shell;

mod cli;

#[derive(Parser)]
#[command(name = "dirvana")]
#[command(about = "Per-directory shell aliases, functions and environment")]
#[command(version)]
struct Cli {
    /// Enable verbose logging (stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print shell code for the current directory (run from the prompt hook)
    Export {
        #[arg(long, value_enum)]
        shell: Shell,

        /// Previous directory (defaults to $DIRVANA_PREV_DIR)
        #[arg(long)]
        prev: Option<PathBuf>,

        /// Approve new shell commands without prompting
        #[arg(short, long)]
        yes: bool,
    },

    /// Trust a directory's config (defaults to current directory)
    Allow { dir: Option<PathBuf> },

    /// Stop trusting a directory's config
    Revoke { dir: Option<PathBuf> },

    /// List trusted directories
    List,

    /// Show which configs are active for a directory
    Status { dir: Option<PathBuf> },

    /// Clear cached results for a directory tree, or everything with --all
    Clean {
        dir: Option<PathBuf>,

        #[arg(long)]
        all: bool,
    },

    /// Run an alias, evaluating its condition first
    Exec {
        name: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the prompt hook for a shell
    Hook {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Create a commented .dirvana.yml in the current directory
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout is evaluated by the shell, so logs go to stderr
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Export { shell, prev, yes } => {
            cli::export::export_command(shell, prev, yes)?;
        }
        Commands::Allow { dir } => {
            cli::allow::allow_command(dir)?;
        }
        Commands::Revoke { dir } => {
            cli::allow::revoke_command(dir)?;
        }
        Commands::List => {
            cli::allow::list_command()?;
        }
        Commands::Status { dir } => {
            cli::status::status_command(dir)?;
        }
        Commands::Clean { dir, all } => {
            cli::status::clean_command(dir, all)?;
        }
        Commands::Exec { name, args } => {
            let code = cli::exec::exec_command(&name, &args)?;
            std::process::exit(code);
        }
        Commands::Hook { shell } => {
            print!("{}", dirvana::render::hook(shell));
        }
        Commands::Init { force } => {
            cli::init::init_command(force)?;
        }
    }

    Ok(())
}
