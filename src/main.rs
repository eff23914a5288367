use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use gitosis_keys::cli;
use gitosis_keys::config::{ServeCommand, Settings};
use gitosis_keys::Result;

#[derive(Parser)]
#[command(name = "gitosis-keys")]
#[command(version)]
#[command(about = "Regenerate a restricted SSH authorized_keys file from a key directory", long_about = None)]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log per-key details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite authorized_keys from the key directory
    Sync {
        /// Directory of <username>.pub files
        #[arg(long, value_name = "DIR")]
        keydir: Option<PathBuf>,

        /// authorized_keys file to rewrite (default: ~/.ssh/authorized_keys)
        #[arg(long, value_name = "FILE")]
        authorized_keys: Option<PathBuf>,

        /// Program named in the forced command (default: gitosis-serve)
        #[arg(long, value_name = "PROGRAM", value_parser = parse_serve_command)]
        serve_command: Option<ServeCommand>,

        /// Print the new file instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse one key line and show how it would be handled
    Check {
        /// Also print the restricted line generated for this user
        #[arg(long)]
        user: Option<String>,

        /// Program named in the forced command (default: gitosis-serve)
        #[arg(long, value_name = "PROGRAM", value_parser = parse_serve_command)]
        serve_command: Option<ServeCommand>,

        /// Key line (read from stdin when omitted)
        line: Option<String>,
    },

    /// Print the username taken from a public key's comment
    Whois {
        /// Key line (read from stdin when omitted)
        line: Option<String>,
    },
}

fn parse_serve_command(program: &str) -> std::result::Result<ServeCommand, String> {
    ServeCommand::new(program).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Sync {
            keydir,
            authorized_keys,
            serve_command,
            dry_run,
        } => cli::sync::run(
            config,
            Settings {
                keydir,
                authorized_keys,
                serve_command,
            },
            dry_run,
        ),
        Commands::Check {
            user,
            serve_command,
            line,
        } => cli::check::run(config, serve_command, user, line),
        Commands::Whois { line } => cli::whois::run(line),
    }
}
