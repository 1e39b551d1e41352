//! Mentor - personal language-learning companion
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use mentor::cli::{
    ConfigCommand, ConfigOptions, DeviceCommand, DeviceOptions, PlayCommand, UsersCommand,
    UsersOptions,
};
use mentor::config::{mentor_home, Config};
use mentor::core::ModerationGate;
use mentor::error::exit_codes;
use mentor::provider::facade_from_config;
use mentor::{App, FileStore, RecordStore};

// =============================================================================
// CLI Definition
// =============================================================================

/// Mentor - personal language-learning companion
#[derive(Parser)]
#[command(name = "mentor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive learning session
    Play {
        /// Use the built-in offline provider instead of the configured one
        #[arg(long)]
        offline: bool,
        /// Seed for account codes and quiz repetition (for reproducible runs)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List accounts stored on this device
    Users {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Maximum number of accounts
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show this device's moderation state
    Device {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Write the default config to ~/.mentor/config.toml
        #[arg(long)]
        init: bool,
        /// Overwrite an existing config file with --init
        #[arg(long)]
        force: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    setup_logging();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mentor error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Log to stderr, filtered by `MENTOR_LOG` (default `warn`).
fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MENTOR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.mentor/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("mentor panic: {}", info);

        if let Some(home) = mentor_home() {
            let _ = std::fs::create_dir_all(&home);
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::Play { offline, seed } => run_play(config, offline, seed),
        Commands::Users { json, quiet, limit } => run_users(config, json, quiet, limit),
        Commands::Device { json, quiet } => run_device(config, json, quiet),
        Commands::Config {
            json,
            quiet,
            init,
            force,
        } => run_config(config, json, quiet, init, force),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn open_records(config: &Config) -> mentor::Result<RecordStore<FileStore>> {
    RecordStore::open(FileStore::new()?, config.storage.id_space)
}

fn run_play(
    config: Config,
    offline: bool,
    seed: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut records = open_records(&config)?;
    if let Some(seed) = seed {
        records = records.with_seed(seed);
    }
    let facade = facade_from_config(&config.provider, offline)?;
    tracing::info!("Using {} provider", facade.provider_name());

    let mut app = App::new(records, facade, config)?;
    if let Some(seed) = seed {
        app = app.with_seed(seed);
    }

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    PlayCommand::new(app).run(&mut input, &mut output)?;
    Ok(ExitCode::from(exit_codes::SUCCESS as u8))
}

fn run_users(
    config: Config,
    json: bool,
    quiet: bool,
    limit: Option<usize>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let records = open_records(&config)?;
    let command = UsersCommand::new(&records);
    let options = UsersOptions { json, quiet, limit };

    let output = command.run(&options);
    let formatted = command.format_output(&output, &options);
    if !formatted.is_empty() {
        print!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}

fn run_device(
    config: Config,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let records = open_records(&config)?;
    let command = DeviceCommand::new(&records, ModerationGate::from_config(&config.moderation));
    let options = DeviceOptions { json, quiet };

    let output = command.run();
    let formatted = command.format_output(&output, &options);
    if !formatted.is_empty() {
        print!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}

fn run_config(
    config: Config,
    json: bool,
    quiet: bool,
    init: bool,
    force: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let command = ConfigCommand::new(config);
    let options = ConfigOptions {
        json,
        quiet,
        init,
        force,
    };

    let output = command.run(&options);
    let formatted = command.format_output(&output, &options);
    if !formatted.is_empty() {
        print!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}
