//! Binary entrypoint for the Roster CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and create the database with the canonical world
//! - `serve [--bind <addr>]` - run the web server
//! - `add-user <name>` - register a player account (password prompted twice)
//! - `seed [--file <path>]` - seed the canonical world and optionally a JSON seed file
//! - `status` - print record counts as JSON
//!
//! See the library crate docs for module-level details: `roster::`.
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use roster::config::Config;
use roster::game::{apply_seed, load_seed_file, GameStore, GameStoreBuilder};
use roster::web::WebServer;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Character roster and inventory manager for a browser-based text game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init,
    /// Run the web server
    Serve {
        /// Address to listen on, overriding server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Register a player account
    AddUser {
        /// Username for the new account
        username: String,
    },
    /// Seed the world, optionally loading extra records from a JSON file
    Seed {
        /// JSON seed file with locations, species, genders, NPCs and items
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show record counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(None, cli.verbose);
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                warn!("{} already exists; leaving it untouched", cli.config);
            } else {
                Config::create_default(&cli.config).await?;
                info!("Configuration file created at {}", cli.config);
            }
            let config = Config::load(&cli.config).await?;
            let store = open_store(&config)?;
            let stats = store.statistics()?;
            info!(
                "Database ready at {} ({} locations)",
                config.storage.database_path().display(),
                stats.locations
            );
        }
        Commands::Serve { bind } => {
            let mut config = Config::load(&cli.config).await?;
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            init_logging(Some(&config), cli.verbose);
            info!("Starting Roster v{}", env!("CARGO_PKG_VERSION"));
            let server = WebServer::new(config)?;
            server.run().await?;
        }
        Commands::AddUser { username } => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            let store = open_store(&config)?;
            println!("Creating account '{}'.", username);
            // Prompt twice without echo
            let pass1 = rpassword::prompt_password("Password: ")?;
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                println!("Error: passwords do not match.");
                return Ok(());
            }
            match store.accounts().register_user(&username, &pass1) {
                Ok(user) => {
                    info!(target: "security", "Account {} created from the command line", user.username);
                    println!("Account '{}' created.", user.username);
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        Commands::Seed { file } => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            let store = open_store(&config)?;
            let mut written = store.seed_world_if_needed()?;
            if let Some(path) = file {
                let seed = load_seed_file(&path)?;
                written += apply_seed(&store, seed)?;
                info!("Applied seed file {}", path.display());
            }
            println!("Seeded {} records.", written);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(Some(&config), cli.verbose);
            let store = open_store(&config)?;
            let stats = store.statistics()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<GameStore> {
    let path = config.storage.database_path();
    GameStoreBuilder::new(&path)
        .with_argon2_params(config.security.argon2_params()?)
        .open()
        .with_context(|| format!("Failed to open store at {}", path.display()))
}

fn base_level(config: Option<&Config>, verbosity: u8) -> Result<log::LevelFilter> {
    match verbosity {
        0 => match config {
            Some(cfg) => cfg
                .logging
                .level
                .parse()
                .map_err(|_| anyhow!("Unknown log level '{}'", cfg.logging.level)),
            None => Ok(log::LevelFilter::Info),
        },
        1 => Ok(log::LevelFilter::Debug),
        _ => Ok(log::LevelFilter::Trace),
    }
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let level = base_level(config, verbosity).unwrap_or(log::LevelFilter::Info);
    builder.filter_level(level);

    let log_file = config
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    let security_path = config.and_then(|cfg| cfg.logging.security_file.clone());

    match log_file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Only echo to the console when someone is watching it
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if record.target() == "security" {
                    append_security_line(security_path.as_deref(), &line);
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if record.target() == "security" {
                    append_security_line(security_path.as_deref(), &line);
                }
                writeln!(fmt, "{}", line)
            });
        }
    }
    let _ = builder.try_init();
}

/// Copy a security-target line into the dedicated audit file, if configured.
fn append_security_line(path: Option<&str>, line: &str) {
    use std::io::Write;
    let Some(path) = path else {
        return;
    };
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        let _ = writeln!(file, "{}", line);
    }
}
