//! usermig command line interface
//!
//! Migrates users from a New Relic password auth domain to another
//! (typically SAML/SSO) auth domain, driven by a TSV roster.
//!
//! # Usage
//!
//! ```bash
//! # Validate the roster only
//! usermig --dryrun -c config.yml
//!
//! # Full migration (users, groups, memberships, role grants)
//! usermig -c config.yml
//!
//! # Add existing users to the roster's groups
//! usermig --just-add-to-group
//!
//! # Print the source domain's users as a roster
//! usermig --dump-users > users.tsv
//! ```
//!
//! Exit status: 0 on success, 1 when there is nothing to do (no valid rows,
//! or a boilerplate config was just written), 2 on any other failure, 255
//! when interrupted.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use usermig::config::{write_sample_config, UserMigConfig, API_KEY_ENV, DEFAULT_CONFIG_FILE};
use usermig::error::{ConfigError, MigrationError};
use usermig::migration::{Migrator, RunMode, RunOptions, RunReport};
use usermig::nerdgraph::HttpTransport;
use usermig::roster;

const EXIT_NOTHING_TO_DO: u8 = 1;
const EXIT_FAILURE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 255;

#[derive(Parser)]
#[command(name = "usermig")]
#[command(version)]
#[command(about = "Migrate users from one New Relic auth domain to another")]
#[command(
    long_about = "Migrate users from a New Relic password auth domain onto a SAML/SSO domain.\n\n\
Assumptions:\n  \
(a) The new domain has already been created and has no users in it\n  \
(b) The list of users has been pre-vetted and complies with the roster format"
)]
#[command(group(ArgGroup::new("mode").multiple(false)))]
struct Cli {
    /// Enable debugging
    #[arg(long, short = 'd', group = "mode")]
    debug: bool,

    /// Don't log
    #[arg(long, short = 's', group = "mode")]
    silent: bool,

    /// Dump users in the format the roster expects
    #[arg(long = "dump-users", short = 'u', group = "mode")]
    dump_users: bool,

    /// Just add users to the roster's groups
    #[arg(long = "just-add-to-group", short = 'j', group = "mode")]
    just_add_to_group: bool,

    /// Just parse and validate the roster
    #[arg(long = "dryrun", short = 'r', group = "mode")]
    dryrun: bool,

    /// Configuration file (written with boilerplate if it does not exist)
    #[arg(long = "config", short = 'c', default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.dump_users {
            RunMode::DumpUsers
        } else if self.just_add_to_group {
            RunMode::AddToGroup
        } else {
            RunMode::Migrate
        }
    }
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match load_or_bootstrap(&cli.config) {
        Ok(Some(config)) => config,
        Ok(None) => return ExitCode::from(EXIT_NOTHING_TO_DO),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let Err(e) = init_logging(&cli, &config) {
        eprintln!("{}: {}", "error".red().bold(), e);
        return ExitCode::from(EXIT_FAILURE);
    }

    info!("Starting {} ...", config.name);

    tokio::select! {
        result = run(&cli, &config) => match result {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                if cli.silent {
                    eprintln!("{}: {:#}", "error".red().bold(), e);
                }
                match e.downcast_ref::<MigrationError>() {
                    Some(MigrationError::NoValidRows) => ExitCode::from(EXIT_NOTHING_TO_DO),
                    _ => ExitCode::from(EXIT_FAILURE),
                }
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Manually interrupted execution");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

/// Load the config, or write a boilerplate one and return `None`.
fn load_or_bootstrap(path: &Path) -> Result<Option<UserMigConfig>> {
    if path.exists() {
        return UserMigConfig::load(path)
            .map(Some)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    match write_sample_config(path) {
        Ok(()) => {
            eprintln!("Boilerplate configuration created at {}", path.display());
            Ok(None)
        }
        Err(ConfigError::AlreadyExists { .. }) => {
            eprintln!("Refusing to over-write an existing file!");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Configure logging. The config's `loglevel` overrides `--debug`; a DEBUG
/// level from the config also cancels `--silent`. `RUST_LOG` wins over both.
fn init_logging(cli: &Cli, config: &UserMigConfig) -> Result<()> {
    let mut level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let mut silent = cli.silent;

    if let Some(configured) = config.log_level()? {
        level = configured;
        if level == Level::DEBUG {
            silent = false;
        }
    }

    if silent {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,usermig={}", level.as_str().to_lowercase())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Ok(())
}

async fn run(cli: &Cli, config: &UserMigConfig) -> Result<RunReport> {
    let settings = config.settings(std::env::var(API_KEY_ENV).ok())?;
    let transport = HttpTransport::with_options(config.endpoint(), config.timeout())?;
    let options = RunOptions {
        dry_run: cli.dryrun,
        mode: cli.mode(),
        confirm_delay: config.confirm_delay(),
    };
    let mut migrator = Migrator::new(transport, settings, options);

    if cli.mode() == RunMode::DumpUsers {
        let mut stdout = std::io::stdout();
        return Ok(migrator.dump_users(&mut stdout).await?);
    }

    let roster_path = config.roster_path()?;
    info!("Parsing data from {}...", roster_path.display());
    let roster = roster::parse_file(roster_path)?;

    Ok(migrator.run(&roster.records).await?)
}
