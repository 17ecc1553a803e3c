//! Prop-firm risk engine - main entry point
//!
//! This binary journals trades against a prop-firm trading plan:
//! - open / close / take: record trades and book their pnl
//! - status: equity, performance metrics, and the risk gate decision
//! - session: forex session clock, optionally ticking
//! - export / reset: trade journal CSV and account reset

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "prop-risk-engine")]
#[command(about = "Prop-firm trading journal with risk limits and session clock", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show equity, performance and trade permission
    Status {
        /// Account identity (e.g. email)
        #[arg(short, long)]
        user: String,

        /// Number of recent trades to list
        #[arg(long, default_value = "5")]
        recent: usize,
    },

    /// Open a position from a signal
    Open {
        #[arg(short, long)]
        user: String,

        /// Instrument, e.g. EURUSD
        #[arg(short, long)]
        pair: String,

        /// buy or sell
        #[arg(short, long)]
        direction: String,

        /// Entry price
        #[arg(long)]
        price: String,

        #[arg(long)]
        stop_loss: Option<String>,

        #[arg(long)]
        take_profit: Option<String>,

        /// Open even if the risk gate blocks new trades
        #[arg(long)]
        force: bool,
    },

    /// Close an open position
    Close {
        #[arg(short, long)]
        user: String,

        /// Trade id
        #[arg(long)]
        id: u64,

        /// win, loss or breakeven
        #[arg(short, long)]
        outcome: String,

        /// Realized pnl; defaults to one unit of risk signed by outcome
        #[arg(long, allow_hyphen_values = true)]
        pnl: Option<String>,
    },

    /// Journal a signal that was already traded (open and close in one step)
    Take {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        pair: String,

        #[arg(short, long)]
        direction: String,

        #[arg(long)]
        price: String,

        #[arg(short, long)]
        outcome: String,

        #[arg(long, allow_hyphen_values = true)]
        pnl: Option<String>,
    },

    /// Show the forex market session clock
    Session {
        /// Display timezone (UTC, UTC+5:30, UTC-5, UTC-8, UTC+1, UTC+9, UTC+10)
        #[arg(short, long)]
        timezone: Option<String>,

        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,

        /// Refresh interval in seconds
        #[arg(long, default_value = "1")]
        interval: u64,
    },

    /// Export the trade journal as CSV
    Export {
        #[arg(short, long)]
        user: String,

        /// Output file
        #[arg(short, long, default_value = "trades.csv")]
        output: PathBuf,
    },

    /// Discard the account state and reseed it from the trading plan
    Reset {
        #[arg(short, long)]
        user: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Status { .. } => "status",
        Commands::Open { .. } => "open",
        Commands::Close { .. } => "close",
        Commands::Take { .. } => "take",
        Commands::Session { .. } => "session",
        Commands::Export { .. } => "export",
        Commands::Reset { .. } => "reset",
    };

    setup_logging(cli.verbose, command_name)?;

    let config = prop_risk_engine::Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Status { user, recent } => commands::account::status(&config, &user, recent),

        Commands::Open {
            user,
            pair,
            direction,
            price,
            stop_loss,
            take_profit,
            force,
        } => commands::trade::open(
            &config,
            &user,
            commands::trade::SignalArgs {
                pair,
                direction,
                price,
                stop_loss,
                take_profit,
            },
            force,
        ),

        Commands::Close {
            user,
            id,
            outcome,
            pnl,
        } => commands::trade::close(&config, &user, id, &outcome, pnl.as_deref()),

        Commands::Take {
            user,
            pair,
            direction,
            price,
            outcome,
            pnl,
        } => commands::trade::take(
            &config,
            &user,
            commands::trade::SignalArgs {
                pair,
                direction,
                price,
                stop_loss: None,
                take_profit: None,
            },
            &outcome,
            pnl.as_deref(),
        ),

        Commands::Session {
            timezone,
            watch,
            interval,
        } => commands::session::run(&config, timezone.as_deref(), watch, interval),

        Commands::Export { user, output } => commands::account::export(&config, &user, &output),

        Commands::Reset { user } => commands::account::reset(&config, &user),
    }
}
