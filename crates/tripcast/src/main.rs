//! Tripcast - flight, hotel and weather planning for a trip

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, plan_command, serve_command, status_command};

/// Tripcast - AI trip planner
#[derive(Parser)]
#[command(name = "tripcast")]
#[command(about = "Plan a trip's flight, hotel and current weather with one request")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config
    Init,
    /// Start the HTTP server
    Serve {
        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Plan one trip and print the response
    Plan(PlanArgs),
    /// Show configuration status
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Destination city
    #[arg(short, long)]
    pub destination: String,
    /// City you are flying from
    #[arg(short, long)]
    pub from: String,
    /// Departure date (YYYY-MM-DD)
    #[arg(long)]
    pub depart: String,
    /// Return date (YYYY-MM-DD)
    #[arg(long = "return")]
    pub return_date: String,
    /// Total budget in USD
    #[arg(short, long)]
    pub budget: f64,
    /// Number of travelers
    #[arg(short, long, default_value_t = 1)]
    pub travelers: u32,
    /// Kind of trip, e.g. leisure or business
    #[arg(long, default_value = "leisure")]
    pub trip_type: String,
    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(
        cli.command,
        Commands::Serve { verbose: true } | Commands::Plan(PlanArgs { verbose: true, .. })
    );
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            if let Err(e) = init_command().await {
                error!("Init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Serve { verbose: _ } => {
            if let Err(e) = serve_command().await {
                error!("Serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Plan(args) => {
            if let Err(e) = plan_command(args).await {
                error!("Plan failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Status => {
            if let Err(e) = status_command().await {
                error!("Status failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
