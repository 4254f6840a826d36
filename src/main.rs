use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use attack_lab::config::{LabConfig, SimulationConfig};
use attack_lab::dashboard::{run_dashboard, DashboardState};
use attack_lab::gate::{
    looks_like_safe_script_payload, safe_parse, sanitize_markup, target_rule,
};
use attack_lab::orchestrator::{BroadcastNotifier, Orchestrator};
use attack_lab::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "attack-lab")]
#[command(version)]
#[command(about = "Sandbox that gates, simulates and records XSS/SSRF attack jobs")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the attack lab API server
    Serve(ServeArgs),

    /// Run an input through the admission gate without submitting it
    Check {
        /// Output format
        #[arg(long, short = 'o', default_value = "table", global = true)]
        output: OutputFormat,

        #[command(subcommand)]
        command: CheckCommands,
    },

    /// HTML-escape text the way the gate does
    Sanitize {
        /// Text to escape
        text: String,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Deadline for a single evaluator call, in milliseconds
    #[arg(long, default_value = "10000")]
    deadline_ms: u64,

    /// Maximum number of job records kept in memory (unbounded when omitted)
    #[arg(long)]
    capacity: Option<usize>,

    /// Multiplier for simulated attack latency (0 makes simulations instant)
    #[arg(long, default_value = "1.0")]
    latency_scale: f64,

    /// Allowed CORS origin (any origin when omitted)
    #[arg(long)]
    cors_origin: Option<String>,
}

// =============================================================================
// Check Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum CheckCommands {
    /// Decide whether a target URL would be admitted
    Url {
        /// The target URL
        url: String,
    },
    /// Run the script-payload heuristic
    Payload {
        /// The payload text
        payload: String,
    },
    /// Parse JSON text with the size and nesting limits applied
    Json {
        /// The JSON text
        text: String,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct UrlCheckOutput {
    url: String,
    allowed: bool,
    rule: String,
}

#[derive(Serialize)]
struct PayloadCheckOutput {
    safe: bool,
    sanitized: String,
}

#[derive(Serialize)]
struct JsonCheckOutput {
    accepted: bool,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    let mut config = LabConfig::new(listen_addr)
        .with_deadline(Duration::from_millis(args.deadline_ms))
        .with_simulation(SimulationConfig::default().scaled(args.latency_scale));
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if let Some(origin) = args.cors_origin {
        config = config.with_cors_origin(origin);
    }

    tracing::info!(
        addr = %config.listen_addr,
        deadline_ms = args.deadline_ms,
        capacity = ?config.store_capacity,
        "Starting attack lab"
    );

    let events = BroadcastNotifier::new(config.event_buffer);
    let orchestrator = Orchestrator::from_config(&config, Arc::new(events.clone()));
    let state = DashboardState {
        orchestrator,
        events,
    };

    let shutdown = install_shutdown_handler()?;
    run_dashboard(&config, state, shutdown).await?;

    tracing::info!("Attack lab stopped");
    Ok(())
}

// =============================================================================
// Check Implementation
// =============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_check(output: OutputFormat, command: CheckCommands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CheckCommands::Url { url } => {
            let rule = target_rule(&url);
            let result = UrlCheckOutput {
                url,
                allowed: rule.allows(),
                rule: rule.to_string(),
            };
            match output {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => {
                    println!("URL:     {}", result.url);
                    println!("Allowed: {}", result.allowed);
                    println!("Rule:    {}", result.rule);
                }
            }
        }
        CheckCommands::Payload { payload } => {
            let result = PayloadCheckOutput {
                safe: looks_like_safe_script_payload(&payload),
                sanitized: sanitize_markup(&payload),
            };
            match output {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => {
                    println!("Safe:      {}", result.safe);
                    println!("Sanitized: {}", result.sanitized);
                }
            }
        }
        CheckCommands::Json { text } => {
            let result = JsonCheckOutput {
                accepted: safe_parse(&text).is_some(),
            };
            match output {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => println!("Accepted: {}", result.accepted),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve(serve_args) => run_server(serve_args).await,
        Commands::Check { output, command } => run_check(output, command),
        Commands::Sanitize { text } => {
            println!("{}", sanitize_markup(&text));
            Ok(())
        }
    }
}
