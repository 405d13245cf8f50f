//! # Community Connect
//!
//! Registry server for volunteers, community organisations, skills and
//! events, backed by a single SQLite file.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default settings (connect.db, port 3000)
//! community-connect
//!
//! # Fresh database loaded with the sample data
//! community-connect --db demo.db --seed
//!
//! # In-memory mode (for testing)
//! community-connect --memory --seed
//! ```
//!
//! ## API Usage
//!
//! ```bash
//! # Volunteers holding a first aid skill, most proficient first
//! curl "http://localhost:3000/v1/volunteers/search?skill=first%20aid"
//!
//! # Register a volunteer for an event
//! curl -X POST http://localhost:3000/v1/events/6/registrations \
//!   -H "Content-Type: application/json" \
//!   -d '{"volunteer_id": 3}'
//! ```

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use community_connect::api::{create_router, AppState};
use community_connect::db::{CapacityPolicy, ConnectStore};
use community_connect::seed;

/// CLI arguments
struct Args {
    /// Database file path
    db_path: String,
    /// Server port
    port: u16,
    /// Use in-memory database
    in_memory: bool,
    /// Host to bind to
    host: String,
    /// Drop and recreate the schema on start
    init: bool,
    /// Drop, recreate and load the sample data on start
    seed: bool,
    /// Cancelled registrations free their place
    exclude_cancelled: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            db_path: "connect.db".to_string(),
            port: 3000,
            in_memory: false,
            host: "0.0.0.0".to_string(),
            init: false,
            seed: false,
            exclude_cancelled: false,
        }
    }
}

impl Args {
    fn from_env() -> Self {
        let mut args = Args::default();
        let env_args: Vec<String> = env::args().collect();
        let mut i = 1;

        while i < env_args.len() {
            match env_args[i].as_str() {
                "--db" | "-d" => {
                    if i + 1 < env_args.len() {
                        args.db_path = env_args[i + 1].clone();
                        i += 1;
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < env_args.len() {
                        args.port = env_args[i + 1].parse().unwrap_or(3000);
                        i += 1;
                    }
                }
                "--host" | "-h" => {
                    if i + 1 < env_args.len() {
                        args.host = env_args[i + 1].clone();
                        i += 1;
                    }
                }
                "--memory" | "-m" => {
                    args.in_memory = true;
                }
                "--init" => {
                    args.init = true;
                }
                "--seed" => {
                    args.seed = true;
                }
                "--exclude-cancelled" => {
                    args.exclude_cancelled = true;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Ignoring unknown argument: {}", other);
                }
            }
            i += 1;
        }

        // Environment variable overrides
        if let Ok(port) = env::var("CONNECT_PORT") {
            args.port = port.parse().unwrap_or(args.port);
        }
        if let Ok(db) = env::var("CONNECT_DB_PATH") {
            args.db_path = db;
        }
        if let Ok(host) = env::var("CONNECT_HOST") {
            args.host = host;
        }
        if env::var("CONNECT_MEMORY").is_ok() {
            args.in_memory = true;
        }
        if env::var("CONNECT_EXCLUDE_CANCELLED").is_ok() {
            args.exclude_cancelled = true;
        }

        args
    }

    fn capacity_policy(&self) -> CapacityPolicy {
        if self.exclude_cancelled {
            CapacityPolicy::ExcludeCancelled
        } else {
            CapacityPolicy::CountAll
        }
    }
}

fn print_help() {
    println!(
        r#"
Community Connect - volunteer and event registry

USAGE:
    community-connect [OPTIONS]

OPTIONS:
    -d, --db <PATH>        Database file path [default: connect.db]
    -p, --port <PORT>      Server port [default: 3000]
    -h, --host <HOST>      Host to bind to [default: 0.0.0.0]
    -m, --memory           Use in-memory database
        --init             Drop and recreate all tables
        --seed             Drop, recreate and load the sample data
        --exclude-cancelled
                           Cancelled registrations do not count against capacity
        --help             Print this help message

ENVIRONMENT VARIABLES:
    CONNECT_PORT               Server port
    CONNECT_DB_PATH            Database file path
    CONNECT_HOST               Host to bind to
    CONNECT_MEMORY             Set to use in-memory database
    CONNECT_EXCLUDE_CANCELLED  Set to exclude cancelled registrations from capacity

API ENDPOINTS:
    GET|POST   /v1/volunteers                     List / register volunteers
    GET        /v1/volunteers/search?skill=       Search by skill
    GET|DELETE /v1/volunteers/:id                 Fetch / remove a volunteer
    PUT        /v1/volunteers/:id/contact         Update phone and address
    POST       /v1/volunteers/:id/skills          Add a skill
    GET|POST   /v1/organisations                  List / create organisations
    GET        /v1/organisations/:id/volunteers   Volunteers across an organisation's events
    GET|POST   /v1/skills                         List / create skills
    GET|POST   /v1/events                         List / create events
    POST       /v1/events/:id/registrations       Register for an event
    PUT        /v1/registrations/:vid/:eid        Set attendance
    GET        /v1/reports/event-statistics       Registrations per event
    GET        /v1/reports/skills                 Skill distribution
    GET        /v1/reports/organisations          Organisation summary
    GET        /v1/reports/directory              Volunteer directory
    GET        /health                            Health check
"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let args = Args::from_env();
    let policy = args.capacity_policy();

    let store = if args.in_memory {
        info!("Using in-memory database");
        ConnectStore::in_memory().await?
    } else {
        info!("Using database file: {}", args.db_path);
        ConnectStore::new(&args.db_path).await?
    };
    let store = Arc::new(store.with_capacity_policy(policy));
    if policy == CapacityPolicy::ExcludeCancelled {
        warn!("Cancelled registrations no longer count against event capacity");
    }

    if args.init || args.seed {
        let counts = seed::initialize(&store, args.seed).await?;
        for (table, rows) in counts {
            info!("  {}: {} rows", table, rows);
        }
    } else {
        seed::ensure_schema(&store).await?;
    }

    let app = create_router(AppState::new(Arc::clone(&store)));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;

    info!("Community Connect listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}
