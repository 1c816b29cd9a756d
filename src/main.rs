#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # needle
//!
//! Command-line front end for the needle tunnel dashboard's data layer.
//!
//! Every subcommand builds a [`Dashboard`] from config, runs one store
//! operation and prints the resulting state. A store failure is printed to
//! stderr with a non-zero exit.
//!
//! ## Subcommands
//!
//! | Command                      | Route guarded | Store call                         |
//! |------------------------------|---------------|------------------------------------|
//! | `status`                     | no            | `GET /health`, credential presence |
//! | `login`, `register`          | no            | `AuthStore::login` / `register`    |
//! | `logout`                     | no            | `AuthStore::logout`                |
//! | `tunnels list/create/delete` | `/tunnels`    | `TunnelsStore`                     |
//! | `requests <id>`              | inspector     | `InspectorStore::fetch_requests`   |
//! | `analytics <id>`             | analytics     | `AnalyticsStore::fetch_tunnel_stats` |
//! | `summary`                    | `/`           | `AnalyticsStore::fetch_summary`    |
//! | `keys list/create/delete`    | `/settings`   | `ApiKeysStore`                     |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use needle_client::config::Config;
use needle_client::stores::{analytics, inspector};
use needle_client::types::CreateTunnelRequest;
use needle_client::{Dashboard, Route};

/// Client for the needle tunnel service.
#[derive(Parser)]
#[command(name = "needle", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the service and show whether a credential is held.
    Status,
    /// Sign in and persist the session credential.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "NEEDLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "NEEDLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the session credential.
    Logout,
    /// Manage tunnels.
    Tunnels {
        #[command(subcommand)]
        command: TunnelCommands,
    },
    /// Show recent requests through a tunnel.
    Requests {
        tunnel_id: String,
        #[arg(long, default_value_t = inspector::DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Show per-day traffic for a tunnel.
    Analytics {
        tunnel_id: String,
        #[arg(long, default_value_t = analytics::DEFAULT_DAYS)]
        days: u32,
    },
    /// Show seven-day totals across all tunnels.
    Summary,
    /// Manage API keys.
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum TunnelCommands {
    /// List tunnels.
    List {
        /// Only tunnels currently marked active.
        #[arg(long)]
        active: bool,
    },
    /// Create a tunnel to a local port.
    Create {
        #[arg(long)]
        port: u16,
        #[arg(long)]
        subdomain: Option<String>,
        #[arg(long)]
        protocol: Option<String>,
        #[arg(long)]
        persistent: bool,
    },
    /// Delete a tunnel by subdomain.
    Delete { subdomain: String },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// List API keys.
    List,
    /// Create an API key. The key is printed once.
    Create { name: String },
    /// Delete an API key by id.
    Delete { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();
    debug!(base_url = %config.api.base_url, "configuration loaded");

    let dash = Dashboard::from_config(&config)?;

    match cli.command {
        Commands::Status => status(&dash).await,
        Commands::Login { email, password } => {
            let user = dash
                .auth
                .login(&email, &password)
                .await
                .map_err(|e| anyhow::anyhow!(store_error(dash.auth.error(), &e.to_string())))?;
            println!("logged in as {} <{}> ({})", user.username, user.email, user.tier);
            Ok(())
        }
        Commands::Register {
            email,
            username,
            password,
        } => {
            let user = dash
                .auth
                .register(&email, &username, &password)
                .await
                .map_err(|e| anyhow::anyhow!(store_error(dash.auth.error(), &e.to_string())))?;
            println!("registered {} <{}>", user.username, user.email);
            Ok(())
        }
        Commands::Logout => {
            dash.auth.logout();
            println!("logged out");
            Ok(())
        }
        Commands::Tunnels { command } => {
            guard(&dash, Route::Tunnels)?;
            tunnels(&dash, command).await
        }
        Commands::Requests { tunnel_id, limit } => {
            guard(
                &dash,
                Route::Inspector {
                    tunnel_id: tunnel_id.clone(),
                },
            )?;
            dash.inspector.fetch_requests(&tunnel_id, limit).await;
            check(dash.inspector.error())?;
            let requests = dash.inspector.requests();
            if requests.is_empty() {
                println!("no requests recorded");
            }
            for r in requests {
                println!(
                    "{}  {:<7} {:<40} {}  {}ms",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.method,
                    r.path,
                    r.status_code,
                    r.latency_ms
                );
            }
            Ok(())
        }
        Commands::Analytics { tunnel_id, days } => {
            guard(
                &dash,
                Route::Analytics {
                    tunnel_id: tunnel_id.clone(),
                },
            )?;
            dash.analytics.fetch_tunnel_stats(&tunnel_id, days).await;
            check(dash.analytics.error())?;
            for d in dash.analytics.daily_stats() {
                println!(
                    "{}  requests={} in={}B out={}B avg={}ms errors={} ips={}",
                    d.date,
                    d.total_requests,
                    d.total_bytes_in,
                    d.total_bytes_out,
                    d.avg_latency_ms,
                    d.error_count,
                    d.unique_ips
                );
            }
            Ok(())
        }
        Commands::Summary => {
            guard(&dash, Route::Dashboard)?;
            dash.analytics.fetch_summary().await;
            check(dash.analytics.error())?;
            match dash.analytics.summary() {
                Some(s) => println!(
                    "tunnels={} requests_7d={} bytes_7d={}",
                    s.total_tunnels, s.requests_7d, s.bytes_7d
                ),
                None => println!("no summary available"),
            }
            Ok(())
        }
        Commands::Keys { command } => {
            guard(&dash, Route::Settings)?;
            keys(&dash, command).await
        }
    }
}

async fn status(dash: &Dashboard) -> Result<()> {
    let health = dash
        .client
        .health()
        .await
        .with_context(|| format!("probing {}", dash.client.base_url()))?;
    println!(
        "{} {} ({})",
        dash.client.base_url(),
        health.status,
        health.service.as_deref().unwrap_or("unknown service")
    );
    if dash.auth.is_authenticated() {
        println!("credential: present");
    } else {
        println!("credential: none (run `needle login`)");
    }
    Ok(())
}

async fn tunnels(dash: &Dashboard, command: TunnelCommands) -> Result<()> {
    let store = &dash.tunnels;
    match command {
        TunnelCommands::List { active } => {
            store.fetch_tunnels().await;
            check(store.error())?;
            let list = if active {
                store.active_tunnels()
            } else {
                store.tunnels()
            };
            for t in &list {
                println!(
                    "{:<24} :{:<5} {:<5} {}{}",
                    t.subdomain,
                    t.target_port,
                    t.protocol,
                    if t.is_active { "active" } else { "idle" },
                    if t.is_persistent { " persistent" } else { "" }
                );
            }
            println!("{} tunnel(s), {} active", list.len(), store.active_count());
        }
        TunnelCommands::Create {
            port,
            subdomain,
            protocol,
            persistent,
        } => {
            let request = CreateTunnelRequest {
                subdomain,
                target_port: port,
                protocol,
                is_persistent: persistent.then_some(true),
            };
            let Some(created) = store.create_tunnel(&request).await else {
                bail!(store_error(store.error(), "failed to create tunnel"));
            };
            match created.url.as_deref() {
                Some(url) => println!("{url} -> localhost:{port}"),
                None if !created.subdomain.is_empty() => {
                    println!("{} -> localhost:{port}", created.subdomain);
                }
                None => println!("tunnel created -> localhost:{port}"),
            }
        }
        TunnelCommands::Delete { subdomain } => {
            if !store.delete_tunnel(&subdomain).await {
                bail!(store_error(store.error(), "failed to delete tunnel"));
            }
            println!("deleted {subdomain}");
        }
    }
    Ok(())
}

async fn keys(dash: &Dashboard, command: KeyCommands) -> Result<()> {
    let store = &dash.api_keys;
    match command {
        KeyCommands::List => {
            store.fetch_keys().await;
            check(store.error())?;
            for k in store.keys() {
                let last_used = k
                    .last_used
                    .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
                println!("{}  {}…  {:<20} last used {last_used}", k.id, k.prefix, k.name);
            }
        }
        KeyCommands::Create { name } => {
            let Some(created) = store.create_key(&name).await else {
                bail!(store_error(store.error(), "failed to create api key"));
            };
            println!("{}", created.key);
            eprintln!("store this key now; it will not be shown again");
        }
        KeyCommands::Delete { id } => {
            if !store.delete_key(&id).await {
                bail!(store_error(store.error(), "failed to delete api key"));
            }
            println!("deleted {id}");
        }
    }
    Ok(())
}

/// Run the route guard for the view a command corresponds to.
fn guard(dash: &Dashboard, route: Route) -> Result<()> {
    let landed = dash.navigator.navigate(route);
    if landed == Route::Login {
        bail!("not logged in; run `needle login`");
    }
    Ok(())
}

fn check(error: Option<String>) -> Result<()> {
    match error {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn store_error(error: Option<String>, fallback: &str) -> String {
    error.unwrap_or_else(|| fallback.to_string())
}
