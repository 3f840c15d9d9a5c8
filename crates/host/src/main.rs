//! FileHost Server
//!
//! Shared file hosting with owner/admin access control.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use host::config::Config;
use host::files::FileRegistry;
use host::{http, FileHost};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// FileHost - shared file hosting with owner/admin access control.
#[derive(Parser, Debug)]
#[command(name = "filehost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Manage user accounts
    #[command(subcommand)]
    Users(UsersCommands),

    /// Inspect hosted files
    #[command(subcommand)]
    Files(FilesCommands),
}

/// Subcommands for user management.
#[derive(Subcommand, Debug, Clone)]
pub enum UsersCommands {
    /// List all users
    List,

    /// Add a user
    Add {
        /// Username to register
        username: String,

        /// Password for the new user
        #[arg(long, short)]
        password: String,

        /// Grant admin rights
        #[arg(long)]
        admin: bool,
    },
}

/// Subcommands for file inspection.
#[derive(Subcommand, Debug, Clone)]
pub enum FilesCommands {
    /// List files and their owners
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Environment wins over the file
    config.apply_env_overrides();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.to_lowercase()
    };
    let _guard = init_tracing(&level, config.server.log_dir.as_deref());

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    config.validate()?;

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Users(UsersCommands::List) => {
            let store = identity::open_store(&config.identity.location())?;
            let users = store.list_users()?;
            print_users_table(&users);
        }
        Commands::Users(UsersCommands::Add {
            username,
            password,
            admin,
        }) => {
            let store = identity::open_store(&config.identity.location())?;
            store.register_with_role(&username, &password, admin)?;
            println!(
                "Added {}user {}",
                if admin { "admin " } else { "" },
                username
            );
        }
        Commands::Files(FilesCommands::List) => {
            let registry = FileRegistry::open(config.files.registry_path())?;
            print_files_table(&registry.list()?);
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` overrides `level`. With a log directory, output is also
/// written to a daily-rolling file; the returned guard flushes it and must
/// live until exit.
fn init_tracing(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http={}", level, level)));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "filehost.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("FileHost v{} starting...", env!("CARGO_PKG_VERSION"));

    let host = Arc::new(FileHost::from_config(&config)?);
    tracing::info!(
        "Identity backend: {}, files directory: {}",
        host.identity().mode(),
        config.files.dir.display()
    );

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, http::router(host))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("FileHost stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl-C, or SIGTERM on unix).
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl-C");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}

/// Print users in a formatted ASCII table.
fn print_users_table(users: &[identity::UserRecord]) {
    if users.is_empty() {
        println!("No users.");
        return;
    }

    let name_width = users
        .iter()
        .map(|u| u.username.len())
        .max()
        .unwrap_or(8)
        .max(8);

    println!("{:<name_width$}  {:>5}", "USERNAME", "ADMIN", name_width = name_width);
    println!("{}", "-".repeat(name_width + 7));

    for user in users {
        println!(
            "{:<name_width$}  {:>5}",
            user.username,
            if user.is_admin { "yes" } else { "no" },
            name_width = name_width
        );
    }

    println!();
    println!("Total: {} user(s)", users.len());
}

/// Print registry entries in a formatted ASCII table.
fn print_files_table(files: &[host::files::FileRecord]) {
    if files.is_empty() {
        println!("No files.");
        return;
    }

    let name_width = files.iter().map(|f| f.name.len()).max().unwrap_or(4).max(4);
    let owner_width = files.iter().map(|f| f.owner.len()).max().unwrap_or(5).max(5);

    println!(
        "{:<name_width$}  {:<owner_width$}  CREATED",
        "NAME",
        "OWNER",
        name_width = name_width,
        owner_width = owner_width
    );
    println!("{}", "-".repeat(name_width + owner_width + 24));

    for file in files {
        println!(
            "{:<name_width$}  {:<owner_width$}  {}",
            file.name,
            file.owner,
            file.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            name_width = name_width,
            owner_width = owner_width
        );
    }

    println!();
    println!("Total: {} file(s)", files.len());
}
