use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;

use feedtree::api::ReaderClient;
use feedtree::app::{App, AppEvent};
use feedtree::config::{Config, TOKEN_ENV_VAR};
use feedtree::ui;

/// Get the config directory path (~/.config/feedtree/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("feedtree");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "feedtree", about = "Terminal client for a self-hosted RSS reader")]
struct Args {
    /// Reader API base URL (overrides server_url from config.toml)
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Config file (default: ~/.config/feedtree/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start with the tree filtered to unread subscriptions
    #[arg(long)]
    unread: bool,

    /// Write logs to this file; the terminal is owned by the UI
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// Initialize tracing. Logs go to `log_file` when given, else stderr.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access): the config may hold a token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;

    if let Some(server) = args.server {
        config.server_url = server;
    }
    if args.unread {
        config.unread_only = true;
    }
    tracing::debug!(?config, "Configuration loaded");

    let token = config.resolve_token(std::env::var(TOKEN_ENV_VAR).ok());
    if token.is_none() {
        tracing::warn!("No auth token configured; the server may reject requests");
    }

    let client = ReaderClient::new(&config.server_url, token)
        .with_context(|| format!("Cannot use server URL '{}'", config.server_url))?;

    let mut app = App::new(client, &config);
    for warning in app.keybindings.apply_overrides(&config.keybindings) {
        tracing::warn!("{}", warning);
    }

    // Create event channel for background tasks
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::run(&mut app, event_tx, event_rx).await?;

    Ok(())
}
