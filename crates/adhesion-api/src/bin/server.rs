//! adhesion API server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), layers
//! `ADHESION_*` environment variables on top (`__` separates nested keys, e.g.
//! `ADHESION_AUTH__SESSION_SECRET`), opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Admin secret hash generation
//!
//! To generate the argon2 PHC string for `auth.admin_secret_hash`:
//!
//! ```
//! cargo run -p adhesion-api --bin server -- --hash-secret
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use adhesion_api::{AppState, ServerConfig, auth::AccessGuard};
use adhesion_store_sqlite::SqliteStore;
use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Adhesion membership API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for an admin secret entered on stdin and exit.
  #[arg(long)]
  hash_secret: bool,

  /// Print a session token for ACCOUNT and exit.
  #[arg(long, value_name = "ACCOUNT")]
  issue_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_secret {
    let secret = read_secret()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(secret.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("ADHESION")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate().context("invalid configuration")?;

  if let Some(account) = cli.issue_token {
    let token = AccessGuard::new(&server_cfg.auth)
      .issue_session(&account)
      .context("failed to sign session token")?;
    println!("{token}");
    return Ok(());
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let state = AppState::new(Arc::new(store), &server_cfg);
  let app = adhesion_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    prefix = %server_cfg.identity.prefix,
    store = ?store_path,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a secret from stdin.
fn read_secret() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Admin secret: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let secret = line.trim_end_matches(['\n', '\r']).to_string();
  anyhow::ensure!(!secret.is_empty(), "secret must not be empty");
  Ok(secret)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
