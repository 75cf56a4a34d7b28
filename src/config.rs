//! Configuration management for the image gateway.
//!
//! This module provides the command-line interface:
//! - `serve` (default): run the HTTP gateway
//! - `token`: mint a signed API key for a user
//! - `check`: validate the operation table and test store connectivity
//! - `operations`: print the operation table
//!
//! Options can be set on the command line or through environment variables
//! with the `GATEWAY_` prefix. Running the binary without a subcommand is the
//! same as `serve`.
//!
//! # Environment Variables
//!
//! - `GATEWAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GATEWAY_PORT` - Server port (default: 8000)
//! - `GATEWAY_SIGNING_SECRET` - HS256 secret for API keys (required)
//! - `GATEWAY_REDIS_URI` - Redis connection URI (required)
//! - `GATEWAY_JPEG_QUALITY` - JPEG quality of generated images (default: 80)
//! - `GATEWAY_FETCH_TIMEOUT` - Remote image fetch timeout in seconds (default: 10)
//! - `GATEWAY_MAX_FETCH_BYTES` - Largest accepted remote image (default: 4 MiB)
//! - `GATEWAY_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::dispatch::MAX_FETCH_SIZE;
use crate::engine::DEFAULT_JPEG_QUALITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default remote fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLI Arguments
// =============================================================================

/// imggen-gateway - An authenticated HTTP gateway for image generation.
///
/// Verifies signed API keys, enforces per-key rate limits and streams back
/// the images produced by the generation engine.
#[derive(Parser, Debug, Clone)]
#[command(name = "imggen-gateway")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Server options for the implicit `serve` command
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// Resolve the command to run; no subcommand means `serve`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP gateway
    Serve(ServeConfig),

    /// Mint a signed API key
    Token(TokenConfig),

    /// Validate the operation table and test store connectivity
    Check(CheckConfig),

    /// Print the operation table
    Operations,
}

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GATEWAY_PORT")]
    pub port: u16,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Secret used to verify API key signatures (HS256).
    ///
    /// The server refuses to start without it.
    #[arg(long, env = "GATEWAY_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: Option<String>,

    /// Redis URI for revocation entries and rate-limit counters.
    ///
    /// The server refuses to start without it.
    #[arg(long, env = "GATEWAY_REDIS_URI", hide_env_values = true)]
    pub redis_uri: Option<String>,

    // =========================================================================
    // Generation Configuration
    // =========================================================================
    /// JPEG quality of generated images (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "GATEWAY_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Timeout in seconds for fetching a remote input image.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "GATEWAY_FETCH_TIMEOUT")]
    pub fetch_timeout: u64,

    /// Largest remote input image accepted, in bytes.
    #[arg(long, default_value_t = MAX_FETCH_SIZE, env = "GATEWAY_MAX_FETCH_BYTES")]
    pub max_fetch_bytes: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GATEWAY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.signing_secret.as_deref().map_or(true, str::is_empty) {
            return Err(
                "No signing secret provided. Set --signing-secret or GATEWAY_SIGNING_SECRET"
                    .to_string(),
            );
        }

        if self.redis_uri.as_deref().map_or(true, str::is_empty) {
            return Err(
                "No Redis URI provided. Set --redis-uri or GATEWAY_REDIS_URI".to_string(),
            );
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.fetch_timeout == 0 {
            return Err("fetch_timeout must be greater than 0".to_string());
        }
        if self.max_fetch_bytes == 0 {
            return Err("max_fetch_bytes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Signing secret, empty if unset (call validate() first).
    pub fn signing_secret_or_empty(&self) -> &str {
        self.signing_secret.as_deref().unwrap_or("")
    }

    /// Redis URI, empty if unset (call validate() first).
    pub fn redis_uri_or_empty(&self) -> &str {
        self.redis_uri.as_deref().unwrap_or("")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

/// Options for `token`.
#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// Secret used to sign the key (must match the server's).
    #[arg(long, env = "GATEWAY_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: String,

    /// User the key belongs to.
    #[arg(long)]
    pub user_id: i64,

    /// Requests allowed per wall-clock minute.
    #[arg(long)]
    pub rate_limit: u32,

    /// Random value distinguishing this key from the user's other keys.
    #[arg(long)]
    pub nonce: String,

    /// Lifetime in seconds (default: no expiry).
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Print JSON including the revocation key to set in the store.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.signing_secret.is_empty() {
            return Err("Signing secret must not be empty".to_string());
        }
        if self.nonce.is_empty() {
            return Err("Nonce must not be empty".to_string());
        }
        // Keys are colon-separated; a colon in the nonce would alias another key.
        if self.nonce.contains(':') || self.nonce.chars().any(char::is_whitespace) {
            return Err("Nonce must not contain ':' or whitespace".to_string());
        }
        if self.ttl == Some(0) {
            return Err("ttl must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Options for `check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Redis URI to test.
    #[arg(long, env = "GATEWAY_REDIS_URI", hide_env_values = true)]
    pub redis_uri: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
