//! imggen-gateway - An authenticated HTTP gateway for image generation.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imggen_gateway::{
    auth::revocation_key,
    config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig},
    create_router, AuthGate, BasicEngine, Claims, CredentialVerifier, Dispatcher,
    HttpImageFetcher, KeyValueStore, OperationRegistry, RedisStore, RouterConfig, Shape,
    server::OPERATION_PREFIX,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Token(config) => run_token(config),
        Command::Check(config) => run_check(config).await,
        Command::Operations => run_operations(),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  JPEG quality: {}", config.jpeg_quality);
    info!(
        "  Remote fetch: {}s timeout, {} KiB limit",
        config.fetch_timeout,
        config.max_fetch_bytes / 1024
    );
    match config.cors_origins {
        Some(ref origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    // Connects on first use; the URI may carry a password, so it is not logged.
    let store = match RedisStore::open(config.redis_uri_or_empty()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Invalid Redis URI: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpImageFetcher::with_options(config.fetch_timeout(), config.max_fetch_bytes)
    {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let engine = BasicEngine::with_quality(config.jpeg_quality);
    let dispatcher = match Dispatcher::new(engine, fetcher) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("Operation table error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("Operations:");
    log_operations(dispatcher.registry());

    let gate = AuthGate::new(CredentialVerifier::new(config.signing_secret_or_empty()), store);
    let router = create_router(dispatcher, gate, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/v1/operations", addr);
    info!(
        "    curl -H 'x-api-key: <token>' 'http://{}{}/solid?texts=red'",
        addr, OPERATION_PREFIX
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██╗███╗   ███╗ ██████╗  ██████╗ ███████╗███╗   ██╗");
    info!("██║████╗ ████║██╔════╝ ██╔════╝ ██╔════╝████╗  ██║");
    info!("██║██╔████╔██║██║  ███╗██║  ███╗█████╗  ██╔██╗ ██║");
    info!("██║██║╚██╔╝██║██║   ██║██║   ██║██╔══╝  ██║╚██╗██║");
    info!("██║██║ ╚═╝ ██║╚██████╔╝╚██████╔╝███████╗██║ ╚████║");
    info!("╚═╝╚═╝     ╚═╝ ╚═════╝  ╚═════╝ ╚══════╝╚═╝  ╚═══╝");
    info!("");
    info!("                 gateway v{}", version);
}

fn log_operations(registry: &OperationRegistry) {
    for descriptor in registry.operations() {
        info!(
            "  {:<14} {:<16} {}",
            descriptor.name(),
            describe_shape(descriptor.shape()),
            descriptor.summary()
        );
    }
    info!("  ({} operations)", registry.len());
}

fn describe_shape(shape: Shape) -> String {
    match shape {
        Shape::Paste => "url".to_string(),
        Shape::Text { arity: 1 } => "1 text".to_string(),
        Shape::Text { arity } => format!("{} texts", arity),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "imggen_gateway=debug,tower_http=debug"
    } else {
        "imggen_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut claims = Claims::new(config.user_id, config.rate_limit, config.nonce.clone());
    if let Some(ttl) = config.ttl {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        claims = claims.with_expiry(now + ttl);
    }

    let verifier = CredentialVerifier::new(&config.signing_secret);
    let token = match verifier.issue(&claims) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error: failed to sign token: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !config.json {
        println!("{}", token);
        return ExitCode::SUCCESS;
    }

    let json = serde_json::json!({
        "token": token,
        "user_id": claims.user_id,
        "rate_limit": claims.rate_limit,
        "nonce": claims.nonce,
        "expires_at": claims.exp,
        "revocation_key": revocation_key(claims.user_id, &claims.nonce),
    });

    match serde_json::to_string_pretty(&json) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("imggen-gateway Configuration Check");
    println!("═══════════════════════════════════");
    println!();

    match OperationRegistry::from_engine(&BasicEngine::new()) {
        Ok(registry) => println!("✓ Operations: {} registered", registry.len()),
        Err(e) => {
            println!("✗ Operations: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let uri = match config.redis_uri.as_deref() {
        Some(uri) if !uri.is_empty() => uri,
        _ => {
            println!("✗ Redis URI: not set (use --redis-uri or GATEWAY_REDIS_URI)");
            return ExitCode::FAILURE;
        }
    };

    let store = match RedisStore::open(uri) {
        Ok(store) => {
            println!("✓ Redis URI: valid");
            store
        }
        Err(e) => {
            println!("✗ Redis URI: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    print!("Testing Redis connection... ");

    match store.get("imggen-gateway:check").await {
        Ok(_) => println!("✓ success"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The Redis server is running and reachable");
            println!("  - The URI's host, port, database and password are correct");
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("═══════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}

// =============================================================================
// Operations Command
// =============================================================================

fn run_operations() -> ExitCode {
    let registry = match OperationRegistry::from_engine(&BasicEngine::new()) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{:<14} {:<16} {:<16} PATH", "NAME", "ARGUMENTS", "TAG");
    for descriptor in registry.operations() {
        println!(
            "{:<14} {:<16} {:<16} {}/{}",
            descriptor.name(),
            describe_shape(descriptor.shape()),
            descriptor.tag(),
            OPERATION_PREFIX,
            descriptor.name()
        );
    }

    ExitCode::SUCCESS
}
