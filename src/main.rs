//! # relaymux - OpenAI-compatible gateway server
//!
//! Serves one chat-completions API over Anthropic messages, OpenAI responses
//! and plain chat-completions upstreams, with live stream translation and
//! credential fallback on quota or auth failures.
//!
//! ## Configuration
//!
//! Configuration is layered (later wins): built-in defaults, the system file
//! `/etc/relaymux/config.toml`, the user file, an explicit `--config <path>`
//! and finally `RELAYMUX_*` environment variables.
//!
//! ```bash
//! relaymux --config ./relaymux.toml
//! relaymux validate --config ./relaymux.toml
//! ```
//!
//! Authors: Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp
//!

/* --- uses ------------------------------------------------------------------------------------ */

use std::env;
use std::path::PathBuf;

use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relaymux::config::Config;
use relaymux::config::loader::ConfigLoader;
use relaymux::error::{ProxyError, Result};
use relaymux::{ValidationSeverity, create_app};

/* --- types ----------------------------------------------------------------------------------- */

///
/// What the process was asked to do.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve,
    Validate,
}

///
/// Parsed command line.
#[derive(Debug)]
struct CliArgs {
    command: Command,
    /** explicit configuration file (`--config <path>`) */
    config_file: Option<PathBuf>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** the version as defined in cargo.toml */
const VERSION: &str = env!("CARGO_PKG_VERSION");

/* --- start of code -------------------------------------------------------------------------- */

///
/// Main entry point for the relaymux gateway.
///
/// Handles the CLI, loads configuration, initializes logging and serves the
/// router until shutdown.
#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = handle_cli_args();

    if args.command == Command::Validate {
        std::process::exit(run_validate(args.config_file.as_deref()));
    }

    if let Err(e) = run(args.config_file).await {
        let error_msg = format!("{}", e);
        eprintln!("Error:");
        for line in error_msg.lines() {
            eprintln!("{}", line);
        }
        std::process::exit(1);
    }
}

async fn run(config_file: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_file.as_deref())?;
    initialize_logging(&config);

    let app = create_app(config.clone())?;
    start_server(&config, app).await
}

///
/// Parse command line arguments.
///
/// `--version` and `--help` exit immediately so they work without any
/// configuration present.
fn handle_cli_args() -> CliArgs {
    let mut args = env::args().skip(1);
    let mut parsed = CliArgs { command: Command::Serve, config_file: None };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("relaymux {}", VERSION);
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--config" | "-c" => match args.next() {
                Some(path) => parsed.config_file = Some(PathBuf::from(path)),
                None => {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
            },
            "validate" => parsed.command = Command::Validate,
            other => {
                if other.starts_with('-') {
                    eprintln!("Error: Unknown option: {}", other);
                } else {
                    eprintln!("Error: Unknown command: {}", other);
                }
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    }

    parsed
}

///
/// Print help information for the relaymux CLI.
fn print_help() {
    println!("relaymux v{}", VERSION);
    println!("OpenAI-compatible gateway over Anthropic, OpenAI responses and chat-completions upstreams");
    println!();
    println!("USAGE:");
    println!("    relaymux [COMMAND] [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    validate            Validate configuration and exit");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH> Load this configuration file on top of the user/system files");
    println!("    -h, --help          Print help information");
    println!("    -V, --version       Print version information");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    RELAYMUX_SERVER_PORT              Server port (default: 3000)");
    println!("    RELAYMUX_SERVER_LOG_LEVEL         trace, debug, info, warn, error (default: info)");
    println!("    RELAYMUX_CREDENTIALS_KEYS         Comma separated upstream keys, primary first");
    println!("    RELAYMUX_CREDENTIALS_KEYS_FILE    File with one upstream key per line");
    println!("    RELAYMUX_UPSTREAM_PROXY           Forward proxy for upstream calls");
    println!("    RELAYMUX_UPSTREAM_SYSTEM_PROMPT   System prompt injected into every request");
    println!("    RUST_LOG                          Overrides the log filter");
    println!();
    println!("EXAMPLE CONFIG:");
    for line in Config::example_toml().lines() {
        println!("    {}", line);
    }
}

///
/// Run the validate command.
///
/// # Returns
///  * exit code 0 if the configuration has no errors, 1 otherwise
fn run_validate(config_file: Option<&std::path::Path>) -> i32 {
    let loaded = ConfigLoader::new()
        .with_defaults()
        .with_system_config()
        .and_then(|l| l.with_user_config())
        .and_then(|l| match config_file {
            Some(path) => l.with_config_file(path),
            None => Ok(l),
        })
        .and_then(|l| l.with_env_vars())
        .and_then(|l| l.build_unchecked());

    for path in relaymux::config::paths::config_file_paths() {
        let state = if path.exists() { "found" } else { "absent" };
        println!("[Info] {} ({})", path.display(), state);
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] Configuration error: {}", e);
            return 1;
        }
    };

    let issues = config.validation_issues();
    for issue in issues.iter().filter(|i| i.severity != ValidationSeverity::Error) {
        println!("[{:?}] {}: {}", issue.severity, issue.field, issue.message);
    }

    let errors: Vec<_> = issues.iter().filter(|i| i.severity == ValidationSeverity::Error).collect();
    if errors.is_empty() {
        println!("[OK] Configuration is valid ({} models, {} redirects)", config.models.len(), config.redirects.len());
        0
    } else {
        eprintln!("[ERROR] Configuration validation failed:");
        for issue in &errors {
            eprintln!("  • {}: {}", issue.field, issue.message);
            if let Some(suggestion) = &issue.suggestion {
                eprintln!("    Suggestion: {}", suggestion);
            }
        }
        1
    }
}

///
/// Initialize logging.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies.
///
/// # Arguments
///  * `config` - application configuration containing log level settings
fn initialize_logging(config: &Config) {
    let level = config.server.log_level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

///
/// Start the HTTP server and log startup information.
///
/// # Arguments
///  * `config` - application configuration
///  * `app` - configured Axum application
///
/// # Returns
///  * `Ok(())` when server shuts down gracefully
///  * `ProxyError::Http` if server binding or startup fails
async fn start_server(config: &Config, app: Router) -> Result<()> {
    let port = config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await.map_err(|e| {
        ProxyError::Http(format!(
            "Failed to bind to port {}: {}\n\n\
             To fix this:\n\
             • Check whether another process holds the port: lsof -i :{}\n\
             • Or pick another port: export RELAYMUX_SERVER_PORT=3001",
            port, e, port
        ))
    })?;

    log_startup_info(config);

    axum::serve(listener, app).await.map_err(|e| ProxyError::Http(format!("Server error: {}", e)))?;

    Ok(())
}

///
/// Log startup information and configuration details.
fn log_startup_info(config: &Config) {
    info!("relaymux v{} running on port {}", VERSION, config.server.port);
    info!("OpenAI-compatible endpoint: http://localhost:{}/v1", config.server.port);
    info!(
        "Catalog: {} models, {} redirects, max {} dispatch attempts",
        config.models.len(),
        config.redirects.len(),
        config.server.max_dispatch_attempts
    );
    if config.server.debug_errors {
        info!("debug_errors is enabled: internal error detail is echoed to clients");
    }
}
