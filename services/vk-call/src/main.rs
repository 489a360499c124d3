//! vk-call
//!
//! Command line client for the VK API:
//! 1. Loads `vk-call.toml` and secrets from env or files
//! 2. Authorizes with a stored token or a login/password exchange
//! 3. Invokes one method with `--param key=value` pairs
//! 4. Prints the response; Ctrl-C cancels the call

mod config;
mod error;
mod metrics;
mod prompt;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vk_api::{VkApi, VkParameters, json::pretty_print_json};

use crate::config::Config;
use crate::prompt::TerminalCaptchaSolver;

const USAGE: &str =
    "usage: vk-call [--config <path>] --method <name> [--param key=value]... [--metrics]";

/// Parsed command line
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<String>,
    method: String,
    params: Vec<(String, String)>,
    metrics: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> error::Result<Args> {
    let mut parsed = Args::default();
    let mut method = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                parsed.config = Some(args.next().ok_or(error::Error::MissingValue("--config"))?);
            }
            "--method" => {
                method = Some(args.next().ok_or(error::Error::MissingValue("--method"))?);
            }
            "--param" => {
                let pair = args.next().ok_or(error::Error::MissingValue("--param"))?;
                let (key, value) = pair
                    .split_once('=')
                    .filter(|(key, _)| !key.trim().is_empty())
                    .ok_or_else(|| error::Error::MalformedParam(pair.clone()))?;
                parsed.params.push((key.trim().to_owned(), value.to_owned()));
            }
            "--metrics" => parsed.metrics = true,
            _ => return Err(error::Error::UnknownArgument(arg)),
        }
    }
    parsed.method = method
        .filter(|m| !m.trim().is_empty())
        .ok_or(error::Error::MissingMethod)?;
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args = parse_args(std::env::args().skip(1)).context(USAGE)?;

    let prometheus = if args.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let api = VkApi::builder()
        .config(config.api.clone())
        .captcha_solver(Arc::new(TerminalCaptchaSolver))
        .build()
        .context("failed to build VK client")?;

    let mut auth = config.auth.to_auth_params();
    if auth.has_login_credentials() {
        auth.two_factor = Some(prompt::two_factor());
    }
    api.authorize(auth).await.context("authorization failed")?;
    info!(user_id = ?api.user_id().await, "authorized");

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, cancelling call");
                on_ctrl_c.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    let params: VkParameters = args.params.into_iter().collect();
    let result = api.invoke(&args.method, params, false, &cancel).await;

    api.logout().await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    let body = result.with_context(|| format!("{} failed", args.method))?;
    println!("{}", pretty_print_json(&body));
    Ok(())
}
