//! Bookshelf client
//!
//! Command-line front end for the bookshelf service. Credentials persist
//! between runs; every request goes through the session pipeline, so an
//! expired access credential is refreshed once and the request retried.

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use common::Secret;
use futures_util::future::join_all;
use session_auth::CredentialStore;
use session_pipeline::{SessionClient, SessionOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{HttpTransport, Request};

use crate::cli::{Cli, Command};
use crate::config::{Config, PASSWORD_ENV};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr, filtered by LOG_LEVEL / RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let store = CredentialStore::load(config.session.credentials_path.clone()).with_context(|| {
        format!(
            "failed to load credentials from {}",
            config.session.credentials_path.display()
        )
    })?;
    let transport = HttpTransport::new(
        reqwest::Client::new(),
        config.service.base_url.clone(),
        config.request_timeout(),
    );
    let client = SessionClient::new(
        Arc::new(transport),
        Arc::new(store),
        SessionOptions {
            refresh_timeout: config.refresh_timeout(),
        },
    );

    info!(
        base_url = %config.service.base_url,
        authenticated = client.is_authenticated(),
        "session ready"
    );

    match cli.command {
        Command::Register {
            first_name,
            last_name,
            email,
            account_type,
        } => {
            let Some(email) = email.or_else(|| config.session.username.clone()) else {
                bail!("no email: pass --email or set session.username");
            };
            let password = password(&config)?;
            let user = client
                .register(
                    &first_name,
                    &last_name,
                    &email,
                    password.expose(),
                    account_type.into(),
                )
                .await
                .context("registration failed")?;
            println!("registered {} ({:?})", user.email, user.account_type);
            Ok(())
        }
        Command::Login => login(&client, &config).await,
        Command::Logout => {
            client.logout();
            println!("logged out");
            Ok(())
        }
        Command::Status => {
            if client.is_authenticated() {
                println!("authenticated");
            } else {
                println!("not authenticated");
            }
            Ok(())
        }
        Command::Get { paths } => get_all(&client, &paths).await,
    }
}

async fn login(client: &SessionClient, config: &Config) -> Result<()> {
    let Some(username) = config.session.username.as_deref() else {
        bail!("session.username is not configured");
    };
    let password = password(config)?;

    client
        .login(username, password.expose())
        .await
        .context("login failed")?;
    println!("logged in as {username}");
    Ok(())
}

fn password(config: &Config) -> Result<&Secret<String>> {
    match config.session.password.as_ref() {
        Some(password) => Ok(password),
        None => bail!("no password: set {PASSWORD_ENV} or session.password_file"),
    }
}

/// Issue every GET concurrently. Fails if any request failed.
async fn get_all(client: &SessionClient, paths: &[String]) -> Result<()> {
    let results = join_all(
        paths
            .iter()
            .map(|path| client.send(Request::get(path.as_str()))),
    )
    .await;

    let mut failed = 0;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(response) => {
                println!("{} {path} {}", response.status.as_u16(), response.text());
                if !response.status.is_success() {
                    failed += 1;
                }
            }
            Err(e) => {
                warn!(path = %path, error = %e, "request failed");
                eprintln!("error {path} {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} requests failed", paths.len());
    }
    Ok(())
}
