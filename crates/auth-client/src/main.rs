//! auth-client: one-shot login or registration against an auth server.
//!
//! # Usage
//!
//! ```text
//! auth-client [--host H] [--port P] login    --username U
//! auth-client [--host H] [--port P] register --username U
//! ```
//!
//! The password is read from the first line of stdin so it never appears in
//! the process list.  The server's status word is printed on stdout; the exit
//! code is 0 for `LOGIN_SUCCESS` / `REGISTRATION_SUCCESS` and 1 otherwise.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth_client::AuthClient;
use auth_core::Response;

#[derive(Debug, Parser)]
#[command(
    name = "auth-client",
    about = "Log in to or register with an auth server",
    version
)]
struct Cli {
    /// Server host name or IP address.
    #[arg(long, default_value = "127.0.0.1", env = "AUTH_HOST")]
    host: String,

    /// Server TCP port.
    #[arg(long, default_value_t = 6969, env = "AUTH_PORT")]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Check a username and password.
    Login {
        #[arg(long, short)]
        username: String,
    },
    /// Create a new account.
    Register {
        #[arg(long, short)]
        username: String,
    },
}

impl Command {
    fn username(&self) -> &str {
        match self {
            Command::Login { username } | Command::Register { username } => username,
        }
    }
}

/// Strips the line terminator from a password read off stdin.
fn password_from_line(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

fn is_success(response: Response) -> bool {
    matches!(
        response,
        Response::LoginSuccess | Response::RegistrationSuccess
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the server's answer.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read password from stdin")?;
    let password = password_from_line(&line);

    let mut client = AuthClient::connect(&cli.host, cli.port).await?;
    info!("connected to {}:{}", cli.host, cli.port);

    let username = cli.command.username();
    let response = match &cli.command {
        Command::Login { .. } => client.login(username, password).await?,
        Command::Register { .. } => client.register(username, password).await?,
    };
    client.close().await.ok();

    println!("{response}");
    Ok(if is_success(response) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
