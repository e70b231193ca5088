//! `smb2-echo`: send compounded ECHO requests and print each response status.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use futures::future::join_all;
use smb2_client::{Config, Connection};
use smb2_protocol::Command;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// ECHO request/response fixed part: body size 4, reserved 0.
const ECHO_BODY: [u8; 4] = [0x00, 0x04, 0x00, 0x00];
const ECHO_BODY_SIZE: u16 = 4;

#[derive(Parser)]
#[clap(name = "smb2-echo")]
#[clap(about = "Send compounded ECHO requests to a server and report the replies")]
struct Cli {
    /// Server host; overrides the config
    #[clap(short, long)]
    server: Option<String>,

    /// Server port; overrides the config
    #[clap(short, long)]
    port: Option<u16>,

    /// TOML config file (default: SMB2_* environment variables)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// ECHO requests per compound
    #[clap(short = 'n', long, default_value = "3")]
    count: usize,

    /// Number of compounds to send
    #[clap(short, long, default_value = "1")]
    rounds: usize,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Config::from_toml_str(&text)?
        }
        None => Config::from_env()?,
    };
    if let Some(server) = cli.server {
        config.server_addr = server;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let conn = Connection::connect(&config).await?;
    let echo = Bytes::from_static(&ECHO_BODY);
    let mut failures = 0usize;

    for round in 0..cli.rounds {
        let requests = (0..cli.count)
            .map(|_| conn.create_request(Command::Echo.opcode(), 0, echo.clone(), Bytes::new()))
            .collect();
        let pending = conn.compound_submit(requests)?;
        let ids: Vec<_> = pending.iter().map(|p| p.message_id()).collect();

        let outcomes = join_all(pending.into_iter().map(|p| p.receive(Some(ECHO_BODY_SIZE)))).await;
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                Ok(response) => println!("round {} message {}: {}", round, id, response.status()),
                Err(e) => {
                    failures += 1;
                    error!(message_id = %id, error = %e, "echo failed");
                }
            }
        }
    }

    conn.disconnect();
    info!(rounds = cli.rounds, failures, "done");

    if failures > 0 {
        anyhow::bail!("{} echo request(s) failed", failures);
    }
    Ok(())
}
