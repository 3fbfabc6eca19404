// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve => run_serve().await,
        Commands::ShowConfig => {
            show_config();
            Ok(())
        }
    }
}

async fn run_serve() -> anyhow::Result<()> {
    let config = hub_config::HubConfig::load();

    tracing::info!(
        api_port = config.api_port,
        mcp_port = config.mcp_port,
        dashboard_url = ?config.dashboard_url,
        "starting coordination hub",
    );

    let state = hub_server::new_state(config.clone());

    match hub_server::serve(&config.bind_host, config.api_port, state).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "hub server exited with an error");
            Err(e)
        }
    }
}

fn show_config() {
    let config = hub_config::HubConfig::load();
    println!("api_port:       {}", config.api_port);
    println!("mcp_port:       {}", config.mcp_port);
    println!("hub_url:        {}", config.hub_url.as_deref().unwrap_or("-"));
    println!(
        "dashboard_url:  {}",
        config.dashboard_url.as_deref().unwrap_or("-")
    );
    println!("bind_host:      {}", config.bind_host);
    println!("http_bind:      {}", config.http_bind());
    println!("mcp_bind:       {}", config.mcp_bind());
    println!("timings:        {:?}", config.timings);
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
