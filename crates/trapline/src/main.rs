//! Trapline - follow a mail-trap inbox from the terminal
//!
//! Lists, shows and deletes captured messages and keeps a live view of
//! the inbox with desktop notifications for new mail.

mod cli;
mod commands;
mod desktop;
mod render;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "trapline=debug"
    } else {
        "trapline=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    tracing::debug!("Starting Trapline against {}", cli.url);

    commands::run(&cli).await
}
