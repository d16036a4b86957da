//! # TenantDesk Console
//!
//! Admin console for the TenantDesk multi-tenant membership platform:
//! tenants, users, plans, subscriptions, gated content, and the payment and
//! webhook testbed.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tenantdesk-cli -- --offline tenants list
//! cargo run -p tenantdesk-cli -- login admin@example.com
//! ```

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use tenantdesk_cli::app::Console;
use tenantdesk_cli::cli::Cli;
use tenantdesk_cli::commands;
use tenantdesk_cli::output::{OutputFormat, Printer};
use tenantdesk_shared::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantdesk_cli=info,tenantdesk_shared=warn,tenantdesk_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let console = if cli.offline {
        Console::offline()
    } else {
        let config = Config::from_env().context("failed to load configuration")?;
        Console::connect(config).await.context("failed to connect to the backend")?
    };

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let result = {
        let mut printer = Printer::new(format, &mut lock);
        commands::run(&console, cli.command, &mut printer).await
    };
    lock.flush()?;

    if let Err(e) = result {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }

    Ok(())
}
