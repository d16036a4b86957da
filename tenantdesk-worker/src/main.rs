//! # TenantDesk Worker
//!
//! Long-running listener for simulated webhooks. Resumes the session from
//! `SESSION_ACCESS_TOKEN`, watches the user's tenant, and logs every payment
//! event as it arrives.
//!
//! ## Usage
//!
//! ```bash
//! SESSION_ACCESS_TOKEN=... cargo run -p tenantdesk-worker
//! ```

use anyhow::Context;
use std::sync::Arc;
use tenantdesk_shared::auth::jwt::validate_session_token;
use tenantdesk_shared::backend::rest::RestBackend;
use tenantdesk_shared::config::Config;
use tenantdesk_worker::listener::{payment_events, WebhookListener};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantdesk_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TenantDesk Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("failed to load configuration")?;
    let access_token = config
        .session
        .access_token
        .clone()
        .context("SESSION_ACCESS_TOKEN is required to run the worker")?;

    if let Some(secret) = &config.session.jwt_secret {
        let claims = validate_session_token(&access_token, secret).context("session token rejected")?;
        tracing::debug!(user_id = %claims.sub, "Session token validated locally");
    }

    let backend = Arc::new(RestBackend::new(&config.backend)?);
    let user = backend
        .restore_session(&access_token)
        .await
        .context("failed to restore session")?;
    tracing::info!(user_id = %user.id, email = %user.email, "Session restored");

    let listener = WebhookListener::for_current_tenant(backend.clone()).await?;
    let subscription = listener.subscribe().await?;
    let cancel = subscription.cancel_token();

    let router = payment_events(
        subscription,
        |data| tracing::info!(payload = %data, "Payment succeeded"),
        |data| tracing::warn!(payload = %data, "Payment failed"),
    );
    tracing::info!(tenant_id = %listener.tenant_id(), "Worker ready and listening for webhooks");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, exiting...");

    cancel.cancel();
    router.await?;

    Ok(())
}
