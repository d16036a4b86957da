//! Webhook simulation

use crate::app::Console;
use crate::cli::WebhooksCommand;
use crate::error::{CliError, CliResult};
use crate::output::{or_dash, Printer};
use futures::future::join_all;
use serde_json::json;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::models::webhook::MockWebhook;
use tenantdesk_worker::events::{catalog, find_event};
use tenantdesk_worker::listener::WebhookListener;
use tenantdesk_worker::simulator::{DeliveryOutcome, RetryPolicy, SimulatorError};
use tokio::time::Duration;
use tracing::info;

fn outcome_rows(outcomes: &[DeliveryOutcome]) -> Vec<Vec<String>> {
    outcomes
        .iter()
        .map(|o| {
            vec![
                o.webhook_id.to_string(),
                if o.delivered { "delivered" } else { "failed" }.to_string(),
                o.attempts.to_string(),
            ]
        })
        .collect()
}

fn attempt_summary(webhook: &MockWebhook) -> String {
    webhook
        .logs
        .iter()
        .map(|log| match &log.error_message {
            Some(message) => format!("#{} {} ({})", log.attempt_number, log.status.as_str(), message),
            None => format!("#{} {}", log.attempt_number, log.status.as_str()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn run(console: &Console, command: WebhooksCommand, out: &mut Printer<'_>) -> CliResult<()> {
    match command {
        WebhooksCommand::Events => {
            let events = catalog();
            let rows = events
                .iter()
                .map(|e| vec![e.event_type.to_string(), e.description.to_string()])
                .collect();
            let value: Vec<_> = events
                .iter()
                .map(|e| json!({ "type": e.event_type, "description": e.description, "data": e.data }))
                .collect();
            out.table(&["TYPE", "DESCRIPTION"], rows, &value)?;
        }

        WebhooksCommand::Simulate {
            event_type,
            tenant,
            max_attempts,
            count,
        } => {
            if find_event(&event_type).is_none() {
                return Err(SimulatorError::UnknownEvent(event_type).into());
            }
            if count == 0 {
                return Err(CliError::InvalidInput("count must be at least 1".to_string()));
            }

            let mut simulator = console.simulator();
            match tenant {
                Some(tenant_id) => {
                    console.require_in_tenant(Permission::UsePaymentTestbed, tenant_id).await?;
                    simulator = simulator.for_tenant(tenant_id);
                }
                None => {
                    console.require(Permission::UsePaymentTestbed).await?;
                }
            }
            if let Some(max_attempts) = max_attempts {
                simulator = simulator.with_policy(RetryPolicy::with_max_attempts(max_attempts));
            }

            out.note(&format!(
                "Delivering {} x {} (up to {} attempts each)",
                count,
                event_type,
                simulator.policy().max_attempts
            ))?;
            let handles = (0..count).map(|_| simulator.spawn_delivery(event_type.as_str()));

            let mut outcomes = Vec::new();
            for joined in join_all(handles).await {
                outcomes.push(joined??);
            }
            let delivered = outcomes.iter().filter(|o| o.delivered).count();
            info!(event_type = %event_type, delivered, total = outcomes.len(), "Simulation finished");

            out.table(&["WEBHOOK", "RESULT", "ATTEMPTS"], outcome_rows(&outcomes), &outcomes)?;
        }

        WebhooksCommand::Logs { limit } => {
            console.require(Permission::UsePaymentTestbed).await?;
            let webhooks = MockWebhook::list_recent(console.backend.as_ref(), limit).await?;
            let rows = webhooks
                .iter()
                .map(|w| {
                    vec![
                        w.id.to_string(),
                        w.event_type.clone(),
                        w.delivery_attempts.to_string(),
                        or_dash(w.delivered_at.map(|at| at.to_rfc3339())),
                        attempt_summary(w),
                    ]
                })
                .collect();
            out.table(&["ID", "EVENT", "ATTEMPTS", "DELIVERED", "LOG"], rows, &webhooks)?;
        }

        WebhooksCommand::Listen { count, poll_ms } => {
            console.require(Permission::UsePaymentTestbed).await?;
            let listener = WebhookListener::for_current_tenant(console.backend.clone())
                .await?
                .with_poll_interval(Duration::from_millis(poll_ms.max(1)));
            out.note(&format!("Listening for webhooks of tenant {} (Ctrl-C to stop)", listener.tenant_id()))?;

            let mut subscription = listener.subscribe().await?;
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            let mut received = 0usize;
            while count.map_or(true, |max| received < max) {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    event = subscription.next() => {
                        let Some(event) = event else { break };
                        received += 1;
                        out.message(&format!("{}  {}", event.event_type, event.data), &event)?;
                    }
                }
            }

            subscription.unsubscribe().await;
            out.note(&format!("Received {} webhook(s)", received))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tenantdesk_shared::models::webhook::{AttemptStatus, DeliveryLog};
    use uuid::Uuid;

    #[test]
    fn test_attempt_summary() {
        let log = |attempt_number, status, error_message: Option<&str>| DeliveryLog {
            attempt_number,
            status,
            error_message: error_message.map(str::to_string),
            created_at: Utc::now(),
        };
        let webhook = MockWebhook {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            event_type: "charge.refunded".to_string(),
            data: json!({}),
            delivery_attempts: 2,
            last_attempt_at: None,
            delivered_at: None,
            created_at: Utc::now(),
            logs: vec![
                log(1, AttemptStatus::Failed, Some("Network timeout")),
                log(2, AttemptStatus::Success, None),
            ],
        };

        assert_eq!(attempt_summary(&webhook), "#1 failed (Network timeout), #2 success");
    }
}
