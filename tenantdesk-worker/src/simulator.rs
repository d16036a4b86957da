/// Webhook delivery simulator
///
/// Delivers a simulated webhook with retries. The flow for one delivery:
///
/// ```text
/// deliver(event_type)
///   ├─> Look up the event and build its payload
///   ├─> Resolve the tenant (explicit, or the signed-in user's)
///   ├─> Insert the webhook record
///   ├─> For attempt 1..=max_attempts:
///   │     ├─> Transmit over the network simulator
///   │     ├─> Log the attempt (success or failure with message)
///   │     ├─> On success: mark delivered, return delivered = true
///   │     └─> On failure: wait 2^n seconds unless this was the last attempt
///   └─> Mark failed, return delivered = false
/// ```
///
/// Only setup can fail with an error: an unknown event, no tenant, or the
/// backend refusing the webhook record. Running out of attempts is a normal
/// outcome. Failing to write an attempt log is reported and otherwise
/// ignored.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tenantdesk_shared::backend::MockBackend;
/// use tenantdesk_worker::simulator::WebhookSimulator;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let simulator = WebhookSimulator::new(Arc::new(MockBackend::new()))
///     .for_tenant(Uuid::new_v4());
///
/// let outcome = simulator.deliver("payment_intent.succeeded").await?;
/// println!("{} after {} attempts", outcome.delivered, outcome.attempts);
///
/// // Or without waiting
/// let _handle = simulator.spawn_delivery("charge.refunded");
/// # Ok(())
/// # }
/// ```

use crate::events::find_event;
use crate::network::{NetworkSimulator, RandomNetwork};
use hmac::digest::InvalidLength;
use serde::Serialize;
use std::sync::Arc;
use tenantdesk_shared::backend::{current_tenant_id, Backend};
use tenantdesk_shared::config::WebhookConfig;
use tenantdesk_shared::error::ConsoleError;
use tenantdesk_shared::models::webhook::{AttemptStatus, MockWebhook};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Setup failures of a delivery
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// Not in the event catalog
    #[error("Unknown webhook event type: {0}")]
    UnknownEvent(String),

    /// Signing secret rejected by HMAC
    #[error("Invalid webhook signing secret")]
    InvalidSecret(#[from] InvalidLength),

    /// Tenant lookup or webhook record creation failed
    #[error(transparent)]
    Console(#[from] ConsoleError),
}

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub max_attempts: u32,

    /// Wait after the first failed attempt; doubles for each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Default backoff with `max_attempts` attempts (at least 1)
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Wait after failed attempt `attempt` (1-based)
    ///
    /// `base_delay * 2^(attempt - 1)`: 2 s, 4 s, 8 s with the default base.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Result of one delivery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub webhook_id: Uuid,
    pub delivered: bool,

    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Delivers simulated webhooks
#[derive(Clone)]
pub struct WebhookSimulator {
    backend: Arc<dyn Backend>,
    network: Arc<dyn NetworkSimulator>,
    policy: RetryPolicy,
    tenant_id: Option<Uuid>,
    signing_secret: Option<String>,
}

impl WebhookSimulator {
    /// Simulator over a random network with the default retry policy
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        WebhookSimulator {
            backend,
            network: Arc::new(RandomNetwork::new()),
            policy: RetryPolicy::default(),
            tenant_id: None,
            signing_secret: None,
        }
    }

    /// Simulator configured from the webhook settings
    pub fn from_config(backend: Arc<dyn Backend>, config: &WebhookConfig) -> Self {
        let mut simulator = Self::new(backend).with_policy(RetryPolicy::with_max_attempts(config.max_retries));
        simulator.signing_secret = config.signing_secret.clone();
        simulator
    }

    pub fn with_network(mut self, network: Arc<dyn NetworkSimulator>) -> Self {
        self.network = network;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        self
    }

    /// Delivers for `tenant_id` instead of the signed-in user's tenant
    pub fn for_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Creates a webhook for `event_type` and delivers it with retries
    ///
    /// # Errors
    ///
    /// Only for setup: unknown event type, no tenant, invalid signing
    /// secret, or the webhook record could not be created. A delivery that
    /// runs out of attempts returns `Ok` with `delivered == false`.
    pub async fn deliver(&self, event_type: &str) -> Result<DeliveryOutcome, SimulatorError> {
        let event = find_event(event_type)
            .ok_or_else(|| SimulatorError::UnknownEvent(event_type.to_string()))?;

        let payload = match &self.signing_secret {
            Some(secret) => event.signed_envelope(secret.as_bytes())?,
            None => event.envelope(),
        };

        let tenant_id = match self.tenant_id {
            Some(id) => id,
            None => current_tenant_id(self.backend.as_ref()).await?,
        };

        let webhook = MockWebhook::create(self.backend.as_ref(), tenant_id, event_type, payload).await?;
        info!(
            webhook_id = %webhook.id,
            tenant_id = %tenant_id,
            event_type,
            max_attempts = self.policy.max_attempts,
            "Delivering simulated webhook"
        );

        for attempt in 1..=self.policy.max_attempts {
            match self.network.transmit(attempt).await {
                Ok(()) => {
                    self.log_attempt(webhook.id, attempt, AttemptStatus::Success, None).await;
                    if let Err(e) = MockWebhook::mark_delivered(self.backend.as_ref(), webhook.id).await {
                        warn!(webhook_id = %webhook.id, error = %e, "Failed to mark webhook delivered");
                    }

                    info!(webhook_id = %webhook.id, attempt, "Webhook delivered");
                    return Ok(DeliveryOutcome {
                        webhook_id: webhook.id,
                        delivered: true,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(webhook_id = %webhook.id, attempt, error = %message, "Webhook attempt failed");
                    self.log_attempt(webhook.id, attempt, AttemptStatus::Failed, Some(&message))
                        .await;

                    if attempt < self.policy.max_attempts {
                        let delay = self.policy.backoff_for(attempt);
                        debug!(webhook_id = %webhook.id, attempt, delay_secs = delay.as_secs_f64(), "Backing off");
                        sleep(delay).await;
                    }
                }
            }
        }

        if let Err(e) = MockWebhook::mark_failed(self.backend.as_ref(), webhook.id).await {
            warn!(webhook_id = %webhook.id, error = %e, "Failed to mark webhook failed");
        }

        warn!(
            webhook_id = %webhook.id,
            attempts = self.policy.max_attempts,
            "Webhook delivery exhausted all attempts"
        );
        Ok(DeliveryOutcome {
            webhook_id: webhook.id,
            delivered: false,
            attempts: self.policy.max_attempts,
        })
    }

    /// Runs [`deliver`](Self::deliver) on its own task
    ///
    /// The caller may drop the handle; the outcome is logged either way.
    pub fn spawn_delivery(
        &self,
        event_type: impl Into<String>,
    ) -> JoinHandle<Result<DeliveryOutcome, SimulatorError>> {
        let simulator = self.clone();
        let event_type = event_type.into();

        tokio::spawn(async move {
            let result = simulator.deliver(&event_type).await;
            if let Err(e) = &result {
                error!(event_type = %event_type, error = %e, "Webhook delivery could not start");
            }
            result
        })
    }

    async fn log_attempt(
        &self,
        webhook_id: Uuid,
        attempt: u32,
        status: AttemptStatus,
        error_message: Option<&str>,
    ) {
        if let Err(e) =
            MockWebhook::log_attempt(self.backend.as_ref(), webhook_id, attempt, status, error_message).await
        {
            warn!(
                webhook_id = %webhook_id,
                attempt,
                error = %e,
                "Failed to log webhook delivery attempt"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkError, ScriptedNetwork};
    use serde_json::{json, Value as JsonValue};
    use tenantdesk_shared::backend::{AuthUser, MockBackend};
    use tokio::time::Instant;

    fn backend() -> MockBackend {
        let backend = MockBackend::new();
        backend.on_rpc("log_webhook_delivery_attempt", |_| Ok(JsonValue::Null));
        backend.on_rpc("mark_webhook_delivered", |_| Ok(JsonValue::Null));
        backend.on_rpc("mark_webhook_failed", |_| Ok(JsonValue::Null));
        backend
    }

    fn simulator(backend: &MockBackend, network: Arc<ScriptedNetwork>, max_attempts: u32) -> WebhookSimulator {
        WebhookSimulator::new(Arc::new(backend.clone()))
            .with_network(network)
            .with_policy(RetryPolicy::with_max_attempts(max_attempts))
            .for_tenant(Uuid::new_v4())
    }

    fn logged_statuses(backend: &MockBackend) -> Vec<String> {
        backend
            .rpc_calls("log_webhook_delivery_attempt")
            .iter()
            .map(|params| params["p_status"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_backoff_doubles_from_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(1024));
    }

    #[test]
    fn test_policy_needs_one_attempt() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_succeeds() {
        let backend = backend();
        let network = Arc::new(ScriptedNetwork::fail_first(0));

        let outcome = simulator(&backend, network, 3)
            .deliver("payment_intent.succeeded")
            .await
            .unwrap();

        assert!(outcome.delivered);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(logged_statuses(&backend), vec!["success"]);
        assert_eq!(backend.rpc_calls("mark_webhook_delivered").len(), 1);
        assert!(backend.rpc_calls("mark_webhook_failed").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_attempt_k_logs_k_attempts() {
        for k in 1..=5u32 {
            let backend = backend();
            let network = Arc::new(ScriptedNetwork::fail_first((k - 1) as usize));

            let outcome = simulator(&backend, network.clone(), 5)
                .deliver("charge.refunded")
                .await
                .unwrap();

            assert!(outcome.delivered);
            assert_eq!(outcome.attempts, k);
            assert_eq!(network.transmissions().len(), k as usize);

            let statuses = logged_statuses(&backend);
            assert_eq!(statuses.len(), k as usize);
            assert_eq!(statuses.last().map(String::as_str), Some("success"));
            assert!(statuses[..k as usize - 1].iter().all(|s| s == "failed"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_undelivered() {
        for max_attempts in 1..=4u32 {
            let backend = backend();
            let network = Arc::new(ScriptedNetwork::always_fail(10));

            let outcome = simulator(&backend, network.clone(), max_attempts)
                .deliver("payment_intent.failed")
                .await
                .unwrap();

            assert!(!outcome.delivered);
            assert_eq!(outcome.attempts, max_attempts);
            assert_eq!(network.transmissions().len(), max_attempts as usize);

            let logs = backend.rpc_calls("log_webhook_delivery_attempt");
            assert_eq!(logs.len(), max_attempts as usize);
            for (i, params) in logs.iter().enumerate() {
                assert_eq!(params["p_attempt_number"], json!(i + 1));
                assert_eq!(params["p_status"], "failed");
                assert_eq!(params["p_error_message"], "Network timeout");
            }
            assert_eq!(backend.rpc_calls("mark_webhook_failed").len(), 1);
            assert!(backend.rpc_calls("mark_webhook_delivered").is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let backend = backend();
        let network = Arc::new(ScriptedNetwork::always_fail(4));

        let start = Instant::now();
        simulator(&backend, network.clone(), 4)
            .deliver("payment_intent.succeeded")
            .await
            .unwrap();

        let times: Vec<Instant> = network.transmissions().iter().map(|(_, t)| *t).collect();
        assert_eq!(times.len(), 4);
        for n in 1..times.len() {
            let gap = times[n] - times[n - 1];
            let expected = Duration::from_secs(1 << n);
            assert!(
                gap >= expected && gap < expected + Duration::from_millis(5),
                "gap after attempt {} was {:?}",
                n,
                gap
            );
        }

        // No wait after the final attempt
        let total = start.elapsed();
        assert!(total < Duration::from_secs(2 + 4 + 8) + Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_failures_do_not_change_outcome() {
        let backend = MockBackend::new();
        backend.on_rpc("mark_webhook_delivered", |_| Ok(JsonValue::Null));
        // log_webhook_delivery_attempt is not registered and fails every time

        let network = Arc::new(ScriptedNetwork::from_outcomes([Err(NetworkError::Timeout), Ok(())]));
        let outcome = simulator(&backend, network, 3)
            .deliver("payment_intent.succeeded")
            .await
            .unwrap();

        assert!(outcome.delivered);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(backend.rpc_calls("log_webhook_delivery_attempt").len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_event_is_an_error() {
        let backend = backend();
        let network = Arc::new(ScriptedNetwork::default());

        let result = simulator(&backend, network.clone(), 3).deliver("invoice.paid").await;

        assert!(matches!(result, Err(SimulatorError::UnknownEvent(_))));
        assert!(backend.rows("mock_webhooks").is_empty());
        assert!(network.transmissions().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tenant_is_an_error() {
        let backend = backend();
        let simulator = WebhookSimulator::new(Arc::new(backend.clone()))
            .with_network(Arc::new(ScriptedNetwork::default()));

        let result = simulator.deliver("payment_intent.succeeded").await;
        assert!(matches!(
            result,
            Err(SimulatorError::Console(ConsoleError::NotAuthenticated))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_tenant_of_signed_in_user() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
        };
        let tenant_id = Uuid::new_v4();
        let backend = backend().with_user(user.clone());
        backend.seed("user_profiles", vec![json!({ "id": user.id, "tenant_id": tenant_id })]);

        let simulator = WebhookSimulator::new(Arc::new(backend.clone()))
            .with_network(Arc::new(ScriptedNetwork::default()));
        simulator.deliver("payment_intent.succeeded").await.unwrap();

        let rows = backend.rows("mock_webhooks");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["tenant_id"], json!(tenant_id));
        assert_eq!(rows[0]["event_type"], "payment_intent.succeeded");
        assert_eq!(rows[0]["data"]["type"], "payment_intent.succeeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_payload() {
        let backend = backend();
        let simulator = simulator(&backend, Arc::new(ScriptedNetwork::default()), 3)
            .with_signing_secret("whsec_test");

        simulator.deliver("charge.refunded").await.unwrap();

        let rows = backend.rows("mock_webhooks");
        let signature = rows[0]["data"]["signature"].as_str().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_delivery() {
        let backend = backend();
        let network = Arc::new(ScriptedNetwork::fail_first(1));

        let handle = simulator(&backend, network, 3).spawn_delivery("payment_intent.succeeded");
        let outcome = handle.await.unwrap().unwrap();

        assert!(outcome.delivered);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn test_from_config() {
        let config = WebhookConfig {
            max_retries: 5,
            signing_secret: Some("s".to_string()),
        };
        let simulator = WebhookSimulator::from_config(Arc::new(MockBackend::new()), &config);
        assert_eq!(simulator.policy().max_attempts, 5);
        assert_eq!(simulator.policy().base_delay, Duration::from_secs(2));
    }
}
