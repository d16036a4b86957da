/// Mock webhook records and delivery logs
///
/// Simulated webhooks are stored in `mock_webhooks`; each delivery attempt
/// adds a row to `mock_webhook_delivery_logs`. The delivery bookkeeping
/// (attempt counters, `delivered_at`) is maintained by stored procedures.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE mock_webhooks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id),
///     event_type TEXT NOT NULL,
///     data JSONB NOT NULL,
///     delivery_attempts INT NOT NULL DEFAULT 0,
///     last_attempt_at TIMESTAMPTZ,
///     delivered_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE mock_webhook_delivery_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     webhook_id UUID NOT NULL REFERENCES mock_webhooks(id),
///     attempt_number INT NOT NULL,
///     status TEXT NOT NULL,          -- success | failed
///     error_message TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::backend::{fetch_all, Backend, TableQuery};
use crate::error::ConsoleResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

/// Columns for the log viewer, with delivery logs embedded
const WEBHOOK_WITH_LOGS: &str = "id,tenant_id,event_type,data,delivery_attempts,last_attempt_at,\
delivered_at,created_at,mock_webhook_delivery_logs(attempt_number,status,error_message,created_at)";

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

/// A logged delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLog {
    /// 1-based attempt number
    pub attempt_number: u32,
    pub status: AttemptStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A simulated webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockWebhook {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub event_type: String,

    /// Event payload
    pub data: JsonValue,

    #[serde(default)]
    pub delivery_attempts: u32,

    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// Set once an attempt succeeds
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    /// Delivery attempts, when loaded
    #[serde(default, alias = "mock_webhook_delivery_logs")]
    pub logs: Vec<DeliveryLog>,
}

impl MockWebhook {
    /// Whether an attempt succeeded
    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }

    /// Records a new webhook for a tenant
    pub async fn create(
        backend: &dyn Backend,
        tenant_id: Uuid,
        event_type: &str,
        data: JsonValue,
    ) -> ConsoleResult<Self> {
        let row = backend
            .insert(
                "mock_webhooks",
                json!({
                    "tenant_id": tenant_id,
                    "event_type": event_type,
                    "data": data,
                }),
            )
            .await?;
        Ok(serde_json::from_value(row)?)
    }

    /// Lists the most recent webhooks with their delivery logs, newest first
    pub async fn list_recent(backend: &dyn Backend, limit: usize) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("mock_webhooks")
            .select(WEBHOOK_WITH_LOGS)
            .order("created_at", false)
            .limit(limit);
        fetch_all(backend, &query).await
    }

    /// Lists a tenant's webhooks created at or after `since`, oldest first
    ///
    /// Rows sharing the `since` timestamp are included, so a caller keeping a
    /// cursor must skip the ids it has already seen there.
    pub async fn list_since(
        backend: &dyn Backend,
        tenant_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> ConsoleResult<Vec<Self>> {
        let mut query = TableQuery::new("mock_webhooks")
            .select("id,tenant_id,event_type,data,delivery_attempts,last_attempt_at,delivered_at,created_at")
            .eq("tenant_id", tenant_id)
            .order("created_at", true);
        if let Some(since) = since {
            query = query.gte("created_at", since.to_rfc3339_opts(SecondsFormat::Micros, true));
        }
        fetch_all(backend, &query).await
    }

    /// A tenant's newest webhooks without logs, newest first
    pub async fn list_latest(backend: &dyn Backend, tenant_id: Uuid, limit: usize) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("mock_webhooks")
            .select("id,tenant_id,event_type,data,delivery_attempts,last_attempt_at,delivered_at,created_at")
            .eq("tenant_id", tenant_id)
            .order("created_at", false)
            .limit(limit);
        fetch_all(backend, &query).await
    }

    /// Logs one delivery attempt
    pub async fn log_attempt(
        backend: &dyn Backend,
        webhook_id: Uuid,
        attempt_number: u32,
        status: AttemptStatus,
        error_message: Option<&str>,
    ) -> ConsoleResult<()> {
        backend
            .rpc(
                "log_webhook_delivery_attempt",
                json!({
                    "p_webhook_id": webhook_id,
                    "p_attempt_number": attempt_number,
                    "p_status": status,
                    "p_error_message": error_message,
                }),
            )
            .await?;
        Ok(())
    }

    /// Marks a webhook delivered
    pub async fn mark_delivered(backend: &dyn Backend, webhook_id: Uuid) -> ConsoleResult<()> {
        backend
            .rpc("mark_webhook_delivered", json!({ "p_webhook_id": webhook_id }))
            .await?;
        Ok(())
    }

    /// Marks a webhook undeliverable after its last attempt
    pub async fn mark_failed(backend: &dyn Backend, webhook_id: Uuid) -> ConsoleResult<()> {
        backend
            .rpc("mark_webhook_failed", json!({ "p_webhook_id": webhook_id }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_decodes_embedded_logs() {
        let webhook: MockWebhook = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "tenant_id": Uuid::new_v4(),
            "event_type": "payment_intent.succeeded",
            "data": { "amount": 1000 },
            "delivery_attempts": 2,
            "last_attempt_at": "2024-01-05T10:00:03Z",
            "delivered_at": "2024-01-05T10:00:03Z",
            "created_at": "2024-01-05T10:00:00Z",
            "mock_webhook_delivery_logs": [
                { "attempt_number": 1, "status": "failed", "error_message": "Network timeout", "created_at": "2024-01-05T10:00:01Z" },
                { "attempt_number": 2, "status": "success", "error_message": null, "created_at": "2024-01-05T10:00:03Z" },
            ],
        }))
        .unwrap();

        assert!(webhook.is_delivered());
        assert_eq!(webhook.logs.len(), 2);
        assert_eq!(webhook.logs[0].status, AttemptStatus::Failed);
        assert_eq!(webhook.logs[0].error_message.as_deref(), Some("Network timeout"));
    }

    #[tokio::test]
    async fn test_create_and_list_since() {
        let backend = MockBackend::new();
        let tenant = Uuid::new_v4();
        backend.seed(
            "mock_webhooks",
            vec![json!({
                "id": Uuid::new_v4(),
                "tenant_id": tenant,
                "event_type": "charge.refunded",
                "data": {},
                "created_at": "2020-01-01T00:00:00.000000Z",
            })],
        );

        let created = MockWebhook::create(&backend, tenant, "payment_intent.succeeded", json!({ "amount": 1000 }))
            .await
            .unwrap();
        assert_eq!(created.delivery_attempts, 0);
        assert!(!created.is_delivered());

        let all = MockWebhook::list_since(&backend, tenant, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event_type, "charge.refunded");

        let cutoff = "2021-01-01T00:00:00Z".parse().unwrap();
        let newer = MockWebhook::list_since(&backend, tenant, Some(cutoff)).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].id, created.id);

        let inclusive = "2020-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(MockWebhook::list_since(&backend, tenant, Some(inclusive)).await.unwrap().len(), 2);

        let latest = MockWebhook::list_latest(&backend, tenant, 1).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, created.id);

        assert!(MockWebhook::list_since(&backend, Uuid::new_v4(), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_log_attempt_parameters() {
        let backend = MockBackend::new();
        backend.on_rpc("log_webhook_delivery_attempt", |_| Ok(JsonValue::Null));
        let id = Uuid::new_v4();

        MockWebhook::log_attempt(&backend, id, 2, AttemptStatus::Failed, Some("Network timeout"))
            .await
            .unwrap();

        assert_eq!(
            backend.rpc_calls("log_webhook_delivery_attempt")[0],
            json!({
                "p_webhook_id": id,
                "p_attempt_number": 2,
                "p_status": "failed",
                "p_error_message": "Network timeout",
            })
        );
    }
}
