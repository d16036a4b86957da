/// Member subscription model and lifecycle operations
///
/// The subscription lifecycle (trials, renewals, upgrades, cancellation) is
/// implemented by stored procedures; these functions name the transitions
/// and carry their parameters. Bulk operations run server-side and report
/// progress through a `bulk_operations` record that callers poll.
///
/// # Lifecycle
///
/// ```text
/// incomplete ──▶ active ──▶ past_due ──▶ canceled
///                  ▲           │             │
///                  └── retry ──┘  reactivate ┘
/// ```
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::models::subscription::{MemberSubscription, SubscriptionStatus};
/// use tenantdesk_shared::backend::Backend;
/// use uuid::Uuid;
///
/// # async fn example(backend: &dyn Backend, user_id: Uuid, plan_id: Uuid) -> tenantdesk_shared::error::ConsoleResult<()> {
/// let id = MemberSubscription::create_trial(backend, user_id, plan_id).await?;
/// MemberSubscription::process_trial_expiration(backend, id, true).await?;
///
/// let operation_id =
///     MemberSubscription::bulk_update_status(backend, &[id], SubscriptionStatus::Active).await?;
/// # Ok(())
/// # }
/// ```

use crate::backend::{call, call_or_default, current_tenant_id, Backend};
use crate::error::{ConsoleError, ConsoleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Incomplete,
}

impl SubscriptionStatus {
    /// Converts status to its column value
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Incomplete => "incomplete",
        }
    }

    /// Parses a column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "canceled" => Some(SubscriptionStatus::Canceled),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            _ => None,
        }
    }
}

/// A member's subscription to a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,

    /// Cancels when the current period ends instead of renewing
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// Payment provider reference, if any
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row returned by `get_tenant_subscriptions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub status: SubscriptionStatus,

    /// Still within the free trial
    #[serde(default)]
    pub is_trial: bool,

    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,

    pub current_period_end: DateTime<Utc>,

    /// Price per interval, in dollars
    pub amount: f64,
}

/// Progress of a server-side bulk operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperation {
    /// e.g. `update_status`, `cancel`, `convert_trials`
    pub operation_type: String,
    pub total_items: i64,
    pub processed_items: i64,
    pub failed_items: i64,

    /// Per-item results; failed items carry an `error` field
    #[serde(default)]
    pub details: Vec<JsonValue>,

    pub created_at: DateTime<Utc>,
}

impl BulkOperation {
    /// Whether every item has been processed or has failed
    pub fn is_complete(&self) -> bool {
        self.processed_items + self.failed_items >= self.total_items
    }

    /// Error messages of the failed items
    pub fn errors(&self) -> Vec<&str> {
        self.details
            .iter()
            .filter_map(|d| d.get("error").and_then(JsonValue::as_str))
            .collect()
    }

    /// Fetches the current progress of an operation
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the backend has no such operation.
    pub async fn fetch(backend: &dyn Backend, operation_id: Uuid) -> ConsoleResult<Self> {
        let status: Option<Self> = call(
            backend,
            "get_bulk_operation_status",
            json!({ "p_operation_id": operation_id }),
        )
        .await?;
        status.ok_or_else(|| ConsoleError::NotFound("Bulk operation".to_string()))
    }
}

#[derive(Deserialize)]
struct BulkStarted {
    operation_id: Uuid,
}

async fn start_bulk(backend: &dyn Backend, name: &str, params: JsonValue) -> ConsoleResult<Uuid> {
    let started: BulkStarted = call(backend, name, params).await?;
    info!(operation_id = %started.operation_id, procedure = name, "Started bulk operation");
    Ok(started.operation_id)
}

impl MemberSubscription {
    /// Subscribes a user to a plan and returns the subscription ID
    pub async fn create(
        backend: &dyn Backend,
        user_id: Uuid,
        plan_id: Uuid,
        stripe_subscription_id: Option<&str>,
    ) -> ConsoleResult<Uuid> {
        let id: Uuid = call(
            backend,
            "create_subscription",
            json!({
                "p_user_id": user_id,
                "p_plan_id": plan_id,
                "p_stripe_subscription_id": stripe_subscription_id,
            }),
        )
        .await?;
        info!(subscription_id = %id, user_id = %user_id, plan_id = %plan_id, "Created subscription");
        Ok(id)
    }

    /// Starts a free trial of a plan and returns the subscription ID
    pub async fn create_trial(backend: &dyn Backend, user_id: Uuid, plan_id: Uuid) -> ConsoleResult<Uuid> {
        let id: Uuid = call(
            backend,
            "create_trial_subscription",
            json!({ "p_user_id": user_id, "p_plan_id": plan_id }),
        )
        .await?;
        info!(subscription_id = %id, user_id = %user_id, plan_id = %plan_id, "Created trial subscription");
        Ok(id)
    }

    /// Sets a subscription's status
    pub async fn update_status(
        backend: &dyn Backend,
        id: Uuid,
        status: SubscriptionStatus,
        cancel_at_period_end: bool,
    ) -> ConsoleResult<()> {
        backend
            .rpc(
                "update_subscription_status",
                json!({
                    "p_subscription_id": id,
                    "p_status": status,
                    "p_cancel_at_period_end": cancel_at_period_end,
                }),
            )
            .await?;
        Ok(())
    }

    /// Lists a user's subscriptions
    pub async fn list_for_user(backend: &dyn Backend, user_id: Uuid) -> ConsoleResult<Vec<Self>> {
        call_or_default(backend, "get_user_subscriptions", json!({ "p_user_id": user_id })).await
    }

    /// Lists a tenant's subscriptions with user and plan names
    pub async fn list_for_tenant(
        backend: &dyn Backend,
        tenant_id: Uuid,
    ) -> ConsoleResult<Vec<SubscriptionSummary>> {
        call_or_default(backend, "get_tenant_subscriptions", json!({ "p_tenant_id": tenant_id })).await
    }

    /// Lists the subscriptions of the signed-in user's tenant
    pub async fn list_for_current_tenant(backend: &dyn Backend) -> ConsoleResult<Vec<SubscriptionSummary>> {
        let tenant_id = current_tenant_id(backend).await?;
        Self::list_for_tenant(backend, tenant_id).await
    }

    /// Renews a subscription for another period
    pub async fn process_renewal(backend: &dyn Backend, id: Uuid) -> ConsoleResult<()> {
        Self::transition(backend, "process_subscription_renewal", json!({ "p_subscription_id": id })).await
    }

    /// Cancels now, or at the end of the current period
    pub async fn cancel(backend: &dyn Backend, id: Uuid, immediate: bool) -> ConsoleResult<()> {
        Self::transition(
            backend,
            "cancel_subscription",
            json!({ "p_subscription_id": id, "p_immediate": immediate }),
        )
        .await
    }

    /// Reactivates a canceled subscription
    pub async fn reactivate(backend: &dyn Backend, id: Uuid) -> ConsoleResult<()> {
        Self::transition(backend, "reactivate_subscription", json!({ "p_subscription_id": id })).await
    }

    /// Retries the failed payment of a past-due subscription
    pub async fn retry_payment(backend: &dyn Backend, id: Uuid) -> ConsoleResult<()> {
        Self::transition(backend, "retry_subscription_payment", json!({ "p_subscription_id": id })).await
    }

    /// Moves to a pricier plan, now or at the next renewal
    pub async fn upgrade(
        backend: &dyn Backend,
        id: Uuid,
        new_plan_id: Uuid,
        immediate: bool,
    ) -> ConsoleResult<()> {
        Self::transition(
            backend,
            "upgrade_subscription",
            json!({
                "p_subscription_id": id,
                "p_new_plan_id": new_plan_id,
                "p_immediate": immediate,
            }),
        )
        .await
    }

    /// Moves to a cheaper plan at the next renewal
    pub async fn downgrade(backend: &dyn Backend, id: Uuid, new_plan_id: Uuid) -> ConsoleResult<()> {
        Self::transition(
            backend,
            "downgrade_subscription",
            json!({ "p_subscription_id": id, "p_new_plan_id": new_plan_id }),
        )
        .await
    }

    /// Ends a trial, converting it to a paid subscription when `convert`
    pub async fn process_trial_expiration(
        backend: &dyn Backend,
        id: Uuid,
        convert: bool,
    ) -> ConsoleResult<()> {
        Self::transition(
            backend,
            "process_trial_expiration",
            json!({ "p_subscription_id": id, "p_convert": convert }),
        )
        .await
    }

    async fn transition(backend: &dyn Backend, procedure: &str, params: JsonValue) -> ConsoleResult<()> {
        let subscription_id = params["p_subscription_id"].clone();
        backend.rpc(procedure, params).await?;
        info!(subscription_id = %subscription_id, procedure, "Subscription transition");
        Ok(())
    }

    /// Starts a bulk status change and returns the operation ID
    pub async fn bulk_update_status(
        backend: &dyn Backend,
        ids: &[Uuid],
        status: SubscriptionStatus,
    ) -> ConsoleResult<Uuid> {
        start_bulk(
            backend,
            "bulk_update_subscription_status",
            json!({ "p_subscription_ids": ids, "p_status": status }),
        )
        .await
    }

    /// Starts a bulk cancellation and returns the operation ID
    pub async fn bulk_cancel(backend: &dyn Backend, ids: &[Uuid], immediate: bool) -> ConsoleResult<Uuid> {
        start_bulk(
            backend,
            "bulk_cancel_subscriptions",
            json!({ "p_subscription_ids": ids, "p_immediate": immediate }),
        )
        .await
    }

    /// Starts converting trials to paid subscriptions and returns the operation ID
    pub async fn bulk_convert_trials(backend: &dyn Backend, ids: &[Uuid]) -> ConsoleResult<Uuid> {
        start_bulk(backend, "bulk_convert_trials", json!({ "p_subscription_ids": ids })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthUser, MockBackend};

    fn operation(total: i64, processed: i64, failed: i64) -> BulkOperation {
        BulkOperation {
            operation_type: "cancel".to_string(),
            total_items: total,
            processed_items: processed,
            failed_items: failed,
            details: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
        assert_eq!(SubscriptionStatus::from_str("incomplete"), Some(SubscriptionStatus::Incomplete));
        assert_eq!(SubscriptionStatus::from_str("trial"), None);
    }

    #[test]
    fn test_bulk_completion() {
        assert!(!operation(5, 0, 0).is_complete());
        assert!(!operation(5, 3, 1).is_complete());
        assert!(operation(5, 4, 1).is_complete());
        assert!(operation(5, 0, 5).is_complete());
        assert!(operation(0, 0, 0).is_complete());
    }

    #[test]
    fn test_bulk_errors() {
        let mut op = operation(3, 1, 2);
        op.details = vec![
            json!({ "id": "a" }),
            json!({ "id": "b", "error": "Subscription not found" }),
            json!({ "id": "c", "error": "Already canceled" }),
        ];
        assert_eq!(op.errors(), vec!["Subscription not found", "Already canceled"]);
    }

    #[tokio::test]
    async fn test_transition_parameters() {
        let backend = MockBackend::new();
        backend.on_rpc("upgrade_subscription", |_| Ok(json!(true)));
        backend.on_rpc("process_trial_expiration", |_| Ok(json!(true)));
        let id = Uuid::new_v4();
        let plan = Uuid::new_v4();

        MemberSubscription::upgrade(&backend, id, plan, false).await.unwrap();
        MemberSubscription::process_trial_expiration(&backend, id, true).await.unwrap();

        assert_eq!(
            backend.rpc_calls("upgrade_subscription")[0],
            json!({ "p_subscription_id": id, "p_new_plan_id": plan, "p_immediate": false })
        );
        assert_eq!(backend.rpc_calls("process_trial_expiration")[0]["p_convert"], true);
    }

    #[tokio::test]
    async fn test_create_passes_optional_reference() {
        let backend = MockBackend::new();
        let id = Uuid::new_v4();
        backend.on_rpc("create_subscription", move |_| Ok(json!(id)));

        let created = MemberSubscription::create(&backend, Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap();
        assert_eq!(created, id);
        assert!(backend.rpc_calls("create_subscription")[0]["p_stripe_subscription_id"].is_null());
    }

    #[tokio::test]
    async fn test_list_for_current_tenant() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "owner@acme.test".to_string(),
        };
        let tenant = Uuid::new_v4();
        let backend = MockBackend::new().with_user(user.clone());
        backend.seed("user_profiles", vec![json!({ "id": user.id, "tenant_id": tenant })]);
        backend.on_rpc("get_tenant_subscriptions", |_| {
            Ok(json!([{
                "subscription_id": Uuid::new_v4(),
                "user_id": Uuid::new_v4(),
                "user_name": "Ada",
                "plan_id": Uuid::new_v4(),
                "plan_name": "Pro",
                "status": "active",
                "is_trial": true,
                "trial_ends_at": "2024-02-01T00:00:00Z",
                "current_period_end": "2024-02-01T00:00:00Z",
                "amount": 29.0,
            }]))
        });

        let subscriptions = MemberSubscription::list_for_current_tenant(&backend).await.unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert!(subscriptions[0].is_trial);
        assert_eq!(
            backend.rpc_calls("get_tenant_subscriptions")[0],
            json!({ "p_tenant_id": tenant })
        );
    }

    #[tokio::test]
    async fn test_bulk_start_returns_operation_id() {
        let backend = MockBackend::new();
        let operation_id = Uuid::new_v4();
        backend.on_rpc("bulk_cancel_subscriptions", move |_| {
            Ok(json!({ "operation_id": operation_id }))
        });
        let ids = [Uuid::new_v4(), Uuid::new_v4()];

        let started = MemberSubscription::bulk_cancel(&backend, &ids, true).await.unwrap();
        assert_eq!(started, operation_id);

        let params = &backend.rpc_calls("bulk_cancel_subscriptions")[0];
        assert_eq!(params["p_subscription_ids"], json!(ids));
        assert_eq!(params["p_immediate"], true);
    }

    #[tokio::test]
    async fn test_fetch_missing_operation() {
        let backend = MockBackend::new();
        backend.on_rpc("get_bulk_operation_status", |_| Ok(JsonValue::Null));

        let err = BulkOperation::fetch(&backend, Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
