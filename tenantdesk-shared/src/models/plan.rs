/// Membership plan model and backend operations
///
/// A membership plan is a priced recurring offering a tenant sells to its
/// members. Plans are created and edited through stored procedures scoped to
/// the signed-in tenant admin's tenant.
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::models::plan::{CreatePlan, MembershipPlan, PlanInterval};
/// use tenantdesk_shared::backend::Backend;
///
/// # async fn example(backend: &dyn Backend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// let plan = CreatePlan {
///     name: "Pro".to_string(),
///     description: Some("Everything in Basic, plus more".to_string()),
///     price: 29.0,
///     interval: PlanInterval::Monthly,
///     trial_days: 14,
///     features: vec!["Unlimited projects".to_string()],
/// };
/// let plan_id = MembershipPlan::create(backend, plan).await?;
/// # Ok(())
/// # }
/// ```

use crate::backend::{call, call_or_default, fetch_all, Backend, TableQuery};
use crate::error::ConsoleResult;
use crate::models::subscription::MemberSubscription;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Billing interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    Monthly,
    Yearly,
}

impl PlanInterval {
    /// Converts the interval to its column value
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Monthly => "monthly",
            PlanInterval::Yearly => "yearly",
        }
    }

    /// Parses a column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(PlanInterval::Monthly),
            "yearly" => Some(PlanInterval::Yearly),
            _ => None,
        }
    }
}

/// A tenant's membership plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipPlan {
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Price per interval, in dollars
    pub price: f64,

    pub interval: PlanInterval,

    /// Marketing feature list
    #[serde(default)]
    pub features: Vec<String>,

    /// Inactive plans cannot be subscribed to
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a plan
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePlan {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub price: f64,

    pub interval: PlanInterval,

    /// Free trial length for new subscribers; 0 disables trials
    #[validate(range(max = 365, message = "must be at most 365 days"))]
    pub trial_days: u32,

    pub features: Vec<String>,
}

/// Input for updating a plan
///
/// `None` fields are sent as `null`, which the procedure treats as "keep".
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePlan {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub price: Option<f64>,

    pub interval: Option<PlanInterval>,

    pub features: Option<Vec<String>>,

    pub is_active: Option<bool>,
}

/// Action for `manage_subscription`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    Cancel,
    Reactivate,
}

impl MembershipPlan {
    /// Creates a plan for the signed-in user's tenant and returns its ID
    pub async fn create(backend: &dyn Backend, data: CreatePlan) -> ConsoleResult<Uuid> {
        data.validate()?;
        let id: Uuid = call(
            backend,
            "create_membership_plan",
            json!({
                "p_name": data.name,
                "p_description": data.description,
                "p_price": data.price,
                "p_interval": data.interval,
                "p_trial_days": data.trial_days,
                "p_features": data.features,
            }),
        )
        .await?;
        info!(plan_id = %id, name = %data.name, "Created membership plan");
        Ok(id)
    }

    /// Updates a plan; returns whether the procedure reported a change
    pub async fn update(backend: &dyn Backend, id: Uuid, data: UpdatePlan) -> ConsoleResult<bool> {
        data.validate()?;
        call(
            backend,
            "update_membership_plan",
            json!({
                "p_plan_id": id,
                "p_name": data.name,
                "p_description": data.description,
                "p_price": data.price,
                "p_interval": data.interval,
                "p_features": data.features,
                "p_is_active": data.is_active,
            }),
        )
        .await
    }

    /// Lists a tenant's plans
    pub async fn list_for_tenant(backend: &dyn Backend, tenant_id: Uuid) -> ConsoleResult<Vec<Self>> {
        call_or_default(backend, "get_tenant_plans", json!({ "p_tenant_id": tenant_id })).await
    }

    /// Lists a tenant's plans that accept new subscribers
    pub async fn list_active_for_tenant(
        backend: &dyn Backend,
        tenant_id: Uuid,
    ) -> ConsoleResult<Vec<Self>> {
        let plans = Self::list_for_tenant(backend, tenant_id).await?;
        Ok(plans.into_iter().filter(|p| p.is_active).collect())
    }

    /// Lists every plan visible to the signed-in user, newest first
    pub async fn list_recent(backend: &dyn Backend) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("membership_plans").order("created_at", false);
        fetch_all(backend, &query).await
    }

    /// Lists the subscriptions to a plan
    pub async fn subscriptions(
        backend: &dyn Backend,
        plan_id: Uuid,
    ) -> ConsoleResult<Vec<MemberSubscription>> {
        call_or_default(backend, "get_plan_subscriptions", json!({ "p_plan_id": plan_id })).await
    }

    /// Cancels or reactivates a subscription through `manage_subscription`
    pub async fn manage_subscription(
        backend: &dyn Backend,
        subscription_id: Uuid,
        action: SubscriptionAction,
    ) -> ConsoleResult<bool> {
        call(
            backend,
            "manage_subscription",
            json!({
                "p_subscription_id": subscription_id,
                "p_action": action,
            }),
        )
        .await
    }
}
