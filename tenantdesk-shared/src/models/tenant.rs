/// Tenant model and backend operations
///
/// Tenants are the customer organizations of the platform. All tenant
/// operations go through stored procedures, which enforce that only platform
/// admins see or change tenants other than their own.
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::models::tenant::{CreateTenant, Tenant, TenantStatus, UpdateTenant};
/// use tenantdesk_shared::backend::Backend;
///
/// # async fn example(backend: &dyn Backend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// let id = Tenant::create(backend, CreateTenant { name: "Acme Corp".to_string() }).await?;
///
/// Tenant::update(
///     backend,
///     id,
///     UpdateTenant { status: Some(TenantStatus::Inactive), ..Default::default() },
/// )
/// .await?;
///
/// let stats = Tenant::stats(backend, id).await?;
/// println!("{} users", stats.total_users);
/// # Ok(())
/// # }
/// ```

use crate::backend::{call, call_or_default, Backend};
use crate::error::ConsoleResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Whether a tenant is in service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    /// Converts status to its column value
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
        }
    }

    /// Parses a column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TenantStatus::Active),
            "inactive" => Some(TenantStatus::Inactive),
            _ => None,
        }
    }
}

/// State of the tenant's own platform subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantBilling {
    Active,
    Canceled,
    PastDue,
}

impl TenantBilling {
    /// Converts the value to its column value
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantBilling::Active => "active",
            TenantBilling::Canceled => "canceled",
            TenantBilling::PastDue => "past_due",
        }
    }
}

/// A customer organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant ID
    pub id: Uuid,

    /// Organization name
    pub name: String,

    /// Service status
    pub status: TenantStatus,

    /// Platform billing status
    pub subscription_status: TenantBilling,

    /// When the tenant was created
    pub created_at: DateTime<Utc>,
}

/// Headline numbers for one tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantStats {
    #[serde(default)]
    pub total_users: i64,

    #[serde(default)]
    pub active_plans: i64,

    /// Revenue in dollars
    #[serde(default)]
    pub total_revenue: f64,
}

/// Input for creating a tenant
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTenant {
    /// Organization name
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
}

/// Input for updating a tenant
///
/// `None` fields are sent as `null`, which the procedure treats as "keep".
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTenant {
    /// New name
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: Option<String>,

    /// New status
    pub status: Option<TenantStatus>,
}

impl Tenant {
    /// Lists the tenants the signed-in user may see
    ///
    /// A `null` result is an empty list.
    pub async fn list_accessible(backend: &dyn Backend) -> ConsoleResult<Vec<Self>> {
        call_or_default(backend, "get_accessible_tenants", json!({})).await
    }

    /// Creates a tenant and returns its ID
    pub async fn create(backend: &dyn Backend, data: CreateTenant) -> ConsoleResult<Uuid> {
        data.validate()?;
        let id: Uuid = call(backend, "create_tenant", json!({ "p_name": data.name })).await?;
        info!(tenant_id = %id, name = %data.name, "Created tenant");
        Ok(id)
    }

    /// Updates a tenant's name and/or status
    ///
    /// Returns whether the procedure reported a change.
    pub async fn update(backend: &dyn Backend, id: Uuid, data: UpdateTenant) -> ConsoleResult<bool> {
        data.validate()?;
        call(
            backend,
            "update_tenant",
            json!({
                "p_tenant_id": id,
                "p_name": data.name,
                "p_status": data.status,
            }),
        )
        .await
    }

    /// Deletes a tenant
    ///
    /// Returns whether the procedure deleted it.
    pub async fn delete(backend: &dyn Backend, id: Uuid) -> ConsoleResult<bool> {
        let deleted: bool = call(backend, "delete_tenant", json!({ "p_tenant_id": id })).await?;
        if deleted {
            info!(tenant_id = %id, "Deleted tenant");
        }
        Ok(deleted)
    }

    /// Gets headline numbers for a tenant
    pub async fn stats(backend: &dyn Backend, id: Uuid) -> ConsoleResult<TenantStats> {
        call_or_default(backend, "get_tenant_stats", json!({ "p_tenant_id": id })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::ConsoleError;
    use serde_json::Value as JsonValue;

    #[test]
    fn test_status_conversion() {
        assert_eq!(TenantStatus::Inactive.as_str(), "inactive");
        assert_eq!(TenantStatus::from_str("active"), Some(TenantStatus::Active));
        assert_eq!(TenantStatus::from_str("deleted"), None);
        assert_eq!(TenantBilling::PastDue.as_str(), "past_due");
    }

    #[tokio::test]
    async fn test_list_null_is_empty() {
        let backend = MockBackend::new();
        backend.on_rpc("get_accessible_tenants", |_| Ok(JsonValue::Null));
        assert!(Tenant::list_accessible(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_decodes_rows() {
        let backend = MockBackend::new();
        backend.on_rpc("get_accessible_tenants", |_| {
            Ok(json!([{
                "id": "6f1c1b1e-8a51-4bb4-9d55-3f6b0f1f2a10",
                "name": "Acme",
                "status": "active",
                "subscription_status": "past_due",
                "created_at": "2024-01-05T10:00:00Z",
            }]))
        });

        let tenants = Tenant::list_accessible(&backend).await.unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].subscription_status, TenantBilling::PastDue);
    }

    #[tokio::test]
    async fn test_create_sends_name() {
        let backend = MockBackend::new();
        let id = Uuid::new_v4();
        backend.on_rpc("create_tenant", move |_| Ok(json!(id)));

        let created = Tenant::create(&backend, CreateTenant { name: "Acme".to_string() })
            .await
            .unwrap();
        assert_eq!(created, id);
        assert_eq!(backend.rpc_calls("create_tenant")[0], json!({ "p_name": "Acme" }));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let backend = MockBackend::new();
        let err = Tenant::create(&backend, CreateTenant { name: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_sends_nulls_for_unchanged() {
        let backend = MockBackend::new();
        backend.on_rpc("update_tenant", |_| Ok(json!(true)));
        let id = Uuid::new_v4();

        let changed = Tenant::update(
            &backend,
            id,
            UpdateTenant {
                status: Some(TenantStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(changed);
        assert_eq!(
            backend.rpc_calls("update_tenant")[0],
            json!({ "p_tenant_id": id, "p_name": null, "p_status": "inactive" })
        );
    }

    #[tokio::test]
    async fn test_delete_error_passes_through() {
        let backend = MockBackend::new();
        backend.on_rpc("delete_tenant", |_| {
            Err(ConsoleError::Backend {
                code: Some("42501".to_string()),
                message: "Only platform admins can delete tenants".to_string(),
            })
        });

        let err = Tenant::delete(&backend, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.user_message(), "Only platform admins can delete tenants");
    }

    #[tokio::test]
    async fn test_stats_defaults_missing_fields() {
        let backend = MockBackend::new();
        backend.on_rpc("get_tenant_stats", |_| Ok(json!({ "total_users": 12 })));

        let stats = Tenant::stats(&backend, Uuid::new_v4()).await.unwrap();
        assert_eq!(stats.total_users, 12);
        assert_eq!(stats.active_plans, 0);
        assert_eq!(stats.total_revenue, 0.0);
    }
}
