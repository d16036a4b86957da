/// Gated content and access rules
///
/// Content items belong to a tenant. Access rules map a membership plan to a
/// content item with an access level; a member's effective access is the
/// highest level granted by any plan they actively subscribe to.
///
/// # Access Resolution
///
/// 1. Find the user's `active` subscriptions
/// 2. Find the rules for the content item in those plans
/// 3. `full` beats `preview`; no rule means no access
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::models::content::{verify_access, AccessType};
/// use tenantdesk_shared::backend::Backend;
/// use uuid::Uuid;
///
/// # async fn example(backend: &dyn Backend, content_id: Uuid, user_id: Uuid) -> tenantdesk_shared::error::ConsoleResult<()> {
/// let access = verify_access(backend, content_id, user_id).await?;
/// if access.access_type == Some(AccessType::Preview) {
///     println!("Subscribe to read the rest");
/// }
/// # Ok(())
/// # }
/// ```

use crate::backend::{current_tenant_id, fetch_all, fetch_one, Backend, TableQuery};
use crate::error::{ConsoleError, ConsoleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Format of a content item's body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Html,
    Text,
    Url,
}

/// Level of access a rule grants
///
/// Ordered so that `Full > Preview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Preview,
    Full,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Preview => "preview",
            AccessType::Full => "full",
        }
    }
}

/// A piece of gated content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content_type: ContentType,
    pub content: String,

    /// Teaser shown to members with preview access
    #[serde(default)]
    pub preview_content: Option<String>,

    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a content item in the signed-in user's tenant
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateContent {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub content_type: ContentType,
    pub content: String,
    pub is_published: bool,
}

/// Maps a plan to a content item with an access level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: Uuid,
    pub content_id: Uuid,
    pub plan_id: Uuid,
    pub access_type: AccessType,
    pub created_at: DateTime<Utc>,
}

/// Result of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub has_access: bool,
    pub access_type: Option<AccessType>,
}

impl AccessDecision {
    /// No access at all
    pub const DENIED: AccessDecision = AccessDecision {
        has_access: false,
        access_type: None,
    };
}

impl ContentItem {
    /// Lists every content item visible to the signed-in user, newest first
    pub async fn list_recent(backend: &dyn Backend) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("content_items").order("created_at", false);
        fetch_all(backend, &query).await
    }

    /// Lists a tenant's content items
    pub async fn list_for_tenant(backend: &dyn Backend, tenant_id: Uuid) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("content_items").eq("tenant_id", tenant_id);
        fetch_all(backend, &query).await
    }

    /// Creates a content item in the signed-in user's tenant
    pub async fn create(backend: &dyn Backend, data: CreateContent) -> ConsoleResult<Self> {
        data.validate()?;
        let tenant_id = current_tenant_id(backend).await?;

        let row = backend
            .insert(
                "content_items",
                json!({
                    "tenant_id": tenant_id,
                    "title": data.title,
                    "description": data.description,
                    "content_type": data.content_type,
                    "content": data.content,
                    "is_published": data.is_published,
                }),
            )
            .await?;
        let item: Self = serde_json::from_value(row)?;
        info!(content_id = %item.id, tenant_id = %tenant_id, "Created content item");
        Ok(item)
    }

    /// Gets the preview teaser of a content item
    ///
    /// An empty teaser is reported as `None`.
    pub async fn preview(backend: &dyn Backend, content_id: Uuid) -> ConsoleResult<Option<String>> {
        #[derive(Deserialize)]
        struct PreviewRow {
            #[serde(default)]
            preview_content: Option<String>,
        }

        let query = TableQuery::new("content_items")
            .select("preview_content")
            .eq("id", content_id);
        let row: PreviewRow = fetch_one(backend, &query, "Content item").await?;
        Ok(row.preview_content.filter(|p| !p.is_empty()))
    }

    /// Replaces the preview teaser of a content item
    pub async fn set_preview(backend: &dyn Backend, content_id: Uuid, preview: &str) -> ConsoleResult<()> {
        backend
            .update(
                &TableQuery::new("content_items").eq("id", content_id),
                json!({ "preview_content": preview }),
            )
            .await?;
        Ok(())
    }
}

impl AccessRule {
    /// Grants a plan access to a content item
    pub async fn create(
        backend: &dyn Backend,
        content_id: Uuid,
        plan_id: Uuid,
        access_type: AccessType,
    ) -> ConsoleResult<Self> {
        let row = backend
            .insert(
                "content_access",
                json!({
                    "content_id": content_id,
                    "plan_id": plan_id,
                    "access_type": access_type,
                }),
            )
            .await?;
        Ok(serde_json::from_value(row)?)
    }

    /// Lists the rules of a content item
    pub async fn list_for_content(backend: &dyn Backend, content_id: Uuid) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("content_access")
            .select("id,content_id,plan_id,access_type,created_at")
            .eq("content_id", content_id);
        fetch_all(backend, &query).await
    }

    /// Changes the access level of a rule
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no rule has this ID.
    pub async fn update(backend: &dyn Backend, rule_id: Uuid, access_type: AccessType) -> ConsoleResult<Self> {
        let rows = backend
            .update(
                &TableQuery::new("content_access").eq("id", rule_id),
                json!({ "access_type": access_type }),
            )
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ConsoleError::NotFound("Access rule".to_string()))?;
        Ok(serde_json::from_value(row)?)
    }

    /// Deletes a rule
    pub async fn delete(backend: &dyn Backend, rule_id: Uuid) -> ConsoleResult<()> {
        backend
            .delete(&TableQuery::new("content_access").eq("id", rule_id))
            .await
    }
}

/// Resolves a user's access to a content item
pub async fn verify_access(
    backend: &dyn Backend,
    content_id: Uuid,
    user_id: Uuid,
) -> ConsoleResult<AccessDecision> {
    #[derive(Deserialize)]
    struct PlanRef {
        plan_id: Uuid,
    }

    #[derive(Deserialize)]
    struct RuleLevel {
        access_type: AccessType,
    }

    let subscriptions: Vec<PlanRef> = fetch_all(
        backend,
        &TableQuery::new("member_subscriptions")
            .select("plan_id")
            .eq("user_id", user_id)
            .eq("status", "active"),
    )
    .await?;

    if subscriptions.is_empty() {
        return Ok(AccessDecision::DENIED);
    }

    let rules: Vec<RuleLevel> = fetch_all(
        backend,
        &TableQuery::new("content_access")
            .select("access_type")
            .eq("content_id", content_id)
            .in_list("plan_id", subscriptions.iter().map(|s| s.plan_id)),
    )
    .await?;

    Ok(highest_access(rules.iter().map(|r| r.access_type)))
}

/// Picks the highest access level among the granted ones
pub fn highest_access(levels: impl IntoIterator<Item = AccessType>) -> AccessDecision {
    match levels.into_iter().max() {
        Some(level) => AccessDecision {
            has_access: true,
            access_type: Some(level),
        },
        None => AccessDecision::DENIED,
    }
}
