/// Client-side state shared across the console
///
/// Holds the signed-in user, a loading flag, and cached membership plans and
/// content items. The store is cheap to clone; clones share state. Refills
/// replace the cache wholesale ("last write wins"); a failed refill leaves
/// the cache as it was.
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::store::AdminStore;
/// use tenantdesk_shared::backend::Backend;
///
/// # async fn example(backend: &dyn Backend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// let store = AdminStore::new();
/// store.load_current_user(backend).await;
/// store.refresh_membership_plans(backend).await?;
///
/// for plan in store.membership_plans().await {
///     println!("{}", plan.name);
/// }
/// # Ok(())
/// # }
/// ```

use crate::backend::Backend;
use crate::error::ConsoleResult;
use crate::models::content::ContentItem;
use crate::models::plan::MembershipPlan;
use crate::models::user::User;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    current_user: Option<User>,
    is_loading: bool,
    membership_plans: Vec<MembershipPlan>,
    content_items: Vec<ContentItem>,
}

/// Shared console state
#[derive(Debug, Clone, Default)]
pub struct AdminStore {
    state: Arc<RwLock<StoreState>>,
}

impl AdminStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.current_user.clone()
    }

    pub async fn set_current_user(&self, user: Option<User>) {
        self.state.write().await.current_user = user;
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading
    }

    pub async fn set_loading(&self, loading: bool) {
        self.state.write().await.is_loading = loading;
    }

    pub async fn membership_plans(&self) -> Vec<MembershipPlan> {
        self.state.read().await.membership_plans.clone()
    }

    pub async fn content_items(&self) -> Vec<ContentItem> {
        self.state.read().await.content_items.clone()
    }

    /// Loads the signed-in user into the store and returns it
    pub async fn load_current_user(&self, backend: &dyn Backend) -> Option<User> {
        self.set_loading(true).await;
        let user = User::current(backend).await;
        {
            let mut state = self.state.write().await;
            state.current_user = user.clone();
            state.is_loading = false;
        }
        user
    }

    /// Refills the plan cache, newest first; returns the number of plans
    pub async fn refresh_membership_plans(&self, backend: &dyn Backend) -> ConsoleResult<usize> {
        let plans = MembershipPlan::list_recent(backend).await?;
        let count = plans.len();
        self.state.write().await.membership_plans = plans;
        debug!(count, "Refreshed membership plans");
        Ok(count)
    }

    /// Refills the content cache, newest first; returns the number of items
    pub async fn refresh_content_items(&self, backend: &dyn Backend) -> ConsoleResult<usize> {
        let items = ContentItem::list_recent(backend).await?;
        let count = items.len();
        self.state.write().await.content_items = items;
        debug!(count, "Refreshed content items");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::RecordedCall;
    use crate::backend::{AuthUser, MockBackend};
    use serde_json::json;
    use uuid::Uuid;

    fn plan(name: &str, created_at: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "tenant_id": Uuid::new_v4(),
            "name": name,
            "price": 10.0,
            "interval": "monthly",
            "features": [],
            "is_active": true,
            "created_at": created_at,
            "updated_at": created_at,
        })
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = AdminStore::new();
        let clone = store.clone();

        clone.set_loading(true).await;
        assert!(store.is_loading().await);
    }

    #[tokio::test]
    async fn test_refresh_plans_newest_first() {
        let backend = MockBackend::new();
        backend.seed(
            "membership_plans",
            vec![plan("Basic", "2024-01-01T00:00:00Z"), plan("Pro", "2024-03-01T00:00:00Z")],
        );
        let store = AdminStore::new();

        assert_eq!(store.refresh_membership_plans(&backend).await.unwrap(), 2);
        let plans = store.membership_plans().await;
        assert_eq!(plans[0].name, "Pro");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache() {
        let backend = MockBackend::new();
        backend.seed("membership_plans", vec![plan("Basic", "2024-01-01T00:00:00Z")]);
        let store = AdminStore::new();
        store.refresh_membership_plans(&backend).await.unwrap();

        // A row that does not decode makes the refill fail
        backend.seed("membership_plans", vec![json!({ "id": "not-a-uuid" })]);
        assert!(store.refresh_membership_plans(&backend).await.is_err());
        assert_eq!(store.membership_plans().await.len(), 1);
    }

    #[tokio::test]
    async fn test_load_current_user() {
        let viewer = AuthUser {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
        };
        let backend = MockBackend::new().with_user(viewer.clone());
        let id = viewer.id;
        backend.on_rpc("get_accessible_users", move |_| {
            Ok(json!([{
                "id": id,
                "full_name": "Ops",
                "role": "admin",
                "tenant_id": null,
                "status": "active",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
            }]))
        });
        let store = AdminStore::new();

        let user = store.load_current_user(&backend).await.unwrap();
        assert_eq!(user.email, "ops@example.com");
        assert_eq!(store.current_user().await, Some(user));
        assert!(!store.is_loading().await);
        assert!(matches!(backend.calls()[0], RecordedCall::Rpc { .. }));
    }

    #[tokio::test]
    async fn test_refresh_content_items() {
        let backend = MockBackend::new();
        let store = AdminStore::new();
        assert_eq!(store.refresh_content_items(&backend).await.unwrap(), 0);
        assert!(store.content_items().await.is_empty());
    }
}
