/// User model and backend operations
///
/// Accounts live with the auth provider; the console sees them through the
/// `user_profiles` table (role, tenant, status) and the
/// `get_accessible_users` procedure, which returns the profiles the viewer
/// is allowed to see. Changes are logged to `user_activity`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_profiles (
///     id UUID PRIMARY KEY REFERENCES auth.users(id),
///     full_name TEXT NOT NULL,
///     role TEXT NOT NULL DEFAULT 'user',      -- admin | tenant_admin | user
///     tenant_id UUID REFERENCES tenants(id),
///     status TEXT NOT NULL DEFAULT 'active',  -- active | inactive | suspended
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE user_activity (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL,
///     action TEXT NOT NULL,
///     details JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::models::user::{UpdateProfile, User, UserStatus};
/// use tenantdesk_shared::backend::Backend;
///
/// # async fn example(backend: &dyn Backend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// let users = User::list_accessible(backend).await?;
///
/// let suspended: Vec<_> = users.iter().map(|u| u.id).collect();
/// User::bulk_update_status(backend, &suspended, UserStatus::Suspended).await?;
///
/// let update = UpdateProfile {
///     full_name: Some("Grace Hopper".to_string()),
///     ..Default::default()
/// };
/// User::update_profile(backend, users[0].id, update).await?;
/// # Ok(())
/// # }
/// ```

use crate::auth::session::AuthProvider;
use crate::backend::{call, fetch_all, require_user, Backend, TableQuery};
use crate::error::{ConsoleError, ConsoleResult};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Console roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Platform administrator: every tenant
    Admin,

    /// Administrator of one tenant
    TenantAdmin,

    /// Regular member
    User,
}

impl UserRole {
    /// Converts role to its column value
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::TenantAdmin => "tenant_admin",
            UserRole::User => "user",
        }
    }

    /// Parses a column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "tenant_admin" => Some(UserRole::TenantAdmin),
            "user" => Some(UserRole::User),
            _ => None,
        }
    }

    /// Checks if this role has the permission level of the required role
    ///
    /// Hierarchy: Admin > TenantAdmin > User
    pub fn has_permission(&self, required: &UserRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            UserRole::Admin => 3,
            UserRole::TenantAdmin => 2,
            UserRole::User => 1,
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    /// Converts status to its column value
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }

    /// Parses a column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            "suspended" => Some(UserStatus::Suspended),
            _ => None,
        }
    }
}

/// Console-side profile of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name
    pub full_name: String,

    /// Console role
    pub role: UserRole,

    /// Tenant the user belongs to (platform admins may have none)
    #[serde(default)]
    pub tenant_id: Option<Uuid>,

    /// Account status
    pub status: UserStatus,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated
    pub updated_at: DateTime<Utc>,
}

/// A user as the console shows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Account ID (same as the profile ID)
    pub id: Uuid,

    /// Sign-in email
    pub email: String,

    /// Profile, absent until the profile row exists
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

/// Row returned by `get_accessible_users`
#[derive(Debug, Clone, Deserialize)]
struct AccessibleUserRow {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(flatten)]
    profile: UserProfile,
}

/// Profile changes
///
/// Only `Some` fields are sent. `tenant_id: Some(None)` clears the tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateProfile {
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub full_name: Option<String>,

    /// New role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,

    /// New tenant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Option<Uuid>>,

    /// New status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

/// An entry in the user's activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Action name, e.g. `profile_updated`
    pub action: String,

    /// Free-form details recorded with the action
    #[serde(default)]
    pub details: JsonValue,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Lists every user the signed-in viewer may see
    ///
    /// The viewer's own email comes from the session; other rows carry the
    /// email the procedure returns, or an empty string.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` when nobody is signed in.
    pub async fn list_accessible(backend: &dyn Backend) -> ConsoleResult<Vec<Self>> {
        let viewer = require_user(backend)?;
        let rows: Option<Vec<AccessibleUserRow>> =
            call(backend, "get_accessible_users", json!({ "viewer_id": viewer.id })).await?;
        let rows = rows.ok_or_else(|| ConsoleError::backend("No profiles returned"))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let email = if row.id == viewer.id {
                    viewer.email.clone()
                } else {
                    row.email.unwrap_or_default()
                };
                User {
                    id: row.id,
                    email,
                    profile: Some(row.profile),
                }
            })
            .collect())
    }

    /// Lists the accessible users of one tenant with their emails
    ///
    /// Emails are resolved concurrently through `get_user_email`.
    pub async fn list_for_tenant(backend: &dyn Backend, tenant_id: Uuid) -> ConsoleResult<Vec<Self>> {
        let users: Vec<User> = Self::list_accessible(backend)
            .await?
            .into_iter()
            .filter(|u| u.profile.as_ref().and_then(|p| p.tenant_id) == Some(tenant_id))
            .collect();

        let emails = try_join_all(users.iter().map(|user| async move {
            let email: Option<String> =
                call(backend, "get_user_email", json!({ "user_id": user.id })).await?;
            Ok::<_, ConsoleError>(email)
        }))
        .await?;

        Ok(users
            .into_iter()
            .zip(emails)
            .map(|(mut user, email)| {
                if let Some(email) = email {
                    user.email = email;
                }
                user
            })
            .collect())
    }

    /// Gets the signed-in user with their profile
    ///
    /// Any failure while loading the profile is logged and yields `None`,
    /// the same as nobody being signed in.
    pub async fn current(backend: &dyn Backend) -> Option<Self> {
        let viewer = backend.current_user()?;

        match Self::list_accessible(backend).await {
            Ok(users) => {
                let found = users.into_iter().find(|u| u.id == viewer.id);
                if found.is_none() {
                    error!(user_id = %viewer.id, "Error fetching user profile: no profile row");
                }
                found
            }
            Err(e) => {
                error!(user_id = %viewer.id, error = %e, "Error fetching user profile");
                None
            }
        }
    }

    /// Updates a profile and logs `profile_updated` with the changes
    ///
    /// The activity log is best effort: a failed log write is reported but
    /// does not fail the update.
    pub async fn update_profile(
        backend: &dyn Backend,
        user_id: Uuid,
        changes: UpdateProfile,
    ) -> ConsoleResult<()> {
        changes.validate()?;
        let details = serde_json::to_value(&changes)?;

        backend
            .update(&TableQuery::new("user_profiles").eq("id", user_id), details.clone())
            .await?;

        if let Err(e) = UserActivity::log(backend, user_id, "profile_updated", details).await {
            warn!(user_id = %user_id, error = %e, "Failed to log profile update");
        }

        info!(user_id = %user_id, "Updated user profile");
        Ok(())
    }

    /// Sets the status of many users at once
    ///
    /// Updates run concurrently; the first failure is returned.
    pub async fn bulk_update_status(
        backend: &dyn Backend,
        user_ids: &[Uuid],
        status: UserStatus,
    ) -> ConsoleResult<()> {
        try_join_all(user_ids.iter().map(|&id| {
            Self::update_profile(
                backend,
                id,
                UpdateProfile {
                    status: Some(status),
                    ..Default::default()
                },
            )
        }))
        .await?;

        info!(count = user_ids.len(), status = status.as_str(), "Bulk updated user status");
        Ok(())
    }

    /// Deletes a user through `delete_user`
    pub async fn delete(backend: &dyn Backend, user_id: Uuid) -> ConsoleResult<()> {
        backend
            .rpc("delete_user", json!({ "target_user_id": user_id }))
            .await?;
        info!(user_id = %user_id, "Deleted user");
        Ok(())
    }

    /// Sends this user a password reset email and logs the request
    pub async fn request_password_reset(
        &self,
        auth: &dyn AuthProvider,
        backend: &dyn Backend,
        redirect_to: Option<&str>,
    ) -> ConsoleResult<()> {
        auth.reset_password_for_email(&self.email, redirect_to).await?;

        let details = json!({ "requested_at": Utc::now().to_rfc3339() });
        if let Err(e) = UserActivity::log(backend, self.id, "password_reset_requested", details).await {
            warn!(user_id = %self.id, error = %e, "Failed to log password reset");
        }
        Ok(())
    }

    /// Role from the profile, if any
    pub fn role(&self) -> Option<UserRole> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Display name from the profile, if any
    pub fn full_name(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.full_name.as_str())
    }
}

impl UserActivity {
    /// Records an activity through `log_user_activity`
    pub async fn log(
        backend: &dyn Backend,
        user_id: Uuid,
        action: &str,
        details: JsonValue,
    ) -> ConsoleResult<()> {
        backend
            .rpc(
                "log_user_activity",
                json!({
                    "p_user_id": user_id,
                    "p_action": action,
                    "p_details": details,
                }),
            )
            .await?;
        Ok(())
    }

    /// Lists a user's activity, newest first
    pub async fn list_for_user(backend: &dyn Backend, user_id: Uuid) -> ConsoleResult<Vec<Self>> {
        let query = TableQuery::new("user_activity")
            .eq("user_id", user_id)
            .order("created_at", false);
        fetch_all(backend, &query).await
    }

    /// Lists the activity of many users, grouped by user, newest first
    pub async fn list_grouped(
        backend: &dyn Backend,
        user_ids: &[Uuid],
    ) -> ConsoleResult<HashMap<Uuid, Vec<Self>>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = TableQuery::new("user_activity")
            .in_list("user_id", user_ids.iter().copied())
            .order("created_at", false);
        let activities: Vec<Self> = fetch_all(backend, &query).await?;

        let mut grouped: HashMap<Uuid, Vec<Self>> = HashMap::new();
        for activity in activities {
            grouped.entry(activity.user_id).or_default().push(activity);
        }
        Ok(grouped)
    }
}
