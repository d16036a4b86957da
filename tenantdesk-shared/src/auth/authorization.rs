/// Authorization helpers and permission checks
///
/// The backend is the authority on access; these checks only decide what
/// the console offers to the signed-in user, the way a protected route
/// hides screens a user cannot use.
///
/// # Permission Model
///
/// 1. **Signed in**: a user with a profile is required
/// 2. **Account status**: inactive or suspended accounts get nothing
/// 3. **Role**: `admin` > `tenant_admin` > `user`
/// 4. **Tenant scope**: only platform admins reach other tenants
///
/// # Example
///
/// ```
/// use tenantdesk_shared::auth::authorization::{require_permission, Permission};
/// use tenantdesk_shared::models::user::{User, UserProfile, UserRole, UserStatus};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let user = User {
///     id: Uuid::new_v4(),
///     email: "owner@acme.test".to_string(),
///     profile: Some(UserProfile {
///         full_name: "Ada Owner".to_string(),
///         role: UserRole::TenantAdmin,
///         tenant_id: Some(Uuid::new_v4()),
///         status: UserStatus::Active,
///         created_at: Utc::now(),
///         updated_at: Utc::now(),
///     }),
/// };
///
/// assert!(require_permission(&user, Permission::ManagePlans).is_ok());
/// assert!(require_permission(&user, Permission::ManageTenants).is_err());
/// ```

use crate::models::user::{User, UserRole, UserStatus};
use uuid::Uuid;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    /// User has no profile yet
    #[error("User profile is missing")]
    MissingProfile,

    /// Account is not active
    #[error("Account is {0}")]
    AccountDisabled(&'static str),

    /// User's role is below what the action needs
    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientRole { required: UserRole, actual: UserRole },

    /// User belongs to a different tenant
    #[error("Not a member of tenant {0}")]
    NotMember(Uuid),
}

/// Console capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Create, rename, deactivate and delete tenants
    ManageTenants,

    /// Edit profiles, suspend and delete users
    ManageUsers,

    /// Create and edit membership plans
    ManagePlans,

    /// Create, cancel, upgrade subscriptions and run bulk operations
    ManageSubscriptions,

    /// Edit content items and access rules
    ManageContent,

    /// Read dashboards and lists
    ViewDashboard,

    /// Use the mock payment and webhook testbed
    UsePaymentTestbed,
}

impl Permission {
    /// Gets the minimum role required for this permission
    pub fn min_role(&self) -> UserRole {
        match self {
            Permission::ManageTenants => UserRole::Admin,
            Permission::ManageUsers
            | Permission::ManagePlans
            | Permission::ManageSubscriptions
            | Permission::ManageContent
            | Permission::UsePaymentTestbed => UserRole::TenantAdmin,
            Permission::ViewDashboard => UserRole::User,
        }
    }
}

/// Checks that the user may exercise `permission`
pub fn require_permission(user: &User, permission: Permission) -> Result<(), AuthzError> {
    let profile = user.profile.as_ref().ok_or(AuthzError::MissingProfile)?;

    if profile.status != UserStatus::Active {
        return Err(AuthzError::AccountDisabled(profile.status.as_str()));
    }

    let required = permission.min_role();
    if !profile.role.has_permission(&required) {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: profile.role,
        });
    }

    Ok(())
}

/// Checks that the user may act on `tenant_id`
///
/// Platform admins reach every tenant; everyone else only their own.
pub fn require_tenant_access(user: &User, tenant_id: Uuid) -> Result<(), AuthzError> {
    let profile = user.profile.as_ref().ok_or(AuthzError::MissingProfile)?;

    if profile.role == UserRole::Admin || profile.tenant_id == Some(tenant_id) {
        Ok(())
    } else {
        Err(AuthzError::NotMember(tenant_id))
    }
}
