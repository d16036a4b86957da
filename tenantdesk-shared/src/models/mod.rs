/// Entity models and their backend operations
///
/// Every model mirrors a backend table or procedure result. Operations are
/// associated async functions taking the backend as their first argument,
/// one per named remote call.
///
/// # Models
///
/// - `user`: Profiles, activity log, and account administration
/// - `tenant`: Customer organizations
/// - `plan`: Membership plans
/// - `subscription`: Member subscriptions, lifecycle, and bulk operations
/// - `content`: Gated content and access rules
/// - `webhook`: Simulated webhooks and their delivery logs
/// - `payment`: Mock payment transactions
/// - `dashboard`: Aggregates for the dashboard
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::models::tenant::Tenant;
/// use tenantdesk_shared::models::plan::MembershipPlan;
/// use tenantdesk_shared::backend::Backend;
///
/// # async fn example(backend: &dyn Backend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// for tenant in Tenant::list_accessible(backend).await? {
///     let plans = MembershipPlan::list_for_tenant(backend, tenant.id).await?;
///     println!("{}: {} plans", tenant.name, plans.len());
/// }
/// # Ok(())
/// # }
/// ```

pub mod content;
pub mod dashboard;
pub mod payment;
pub mod plan;
pub mod subscription;
pub mod tenant;
pub mod user;
pub mod webhook;
