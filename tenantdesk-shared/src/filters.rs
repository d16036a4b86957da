/// List filtering and selection
///
/// Lists are fetched whole and narrowed locally: a case-insensitive
/// substring search plus an optional status filter. Selections hold the IDs
/// an operator ticked for a bulk action.
///
/// # Example
///
/// ```
/// use tenantdesk_shared::filters::{Selection, SubscriptionFilter};
/// use uuid::Uuid;
///
/// let filter: SubscriptionFilter = "trial".parse().unwrap();
/// assert_eq!(filter, SubscriptionFilter::Trial);
///
/// let id = Uuid::new_v4();
/// let mut selection = Selection::default();
/// selection.toggle(id, true);
/// assert!(selection.contains(id));
/// ```

use crate::models::subscription::{SubscriptionStatus, SubscriptionSummary};
use crate::models::tenant::{Tenant, TenantStatus};
use crate::models::user::User;
use std::str::FromStr;
use uuid::Uuid;

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Tenants whose name contains `query`, optionally only with `status`
pub fn filter_tenants<'a>(
    tenants: &'a [Tenant],
    query: &str,
    status: Option<TenantStatus>,
) -> Vec<&'a Tenant> {
    let needle = query.to_lowercase();
    tenants
        .iter()
        .filter(|t| contains_ignore_case(&t.name, &needle))
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect()
}

/// Users whose email or full name contains `query`
pub fn filter_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let needle = query.to_lowercase();
    users
        .iter()
        .filter(|u| {
            contains_ignore_case(&u.email, &needle)
                || u.full_name().map_or(false, |name| contains_ignore_case(name, &needle))
        })
        .collect()
}

/// Status filter for the subscription list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionFilter {
    /// Everything
    #[default]
    All,

    /// Subscriptions still in their free trial
    Trial,

    /// Subscriptions with exactly this status
    Status(SubscriptionStatus),
}

impl SubscriptionFilter {
    pub fn matches(&self, subscription: &SubscriptionSummary) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Trial => subscription.is_trial,
            SubscriptionFilter::Status(status) => subscription.status == *status,
        }
    }
}

impl FromStr for SubscriptionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SubscriptionFilter::All),
            "trial" => Ok(SubscriptionFilter::Trial),
            other => SubscriptionStatus::from_str(other)
                .map(SubscriptionFilter::Status)
                .ok_or_else(|| format!("unknown subscription filter '{}'", other)),
        }
    }
}

/// Subscriptions whose user or plan name contains `query` and that pass `filter`
pub fn filter_subscriptions<'a>(
    subscriptions: &'a [SubscriptionSummary],
    query: &str,
    filter: SubscriptionFilter,
) -> Vec<&'a SubscriptionSummary> {
    let needle = query.to_lowercase();
    subscriptions
        .iter()
        .filter(|s| {
            contains_ignore_case(&s.user_name, &needle) || contains_ignore_case(&s.plan_name, &needle)
        })
        .filter(|s| filter.matches(s))
        .collect()
}

/// IDs ticked for a bulk action, in the order they were ticked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<Uuid>,
}

impl Selection {
    /// Adds or removes one ID
    pub fn toggle(&mut self, id: Uuid, selected: bool) {
        if selected {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        } else {
            self.ids.retain(|&other| other != id);
        }
    }

    /// Selects exactly `visible`, or clears the selection
    pub fn select_all(&mut self, visible: impl IntoIterator<Item = Uuid>, selected: bool) {
        self.ids = if selected { visible.into_iter().collect() } else { Vec::new() };
    }

    /// Whether every visible row is selected
    pub fn is_all_selected(&self, visible_count: usize) -> bool {
        self.ids.len() == visible_count
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tenant::TenantBilling;
    use crate::models::user::{UserProfile, UserRole, UserStatus};
    use chrono::Utc;

    fn tenant(name: &str, status: TenantStatus) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status,
            subscription_status: TenantBilling::Active,
            created_at: Utc::now(),
        }
    }

    fn user(email: &str, full_name: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            profile: full_name.map(|name| UserProfile {
                full_name: name.to_string(),
                role: UserRole::User,
                tenant_id: None,
                status: UserStatus::Active,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }),
        }
    }

    fn subscription(user_name: &str, plan_name: &str, status: SubscriptionStatus, is_trial: bool) -> SubscriptionSummary {
        SubscriptionSummary {
            subscription_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            plan_id: Uuid::new_v4(),
            plan_name: plan_name.to_string(),
            status,
            is_trial,
            trial_ends_at: None,
            current_period_end: Utc::now(),
            amount: 10.0,
        }
    }

    #[test]
    fn test_filter_tenants() {
        let tenants = vec![
            tenant("Acme Corp", TenantStatus::Active),
            tenant("ACME Labs", TenantStatus::Inactive),
            tenant("Globex", TenantStatus::Active),
        ];

        assert_eq!(filter_tenants(&tenants, "acme", None).len(), 2);
        let active = filter_tenants(&tenants, "acme", Some(TenantStatus::Active));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Acme Corp");
        assert_eq!(filter_tenants(&tenants, "", None).len(), 3);
    }

    #[test]
    fn test_filter_users_by_email_or_name() {
        let users = vec![
            user("ada@example.com", Some("Ada Lovelace")),
            user("grace@example.com", Some("Grace Hopper")),
            user("nobody@lovelace.org", None),
        ];

        let found = filter_users(&users, "LOVELACE");
        assert_eq!(found.len(), 2);
        assert_eq!(filter_users(&users, "hopper")[0].email, "grace@example.com");
        assert!(filter_users(&users, "zzz").is_empty());
    }

    #[test]
    fn test_subscription_filter_parse() {
        assert_eq!("all".parse::<SubscriptionFilter>().unwrap(), SubscriptionFilter::All);
        assert_eq!(
            "past_due".parse::<SubscriptionFilter>().unwrap(),
            SubscriptionFilter::Status(SubscriptionStatus::PastDue)
        );
        assert!("expired".parse::<SubscriptionFilter>().is_err());
    }

    #[test]
    fn test_filter_subscriptions() {
        let subscriptions = vec![
            subscription("Ada", "Pro", SubscriptionStatus::Active, true),
            subscription("Grace", "Basic", SubscriptionStatus::Active, false),
            subscription("Alan", "Pro", SubscriptionStatus::Canceled, false),
        ];

        assert_eq!(filter_subscriptions(&subscriptions, "", SubscriptionFilter::All).len(), 3);
        assert_eq!(filter_subscriptions(&subscriptions, "pro", SubscriptionFilter::All).len(), 2);

        let trials = filter_subscriptions(&subscriptions, "", SubscriptionFilter::Trial);
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].user_name, "Ada");

        let active_pro = filter_subscriptions(
            &subscriptions,
            "pro",
            SubscriptionFilter::Status(SubscriptionStatus::Active),
        );
        assert_eq!(active_pro.len(), 1);
    }

    #[test]
    fn test_selection() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut selection = Selection::default();

        selection.toggle(a, true);
        selection.toggle(a, true);
        selection.toggle(b, true);
        assert_eq!(selection.ids(), &[a, b]);

        selection.toggle(a, false);
        assert_eq!(selection.ids(), &[b]);
        assert!(!selection.is_all_selected(2));

        selection.select_all([a, b], true);
        assert!(selection.is_all_selected(2));

        selection.select_all([a, b], false);
        assert!(selection.is_empty());
    }
}
