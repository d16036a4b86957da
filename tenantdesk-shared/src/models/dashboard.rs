/// Dashboard aggregates
///
/// All aggregation runs in the backend; these shims decode the results.
/// Missing counts in the subscription distribution are reported as zero.

use crate::backend::{call_or_default, Backend};
use crate::error::ConsoleResult;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

/// Platform-wide headline numbers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    #[serde(default)]
    pub total_users: i64,
    #[serde(default)]
    pub active_tenants: i64,

    /// Revenue this month, in dollars
    #[serde(default)]
    pub monthly_revenue: f64,
    #[serde(default)]
    pub active_subscriptions: i64,
}

/// Revenue for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    /// Month label as the backend formats it
    pub month: String,
    pub amount: f64,
}

/// Subscription counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDistribution {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub active: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub canceled: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub past_due: i64,
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

impl SubscriptionDistribution {
    pub fn total(&self) -> i64 {
        self.active + self.canceled + self.past_due
    }
}

impl DashboardMetrics {
    /// Fetches the headline numbers
    pub async fn fetch(backend: &dyn Backend) -> ConsoleResult<Self> {
        call_or_default(backend, "get_dashboard_stats", json!({})).await
    }

    /// Fetches monthly revenue for the chart
    pub async fn revenue(backend: &dyn Backend) -> ConsoleResult<Vec<RevenuePoint>> {
        call_or_default(backend, "get_revenue_data", json!({})).await
    }

    /// Fetches subscription counts by status
    pub async fn subscription_distribution(backend: &dyn Backend) -> ConsoleResult<SubscriptionDistribution> {
        call_or_default(backend, "get_subscription_distribution", json!({})).await
    }
}
