//! Dashboard overview

use crate::app::Console;
use crate::error::CliResult;
use crate::output::{OutputFormat, Printer};
use serde_json::json;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::format::format_currency;
use tenantdesk_shared::models::dashboard::DashboardMetrics;

/// Share of `part` in `total` as a whole percentage
fn percent(part: i64, total: i64) -> i64 {
    if total == 0 {
        0
    } else {
        (part as f64 * 100.0 / total as f64).round() as i64
    }
}

pub async fn show(console: &Console, out: &mut Printer<'_>) -> CliResult<()> {
    console.require(Permission::ViewDashboard).await?;
    let backend = console.backend.as_ref();

    let (metrics, revenue, distribution) = tokio::try_join!(
        DashboardMetrics::fetch(backend),
        DashboardMetrics::revenue(backend),
        DashboardMetrics::subscription_distribution(backend),
    )?;

    if out.format() == OutputFormat::Json {
        out.json(&json!({
            "metrics": metrics,
            "revenue": revenue,
            "subscriptions": distribution,
        }))?;
        return Ok(());
    }

    out.record(
        &[
            ("Total users", metrics.total_users.to_string()),
            ("Active tenants", metrics.active_tenants.to_string()),
            ("Monthly revenue", format_currency(metrics.monthly_revenue)),
            ("Active subscriptions", metrics.active_subscriptions.to_string()),
        ],
        &metrics,
    )?;

    out.note("")?;
    out.table(
        &["MONTH", "REVENUE"],
        revenue
            .iter()
            .map(|point| vec![point.month.clone(), format_currency(point.amount)])
            .collect(),
        &revenue,
    )?;

    let total = distribution.total();
    out.note("")?;
    out.table(
        &["STATUS", "COUNT", "SHARE"],
        [
            ("active", distribution.active),
            ("canceled", distribution.canceled),
            ("past_due", distribution.past_due),
        ]
        .into_iter()
        .map(|(status, count)| vec![status.to_string(), count.to_string(), format!("{}%", percent(count, total))])
        .collect(),
        &distribution,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 5), 100);
    }

    #[tokio::test]
    async fn test_dashboard_text() {
        let console = Console::offline();
        let mut buf = Vec::new();

        show(&console, &mut Printer::new(OutputFormat::Text, &mut buf)).await.unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Total users:           2\n"));
        assert!(text.contains("Monthly revenue:       $0.00\n"));
        assert!(text.contains("active    1      100%\n"));
    }
}
