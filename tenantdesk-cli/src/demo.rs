/// Demo backend for offline runs
///
/// `tenantdesk --offline` runs against an in-memory backend seeded with one
/// tenant, two users, two plans, one subscription and one content item.
/// Read procedures, a few subscription transitions, and the payment and
/// webhook testbed are scripted. Anything else fails the way an unknown
/// procedure does on the real backend.
///
/// The demo admin is signed in from the start and can also sign in again
/// with [`DEMO_EMAIL`] and [`DEMO_PASSWORD`].

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use tenantdesk_shared::backend::{AuthUser, MockBackend, TableQuery};
use tenantdesk_shared::error::ConsoleError;
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "admin@acme.test";
pub const DEMO_PASSWORD: &str = "Demo!pass2024";

pub const DEMO_TENANT: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0001);
pub const DEMO_ADMIN: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0101);
pub const DEMO_MEMBER: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0102);
pub const DEMO_BASIC_PLAN: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0201);
pub const DEMO_PRO_PLAN: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0202);
pub const DEMO_SUBSCRIPTION: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0301);
pub const DEMO_CONTENT: Uuid = Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0401);

const SEEDED_AT: &str = "2024-01-05T10:00:00Z";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Builds the seeded, scripted backend
pub fn demo_backend() -> MockBackend {
    let admin = AuthUser {
        id: DEMO_ADMIN,
        email: DEMO_EMAIL.to_string(),
    };
    let backend = MockBackend::new()
        .with_account_for(admin.clone(), DEMO_PASSWORD)
        .with_user(admin);

    seed(&backend);
    script_users(&backend);
    script_tenants(&backend);
    script_subscriptions(&backend);
    script_dashboard(&backend);
    script_testbed(&backend);
    backend
}

fn seed(backend: &MockBackend) {
    backend.seed(
        "tenants",
        vec![json!({
            "id": DEMO_TENANT,
            "name": "Acme Fitness",
            "status": "active",
            "subscription_status": "active",
            "created_at": SEEDED_AT,
        })],
    );

    backend.seed(
        "user_profiles",
        vec![
            json!({
                "id": DEMO_ADMIN,
                "email": DEMO_EMAIL,
                "full_name": "Ada Admin",
                "role": "admin",
                "tenant_id": DEMO_TENANT,
                "status": "active",
                "created_at": SEEDED_AT,
                "updated_at": SEEDED_AT,
            }),
            json!({
                "id": DEMO_MEMBER,
                "email": "member@acme.test",
                "full_name": "Max Member",
                "role": "user",
                "tenant_id": DEMO_TENANT,
                "status": "active",
                "created_at": SEEDED_AT,
                "updated_at": SEEDED_AT,
            }),
        ],
    );

    backend.seed(
        "membership_plans",
        vec![
            json!({
                "id": DEMO_BASIC_PLAN,
                "tenant_id": DEMO_TENANT,
                "name": "Basic",
                "description": "Gym floor access",
                "price": 19.0,
                "interval": "monthly",
                "features": ["Gym floor"],
                "is_active": true,
                "created_at": SEEDED_AT,
                "updated_at": SEEDED_AT,
            }),
            json!({
                "id": DEMO_PRO_PLAN,
                "tenant_id": DEMO_TENANT,
                "name": "Pro",
                "description": "Everything, including classes",
                "price": 49.0,
                "interval": "monthly",
                "features": ["Gym floor", "Classes", "Video library"],
                "is_active": true,
                "created_at": "2024-01-06T10:00:00Z",
                "updated_at": "2024-01-06T10:00:00Z",
            }),
        ],
    );

    backend.seed(
        "member_subscriptions",
        vec![json!({
            "id": DEMO_SUBSCRIPTION,
            "user_id": DEMO_MEMBER,
            "plan_id": DEMO_PRO_PLAN,
            "status": "active",
            "current_period_start": "2024-02-01T00:00:00Z",
            "current_period_end": "2024-03-01T00:00:00Z",
            "cancel_at_period_end": false,
            "is_trial": false,
            "created_at": SEEDED_AT,
            "updated_at": SEEDED_AT,
        })],
    );

    backend.seed(
        "content_items",
        vec![json!({
            "id": DEMO_CONTENT,
            "tenant_id": DEMO_TENANT,
            "title": "Mobility routine",
            "description": "Ten minutes a day",
            "content_type": "text",
            "content": "Start with hip circles...",
            "preview_content": "Start with hip circles",
            "is_published": true,
            "created_at": SEEDED_AT,
            "updated_at": SEEDED_AT,
        })],
    );

    backend.seed(
        "content_access",
        vec![json!({
            "id": Uuid::from_u128(0x0a11_0000_0000_0000_0000_0000_0000_0501),
            "content_id": DEMO_CONTENT,
            "plan_id": DEMO_PRO_PLAN,
            "access_type": "full",
            "created_at": SEEDED_AT,
        })],
    );
}

fn script_users(backend: &MockBackend) {
    let db = backend.clone();
    backend.on_rpc("get_accessible_users", move |_| {
        let rows = db
            .rows("user_profiles")
            .into_iter()
            .map(|mut row| {
                // Profiles created by sign-up only carry id, name and role
                if row.get("status").map_or(true, JsonValue::is_null) {
                    row["status"] = json!("active");
                }
                row
            })
            .collect();
        Ok(JsonValue::Array(rows))
    });

    let db = backend.clone();
    backend.on_rpc("get_user_email", move |params| {
        Ok(db
            .rows("user_profiles")
            .into_iter()
            .find(|row| row["id"] == params["user_id"])
            .map(|row| row["email"].clone())
            .unwrap_or(JsonValue::Null))
    });

    let db = backend.clone();
    backend.on_rpc("log_user_activity", move |params| {
        db.seed(
            "user_activity",
            vec![json!({
                "id": Uuid::new_v4(),
                "user_id": params["p_user_id"],
                "action": params["p_action"],
                "details": params["p_details"],
                "created_at": now(),
            })],
        );
        Ok(JsonValue::Null)
    });
}

fn script_tenants(backend: &MockBackend) {
    let db = backend.clone();
    backend.on_rpc("get_accessible_tenants", move |_| Ok(JsonValue::Array(db.rows("tenants"))));

    let db = backend.clone();
    backend.on_rpc("create_tenant", move |params| {
        let id = Uuid::new_v4();
        db.seed(
            "tenants",
            vec![json!({
                "id": id,
                "name": params["p_name"],
                "status": "active",
                "subscription_status": "active",
                "created_at": now(),
            })],
        );
        Ok(json!(id))
    });

    let db = backend.clone();
    backend.on_rpc("get_tenant_stats", move |params| {
        let tenant = &params["p_tenant_id"];
        let total_users = db
            .rows("user_profiles")
            .iter()
            .filter(|row| &row["tenant_id"] == tenant)
            .count();
        let active_plans = db
            .rows("membership_plans")
            .iter()
            .filter(|row| &row["tenant_id"] == tenant && row["is_active"] == true)
            .count();
        Ok(json!({
            "total_users": total_users,
            "active_plans": active_plans,
            "total_revenue": completed_revenue(&db, Some(tenant)),
        }))
    });

    let db = backend.clone();
    backend.on_rpc("get_tenant_plans", move |params| {
        Ok(JsonValue::Array(
            db.rows("membership_plans")
                .into_iter()
                .filter(|row| row["tenant_id"] == params["p_tenant_id"])
                .collect(),
        ))
    });
}

fn completed_revenue(db: &MockBackend, tenant: Option<&JsonValue>) -> f64 {
    db.rows("mock_transactions")
        .iter()
        .filter(|row| row["status"] == "completed")
        .filter(|row| tenant.map_or(true, |t| &row["tenant_id"] == t))
        .filter_map(|row| row["amount"].as_f64())
        .sum()
}

fn find<'a>(rows: &'a [JsonValue], id: &JsonValue) -> Option<&'a JsonValue> {
    rows.iter().find(|row| &row["id"] == id)
}

fn script_subscriptions(backend: &MockBackend) {
    let db = backend.clone();
    backend.on_rpc("get_tenant_subscriptions", move |params| {
        let plans = db.rows("membership_plans");
        let profiles = db.rows("user_profiles");

        let summaries = db
            .rows("member_subscriptions")
            .iter()
            .filter_map(|sub| {
                let plan = find(&plans, &sub["plan_id"])?;
                if plan["tenant_id"] != params["p_tenant_id"] {
                    return None;
                }
                let user_name = find(&profiles, &sub["user_id"])
                    .map(|p| p["full_name"].clone())
                    .unwrap_or_else(|| json!(""));
                Some(json!({
                    "subscription_id": sub["id"],
                    "user_id": sub["user_id"],
                    "user_name": user_name,
                    "plan_id": sub["plan_id"],
                    "plan_name": plan["name"],
                    "status": sub["status"],
                    "is_trial": sub["is_trial"],
                    "current_period_end": sub["current_period_end"],
                    "amount": plan["price"],
                }))
            })
            .collect();
        Ok(JsonValue::Array(summaries))
    });

    let db = backend.clone();
    backend.on_rpc("get_user_subscriptions", move |params| {
        Ok(JsonValue::Array(
            db.rows("member_subscriptions")
                .into_iter()
                .filter(|row| row["user_id"] == params["p_user_id"])
                .collect(),
        ))
    });

    let db = backend.clone();
    backend.on_rpc("cancel_subscription", move |params| {
        let changes = if params["p_immediate"] == true {
            json!({ "status": "canceled", "updated_at": now() })
        } else {
            json!({ "cancel_at_period_end": true, "updated_at": now() })
        };
        edit_subscription(&db, &params["p_subscription_id"], &changes)
    });

    let db = backend.clone();
    backend.on_rpc("reactivate_subscription", move |params| {
        let changes = json!({ "status": "active", "cancel_at_period_end": false, "updated_at": now() });
        edit_subscription(&db, &params["p_subscription_id"], &changes)
    });
}

fn edit_subscription(
    db: &MockBackend,
    id: &JsonValue,
    changes: &JsonValue,
) -> Result<JsonValue, ConsoleError> {
    let id = id.as_str().unwrap_or_default();
    let matched = db.edit_rows(&TableQuery::new("member_subscriptions").eq("id", id), |row| {
        if let (Some(row), Some(changes)) = (row.as_object_mut(), changes.as_object()) {
            row.extend(changes.clone());
        }
    });
    if matched == 0 {
        return Err(ConsoleError::Backend {
            code: Some("P0002".to_string()),
            message: "Subscription not found".to_string(),
        });
    }
    Ok(JsonValue::Null)
}

fn script_dashboard(backend: &MockBackend) {
    let db = backend.clone();
    backend.on_rpc("get_dashboard_stats", move |_| {
        let active_tenants = db
            .rows("tenants")
            .iter()
            .filter(|row| row["status"] == "active")
            .count();
        let active_subscriptions = db
            .rows("member_subscriptions")
            .iter()
            .filter(|row| row["status"] == "active")
            .count();
        Ok(json!({
            "total_users": db.rows("user_profiles").len(),
            "active_tenants": active_tenants,
            "monthly_revenue": completed_revenue(&db, None),
            "active_subscriptions": active_subscriptions,
        }))
    });

    let db = backend.clone();
    backend.on_rpc("get_revenue_data", move |_| {
        Ok(json!([{
            "month": Utc::now().format("%b %Y").to_string(),
            "amount": completed_revenue(&db, None),
        }]))
    });

    let db = backend.clone();
    backend.on_rpc("get_subscription_distribution", move |_| {
        let rows = db.rows("member_subscriptions");
        let count = |status: &str| rows.iter().filter(|row| row["status"] == status).count();
        Ok(json!({
            "active": count("active"),
            "canceled": count("canceled"),
            "past_due": count("past_due"),
        }))
    });
}

/// Outcome the demo processor gives each test card
fn card_outcome(card_number: &str) -> Option<(&'static str, &'static str)> {
    match card_number {
        "4242424242424242" => None,
        "4000000000009995" => Some(("insufficient_funds", "Your card has insufficient funds")),
        "4000000000000069" => Some(("expired_card", "Your card has expired")),
        "4000000000000127" => Some(("incorrect_cvc", "Your card's security code is incorrect")),
        "4000000000000119" => Some(("processing_error", "An error occurred while processing your card")),
        _ => Some(("card_declined", "Your card was declined")),
    }
}

fn script_testbed(backend: &MockBackend) {
    let db = backend.clone();
    backend.on_rpc("process_mock_payment", move |params| {
        let id = Uuid::new_v4();
        let card = params["p_card_number"].as_str().unwrap_or_default();
        let (status, error) = match card_outcome(card) {
            None => ("completed", JsonValue::Null),
            Some((code, message)) => ("failed", json!({ "code": code, "message": message })),
        };

        db.seed(
            "mock_transactions",
            vec![json!({
                "id": id,
                "tenant_id": params["p_tenant_id"],
                "amount": params["p_amount"],
                "status": status,
                "error": error,
                "metadata": params["p_metadata"],
                "created_at": now(),
            })],
        );
        Ok(json!({ "id": id, "status": status, "error": error }))
    });

    let db = backend.clone();
    backend.on_rpc("log_webhook_delivery_attempt", move |params| {
        let id = params["p_webhook_id"].as_str().unwrap_or_default();
        let at = now();
        let log = json!({
            "attempt_number": params["p_attempt_number"],
            "status": params["p_status"],
            "error_message": params["p_error_message"],
            "created_at": at,
        });
        db.edit_rows(&TableQuery::new("mock_webhooks").eq("id", id), |row| {
            if !row["logs"].is_array() {
                row["logs"] = json!([]);
            }
            if let Some(logs) = row["logs"].as_array_mut() {
                logs.push(log.clone());
            }
            row["delivery_attempts"] = params["p_attempt_number"].clone();
            row["last_attempt_at"] = json!(at);
        });
        Ok(JsonValue::Null)
    });

    let db = backend.clone();
    backend.on_rpc("mark_webhook_delivered", move |params| {
        let id = params["p_webhook_id"].as_str().unwrap_or_default();
        db.edit_rows(&TableQuery::new("mock_webhooks").eq("id", id), |row| {
            row["delivered_at"] = json!(now());
        });
        Ok(JsonValue::Null)
    });

    backend.on_rpc("mark_webhook_failed", |_| Ok(JsonValue::Null));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantdesk_shared::models::dashboard::DashboardMetrics;
    use tenantdesk_shared::models::subscription::MemberSubscription;
    use tenantdesk_shared::models::user::{User, UserRole};

    #[tokio::test]
    async fn test_demo_admin_is_signed_in() {
        let backend = demo_backend();

        let user = User::current(&backend).await.unwrap();
        assert_eq!(user.email, DEMO_EMAIL);
        assert_eq!(user.role(), Some(UserRole::Admin));
    }

    #[tokio::test]
    async fn test_subscription_summaries_join_names() {
        let backend = demo_backend();

        let summaries = MemberSubscription::list_for_tenant(&backend, DEMO_TENANT).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].user_name, "Max Member");
        assert_eq!(summaries[0].plan_name, "Pro");
        assert_eq!(summaries[0].amount, 49.0);

        assert!(MemberSubscription::list_for_tenant(&backend, Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cancel_at_period_end_keeps_status() {
        let backend = demo_backend();

        MemberSubscription::cancel(&backend, DEMO_SUBSCRIPTION, false).await.unwrap();

        let row = &backend.rows("member_subscriptions")[0];
        assert_eq!(row["status"], "active");
        assert_eq!(row["cancel_at_period_end"], true);

        let missing = MemberSubscription::cancel(&backend, Uuid::new_v4(), true).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_dashboard_counts_seeded_rows() {
        let backend = demo_backend();

        let metrics = DashboardMetrics::fetch(&backend).await.unwrap();
        assert_eq!(metrics.total_users, 2);
        assert_eq!(metrics.active_tenants, 1);
        assert_eq!(metrics.active_subscriptions, 1);
        assert_eq!(metrics.monthly_revenue, 0.0);
    }

    #[test]
    fn test_card_outcomes() {
        assert_eq!(card_outcome("4242424242424242"), None);
        assert_eq!(card_outcome("4000000000000069").map(|o| o.0), Some("expired_card"));
        assert_eq!(card_outcome("1234").map(|o| o.0), Some("card_declined"));
    }
}
