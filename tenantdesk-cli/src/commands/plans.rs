//! Membership plans

use crate::app::Console;
use crate::cli::{CreatePlanArgs, PlansCommand, UpdatePlanArgs};
use crate::error::CliResult;
use crate::output::Printer;
use serde_json::json;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::format::{format_currency, format_date};
use tenantdesk_shared::models::plan::{CreatePlan, MembershipPlan, SubscriptionAction, UpdatePlan};

fn plan_rows(plans: &[MembershipPlan]) -> Vec<Vec<String>> {
    plans
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                format!("{}/{}", format_currency(p.price), p.interval.as_str()),
                if p.is_active { "yes" } else { "no" }.to_string(),
                p.features.join(", "),
            ]
        })
        .collect()
}

impl From<CreatePlanArgs> for CreatePlan {
    fn from(args: CreatePlanArgs) -> Self {
        CreatePlan {
            name: args.name,
            description: args.description,
            price: args.price,
            interval: args.interval,
            trial_days: args.trial_days,
            features: args.features,
        }
    }
}

impl From<UpdatePlanArgs> for UpdatePlan {
    fn from(args: UpdatePlanArgs) -> Self {
        UpdatePlan {
            name: args.name,
            description: args.description,
            price: args.price,
            interval: args.interval,
            features: (!args.features.is_empty()).then_some(args.features),
            is_active: args.active,
        }
    }
}

pub async fn run(console: &Console, command: PlansCommand, out: &mut Printer<'_>) -> CliResult<()> {
    let backend = console.backend.as_ref();

    match command {
        PlansCommand::List { tenant, active_only } => {
            let plans = match tenant {
                Some(tenant_id) => {
                    console.require_in_tenant(Permission::ViewDashboard, tenant_id).await?;
                    if active_only {
                        MembershipPlan::list_active_for_tenant(backend, tenant_id).await?
                    } else {
                        MembershipPlan::list_for_tenant(backend, tenant_id).await?
                    }
                }
                None => {
                    console.require(Permission::ViewDashboard).await?;
                    console.store.refresh_membership_plans(backend).await?;
                    console.store.membership_plans().await
                }
            };
            out.table(&["ID", "NAME", "PRICE", "ACTIVE", "FEATURES"], plan_rows(&plans), &plans)?;
        }

        PlansCommand::Create(args) => {
            console.require(Permission::ManagePlans).await?;
            let name = args.name.clone();
            let id = MembershipPlan::create(backend, args.into()).await?;
            out.message(&format!("Created plan {} ({})", name, id), &json!({ "id": id }))?;
        }

        PlansCommand::Update(args) => {
            console.require(Permission::ManagePlans).await?;
            let id = args.id;
            let changed = MembershipPlan::update(backend, id, args.into()).await?;
            let text = if changed {
                format!("Updated plan {}", id)
            } else {
                format!("Plan {} unchanged", id)
            };
            out.message(&text, &json!({ "id": id, "updated": changed }))?;
        }

        PlansCommand::Subscribers { plan_id } => {
            console.require(Permission::ViewDashboard).await?;
            let subscriptions = MembershipPlan::subscriptions(backend, plan_id).await?;
            let rows = subscriptions
                .iter()
                .map(|s| {
                    vec![
                        s.id.to_string(),
                        s.user_id.to_string(),
                        s.status.as_str().to_string(),
                        format_date(&s.current_period_end),
                        if s.cancel_at_period_end { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            out.table(
                &["ID", "USER", "STATUS", "PERIOD END", "CANCELS"],
                rows,
                &subscriptions,
            )?;
        }

        PlansCommand::Manage {
            subscription_id,
            action,
        } => {
            console.require(Permission::ManagePlans).await?;
            let done = MembershipPlan::manage_subscription(backend, subscription_id, action).await?;
            let verb = match action {
                SubscriptionAction::Cancel => "Canceled",
                SubscriptionAction::Reactivate => "Reactivated",
            };
            let text = if done {
                format!("{} subscription {}", verb, subscription_id)
            } else {
                format!("Subscription {} unchanged", subscription_id)
            };
            out.message(&text, &json!({ "id": subscription_id, "action": action, "done": done }))?;
        }
    }
    Ok(())
}
