//! Member subscriptions and bulk operations

use super::selection_of;
use crate::app::Console;
use crate::cli::{BulkArgs, SubscriptionsCommand};
use crate::error::CliResult;
use crate::output::{or_dash, Printer};
use serde_json::json;
use std::io;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::filters::filter_subscriptions;
use tenantdesk_shared::format::{format_currency, format_date};
use tenantdesk_shared::models::subscription::{BulkOperation, MemberSubscription};
use tenantdesk_worker::bulk::BulkOperationWatcher;
use uuid::Uuid;

/// One line per status read: `processed/total (failed)`
pub fn progress_line(operation: &BulkOperation) -> String {
    format!(
        "{}: {}/{} processed, {} failed",
        operation.operation_type, operation.processed_items, operation.total_items, operation.failed_items
    )
}

async fn wait_for(console: &Console, operation_id: Uuid, out: &mut Printer<'_>) -> CliResult<BulkOperation> {
    let watcher = BulkOperationWatcher::new(console.backend.clone());
    let mut write_error: Option<io::Error> = None;

    let operation = watcher
        .wait_with_progress(operation_id, |status| {
            if write_error.is_none() {
                write_error = out.note(&progress_line(status)).err();
            }
        })
        .await?;

    match write_error {
        Some(err) => Err(err.into()),
        None => Ok(operation),
    }
}

fn report_operation(operation_id: Uuid, operation: &BulkOperation, out: &mut Printer<'_>) -> CliResult<()> {
    let errors = operation.errors();
    let mut fields = vec![
        ("Operation", operation_id.to_string()),
        ("Type", operation.operation_type.clone()),
        ("Processed", format!("{}/{}", operation.processed_items, operation.total_items)),
        ("Failed", operation.failed_items.to_string()),
        ("Complete", if operation.is_complete() { "yes" } else { "no" }.to_string()),
    ];
    if !errors.is_empty() {
        fields.push(("Errors", errors.join("; ")));
    }
    out.record(&fields, &json!({ "operation_id": operation_id, "status": operation }))?;
    Ok(())
}

async fn started(
    console: &Console,
    operation_id: Uuid,
    bulk: &BulkArgs,
    count: usize,
    out: &mut Printer<'_>,
) -> CliResult<()> {
    if bulk.wait {
        out.note(&format!("Started bulk operation {} for {} subscription(s)", operation_id, count))?;
        let operation = wait_for(console, operation_id, out).await?;
        report_operation(operation_id, &operation, out)
    } else {
        out.message(
            &format!("Started bulk operation {} for {} subscription(s)", operation_id, count),
            &json!({ "operation_id": operation_id, "count": count }),
        )?;
        Ok(())
    }
}

fn transitioned(id: Uuid, action: &str, out: &mut Printer<'_>) -> CliResult<()> {
    out.message(
        &format!("Subscription {}: {}", id, action),
        &json!({ "id": id, "action": action }),
    )?;
    Ok(())
}

pub async fn run(console: &Console, command: SubscriptionsCommand, out: &mut Printer<'_>) -> CliResult<()> {
    let backend = console.backend.as_ref();

    match command {
        SubscriptionsCommand::List { tenant, search, filter } => {
            let subscriptions = match tenant {
                Some(tenant_id) => {
                    console.require_in_tenant(Permission::ViewDashboard, tenant_id).await?;
                    MemberSubscription::list_for_tenant(backend, tenant_id).await?
                }
                None => {
                    console.require(Permission::ViewDashboard).await?;
                    MemberSubscription::list_for_current_tenant(backend).await?
                }
            };
            let shown = filter_subscriptions(&subscriptions, &search, filter);

            let rows = shown
                .iter()
                .map(|s| {
                    vec![
                        s.subscription_id.to_string(),
                        s.user_name.clone(),
                        s.plan_name.clone(),
                        s.status.as_str().to_string(),
                        format_currency(s.amount),
                        format_date(&s.current_period_end),
                        or_dash(s.trial_ends_at.as_ref().map(format_date)),
                    ]
                })
                .collect();
            out.table(
                &["ID", "USER", "PLAN", "STATUS", "AMOUNT", "PERIOD END", "TRIAL ENDS"],
                rows,
                &shown,
            )?;
        }

        SubscriptionsCommand::User { user_id } => {
            console.require(Permission::ViewDashboard).await?;
            let subscriptions = MemberSubscription::list_for_user(backend, user_id).await?;
            let rows = subscriptions
                .iter()
                .map(|s| {
                    vec![
                        s.id.to_string(),
                        s.plan_id.to_string(),
                        s.status.as_str().to_string(),
                        format_date(&s.current_period_end),
                        if s.cancel_at_period_end { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            out.table(
                &["ID", "PLAN", "STATUS", "PERIOD END", "CANCELS"],
                rows,
                &subscriptions,
            )?;
        }

        SubscriptionsCommand::Create {
            user_id,
            plan_id,
            trial,
            stripe_id,
        } => {
            console.require(Permission::ManageSubscriptions).await?;
            let id = if trial {
                MemberSubscription::create_trial(backend, user_id, plan_id).await?
            } else {
                MemberSubscription::create(backend, user_id, plan_id, stripe_id.as_deref()).await?
            };
            let kind = if trial { "trial subscription" } else { "subscription" };
            out.message(
                &format!("Created {} {}", kind, id),
                &json!({ "id": id, "trial": trial }),
            )?;
        }

        SubscriptionsCommand::Cancel { id, immediate } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::cancel(backend, id, immediate).await?;
            let action = if immediate {
                "canceled"
            } else {
                "cancels at period end"
            };
            transitioned(id, action, out)?;
        }

        SubscriptionsCommand::Reactivate { id } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::reactivate(backend, id).await?;
            transitioned(id, "reactivated", out)?;
        }

        SubscriptionsCommand::Renew { id } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::process_renewal(backend, id).await?;
            transitioned(id, "renewed", out)?;
        }

        SubscriptionsCommand::RetryPayment { id } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::retry_payment(backend, id).await?;
            transitioned(id, "payment retried", out)?;
        }

        SubscriptionsCommand::Upgrade {
            id,
            new_plan_id,
            immediate,
        } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::upgrade(backend, id, new_plan_id, immediate).await?;
            let action = if immediate {
                format!("upgraded to {}", new_plan_id)
            } else {
                format!("upgrades to {} at renewal", new_plan_id)
            };
            transitioned(id, &action, out)?;
        }

        SubscriptionsCommand::Downgrade { id, new_plan_id } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::downgrade(backend, id, new_plan_id).await?;
            transitioned(id, &format!("downgrades to {} at renewal", new_plan_id), out)?;
        }

        SubscriptionsCommand::ExpireTrial { id, convert } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::process_trial_expiration(backend, id, convert).await?;
            let action = if convert {
                "trial converted"
            } else {
                "trial expired"
            };
            transitioned(id, action, out)?;
        }

        SubscriptionsCommand::SetStatus {
            id,
            status,
            cancel_at_period_end,
        } => {
            console.require(Permission::ManageSubscriptions).await?;
            MemberSubscription::update_status(backend, id, status, cancel_at_period_end).await?;
            transitioned(id, &format!("status set to {}", status.as_str()), out)?;
        }

        SubscriptionsCommand::BulkStatus { status, bulk } => {
            console.require(Permission::ManageSubscriptions).await?;
            let selection = selection_of(bulk.ids.clone());
            let operation_id = MemberSubscription::bulk_update_status(backend, selection.ids(), status).await?;
            started(console, operation_id, &bulk, selection.len(), out).await?;
        }

        SubscriptionsCommand::BulkCancel { immediate, bulk } => {
            console.require(Permission::ManageSubscriptions).await?;
            let selection = selection_of(bulk.ids.clone());
            let operation_id = MemberSubscription::bulk_cancel(backend, selection.ids(), immediate).await?;
            started(console, operation_id, &bulk, selection.len(), out).await?;
        }

        SubscriptionsCommand::BulkConvert { bulk } => {
            console.require(Permission::ManageSubscriptions).await?;
            let selection = selection_of(bulk.ids.clone());
            let operation_id = MemberSubscription::bulk_convert_trials(backend, selection.ids()).await?;
            started(console, operation_id, &bulk, selection.len(), out).await?;
        }

        SubscriptionsCommand::Operation { operation_id, wait } => {
            console.require(Permission::ManageSubscriptions).await?;
            let operation = if wait {
                wait_for(console, operation_id, out).await?
            } else {
                BulkOperation::fetch(backend, operation_id).await?
            };
            report_operation(operation_id, &operation, out)?;
        }
    }
    Ok(())
}
