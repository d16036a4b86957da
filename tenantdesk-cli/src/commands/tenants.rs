//! Tenant management

use crate::app::Console;
use crate::cli::TenantsCommand;
use crate::error::CliResult;
use crate::output::Printer;
use serde_json::json;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::filters::filter_tenants;
use tenantdesk_shared::format::{format_currency, format_date};
use tenantdesk_shared::models::tenant::{CreateTenant, Tenant, UpdateTenant};

pub async fn run(console: &Console, command: TenantsCommand, out: &mut Printer<'_>) -> CliResult<()> {
    let backend = console.backend.as_ref();

    match command {
        TenantsCommand::List { search, status } => {
            console.require(Permission::ViewDashboard).await?;
            let tenants = Tenant::list_accessible(backend).await?;
            let shown = filter_tenants(&tenants, &search, status);

            let rows = shown
                .iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        t.name.clone(),
                        t.status.as_str().to_string(),
                        t.subscription_status.as_str().to_string(),
                        format_date(&t.created_at),
                    ]
                })
                .collect();
            out.table(&["ID", "NAME", "STATUS", "BILLING", "CREATED"], rows, &shown)?;
        }

        TenantsCommand::Create { name } => {
            console.require(Permission::ManageTenants).await?;
            let id = Tenant::create(backend, CreateTenant { name: name.clone() }).await?;
            out.message(&format!("Created tenant {} ({})", name, id), &json!({ "id": id }))?;
        }

        TenantsCommand::Update { id, name, status } => {
            console.require(Permission::ManageTenants).await?;
            let changed = Tenant::update(backend, id, UpdateTenant { name, status }).await?;
            let text = if changed {
                format!("Updated tenant {}", id)
            } else {
                format!("Tenant {} unchanged", id)
            };
            out.message(&text, &json!({ "id": id, "updated": changed }))?;
        }

        TenantsCommand::Delete { id } => {
            console.require(Permission::ManageTenants).await?;
            let deleted = Tenant::delete(backend, id).await?;
            let text = if deleted {
                format!("Deleted tenant {}", id)
            } else {
                format!("Tenant {} was not deleted", id)
            };
            out.message(&text, &json!({ "id": id, "deleted": deleted }))?;
        }

        TenantsCommand::Stats { id } => {
            console.require_in_tenant(Permission::ViewDashboard, id).await?;
            let stats = Tenant::stats(backend, id).await?;
            out.record(
                &[
                    ("Users", stats.total_users.to_string()),
                    ("Active plans", stats.active_plans.to_string()),
                    ("Revenue", format_currency(stats.total_revenue)),
                ],
                &stats,
            )?;
        }
    }
    Ok(())
}
