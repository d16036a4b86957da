//! User management

use super::selection_of;
use crate::app::Console;
use crate::cli::{UpdateUserArgs, UsersCommand};
use crate::error::CliResult;
use crate::output::{or_dash, Printer};
use serde_json::json;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::error::ConsoleError;
use tenantdesk_shared::filters::filter_users;
use tenantdesk_shared::models::user::{UpdateProfile, User, UserActivity};
use uuid::Uuid;

fn user_row(user: &User) -> Vec<String> {
    let profile = user.profile.as_ref();
    vec![
        user.id.to_string(),
        user.email.clone(),
        or_dash(user.full_name()),
        or_dash(user.role().map(|r| r.as_str())),
        or_dash(profile.map(|p| p.status.as_str())),
        or_dash(profile.and_then(|p| p.tenant_id)),
    ]
}

impl From<UpdateUserArgs> for UpdateProfile {
    fn from(args: UpdateUserArgs) -> Self {
        let tenant_id = if args.clear_tenant {
            Some(None)
        } else {
            args.tenant.map(Some)
        };
        UpdateProfile {
            full_name: args.full_name,
            role: args.role,
            tenant_id,
            status: args.status,
        }
    }
}

pub async fn run(console: &Console, command: UsersCommand, out: &mut Printer<'_>) -> CliResult<()> {
    let backend = console.backend.as_ref();

    match command {
        UsersCommand::List { search, tenant } => {
            let users = match tenant {
                Some(tenant_id) => {
                    console.require_in_tenant(Permission::ViewDashboard, tenant_id).await?;
                    User::list_for_tenant(backend, tenant_id).await?
                }
                None => {
                    console.require(Permission::ViewDashboard).await?;
                    User::list_accessible(backend).await?
                }
            };
            let shown = filter_users(&users, &search);
            out.table(
                &["ID", "EMAIL", "NAME", "ROLE", "STATUS", "TENANT"],
                shown.iter().map(|u| user_row(u)).collect(),
                &shown,
            )?;
        }

        UsersCommand::Update(args) => {
            console.require(Permission::ManageUsers).await?;
            let id = args.id;
            let changes = UpdateProfile::from(args);
            if changes == UpdateProfile::default() {
                return Err(ConsoleError::Validation("nothing to update".to_string()).into());
            }
            User::update_profile(backend, id, changes.clone()).await?;
            out.message(&format!("Updated user {}", id), &json!({ "id": id, "changes": changes }))?;
        }

        UsersCommand::SetStatus { status, ids } => {
            console.require(Permission::ManageUsers).await?;
            let selection = selection_of(ids);
            User::bulk_update_status(backend, selection.ids(), status).await?;
            out.message(
                &format!("Set {} user(s) to {}", selection.len(), status.as_str()),
                &json!({ "ids": selection.ids(), "status": status }),
            )?;
        }

        UsersCommand::Delete { id } => {
            console.require(Permission::ManageUsers).await?;
            User::delete(backend, id).await?;
            out.message(&format!("Deleted user {}", id), &json!({ "id": id, "deleted": true }))?;
        }

        UsersCommand::Activity { ids } => {
            console.require(Permission::ViewDashboard).await?;
            let selection = selection_of(ids);
            let mut activity: Vec<UserActivity> = if selection.len() == 1 {
                UserActivity::list_for_user(backend, selection.ids()[0]).await?
            } else {
                UserActivity::list_grouped(backend, selection.ids())
                    .await?
                    .into_values()
                    .flatten()
                    .collect()
            };
            activity.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let rows = activity
                .iter()
                .map(|a| {
                    vec![
                        a.created_at.to_rfc3339(),
                        a.user_id.to_string(),
                        a.action.clone(),
                        a.details.to_string(),
                    ]
                })
                .collect();
            out.table(&["AT", "USER", "ACTION", "DETAILS"], rows, &activity)?;
        }

        UsersCommand::ResetPassword { id } => {
            console.require(Permission::ManageUsers).await?;
            let user = User::list_accessible(backend)
                .await?
                .into_iter()
                .find(|u| u.id == id)
                .ok_or_else(|| ConsoleError::NotFound("User".to_string()))?;
            if user.email.is_empty() {
                return Err(ConsoleError::Validation(format!("user {} has no email on record", id)).into());
            }

            user.request_password_reset(console.auth.as_ref(), backend, console.password_reset_redirect())
                .await?;
            out.message(
                &format!("Password reset email sent to {}", user.email),
                &json!({ "id": id, "email": user.email, "sent": true }),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_args_map_tenant_changes() {
        let args = |tenant: Option<Uuid>, clear_tenant: bool| UpdateUserArgs {
            id: Uuid::nil(),
            full_name: None,
            role: None,
            tenant,
            clear_tenant,
            status: None,
        };
        let tenant = Uuid::new_v4();

        assert_eq!(UpdateProfile::from(args(None, false)), UpdateProfile::default());
        assert_eq!(UpdateProfile::from(args(Some(tenant), false)).tenant_id, Some(Some(tenant)));
        assert_eq!(UpdateProfile::from(args(None, true)).tenant_id, Some(None));
    }
}
