//! Gated content and access rules

use crate::app::Console;
use crate::cli::ContentCommand;
use crate::error::CliResult;
use crate::output::{or_dash, Printer};
use serde_json::json;
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::format::format_date;
use tenantdesk_shared::models::content::{verify_access, AccessRule, ContentItem, ContentType, CreateContent};

fn type_label(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Html => "html",
        ContentType::Text => "text",
        ContentType::Url => "url",
    }
}

fn rule_rows(rules: &[AccessRule]) -> Vec<Vec<String>> {
    rules
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.plan_id.to_string(),
                r.access_type.as_str().to_string(),
                format_date(&r.created_at),
            ]
        })
        .collect()
}

pub async fn run(console: &Console, command: ContentCommand, out: &mut Printer<'_>) -> CliResult<()> {
    let backend = console.backend.as_ref();

    match command {
        ContentCommand::List { tenant } => {
            let items = match tenant {
                Some(tenant_id) => {
                    console.require_in_tenant(Permission::ViewDashboard, tenant_id).await?;
                    ContentItem::list_for_tenant(backend, tenant_id).await?
                }
                None => {
                    console.require(Permission::ViewDashboard).await?;
                    console.store.refresh_content_items(backend).await?;
                    console.store.content_items().await
                }
            };

            let rows = items
                .iter()
                .map(|c| {
                    vec![
                        c.id.to_string(),
                        c.title.clone(),
                        type_label(c.content_type).to_string(),
                        if c.is_published { "yes" } else { "no" }.to_string(),
                        format_date(&c.created_at),
                    ]
                })
                .collect();
            out.table(&["ID", "TITLE", "TYPE", "PUBLISHED", "CREATED"], rows, &items)?;
        }

        ContentCommand::Create {
            title,
            description,
            content_type,
            body,
            publish,
        } => {
            console.require(Permission::ManageContent).await?;
            let item = ContentItem::create(
                backend,
                CreateContent {
                    title,
                    description,
                    content_type,
                    content: body,
                    is_published: publish,
                },
            )
            .await?;
            out.message(&format!("Created content {} ({})", item.title, item.id), &item)?;
        }

        ContentCommand::Preview { id, set } => match set {
            Some(preview) => {
                console.require(Permission::ManageContent).await?;
                ContentItem::set_preview(backend, id, &preview).await?;
                out.message(
                    &format!("Updated preview of {}", id),
                    &json!({ "id": id, "preview_content": preview }),
                )?;
            }
            None => {
                console.require(Permission::ViewDashboard).await?;
                let preview = ContentItem::preview(backend, id).await?;
                out.message(
                    &or_dash(preview.as_deref()),
                    &json!({ "id": id, "preview_content": preview }),
                )?;
            }
        },

        ContentCommand::Rules { content_id } => {
            console.require(Permission::ViewDashboard).await?;
            let rules = AccessRule::list_for_content(backend, content_id).await?;
            out.table(&["ID", "PLAN", "ACCESS", "CREATED"], rule_rows(&rules), &rules)?;
        }

        ContentCommand::Grant {
            content_id,
            plan_id,
            access,
        } => {
            console.require(Permission::ManageContent).await?;
            let rule = AccessRule::create(backend, content_id, plan_id, access).await?;
            out.message(
                &format!("Plan {} has {} access to {} (rule {})", plan_id, access.as_str(), content_id, rule.id),
                &rule,
            )?;
        }

        ContentCommand::UpdateRule { rule_id, access } => {
            console.require(Permission::ManageContent).await?;
            let rule = AccessRule::update(backend, rule_id, access).await?;
            out.message(&format!("Rule {} now grants {} access", rule.id, access.as_str()), &rule)?;
        }

        ContentCommand::Revoke { rule_id } => {
            console.require(Permission::ManageContent).await?;
            AccessRule::delete(backend, rule_id).await?;
            out.message(
                &format!("Revoked rule {}", rule_id),
                &json!({ "id": rule_id, "deleted": true }),
            )?;
        }

        ContentCommand::Check { content_id, user_id } => {
            console.require(Permission::ViewDashboard).await?;
            let decision = verify_access(backend, content_id, user_id).await?;
            let text = match decision.access_type {
                Some(level) if decision.has_access => format!("User {} has {} access", user_id, level.as_str()),
                _ => format!("User {} has no access", user_id),
            };
            out.message(&text, &decision)?;
        }
    }
    Ok(())
}
