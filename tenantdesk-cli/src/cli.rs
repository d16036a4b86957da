/// Command-line interface definition
///
/// One subcommand group per console section. Arguments are parsed into the
/// shared model types directly; enum values use their column spelling
/// (`tenant_admin`, `past_due`, ...).

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use tenantdesk_shared::filters::SubscriptionFilter;
use tenantdesk_shared::models::content::{AccessType, ContentType};
use tenantdesk_shared::models::payment::TransactionStatus;
use tenantdesk_shared::models::plan::{PlanInterval, SubscriptionAction};
use tenantdesk_shared::models::subscription::SubscriptionStatus;
use tenantdesk_shared::models::tenant::TenantStatus;
use tenantdesk_shared::models::user::{UserRole, UserStatus};
use uuid::Uuid;

/// Parses a snake_case value into any enum that deserializes from a string
pub fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("invalid value '{}'", value))
}

#[derive(Debug, Parser)]
#[command(name = "tenantdesk", about = "TenantDesk admin console", version)]
pub struct Cli {
    /// Run against the built-in demo data instead of BACKEND_URL
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and print the session's access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TENANTDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TENANTDESK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        full_name: String,
    },

    /// End the current session
    Logout,

    /// Send a password reset email
    ResetPassword {
        #[arg(long)]
        email: String,
    },

    /// Show the signed-in user
    Whoami,

    /// Headline numbers, revenue and subscription mix
    Dashboard,

    #[command(subcommand)]
    Tenants(TenantsCommand),

    #[command(subcommand)]
    Users(UsersCommand),

    #[command(subcommand)]
    Plans(PlansCommand),

    #[command(subcommand)]
    Subscriptions(SubscriptionsCommand),

    #[command(subcommand)]
    Content(ContentCommand),

    /// Mock payment testbed
    #[command(subcommand)]
    Payments(PaymentsCommand),

    /// Mock webhook testbed
    #[command(subcommand)]
    Webhooks(WebhooksCommand),
}

#[derive(Debug, Subcommand)]
pub enum TenantsCommand {
    List {
        /// Case-insensitive name search
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_parser = parse_enum::<TenantStatus>)]
        status: Option<TenantStatus>,
    },
    Create {
        name: String,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_enum::<TenantStatus>)]
        status: Option<TenantStatus>,
    },
    Delete {
        id: Uuid,
    },
    Stats {
        id: Uuid,
    },
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    List {
        /// Case-insensitive email or name search
        #[arg(long, default_value = "")]
        search: String,

        /// Only users of this tenant, with their emails resolved
        #[arg(long)]
        tenant: Option<Uuid>,
    },
    Update(UpdateUserArgs),

    /// Set the status of several users
    SetStatus {
        #[arg(long, value_parser = parse_enum::<UserStatus>)]
        status: UserStatus,
        #[arg(required = true, num_args = 1..)]
        ids: Vec<Uuid>,
    },
    Delete {
        id: Uuid,
    },

    /// Activity log of one or more users, newest first
    Activity {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<Uuid>,
    },

    /// Send a user a password reset email
    ResetPassword {
        id: Uuid,
    },
}

#[derive(Debug, Args)]
pub struct UpdateUserArgs {
    pub id: Uuid,
    #[arg(long)]
    pub full_name: Option<String>,
    #[arg(long, value_parser = parse_enum::<UserRole>)]
    pub role: Option<UserRole>,
    #[arg(long, conflicts_with = "clear_tenant")]
    pub tenant: Option<Uuid>,

    /// Remove the user from their tenant
    #[arg(long)]
    pub clear_tenant: bool,
    #[arg(long, value_parser = parse_enum::<UserStatus>)]
    pub status: Option<UserStatus>,
}

#[derive(Debug, Subcommand)]
pub enum PlansCommand {
    List {
        /// Plans of this tenant instead of every visible plan
        #[arg(long)]
        tenant: Option<Uuid>,

        /// Only plans accepting new subscribers (needs --tenant)
        #[arg(long, requires = "tenant")]
        active_only: bool,
    },
    Create(CreatePlanArgs),
    Update(UpdatePlanArgs),

    /// Subscriptions to a plan
    Subscribers {
        plan_id: Uuid,
    },

    /// Cancel or reactivate a subscription through its plan
    Manage {
        subscription_id: Uuid,
        #[arg(value_parser = parse_enum::<SubscriptionAction>)]
        action: SubscriptionAction,
    },
}

#[derive(Debug, Args)]
pub struct CreatePlanArgs {
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub price: f64,
    #[arg(long, value_parser = parse_enum::<PlanInterval>, default_value = "monthly")]
    pub interval: PlanInterval,
    #[arg(long, default_value_t = 0)]
    pub trial_days: u32,

    /// Repeat for each feature
    #[arg(long = "feature")]
    pub features: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdatePlanArgs {
    pub id: Uuid,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub price: Option<f64>,
    #[arg(long, value_parser = parse_enum::<PlanInterval>)]
    pub interval: Option<PlanInterval>,

    /// Replaces the feature list; repeat for each feature
    #[arg(long = "feature")]
    pub features: Vec<String>,
    #[arg(long)]
    pub active: Option<bool>,
}

#[derive(Debug, Subcommand)]
pub enum SubscriptionsCommand {
    /// Subscriptions of a tenant (default: your own)
    List {
        #[arg(long)]
        tenant: Option<Uuid>,

        /// Case-insensitive user or plan name search
        #[arg(long, default_value = "")]
        search: String,

        /// `all`, `trial`, or a status
        #[arg(long, default_value = "all")]
        filter: SubscriptionFilter,
    },

    /// Subscriptions of one user
    User {
        user_id: Uuid,
    },
    Create {
        user_id: Uuid,
        plan_id: Uuid,

        /// Start with the plan's free trial
        #[arg(long, conflicts_with = "stripe_id")]
        trial: bool,
        #[arg(long)]
        stripe_id: Option<String>,
    },
    Cancel {
        id: Uuid,

        /// Cancel now instead of at the end of the period
        #[arg(long)]
        immediate: bool,
    },
    Reactivate {
        id: Uuid,
    },
    Renew {
        id: Uuid,
    },
    RetryPayment {
        id: Uuid,
    },
    Upgrade {
        id: Uuid,
        new_plan_id: Uuid,
        #[arg(long)]
        immediate: bool,
    },
    Downgrade {
        id: Uuid,
        new_plan_id: Uuid,
    },

    /// End a trial, converting it to paid with --convert
    ExpireTrial {
        id: Uuid,
        #[arg(long)]
        convert: bool,
    },
    SetStatus {
        id: Uuid,
        #[arg(value_parser = parse_enum::<SubscriptionStatus>)]
        status: SubscriptionStatus,
        #[arg(long)]
        cancel_at_period_end: bool,
    },
    BulkStatus {
        #[arg(long, value_parser = parse_enum::<SubscriptionStatus>)]
        status: SubscriptionStatus,
        #[command(flatten)]
        bulk: BulkArgs,
    },
    BulkCancel {
        #[arg(long)]
        immediate: bool,
        #[command(flatten)]
        bulk: BulkArgs,
    },
    BulkConvert {
        #[command(flatten)]
        bulk: BulkArgs,
    },

    /// Progress of a bulk operation
    Operation {
        operation_id: Uuid,

        /// Poll until it completes
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Debug, Args)]
pub struct BulkArgs {
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<Uuid>,

    /// Poll until the operation completes
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Subcommand)]
pub enum ContentCommand {
    List {
        #[arg(long)]
        tenant: Option<Uuid>,
    },
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type", value_parser = parse_enum::<ContentType>, default_value = "text")]
        content_type: ContentType,
        #[arg(long)]
        body: String,
        #[arg(long)]
        publish: bool,
    },

    /// Show the preview teaser, or replace it with --set
    Preview {
        id: Uuid,
        #[arg(long)]
        set: Option<String>,
    },

    /// Access rules of a content item
    Rules {
        content_id: Uuid,
    },

    /// Give a plan access to a content item
    Grant {
        content_id: Uuid,
        plan_id: Uuid,
        #[arg(long, value_parser = parse_enum::<AccessType>, default_value = "full")]
        access: AccessType,
    },
    UpdateRule {
        rule_id: Uuid,
        #[arg(value_parser = parse_enum::<AccessType>)]
        access: AccessType,
    },
    Revoke {
        rule_id: Uuid,
    },

    /// What access a user has to a content item
    Check {
        content_id: Uuid,
        user_id: Uuid,
    },
}

#[derive(Debug, Subcommand)]
pub enum PaymentsCommand {
    /// Test card numbers and their outcomes
    Cards,

    Charge {
        amount: f64,

        /// Test card name (see `payments cards`) or number
        #[arg(long, default_value = "success")]
        card: String,

        /// JSON object stored with the transaction
        #[arg(long)]
        metadata: Option<String>,
    },
    List {
        #[arg(long, value_parser = parse_enum::<TransactionStatus>)]
        status: Option<TransactionStatus>,
    },
    Refund {
        id: Uuid,
    },
}

#[derive(Debug, Subcommand)]
pub enum WebhooksCommand {
    /// Event types that can be simulated
    Events,

    /// Create and deliver webhooks with retries
    Simulate {
        event_type: String,

        /// Deliver for this tenant instead of your own
        #[arg(long)]
        tenant: Option<Uuid>,

        /// Attempts before giving up (default: WEBHOOK_MAX_RETRIES)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Deliveries to run concurrently
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Recent webhooks with their delivery attempts
    Logs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Print webhooks for your tenant as they arrive
    Listen {
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_enum_uses_column_spelling() {
        assert_eq!(parse_enum::<UserRole>("tenant_admin"), Ok(UserRole::TenantAdmin));
        assert_eq!(parse_enum::<SubscriptionStatus>("past_due"), Ok(SubscriptionStatus::PastDue));
        assert!(parse_enum::<UserRole>("root").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tenantdesk", "tenants", "list", "--status", "inactive", "--json"]).unwrap();

        assert!(cli.json);
        assert!(!cli.offline);
        match cli.command {
            Command::Tenants(TenantsCommand::List { search, status }) => {
                assert_eq!(search, "");
                assert_eq!(status, Some(TenantStatus::Inactive));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bulk_ids_are_required() {
        assert!(Cli::try_parse_from(["tenantdesk", "subscriptions", "bulk-cancel"]).is_err());

        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "tenantdesk",
            "subscriptions",
            "bulk-cancel",
            "--immediate",
            "--wait",
            &id.to_string(),
        ])
        .unwrap();
        match cli.command {
            Command::Subscriptions(SubscriptionsCommand::BulkCancel { immediate, bulk }) => {
                assert!(immediate);
                assert!(bulk.wait);
                assert_eq!(bulk.ids, vec![id]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_subscription_filter_parses() {
        let cli = Cli::try_parse_from(["tenantdesk", "subscriptions", "list", "--filter", "trial"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Subscriptions(SubscriptionsCommand::List {
                filter: SubscriptionFilter::Trial,
                ..
            })
        ));
    }
}
