//! Command handlers
//!
//! Each handler checks permissions, calls the shared shims and prints the
//! result. No business logic lives here.

pub mod auth;
pub mod content;
pub mod dashboard;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod tenants;
pub mod users;
pub mod webhooks;

use crate::app::Console;
use crate::cli::Command;
use crate::error::CliResult;
use crate::output::Printer;
use tenantdesk_shared::filters::Selection;
use uuid::Uuid;

/// Selection of the given IDs, duplicates dropped, first occurrence kept
pub(crate) fn selection_of(ids: Vec<Uuid>) -> Selection {
    let mut selection = Selection::default();
    for id in ids {
        selection.toggle(id, true);
    }
    selection
}

/// Runs one parsed command
pub async fn run(console: &Console, command: Command, out: &mut Printer<'_>) -> CliResult<()> {
    match command {
        Command::Login { email, password } => auth::login(console, &email, &password, out).await,
        Command::Signup {
            email,
            password,
            full_name,
        } => auth::signup(console, email, password, full_name, out).await,
        Command::Logout => auth::logout(console, out).await,
        Command::ResetPassword { email } => auth::reset_password(console, &email, out).await,
        Command::Whoami => auth::whoami(console, out).await,
        Command::Dashboard => dashboard::show(console, out).await,
        Command::Tenants(command) => tenants::run(console, command, out).await,
        Command::Users(command) => users::run(console, command, out).await,
        Command::Plans(command) => plans::run(console, command, out).await,
        Command::Subscriptions(command) => subscriptions::run(console, command, out).await,
        Command::Content(command) => content::run(console, command, out).await,
        Command::Payments(command) => payments::run(console, command, out).await,
        Command::Webhooks(command) => webhooks::run(console, command, out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_of_drops_duplicates() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let selection = selection_of(vec![a, b, a]);
        assert_eq!(selection.ids(), &[a, b]);
    }
}
