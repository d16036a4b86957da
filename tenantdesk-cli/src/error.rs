/// Error handling for the command-line console
///
/// Every command returns `CliResult<()>`. Errors carry an exit code and the
/// message printed to stderr, the way an HTTP API maps errors to status
/// codes and bodies.
///
/// # Exit codes
///
/// - `1`: Backend or unexpected failure
/// - `2`: Invalid input
/// - `3`: Not signed in or session rejected
/// - `4`: Signed in but not allowed
/// - `5`: Not found
///
/// # Example
///
/// ```
/// use tenantdesk_cli::error::CliError;
/// use tenantdesk_shared::error::ConsoleError;
///
/// let err = CliError::from(ConsoleError::NotAuthenticated);
/// assert_eq!(err.exit_code(), 3);
/// assert_eq!(err.user_message(), "Not authenticated");
/// ```

use tenantdesk_shared::auth::authorization::AuthzError;
use tenantdesk_shared::auth::jwt::JwtError;
use tenantdesk_shared::error::ConsoleError;
use tenantdesk_worker::bulk::BulkError;
use tenantdesk_worker::listener::ListenerError;
use tenantdesk_worker::simulator::SimulatorError;

/// CLI result type alias
pub type CliResult<T> = Result<T, CliError>;

/// Unified CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad arguments that clap could not catch
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Signed in, but the role or tenant does not allow it
    #[error("Forbidden: {0}")]
    Forbidden(#[from] AuthzError),

    /// Local session token check failed
    #[error("Session rejected: {0}")]
    Session(#[from] JwtError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Simulator(#[from] SimulatorError),

    #[error(transparent)]
    Bulk(#[from] BulkError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// A spawned delivery panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Writing output failed
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

fn console_exit_code(err: &ConsoleError) -> i32 {
    match err {
        ConsoleError::NotAuthenticated => 3,
        ConsoleError::Validation(_) => 2,
        e if e.is_not_found() => 5,
        _ => 1,
    }
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidInput(_) => 2,
            CliError::Forbidden(_) => 4,
            CliError::Session(_) => 3,
            CliError::Console(e) => console_exit_code(e),
            CliError::Simulator(SimulatorError::UnknownEvent(_)) => 2,
            CliError::Simulator(SimulatorError::Console(e)) => console_exit_code(e),
            CliError::Listener(ListenerError::Console(e)) => console_exit_code(e),
            CliError::Bulk(BulkError::Console(e)) => console_exit_code(e),
            CliError::Simulator(_) | CliError::Bulk(_) | CliError::Task(_) | CliError::Io(_) => 1,
        }
    }

    /// Message printed to the operator
    pub fn user_message(&self) -> String {
        match self {
            CliError::Console(e)
            | CliError::Simulator(SimulatorError::Console(e))
            | CliError::Listener(ListenerError::Console(e))
            | CliError::Bulk(BulkError::Console(e)) => e.user_message(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantdesk_shared::models::user::UserRole;
    use uuid::Uuid;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InvalidInput("x".into()).exit_code(), 2);
        assert_eq!(CliError::from(ConsoleError::NotFound("Tenant".into())).exit_code(), 5);
        assert_eq!(CliError::from(ConsoleError::Validation("name: too long".into())).exit_code(), 2);
        assert_eq!(CliError::from(ConsoleError::backend("boom")).exit_code(), 1);
        assert_eq!(
            CliError::from(AuthzError::InsufficientRole {
                required: UserRole::Admin,
                actual: UserRole::User,
            })
            .exit_code(),
            4
        );
        assert_eq!(
            CliError::from(SimulatorError::UnknownEvent("invoice.paid".into())).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(SimulatorError::Console(ConsoleError::NotAuthenticated)).exit_code(),
            3
        );
    }

    #[test]
    fn test_user_messages() {
        let err = CliError::from(ConsoleError::MissingTenant);
        assert_eq!(err.user_message(), "No tenant ID found");

        let err = CliError::from(BulkError::Console(ConsoleError::NotFound("Bulk operation".into())));
        assert_eq!(err.user_message(), "Bulk operation not found");

        let err = CliError::from(AuthzError::NotMember(Uuid::nil()));
        assert!(err.user_message().starts_with("Forbidden: Not a member of tenant"));
    }
}
