/// Authentication and authorization utilities
///
/// This module provides the console's side of authentication:
///
/// # Modules
///
/// - [`session`]: Sign-in, sign-up, sign-out and password reset flows
/// - [`jwt`]: Local validation of session access tokens
/// - [`password`]: Password strength scoring
/// - [`authorization`]: Role and tenant-scope checks
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::auth::session::sign_in;
/// use tenantdesk_shared::auth::password::validate_password_strength;
/// use tenantdesk_shared::backend::RestBackend;
///
/// # async fn example(backend: &RestBackend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// assert!(validate_password_strength("Str0ng!pass").is_valid);
/// let session = sign_in(backend, "admin@example.com", "Str0ng!pass").await?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod password;
pub mod session;
