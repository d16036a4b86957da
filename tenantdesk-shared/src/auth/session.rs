/// Sign-in, sign-up and session handling
///
/// The auth provider owns credentials. The console signs in with a password,
/// keeps the returned session on its backend client, and creates the
/// `user_profiles` row for new accounts.
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::auth::session::{sign_up, SignUpRequest};
/// use tenantdesk_shared::backend::RestBackend;
/// use tenantdesk_shared::config::Config;
///
/// # async fn example() -> tenantdesk_shared::error::ConsoleResult<()> {
/// let config = Config::from_env()?;
/// let backend = RestBackend::new(&config.backend)?;
///
/// let request = SignUpRequest {
///     email: "new.admin@example.com".to_string(),
///     password: "S3cure!pass".to_string(),
///     full_name: "New Admin".to_string(),
/// };
/// sign_up(&backend, &backend, request).await?;
/// # Ok(())
/// # }
/// ```

use crate::backend::{AuthUser, Backend};
use crate::error::ConsoleResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

/// A signed-in session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for backend calls
    pub access_token: String,

    /// Token used to renew the session
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Seconds until `access_token` expires
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// The signed-in user
    pub user: AuthUser,
}

/// Contract with the authentication provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Signs in with email and password and keeps the session
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ConsoleResult<AuthSession>;

    /// Registers a new account
    ///
    /// Returns `None` when the provider accepted the request but has not
    /// created the user yet (pending email confirmation).
    async fn sign_up(&self, email: &str, password: &str) -> ConsoleResult<Option<AuthUser>>;

    /// Ends the current session
    async fn sign_out(&self) -> ConsoleResult<()>;

    /// Sends a password reset email
    async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>)
        -> ConsoleResult<()>;
}

/// Input for creating an account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    /// Sign-in email
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    /// Initial password
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,

    /// Display name stored on the profile
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub full_name: String,
}

/// Signs in and returns the session
pub async fn sign_in(
    auth: &dyn AuthProvider,
    email: &str,
    password: &str,
) -> ConsoleResult<AuthSession> {
    let session = auth.sign_in_with_password(email, password).await?;
    info!(user_id = %session.user.id, "Signed in");
    Ok(session)
}

/// Creates an account and its `user_profiles` row with role `user`
///
/// The profile is only created when the provider returns the new user; a
/// pending confirmation leaves profile creation to the backend.
pub async fn sign_up(
    auth: &dyn AuthProvider,
    backend: &dyn Backend,
    request: SignUpRequest,
) -> ConsoleResult<Option<AuthUser>> {
    request.validate()?;

    let user = auth.sign_up(&request.email, &request.password).await?;

    if let Some(user) = &user {
        backend
            .insert(
                "user_profiles",
                json!({
                    "id": user.id,
                    "full_name": request.full_name,
                    "role": "user",
                }),
            )
            .await?;
        info!(user_id = %user.id, "Created user profile");
    }

    Ok(user)
}

/// Signs out
pub async fn sign_out(auth: &dyn AuthProvider) -> ConsoleResult<()> {
    auth.sign_out().await?;
    info!("Signed out");
    Ok(())
}

/// Sends a password reset email pointing at `redirect_to`
pub async fn reset_password(
    auth: &dyn AuthProvider,
    email: &str,
    redirect_to: Option<&str>,
) -> ConsoleResult<()> {
    auth.reset_password_for_email(email, redirect_to).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::ConsoleError;

    fn request(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: "S3cure!pass".to_string(),
            full_name: "New Admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let backend = MockBackend::new();

        let user = sign_up(&backend, &backend, request("new@example.com"))
            .await
            .unwrap()
            .unwrap();

        let profiles = backend.rows("user_profiles");
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["id"], user.id.to_string());
        assert_eq!(profiles[0]["role"], "user");
        assert_eq!(profiles[0]["full_name"], "New Admin");
    }

    #[tokio::test]
    async fn test_sign_up_rejects_bad_email() {
        let backend = MockBackend::new();

        let err = sign_up(&backend, &backend, request("not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
        assert!(err.user_message().starts_with("email"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up() {
        let backend = MockBackend::new().with_account("taken@example.com", "whatever1");

        let err = sign_up(&backend, &backend, request("taken@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "User already registered");
        assert!(backend.rows("user_profiles").is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let backend = MockBackend::new().with_account("ops@example.com", "S3cure!pass");

        let session = sign_in(&backend, "ops@example.com", "S3cure!pass").await.unwrap();
        assert_eq!(session.user.email, "ops@example.com");
        assert!(backend.current_user().is_some());

        sign_out(&backend).await.unwrap();
        assert!(backend.current_user().is_none());
    }
}
