/// Session token validation
///
/// The auth provider issues HS256 JWT access tokens. When the console is
/// configured with the project's JWT secret it validates restored tokens
/// locally before using them, so an expired session is reported up front
/// instead of as a failed data call.
///
/// # Claims
///
/// - `sub`: User ID
/// - `email`: Sign-in email
/// - `role`: Database role (`authenticated` for signed-in users)
/// - `aud`: Audience (`authenticated`)
/// - `exp` / `iat`: Expiration and issue timestamps
///
/// # Example
///
/// ```
/// use tenantdesk_shared::auth::jwt::{create_session_token, validate_session_token, SessionClaims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = SessionClaims::new(Uuid::new_v4(), "admin@example.com");
/// let token = create_session_token(&claims, "a-secret-of-at-least-32-bytes-long!")?;
///
/// let validated = validate_session_token(&token, "a-secret-of-at-least-32-bytes-long!")?;
/// assert_eq!(validated.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience the auth provider stamps on user sessions
pub const SESSION_AUDIENCE: &str = "authenticated";

/// Error type for session token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was not issued for a user session
    #[error("Invalid audience")]
    InvalidAudience,
}

/// Session JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Sign-in email
    #[serde(default)]
    pub email: Option<String>,

    /// Database role
    #[serde(default)]
    pub role: Option<String>,

    /// Audience
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    /// Creates claims for a one-hour session
    pub fn new(user_id: Uuid, email: &str) -> Self {
        let now = Utc::now();
        SessionClaims {
            sub: user_id,
            email: Some(email.to_string()),
            role: Some(SESSION_AUDIENCE.to_string()),
            aud: SESSION_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        }
    }

    /// Checks if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs session claims
///
/// The console never mints real sessions; this exists for tests and for
/// local tooling that needs a token accepted by [`validate_session_token`].
pub fn create_session_token(claims: &SessionClaims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a session token and extracts its claims
///
/// Verifies the HS256 signature, expiration, and the `authenticated`
/// audience.
pub fn validate_session_token(token: &str, secret: &str) -> Result<SessionClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[SESSION_AUDIENCE]);
    validation.validate_exp = true;

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::InvalidAudience,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}
