/// Error handling for the console
///
/// Every shim returns `ConsoleResult<T>`. Callers that only need to show the
/// failure to an operator use [`ConsoleError::user_message`], which is the
/// string the console renders in its error banner.
///
/// # Example
///
/// ```
/// use tenantdesk_shared::error::ConsoleError;
///
/// let err = ConsoleError::Backend {
///     code: Some("23505".to_string()),
///     message: "duplicate key value violates unique constraint".to_string(),
/// };
/// assert_eq!(err.user_message(), "duplicate key value violates unique constraint");
/// ```

use thiserror::Error;

/// Console result type alias
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Unified console error type
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// No signed-in user
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Signed-in user has no tenant assigned
    #[error("No tenant ID found")]
    MissingTenant,

    /// A single-row lookup returned nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend rejected the call
    #[error("Backend error{}: {message}", code_suffix(.code))]
    Backend {
        /// Backend error code (Postgres SQLSTATE or auth error code)
        code: Option<String>,

        /// Human-readable message from the backend
        message: String,
    },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response did not match the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before reaching the backend
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default()
}

impl ConsoleError {
    /// Creates a backend error without a code
    pub fn backend(message: impl Into<String>) -> Self {
        ConsoleError::Backend {
            code: None,
            message: message.into(),
        }
    }

    /// Converts the error to the string shown to the operator
    ///
    /// Backend messages are passed through verbatim; transport and decoding
    /// failures collapse to a generic message since their details mean
    /// nothing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::NotAuthenticated => "Not authenticated".to_string(),
            ConsoleError::MissingTenant => "No tenant ID found".to_string(),
            ConsoleError::NotFound(what) => format!("{} not found", what),
            ConsoleError::Backend { message, .. } => message.clone(),
            ConsoleError::Http(err) if err.is_timeout() => {
                "The request timed out. Please try again.".to_string()
            }
            ConsoleError::Http(_) => "Could not reach the server".to_string(),
            ConsoleError::Serialization(_) => "Unexpected response from the server".to_string(),
            ConsoleError::Validation(msg) => msg.clone(),
            ConsoleError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }

    /// Whether the backend reported a missing row or the shim found none
    pub fn is_not_found(&self) -> bool {
        match self {
            ConsoleError::NotFound(_) => true,
            // PGRST116: single row requested, none returned
            // P0002: a procedure raised no_data_found
            ConsoleError::Backend { code: Some(code), .. } => code == "PGRST116" || code == "P0002",
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for ConsoleError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect();
        fields.sort();
        ConsoleError::Validation(fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConsoleError::NotFound("Tenant".to_string());
        assert_eq!(err.to_string(), "Not found: Tenant");

        let err = ConsoleError::Backend {
            code: Some("42501".to_string()),
            message: "permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "Backend error (42501): permission denied");

        let err = ConsoleError::backend("boom");
        assert_eq!(err.to_string(), "Backend error: boom");
    }

    #[test]
    fn test_user_message() {
        assert_eq!(ConsoleError::NotAuthenticated.user_message(), "Not authenticated");
        assert_eq!(ConsoleError::MissingTenant.user_message(), "No tenant ID found");
        assert_eq!(
            ConsoleError::NotFound("Content item".to_string()).user_message(),
            "Content item not found"
        );
        assert_eq!(
            ConsoleError::Validation("name is required".to_string()).user_message(),
            "name is required"
        );
    }

    #[test]
    fn test_serialization_error_message_is_generic() {
        let err: ConsoleError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert_eq!(err.user_message(), "Unexpected response from the server");
    }

    #[test]
    fn test_is_not_found() {
        assert!(ConsoleError::NotFound("x".to_string()).is_not_found());
        assert!(ConsoleError::Backend {
            code: Some("PGRST116".to_string()),
            message: "no rows".to_string(),
        }
        .is_not_found());
        assert!(ConsoleError::Backend {
            code: Some("P0002".to_string()),
            message: "Subscription not found".to_string(),
        }
        .is_not_found());
        assert!(!ConsoleError::backend("other").is_not_found());
    }
}
