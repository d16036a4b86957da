/// HTTP backend client
///
/// Talks to a PostgREST-style API with an auth service next to it:
///
/// ```text
/// POST   {url}/rest/v1/rpc/{name}        remote procedures
/// GET    {url}/rest/v1/{table}?...       select
/// POST   {url}/rest/v1/{table}           insert (Prefer: return=representation)
/// PATCH  {url}/rest/v1/{table}?...       update (Prefer: return=representation)
/// DELETE {url}/rest/v1/{table}?...       delete
/// POST   {url}/auth/v1/token?grant_type=password
/// POST   {url}/auth/v1/signup | /logout | /recover
/// GET    {url}/auth/v1/user
/// ```
///
/// Every request carries the public `apikey` header and a bearer token: the
/// session access token when signed in, the anon key otherwise.
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::backend::{Backend, RestBackend};
/// use tenantdesk_shared::auth::session::AuthProvider;
/// use tenantdesk_shared::config::Config;
///
/// # async fn example() -> tenantdesk_shared::error::ConsoleResult<()> {
/// let config = Config::from_env()?;
/// let backend = RestBackend::new(&config.backend)?;
///
/// backend.sign_in_with_password("admin@example.com", "password").await?;
/// let stats = backend.rpc("get_dashboard_stats", serde_json::json!({})).await?;
/// # Ok(())
/// # }
/// ```

use crate::auth::session::{AuthProvider, AuthSession};
use crate::backend::{AuthUser, Backend, TableQuery};
use crate::config::BackendConfig;
use crate::error::{ConsoleError, ConsoleResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::RwLock;
use tracing::{debug, warn};

/// HTTP implementation of [`Backend`] and [`AuthProvider`]
pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
}

impl RestBackend {
    /// Creates a client for the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS setup)
    pub fn new(config: &BackendConfig) -> ConsoleResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(RestBackend {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
        })
    }

    /// Restores a session from a previously issued access token
    ///
    /// The token is exchanged for the user it belongs to; an expired or
    /// revoked token fails here rather than on the first data call.
    pub async fn restore_session(&self, access_token: &str) -> ConsoleResult<AuthUser> {
        let response = self
            .client
            .get(self.url("auth/v1/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: AuthUser = serde_json::from_value(read_body(response).await?)?;

        self.set_session(Some(AuthSession {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: None,
            user: user.clone(),
        }));
        Ok(user)
    }

    /// The current access token, if signed in
    pub fn access_token(&self) -> Option<String> {
        self.session_read().as_ref().map(|s| s.access_token.clone())
    }

    fn set_session(&self, session: Option<AuthSession>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn session_read(&self) -> std::sync::RwLockReadGuard<'_, Option<AuthSession>> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }
}

/// Error body shapes returned by the REST and auth services
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<JsonValue>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    msg: Option<String>,
}

/// Converts a failed response into a `ConsoleError`
///
/// PostgREST reports `{code, message}`, the auth service `{error,
/// error_description}` or `{error_code, msg}`. Anything else falls back to
/// the HTTP status text.
pub(crate) fn parse_error_body(status: StatusCode, body: &str) -> ConsoleError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed
        .error_code
        .or_else(|| match parsed.code {
            Some(JsonValue::String(code)) => Some(code),
            _ => None,
        })
        .or(parsed.error);

    let message = parsed
        .message
        .or(parsed.error_description)
        .or(parsed.msg)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    ConsoleError::Backend { code, message }
}

async fn read_body(response: reqwest::Response) -> ConsoleResult<JsonValue> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        warn!(status = %status, "Backend request failed");
        return Err(parse_error_body(status, &text));
    }
    if text.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn into_rows(value: JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Array(rows) => rows,
        JsonValue::Null => Vec::new(),
        other => vec![other],
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn rpc(&self, name: &str, params: JsonValue) -> ConsoleResult<JsonValue> {
        debug!(rpc = name, "Calling remote procedure");
        let response = self
            .request(Method::POST, &format!("rest/v1/rpc/{}", name))
            .json(&params)
            .send()
            .await?;
        read_body(response).await
    }

    async fn select(&self, query: &TableQuery) -> ConsoleResult<Vec<JsonValue>> {
        debug!(table = %query.table, "Selecting rows");
        let response = self
            .request(Method::GET, &format!("rest/v1/{}", query.table))
            .query(&query.to_query_pairs())
            .send()
            .await?;
        Ok(into_rows(read_body(response).await?))
    }

    async fn insert(&self, table: &str, row: JsonValue) -> ConsoleResult<JsonValue> {
        debug!(table, "Inserting row");
        let response = self
            .request(Method::POST, &format!("rest/v1/{}", table))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        into_rows(read_body(response).await?)
            .into_iter()
            .next()
            .ok_or_else(|| ConsoleError::backend(format!("Insert into {} returned no row", table)))
    }

    async fn update(&self, query: &TableQuery, changes: JsonValue) -> ConsoleResult<Vec<JsonValue>> {
        debug!(table = %query.table, "Updating rows");
        let filters: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|f| (f.column.clone(), f.render()))
            .collect();
        let response = self
            .request(Method::PATCH, &format!("rest/v1/{}", query.table))
            .header("Prefer", "return=representation")
            .query(&filters)
            .json(&changes)
            .send()
            .await?;
        Ok(into_rows(read_body(response).await?))
    }

    async fn delete(&self, query: &TableQuery) -> ConsoleResult<()> {
        debug!(table = %query.table, "Deleting rows");
        let filters: Vec<(String, String)> = query
            .filters
            .iter()
            .map(|f| (f.column.clone(), f.render()))
            .collect();
        let response = self
            .request(Method::DELETE, &format!("rest/v1/{}", query.table))
            .query(&filters)
            .send()
            .await?;
        read_body(response).await?;
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session_read().as_ref().map(|s| s.user.clone())
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ConsoleResult<AuthSession> {
        let response = self
            .client
            .post(self.url("auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: AuthSession = serde_json::from_value(read_body(response).await?)?;

        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> ConsoleResult<Option<AuthUser>> {
        let response = self
            .client
            .post(self.url("auth/v1/signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body = read_body(response).await?;

        // With email confirmation on, the user comes back bare; otherwise
        // nested in a session object.
        let user = body.get("user").cloned().unwrap_or(body);
        if user.get("id").is_none() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(user)?))
    }

    async fn sign_out(&self) -> ConsoleResult<()> {
        if self.access_token().is_some() {
            let response = self.request(Method::POST, "auth/v1/logout").send().await?;
            read_body(response).await?;
        }
        self.set_session(None);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> ConsoleResult<()> {
        let mut request = self
            .client
            .post(self.url("auth/v1/recover"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email }));
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        read_body(request.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_postgrest_error() {
        let err = parse_error_body(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value","details":null,"hint":null}"#,
        );
        match err {
            ConsoleError::Backend { code, message } => {
                assert_eq!(code.as_deref(), Some("23505"));
                assert_eq!(message, "duplicate key value");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_auth_error() {
        let err = parse_error_body(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.user_message(), "Invalid login credentials");

        let err = parse_error_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters"}"#,
        );
        match err {
            ConsoleError::Backend { code, message } => {
                assert_eq!(code.as_deref(), Some("weak_password"));
                assert_eq!(message, "Password should be at least 6 characters");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unstructured_error() {
        let err = parse_error_body(StatusCode::BAD_GATEWAY, "<html>upstream down</html>");
        assert_eq!(err.user_message(), "Bad Gateway");
    }

    #[test]
    fn test_into_rows() {
        assert!(into_rows(JsonValue::Null).is_empty());
        assert_eq!(into_rows(json!([{"a": 1}, {"a": 2}])).len(), 2);
        assert_eq!(into_rows(json!({"a": 1})).len(), 1);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let backend = RestBackend::new(&BackendConfig {
            url: "https://example.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(backend.url("rest/v1/rpc/x"), "https://example.supabase.co/rest/v1/rpc/x");
        assert!(backend.current_user().is_none());
    }
}
