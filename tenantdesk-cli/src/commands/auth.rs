//! Session commands: login, signup, logout, reset-password, whoami

use crate::app::Console;
use crate::error::{CliError, CliResult};
use crate::output::{or_dash, Printer};
use serde_json::json;
use tenantdesk_shared::auth::jwt::validate_session_token;
use tenantdesk_shared::auth::password::validate_password_strength;
use tenantdesk_shared::auth::session::{self, SignUpRequest};

pub async fn login(console: &Console, email: &str, password: &str, out: &mut Printer<'_>) -> CliResult<()> {
    let session = session::sign_in(console.auth.as_ref(), email, password).await?;
    console.store.set_current_user(None).await;

    out.note(&format!("Signed in as {}", session.user.email))?;
    out.message(
        &format!("export SESSION_ACCESS_TOKEN={}", session.access_token),
        &session,
    )?;
    Ok(())
}

/// Creates an account; weak passwords are refused before reaching the provider
pub async fn signup(
    console: &Console,
    email: String,
    password: String,
    full_name: String,
    out: &mut Printer<'_>,
) -> CliResult<()> {
    let strength = validate_password_strength(&password);
    if !strength.is_valid {
        return Err(CliError::InvalidInput(format!(
            "Password is too weak ({}/5): {}",
            strength.score,
            strength.feedback.join("; ")
        )));
    }

    let request = SignUpRequest {
        email,
        password,
        full_name,
    };
    let created = session::sign_up(console.auth.as_ref(), console.backend.as_ref(), request).await?;

    match created {
        Some(user) => out.message(&format!("Created account {} ({})", user.email, user.id), &user)?,
        None => out.message(
            "Check your email to confirm the account",
            &json!({ "pending_confirmation": true }),
        )?,
    }
    Ok(())
}

pub async fn logout(console: &Console, out: &mut Printer<'_>) -> CliResult<()> {
    session::sign_out(console.auth.as_ref()).await?;
    console.store.set_current_user(None).await;
    out.message("Signed out", &json!({ "signed_out": true }))?;
    Ok(())
}

pub async fn reset_password(console: &Console, email: &str, out: &mut Printer<'_>) -> CliResult<()> {
    session::reset_password(console.auth.as_ref(), email, console.password_reset_redirect()).await?;
    out.message(
        &format!("Password reset email sent to {}", email),
        &json!({ "email": email, "sent": true }),
    )?;
    Ok(())
}

/// Shows the signed-in user
///
/// With both a JWT secret and an access token configured, the token is
/// checked locally first.
pub async fn whoami(console: &Console, out: &mut Printer<'_>) -> CliResult<()> {
    let session = &console.config.session;
    if let (Some(secret), Some(token)) = (&session.jwt_secret, &session.access_token) {
        let claims = validate_session_token(token, secret)?;
        out.note(&format!("Token valid for {}", or_dash(claims.email.as_deref())))?;
    }

    let user = console.current_user().await?;
    let profile = user.profile.as_ref();
    out.record(
        &[
            ("ID", user.id.to_string()),
            ("Email", user.email.clone()),
            ("Name", or_dash(user.full_name())),
            ("Role", or_dash(user.role().map(|r| r.as_str()))),
            ("Tenant", or_dash(profile.and_then(|p| p.tenant_id))),
            ("Status", or_dash(profile.map(|p| p.status.as_str()))),
        ],
        &user,
    )?;
    Ok(())
}
