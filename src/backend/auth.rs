// src/backend/auth.rs
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::error::ApiError;
use crate::backend::password::{hash_password, new_token, token_digest, verify_password};
use crate::backend::AppState;
use crate::database::db::identity as users;
use crate::database::models::{
    AccessToken, CredentialsRequest, EmailRequest, Identity, PasswordRequest, Session,
    SignUpRequest, VerifyRequest,
};
use crate::sync::{validate, VerificationKind};

/// The identity behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let token = bearer(headers).ok_or_else(ApiError::unauthorized)?;
    let token_hash = token_digest(token);
    let (identity, expires_at) = users::session_user(&state.db, &token_hash, Utc::now())
        .await?
        .ok_or_else(ApiError::unauthorized)?;
    Ok(Caller {
        identity,
        token_hash,
        expires_at,
    })
}

async fn issue_session(state: &AppState, identity: Identity) -> Result<Session, ApiError> {
    let token = new_token();
    let expires_at = Utc::now() + state.session_ttl;
    users::insert_session(&state.db, &token_digest(&token), identity.id, expires_at).await?;
    Ok(Session {
        access_token: AccessToken::new(token),
        expires_at,
        user: identity,
    })
}

// Stands in for outbound email: the token is written to the server log.
async fn send_token(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    kind: VerificationKind,
) -> Result<(), ApiError> {
    let token = new_token();
    let expires_at = Utc::now() + state.token_ttl;
    users::insert_auth_token(&state.db, &token_digest(&token), user_id, kind, expires_at).await?;
    info!(target: "outbox", %email, kind = kind.as_str(), %token, "verification token issued");
    Ok(())
}

fn invalid_input(err: impl std::fmt::Display) -> ApiError {
    ApiError::unprocessable("validation_failed", err.to_string())
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<Identity>, ApiError> {
    let email = validate::email(&req.email).map_err(invalid_input)?;
    validate::password(&req.password).map_err(invalid_input)?;
    let display_name = req.display_name.as_deref().and_then(validate::optional_text);

    let hash = hash_password(&req.password).map_err(ApiError::internal)?;
    let identity = match users::create_user(&state.db, &email, &hash, display_name.as_deref()).await {
        Ok(identity) => identity,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "user_already_exists",
                "User already registered",
            ))
        }
        Err(err) => return Err(err.into()),
    };
    info!(user_id = %identity.id, "user registered");

    send_token(&state, identity.id, &identity.email, VerificationKind::Signup).await?;
    Ok(Json(identity))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Session>, ApiError> {
    let invalid = || ApiError::bad_request("invalid_credentials", "Invalid login credentials");

    let user = users::find_user_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash).map_err(ApiError::internal)? {
        warn!(user_id = %user.identity.id, "sign-in with wrong password");
        return Err(invalid());
    }
    if user.identity.email_confirmed_at.is_none() {
        return Err(ApiError::bad_request("email_not_confirmed", "Email not confirmed"));
    }

    let session = issue_session(&state, user.identity).await?;
    info!(user_id = %session.user.id, "signed in");
    Ok(Json(session))
}

/// Always succeeds; an unknown or expired token is already signed out.
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    if let Some(token) = bearer(&headers) {
        if users::delete_session(&state.db, &token_digest(token)).await? {
            info!("signed out");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Identity>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    Ok(Json(caller.identity))
}

pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<Identity>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    validate::password(&req.password).map_err(invalid_input)?;

    let hash = hash_password(&req.password).map_err(ApiError::internal)?;
    users::update_password_hash(&state.db, caller.identity.id, &hash).await?;
    info!(user_id = %caller.identity.id, "password updated");
    Ok(Json(caller.identity))
}

/// Answers the same whether or not the address is registered.
pub async fn recover(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(user) = users::find_user_by_email(&state.db, &req.email).await? {
        send_token(&state, user.identity.id, &user.identity.email, VerificationKind::Recovery).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resend(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(user) = users::find_user_by_email(&state.db, &req.email).await? {
        if user.identity.email_confirmed_at.is_none() {
            send_token(&state, user.identity.id, &user.identity.email, VerificationKind::Signup).await?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Session>, ApiError> {
    let now = Utc::now();
    let user_id = users::consume_auth_token(&state.db, &token_digest(&req.token), req.kind, now)
        .await?
        .ok_or_else(|| ApiError::bad_request("otp_expired", "Token has expired or is invalid"))?;

    if req.kind == VerificationKind::Signup {
        users::confirm_email(&state.db, user_id, now).await?;
        info!(%user_id, "email confirmed");
    }
    let identity = users::get_user(&state.db, user_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let session = issue_session(&state, identity).await?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  abc123 "));
        assert_eq!(bearer(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer(&headers), None);
    }
}
