//! Authentication routes
//!
//! - POST /auth/login  - authenticate with the identity provider, create a
//!   token session
//! - POST /auth/logout - revoke the current token session (idempotent)

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::respond::{error, ok};
use crate::cache::UserProfile;
use crate::server::AppState;
use crate::types::BeaconError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Handle POST /auth/login
pub async fn handle_login(state: Arc<AppState>, body: Bytes) -> Response<Full<Bytes>> {
    let request: LoginRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => return error(&BeaconError::BadRequest("Invalid request format".into())),
    };

    // Credential verification is the provider's job; a broken provider
    // circuit surfaces as 503 here
    let tokens = match state
        .auth
        .identity()
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(t) => t,
        Err(e) => return error(&e),
    };

    // The token itself carries subject and tenant; parse it the same way
    // every later request would
    let ctx = match state
        .auth
        .authenticate(Some(&format!("Bearer {}", tokens.access_token)))
        .await
    {
        Ok(ctx) => ctx,
        Err(e) => return error(&e),
    };

    let profile = UserProfile {
        subject: ctx.subject.clone(),
        email: ctx.email.clone(),
        tenant_id: ctx.tenant_id,
        role: ctx.role.as_str().to_string(),
    };
    let session = state.auth.establish_session(
        &tokens.access_token,
        profile,
        Duration::from_secs(tokens.expires_in),
    );

    // Login bookkeeping happens off the response path. The upsert
    // provisions the user row on a subject's first login; afterwards only
    // last_login_at mutates.
    {
        let users = state.users.clone();
        let subject = ctx.subject.clone();
        let tenant_id = ctx.tenant_id;
        let role = ctx.role.as_str();
        tokio::spawn(async move {
            let result = users
                .upsert_one(
                    doc! { "subject": &subject },
                    doc! {
                        "$set": {
                            "last_login_at": bson::DateTime::now(),
                            "metadata.updated_at": bson::DateTime::now(),
                        },
                        "$setOnInsert": {
                            "tenant_id": tenant_id.to_string(),
                            "role": role,
                            "metadata.created_at": bson::DateTime::now(),
                            "metadata.is_deleted": false,
                        },
                    },
                )
                .await;
            if let Err(e) = result {
                warn!("Failed to record login: {}", e);
            }
        });
    }

    ok(
        "Login successful",
        json!({
            "access_token": tokens.access_token,
            "expires_in": tokens.expires_in,
            "token_type": "Bearer",
            "session_id": session.session_id,
            "user_info": {
                "subject": ctx.subject,
                "email": ctx.email,
                "tenant_id": ctx.tenant_id,
                "role": ctx.role.as_str(),
            },
        }),
    )
}

/// Handle POST /auth/logout
pub async fn handle_logout(
    state: Arc<AppState>,
    authorization: Option<&str>,
) -> Response<Full<Bytes>> {
    match state.auth.revoke(authorization) {
        Ok(()) => ok(
            "Logout successful",
            json!({ "message": "Session revoked successfully" }),
        ),
        Err(e) => error(&e),
    }
}
