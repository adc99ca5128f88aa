use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{error, warn};

use super::{cookies::token_from_headers, jwt::JwtKeys, repo_types::User};
use crate::{error::AppError, state::AppState};

/// The authenticated caller, resolved from the `jwt` cookie or a bearer
/// header. Rejects with 401 before the handler runs.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(|| {
            warn!("request without credential");
            AppError::unauthorized("Token not found")
        })?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::unauthorized("Invalid or expired token")
        })?;

        let user = match User::find_by_id(&state.db, claims.sub).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!(user_id = %claims.sub, "token for unknown user");
                return Err(AppError::unauthorized("User not found"));
            }
            Err(e) => {
                error!(error = %e, user_id = %claims.sub, "user lookup failed");
                return Err(AppError::unauthorized("Authentication failed"));
            }
        };

        Ok(CurrentUser(user))
    }
}
