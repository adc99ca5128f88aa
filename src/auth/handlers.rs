use axum::{
    extract::{FromRef, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        cookies::{build_cookie, build_lax_cookie, clear_cookie, read_cookie, OAUTH_STATE_COOKIE, TOKEN_COOKIE},
        dto::{
            AuthResponse, GoogleCallbackQuery, LoginRequest, MessageResponse, RefreshRequest,
            RegisterRequest, UpdateUserRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        oauth::GoogleOAuth,
        password::{hash_password, verify_password},
        repo_types::{NewUser, PublicUser, User},
        services::{resolve_google_user, validate_registration, MIN_PASSWORD_LEN},
    },
    error::{is_unique_violation, parse_id, AppError, JsonBody},
    state::AppState,
};

const OAUTH_STATE_TTL_SECS: u64 = 600;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/failure", get(oauth_failure))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/user",
            get(get_self).put(update_self).delete(delete_self),
        )
        .route("/auth/users", get(list_users))
        .route(
            "/auth/user/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn session_cookie(state: &AppState, keys: &JwtKeys, token: &str) -> String {
    build_cookie(
        TOKEN_COOKIE,
        token,
        keys.access_ttl_secs(),
        state.config.secure_cookies(),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = validate_registration(&mut payload).map_err(|e| {
        warn!(email = %payload.email, reason = %e, "registration rejected");
        e
    })?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::bad_request("User already exist"));
    }

    let hash = hash_password(payload.password.clone()).await?;
    let created = User::create(
        &state.db,
        NewUser {
            name: &payload.name,
            email: &payload.email,
            password_hash: Some(&hash),
            provider: None,
            provider_id: None,
            role,
            avatar: None,
        },
    )
    .await;
    let user = match created {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email registered concurrently");
            return Err(AppError::bad_request("User already exist"));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.email = payload.email.trim().to_lowercase();
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::unauthorized("Invalid credentials"));
        }
    };

    let Some(hash) = user.password_hash.clone() else {
        warn!(user_id = %user.id, "password login on oauth-only account");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_password(payload.password, hash).await? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let pair = keys.sign_pair(user.id)?;
    let cookie = session_cookie(&state, &keys, &pair.access);

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            token: pair.access,
            refresh_token: pair.refresh,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(payload.refresh_token.trim()).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::unauthorized("Invalid refresh token")
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let pair = keys.sign_pair(user.id)?;
    let cookie = session_cookie(&state, &keys, &pair.access);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            token: pair.access,
            refresh_token: pair.refresh,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::SET_COOKIE,
            clear_cookie(TOKEN_COOKIE, state.config.secure_cookies()),
        )],
        Json(MessageResponse::new("User logged out")),
    )
}

fn google_client(state: &AppState) -> Result<&GoogleOAuth, AppError> {
    state
        .google
        .as_deref()
        .ok_or_else(|| AppError::not_found("Google sign-in is not configured"))
}

#[instrument(skip(state))]
pub async fn google_start(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let google = google_client(&state)?;
    let csrf = GoogleOAuth::new_state();
    let url = google.authorize_url(&csrf)?;
    let cookie = build_lax_cookie(
        OAUTH_STATE_COOKIE,
        &csrf,
        OAUTH_STATE_TTL_SECS,
        state.config.secure_cookies(),
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(url.as_str())))
}

#[instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<Response, AppError> {
    let google = google_client(&state)?;

    if let Some(reason) = query.error.as_deref() {
        warn!(reason, "google returned an error");
        return Ok(Redirect::to("/auth/failure").into_response());
    }

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    if expected.is_none() || expected != query.state.as_deref() {
        warn!("oauth state mismatch");
        return Err(AppError::bad_request("Invalid OAuth state"));
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Authentication failed"))?;

    let profile = google.exchange_code(code).await.map_err(|e| {
        error!(error = ?e, "google code exchange failed");
        AppError::bad_request("Authentication failed")
    })?;

    let user = resolve_google_user(&state.db, &profile).await.map_err(|e| {
        error!(error = ?e, sub = %profile.sub, "google user resolution failed");
        AppError::bad_request("Authentication failed")
    })?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_access(user.id)?;
    let secure = state.config.secure_cookies();

    info!(user_id = %user.id, "user signed in with google");
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session_cookie(&state, &keys, &token)),
            (header::SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE, secure)),
        ]),
        Redirect::to("/"),
    )
        .into_response())
}

pub async fn oauth_failure() -> AppError {
    AppError::unauthorized("OAuth authentication failed")
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_self(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: CurrentUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(User::list_public(&state.db).await?))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    let id = parse_id(&id, "Invalid user ID")?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

async fn apply_update(
    state: &AppState,
    target: uuid::Uuid,
    payload: UpdateUserRequest,
) -> Result<Json<MessageResponse>, AppError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let hash = match payload.password {
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
            return Err(AppError::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        Some(p) => Some(hash_password(p).await?),
        None => None,
    };

    let updated = User::update_profile(
        &state.db,
        target,
        name,
        hash.as_deref(),
        payload.avatar.as_deref(),
    )
    .await?;

    match updated {
        Some(u) => {
            info!(user_id = %u.id, "user updated");
            Ok(Json(MessageResponse::new("User updated successfully")))
        }
        None => Err(AppError::not_found("User not found")),
    }
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_self(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    apply_update(&state, user.id, payload).await
}

#[instrument(skip_all, fields(user_id = %user.id, target = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let target = parse_id(&id, "Invalid user ID")?;
    if !user.can_manage(target) {
        warn!("update of another account refused");
        return Err(AppError::forbidden("You can only update your own account"));
    }
    apply_update(&state, target, payload).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_self(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    if !User::delete(&state.db, user.id).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!("user deleted own account");
    Ok((
        [(
            header::SET_COOKIE,
            clear_cookie(TOKEN_COOKIE, state.config.secure_cookies()),
        )],
        Json(MessageResponse::new("User deleted successfully")),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id, target = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let target = parse_id(&id, "Invalid user ID")?;
    if !user.can_manage(target) {
        warn!("deletion of another account refused");
        return Err(AppError::forbidden("You can only delete your own account"));
    }
    if !User::delete(&state.db, target).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!("user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
