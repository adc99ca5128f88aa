use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use super::{
    dto::RegisterRequest,
    oauth::{GoogleProfile, PROVIDER_GOOGLE},
    repo_types::{NewUser, User, ROLE_COACH, ROLE_USER},
};
use crate::error::AppError;
use sqlx::PgPool;

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Normalises a registration request in place and checks every field.
/// Returns the role to store.
pub fn validate_registration(req: &mut RegisterRequest) -> Result<&'static str, AppError> {
    req.name = req.name.trim().to_string();
    req.email = req.email.trim().to_lowercase();

    if req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request(
            "All fields (name, email, password) are required",
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    match req.role.as_deref().map(str::trim) {
        None | Some("") | Some(ROLE_USER) => Ok(ROLE_USER),
        Some(ROLE_COACH) => Ok(ROLE_COACH),
        Some(_) => Err(AppError::bad_request("Invalid user role")),
    }
}

/// Finds the account behind a Google identity, linking by email or
/// creating it on first sign-in.
pub async fn resolve_google_user(db: &PgPool, profile: &GoogleProfile) -> anyhow::Result<User> {
    if let Some(user) = User::find_by_provider(db, PROVIDER_GOOGLE, &profile.sub).await? {
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| is_valid_email(e))
        .ok_or_else(|| anyhow::anyhow!("google profile has no usable email"))?;

    if let Some(existing) = User::find_by_email(db, &email).await? {
        info!(user_id = %existing.id, "linking google identity to existing account");
        return User::link_provider(db, existing.id, PROVIDER_GOOGLE, &profile.sub).await;
    }

    let user = User::create(
        db,
        NewUser {
            name: profile.display_name(),
            email: &email,
            password_hash: None,
            provider: Some(PROVIDER_GOOGLE),
            provider_id: Some(&profile.sub),
            role: ROLE_USER,
            avatar: profile.picture.as_deref(),
        },
    )
    .await?;
    info!(user_id = %user.id, "user created from google sign-in");
    Ok(user)
}
