use axum::http::{header, HeaderMap};

/// Cookie carrying the access token.
pub const TOKEN_COOKIE: &str = "jwt";
/// Cookie carrying the OAuth `state` between redirect and callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Value of the named cookie, if the request carries it.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value for an HttpOnly, SameSite cookie.
pub fn build_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{name}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Lax variant for the OAuth state cookie, which must survive the
/// cross-site redirect back from the provider.
pub fn build_lax_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    build_cookie(name, value, max_age_secs, secure).replace("SameSite=Strict", "SameSite=Lax")
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", 0, secure)
}

/// Credential from the `jwt` cookie, falling back to `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = read_cookie(headers, TOKEN_COOKIE) {
        return Some(token);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
