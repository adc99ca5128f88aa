use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a token opens a session or only buys a new pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Registered claims plus the token kind. Times are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_value(TokenKind::Refresh).unwrap(), "refresh");
        let k: TokenKind = serde_json::from_value("access".into()).unwrap();
        assert_eq!(k, TokenKind::Access);
    }
}
