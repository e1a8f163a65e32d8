use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use intervue_config::AuthSettings;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Claims carried by the identity provider's access token. `sub` is the
/// user id every session and record is keyed by.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

/// Verifies HS256 access tokens issued by the frontend's identity provider.
/// Verification is a pure function of the token and the shared secret; no
/// user store is consulted.
pub struct AuthService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(settings: &AuthSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[settings.audience.clone()]);

        Self {
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        aud: &'a str,
        exp: usize,
    }

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "test-secret".to_string(),
            audience: "authenticated".to_string(),
        }
    }

    fn make_token(secret: &str, aud: &str, exp: usize) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: "user-42",
                aud,
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        4102444800 // 2100-01-01
    }

    #[test]
    fn accepts_valid_token() {
        let auth = AuthService::new(&settings());
        let token = make_token("test-secret", "authenticated", far_future());
        let claims = auth.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
    }

    #[test]
    fn rejects_wrong_secret() {
        let auth = AuthService::new(&settings());
        let token = make_token("other-secret", "authenticated", far_future());
        assert!(matches!(
            auth.verify_access_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_wrong_audience() {
        let auth = AuthService::new(&settings());
        let token = make_token("test-secret", "somewhere-else", far_future());
        assert!(matches!(
            auth.verify_access_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let auth = AuthService::new(&settings());
        let token = make_token("test-secret", "authenticated", 1000);
        assert!(matches!(
            auth.verify_access_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn rejects_empty_token() {
        let auth = AuthService::new(&settings());
        assert!(matches!(
            auth.verify_access_token(""),
            Err(AuthError::MissingToken)
        ));
    }
}
