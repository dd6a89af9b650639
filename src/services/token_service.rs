use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::user::{AccessToken, Claims, TokenPair, TokenType, UserRecord};

/// Issues and checks the HS256 bearer tokens handed out at login.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime: i64,
    refresh_lifetime: i64,
}

impl TokenService {
    pub fn new(secret: &str, access_lifetime: i64, refresh_lifetime: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime,
            refresh_lifetime,
        }
    }

    pub fn issue_pair(&self, user: &UserRecord) -> Result<TokenPair> {
        Ok(TokenPair {
            refresh: self.issue(&user.id, TokenType::Refresh)?,
            access: self.issue(&user.id, TokenType::Access)?,
        })
    }

    /// Exchanges a refresh token for a fresh access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let claims = self.decode(refresh_token, TokenType::Refresh)?;
        Ok(AccessToken {
            access: self.issue(&claims.user_id, TokenType::Access)?,
        })
    }

    pub fn decode_access(&self, token: &str) -> Result<Claims> {
        self.decode(token, TokenType::Access)
    }

    fn issue(&self, user_id: &str, token_type: TokenType) -> Result<String> {
        let now = Utc::now().timestamp();
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };

        let claims = Claims {
            token_type,
            user_id: user_id.to_string(),
            jti: Uuid::new_v4().simple().to_string(),
            iat: now as usize,
            exp: (now + lifetime) as usize,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn decode(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;

        if data.claims.token_type != expected {
            tracing::debug!("Rejected {:?} token where {:?} was expected", data.claims.token_type, expected);
            return Err(AppError::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: "7".to_string(),
            email: "test@email.com".to_string(),
            name: "Test".to_string(),
            password_hash: String::new(),
            role: Role::User,
            is_active: true,
            deleted: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issues_distinct_token_types() {
        let tokens = TokenService::new("secret", 60, 120);
        let pair = tokens.issue_pair(&user()).unwrap();

        let claims = tokens.decode_access(&pair.access).unwrap();
        assert_eq!(claims.user_id, "7");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 60);

        assert!(matches!(tokens.decode_access(&pair.refresh), Err(AppError::InvalidToken)));
    }

    #[test]
    fn refresh_yields_access_token() {
        let tokens = TokenService::new("secret", 60, 120);
        let pair = tokens.issue_pair(&user()).unwrap();

        let fresh = tokens.refresh(&pair.refresh).unwrap();
        assert_eq!(tokens.decode_access(&fresh.access).unwrap().user_id, "7");
        assert!(tokens.refresh(&pair.access).is_err());
    }

    #[test]
    fn rejects_foreign_and_expired_tokens() {
        let tokens = TokenService::new("secret", 60, 120);
        let other = TokenService::new("other-secret", 60, 120);
        let pair = other.issue_pair(&user()).unwrap();
        assert!(tokens.decode_access(&pair.access).is_err());

        let expired = TokenService::new("secret", -3600, 120);
        let pair = expired.issue_pair(&user()).unwrap();
        assert!(tokens.decode_access(&pair.access).is_err());
        assert!(tokens.decode_access("not-a-jwt").is_err());
    }
}
