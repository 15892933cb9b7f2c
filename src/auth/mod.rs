pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use password::{hash_password, validate_password_strength, verify_password};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password is incorrect")]
    IncorrectPassword,

    #[error("Not authorized to access this route")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Password hashing error: {0}")]
    Hashing(String),
}

/// Account roles, lowest privilege first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Publisher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Publisher => "publisher",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "publisher" => Some(Role::Publisher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, extracted from a bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Grant access to the given roles only
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AuthError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                self.role.as_str()
            )))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self { id: claims.sub, role: claims.role }
    }
}

/// HS256 signing material and token lifetime
#[derive(Clone)]
pub struct JwtKeys {
    secret: String,
    expiry_hours: u64,
}

impl JwtKeys {
    pub fn new(secret: impl Into<String>, expiry_hours: u64) -> Self {
        Self { secret: secret.into(), expiry_hours }
    }

    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::TokenGeneration("JWT secret not configured".to_string()));
        }
        let now = Utc::now();
        let hours = i64::try_from(self.expiry_hours).unwrap_or(i64::MAX / 3600);
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::hours(hours)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::new("secret", 1);
        let token = keys.issue("user-1", Role::Publisher).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Publisher);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = JwtKeys::new("one", 1).issue("u", Role::User).unwrap();
        assert!(matches!(JwtKeys::new("two", 1).verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn require_role_forbids_other_roles() {
        let user = AuthUser { id: "u".into(), role: Role::User };
        assert!(user.require_role(&[Role::User, Role::Admin]).is_ok());
        assert!(matches!(
            user.require_role(&[Role::Publisher, Role::Admin]),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [Role::User, Role::Publisher, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}
