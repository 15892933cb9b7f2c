use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::auth::{AuthError, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Bearer authentication. Handlers that take an `AuthUser` argument are
/// protected; the verified caller is cached in the request extensions.
#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = extract_jwt_from_headers(&parts.headers)?;
        let claims = state.keys.verify(token)?;
        let user = AuthUser::from(claims);
        tracing::debug!("Authenticated {} as {}", user.id, user.role.as_str());

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Extract the JWT from an `Authorization: Bearer <token>` header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Invalid Authorization header format".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(AuthError::MissingToken),
        None => Err(AuthError::InvalidToken(
            "Authorization header must use Bearer token format".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_jwt_from_headers(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn missing_or_malformed_headers_are_rejected() {
        assert!(matches!(extract_jwt_from_headers(&HeaderMap::new()), Err(AuthError::MissingToken)));
        assert!(matches!(extract_jwt_from_headers(&headers("Bearer ")), Err(AuthError::MissingToken)));
        assert!(matches!(
            extract_jwt_from_headers(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
