//! JWT 认证
//!
//! 提供 token 生成与验证，以及从请求中解析当前用户的提取器。

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use config::JwtConfig;
use domain::User;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

#[derive(Clone)]
pub struct JwtService {
    expiration_hours: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            expiration_hours: config.expiration_hours,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: Uuid) -> Result<String, ApiError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.expiration_hours);
        let claims = Claims {
            user_id,
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::unauthorized(format!("Token generation failed: {err}")))
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("Invalid token: {err}")))
    }

    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<Uuid, ApiError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

        Ok(self.verify_token(token)?.user_id)
    }
}

/// 已认证的当前用户：token 有效，且用户存在、未封禁、未注销
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        Uuid::from(self.0.id)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = state.jwt_service.extract_user_from_headers(&parts.headers)?;
        let user = state.identity_service.authenticate(user_id).await?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "unit-test-secret-0123456789abcdef0123".into(),
            expiration_hours: 1,
        })
    }

    #[test]
    fn token_round_trip_keeps_user() {
        let jwt = service();
        let user_id = Uuid::new_v4();
        let token = jwt.generate_token(user_id).unwrap();
        assert_eq!(jwt.verify_token(&token).unwrap().user_id, user_id);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret-0123456789abcdef012345".into(),
            expiration_hours: 1,
        });
        let token = other.generate_token(Uuid::new_v4()).unwrap();
        assert!(service().verify_token(&token).is_err());
    }

    #[test]
    fn header_requires_bearer_scheme() {
        let jwt = service();
        let token = jwt.generate_token(Uuid::new_v4()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            token.parse().unwrap(),
        );
        assert!(jwt.extract_user_from_headers(&headers).is_err());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        assert!(jwt.extract_user_from_headers(&headers).is_ok());
    }
}
