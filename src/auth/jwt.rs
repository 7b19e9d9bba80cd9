use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use log::warn;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // Account email
    pub jti: String,        // Unique token id, prefixes connection session ids
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtGenerator {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl JwtGenerator {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }
}

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30; // Allow 30 seconds clock skew

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, String> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(token_data) => {
                let claims = token_data.claims;
                if claims.sub.is_empty() || claims.jti.is_empty() {
                    return Err("Invalid token claims".to_string());
                }
                Ok(claims)
            }
            Err(e) => {
                warn!("JWT validation error: {:?}", e);
                Err(format!("Invalid token: {}", e))
            }
        }
    }
}

// Header first, then the `token` query parameter (browsers cannot set
// headers on a WebSocket upgrade)
pub fn extract_jwt_from_request(req: &tokio_tungstenite::tungstenite::handshake::server::Request) -> Option<String> {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let query = req.uri().query()?;
    query
        .split('&')
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| *key == "token")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|token| token.into_owned())
}
