use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verifies the HS256 session tokens issued by the household sign-in.
#[derive(Clone)]
pub struct SessionTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionTokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Extracts and validates the bearer token carried in `Authorization`.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, TokenError> {
        let raw = headers
            .get(header::AUTHORIZATION)
            .ok_or(TokenError::Missing)?
            .to_str()
            .map_err(|_| TokenError::Invalid("malformed_header".to_string()))?;
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| TokenError::Invalid("expected_bearer".to_string()))?;
        self.validate(token.trim(), now)
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(format!("{err}")))?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid("missing_subject".to_string()));
        }
        let now_ts = now.timestamp();
        if let Some(nbf) = claims.nbf {
            if now_ts < nbf as i64 {
                return Err(TokenError::Invalid("token_not_yet_valid".to_string()));
            }
        }
        if now_ts >= claims.exp as i64 {
            return Err(TokenError::Invalid("token_expired".to_string()));
        }
        Ok(claims)
    }
}

/// Claims carried by a household session token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionClaims {
    /// Stable user id.
    pub sub: String,
    /// Display name shown to other tenants.
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub nbf: Option<usize>,
}

impl SessionClaims {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.sub)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid token: {0}")]
    Invalid(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::SessionClaims;

    pub fn sign(secret: &[u8], sub: &str, name: &str, exp: usize) -> String {
        let claims = SessionClaims {
            sub: sub.to_string(),
            name: Some(name.to_string()),
            exp,
            nbf: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).expect("sign token")
    }
}
