//! Access-token (JWT) verification → [`Identity`].
//!
//! The demo stack authenticates with HS256 bearer tokens so the host, the
//! tests, and local tooling can mint tokens from one shared secret. The
//! claim validation shape (iss/aud/exp with leeway) is what matters to the
//! authorization core; swapping the algorithm touches only this file.
use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::session::Identity;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("jwt verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("empty 'sub' claim")]
    EmptySub,
}

/// Raw access-token claims.
///
/// Registered claims are typed; everything else (including whatever the
/// deployment configured as the name claim) lands in `extra`.
#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    #[allow(dead_code)]
    exp: u64,

    #[serde(default)]
    roles: Option<Vec<String>>,

    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

/// HS256 access-token verifier.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(hmac_secret: &str, issuer: &str, audience: &str, leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.leeway = leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(hmac_secret.as_bytes()),
            validation,
        }
    }

    /// Verify the token and build the authenticated identity from it.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let data =
            jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            return Err(TokenError::EmptySub);
        }

        let mut claim_map = HashMap::new();
        claim_map.insert("sub".to_string(), claims.sub);
        for (name, value) in claims.extra {
            // Only string claims are meaningful as identity attributes.
            if let serde_json::Value::String(s) = value {
                claim_map.insert(name, s);
            }
        }

        Ok(Identity {
            authenticated: true,
            claims: claim_map,
            roles: claims.roles.unwrap_or_default(),
        })
    }
}
