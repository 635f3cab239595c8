//! Identity-token verification.
//!
//! Tokens are compact JWS strings verified against a key set fetched from a
//! well-known JWKS endpoint. Only the `email` claim is consumed downstream,
//! as the record-owner identity; nothing else in the claim set is trusted
//! or interpreted here.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::RwLock;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid id token")]
    InvalidToken,

    #[error("expired id token")]
    ExpiredToken,

    #[error("could not fetch verification keys: {0}")]
    JwksUnavailable(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub email: String,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    kid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    /// Symmetric key material, base64url encoded.
    k: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Verifier backed by a JWKS endpoint. The key set is fetched once and
/// cached for the lifetime of the process.
pub struct JwksVerifier {
    client: reqwest::Client,
    jwks_url: Url,
    cached: RwLock<Option<Jwks>>,
}

impl JwksVerifier {
    pub fn new(jwks_url: Url) -> Self {
        JwksVerifier {
            client: reqwest::Client::new(),
            jwks_url,
            cached: RwLock::new(None),
        }
    }

    async fn key_set(&self) -> Result<Jwks, AuthError> {
        if let Some(jwks) = self.cached.read().await.as_ref() {
            return Ok(jwks.clone());
        }

        let jwks = self
            .client
            .get(self.jwks_url.clone())
            .send()
            .await
            .map_err(|e| AuthError::JwksUnavailable(e.to_string()))?
            .json::<Jwks>()
            .await
            .map_err(|e| AuthError::JwksUnavailable(e.to_string()))?;

        *self.cached.write().await = Some(jwks.clone());
        Ok(jwks)
    }

    fn find_key<'a>(jwks: &'a Jwks, kid: Option<&str>) -> Option<&'a Jwk> {
        jwks.keys.iter().find(|key| Some(key.kid.as_str()) == kid)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (message, signature_b64) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let (header_b64, payload_b64) = message.split_once('.').ok_or(AuthError::InvalidToken)?;

        let header: TokenHeader = decode_segment(header_b64)?;
        let jwks = self.key_set().await?;
        let key = Self::find_key(&jwks, header.kid.as_deref()).ok_or(AuthError::InvalidToken)?;

        let secret = URL_SAFE_NO_PAD
            .decode(&key.k)
            .map_err(|_| AuthError::InvalidToken)?;
        let mut mac =
            HmacSha256::new_from_slice(&secret).map_err(|_| AuthError::InvalidToken)?;
        mac.update(message.as_bytes());

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims = decode_segment(payload_b64)?;
        if Utc::now().timestamp() > claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) fn make_test_token(secret: &[u8], kid: &str, email: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "alg": "HS256", "kid": kid })
            .to_string()
            .as_bytes(),
    );
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "email": email, "exp": exp })
            .to_string()
            .as_bytes(),
    );
    let message = format!("{header}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(message.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{message}.{signature}")
}
