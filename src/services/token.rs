//! Signed tokens (HS256 JWT)
//!
//! Access tokens and invitation tokens share the format but not the key: each
//! [`TokenSigner`] derives its key from the configured secret plus a purpose
//! salt, so a token minted for one purpose never verifies for another.

use chrono::Utc;
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Salt for login access tokens
pub const ACCESS_TOKEN_SALT: &str = "auth";
/// Salt for collaborator invitation tokens
pub const INVITE_TOKEN_SALT: &str = "invite";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token expired")]
    Expired,
}

/// Claims that carry an expiry as a unix timestamp
pub trait Claims: Serialize + DeserializeOwned {
    fn expires_at(&self) -> i64;
}

/// Claims of a login access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: i64,
    /// Session id
    pub sid: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims for AccessClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Claims of a collaborator invitation token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteClaims {
    pub course_id: i64,
    pub email: String,
    pub exp: i64,
}

impl Claims for InviteClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Signs and verifies compact `header.payload.signature` tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &str, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update([0u8]);
        hasher.update(secret.as_bytes());
        Self {
            key: hasher.finalize().to_vec(),
        }
    }

    pub fn sign<C: Claims>(&self, claims: &C) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".into(),
            typ: "JWT".into(),
        };
        let header = serde_json::to_vec(&header).map_err(|_| TokenError::Malformed)?;
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;

        let signing_input = format!(
            "{}.{}",
            BASE64URL_NOPAD.encode(&header),
            BASE64URL_NOPAD.encode(&payload)
        );
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();

        Ok(format!("{}.{}", signing_input, BASE64URL_NOPAD.encode(&signature)))
    }

    /// Verify signature and expiry against the current time.
    pub fn verify<C: Claims>(&self, token: &str) -> Result<C, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at<C: Claims>(&self, token: &str, now: i64) -> Result<C, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let signature = BASE64URL_NOPAD
            .decode(signature.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let signing_input = format!("{}.{}", header, payload);
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(TokenError::Malformed);
        }
        let claims: C = decode_segment(payload)?;
        if claims.expires_at() <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::Malformed)?;
        mac.update(data);
        Ok(mac)
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = BASE64URL_NOPAD
        .decode(segment.as_bytes())
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
