//! JWT credential verification.
//!
//! Validates signature, issuer, audience, and expiry of a bearer token
//! and extracts the principal identifier from the `sub` claim.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use sgw_auth_core::{IdentityVerifier, VerifiedUser, VerifyError, VerifyFuture};
use tracing::debug;

/// Claims the gateway cares about. Everything else the token carries
/// is surfaced through [`VerifiedUser::metadata`] untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Configuration for the JWT verifier.
#[derive(Debug, Clone)]
pub struct JwtVerifierConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
}

impl Default for JwtVerifierConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            issuer: "session-gateway".to_string(),
            audience: "session-gateway-clients".to_string(),
            algorithm: Algorithm::HS256,
        }
    }
}

/// [`IdentityVerifier`] implementation over `jsonwebtoken`.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: JwtVerifierConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(config.algorithm);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        Self {
            decoding_key,
            validation,
        }
    }

    fn decode_claims(&self, token: &str) -> Result<JwtClaims, VerifyError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::CredentialExpired,
                _ => {
                    debug!("JWT validation failed: {}", e);
                    VerifyError::InvalidCredential
                }
            },
        )?;
        Ok(data.claims)
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, credential: String) -> VerifyFuture<'_> {
        Box::pin(async move {
            let claims = self.decode_claims(&credential)?;
            if claims.sub.is_empty() {
                return Err(VerifyError::InvalidCredential);
            }
            Ok(VerifiedUser {
                user_id: claims.sub,
                metadata: claims.metadata,
            })
        })
    }
}
