//! Identity verification traits for the session gateway.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while verifying a bearer credential.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum VerifyError {
    /// The credential is invalid or malformed.
    #[error("Invalid credential")]
    InvalidCredential,

    /// The credential has expired.
    #[error("Credential expired")]
    CredentialExpired,

    /// A credential is required but none was provided.
    #[error("Credential required")]
    CredentialRequired,

    /// An internal error occurred during verification.
    #[error("Verification error: {0}")]
    Internal(String),
}

/// The principal a credential resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedUser {
    /// Unique identifier for the user, stable across reconnects.
    pub user_id: String,

    /// Optional additional claims carried by the credential.
    pub metadata: Option<serde_json::Value>,
}

/// Result type for verification operations.
pub type VerifyResult<T = VerifiedUser> = Result<T, VerifyError>;

/// Boxed future for async verification operations.
pub type VerifyFuture<'a, T = VerifiedUser> =
    Pin<Box<dyn Future<Output = VerifyResult<T>> + Send + 'a>>;

/// Trait for resolving a bearer credential to a user identity.
///
/// The gateway hands this the raw credential string taken from the
/// upgrade request; any failure means the connection is unauthorized.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Validates a credential and returns the verified principal.
    fn verify(&self, credential: String) -> VerifyFuture<'_>;
}

impl VerifiedUser {
    /// Create a verified user carrying no extra claims.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticVerifier;

    impl IdentityVerifier for StaticVerifier {
        fn verify(&self, credential: String) -> VerifyFuture<'_> {
            Box::pin(async move {
                if credential == "good" {
                    Ok(VerifiedUser::new("user-1"))
                } else {
                    Err(VerifyError::InvalidCredential)
                }
            })
        }
    }

    #[test]
    fn error_display_is_stable() {
        assert_eq!(VerifyError::InvalidCredential.to_string(), "Invalid credential");
        assert_eq!(VerifyError::CredentialExpired.to_string(), "Credential expired");
    }

    #[tokio::test]
    async fn static_verifier_resolves_principal() {
        let verifier = StaticVerifier;
        let user = verifier.verify("good".to_string()).await.unwrap();
        assert_eq!(user.user_id, "user-1");

        let err = verifier.verify("bad".to_string()).await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidCredential));
    }
}
