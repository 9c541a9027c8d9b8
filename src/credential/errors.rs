use crate::error::ErrorKind;
use thiserror::Error;

/// Errors returned while constructing a credential.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// The client ID is empty or blank.
    #[error("client ID must not be empty")]
    InvalidClientId,

    /// A tenant ID is not made of ASCII alphanumerics, `-` and `.`, or holds nothing but dots.
    #[error("invalid tenant ID: {0:?}")]
    InvalidTenantId(String),

    /// The requested tenant is neither the credential's tenant nor additionally allowed.
    #[error("tenant {requested:?} is not allowed for a credential issued for tenant {tenant:?}")]
    TenantNotAllowed {
        /// The credential's own tenant.
        tenant: String,
        /// The tenant that was requested.
        requested: String,
    },

    /// The private key cannot be used to sign client assertions.
    #[error("unsupported private key: {format} key with {algorithm} algorithm")]
    UnsupportedKey {
        /// Encoding of the key.
        format: &'static str,
        /// Detected algorithm.
        algorithm: &'static str,
    },

    /// A token request was made without any scope.
    #[error("at least one scope is required")]
    NoScopes,

    /// The authority host is not an absolute `https` URL.
    #[error("invalid authority host: {0}")]
    InvalidAuthorityHost(String),

    /// Signing the client assertion failed.
    #[error("failed signing client assertion")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl CredentialError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidClientId | Self::InvalidAuthorityHost(_) => ErrorKind::Config,
            _ => ErrorKind::Credential,
        }
    }
}
