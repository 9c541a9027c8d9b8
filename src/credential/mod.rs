//! Client-certificate credentials for the first-party application.
//!
//! [`CredentialRetriever`] turns the bundle cached by a
//! [`WatchingCertificateReader`](crate::WatchingCertificateReader) into a fresh
//! [`ClientCertificateCredential`] on every call. The credential signs OAuth2 client
//! assertions and builds token requests; sending them is left to the caller's HTTP client.

mod client_certificate;
mod errors;
mod options;
mod retriever;

pub use client_certificate::{ClientCertificateCredential, TokenRequest};
pub use errors::CredentialError;
pub use options::ClientOptions;
pub use retriever::{CredentialRetriever, FirstPartyCredentialRetriever};
