//! Error types for certificate and private key parsing/validation.

use x509_parser::error::X509Error;

/// An error that may arise parsing X.509 certificates.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum CertificateError {
    /// Error returned by the X.509 parsing library.
    #[error("failed parsing X.509 certificate")]
    ParseX509Certificate(#[from] X509Error),

    /// The DER input contained bytes after the end of the certificate.
    #[error("unexpected trailing data after X.509 certificate ({0} bytes)")]
    TrailingData(usize),
}

/// An error that may arise decoding private keys.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum PrivateKeyError {
    /// Error returned by the pkcs#8 private key decoding library.
    #[error("failed decoding PKCS#8 private key")]
    DecodePkcs8(pkcs8::Error),

    /// Error returned by the pkcs#1 private key decoding library.
    #[error("failed decoding PKCS#1 private key")]
    DecodePkcs1(pkcs1::Error),

    /// A SEC1 key is malformed or not on P-256 or P-384.
    #[error("failed decoding SEC1 private key: expected a P-256 or P-384 key")]
    DecodeSec1,

    /// An EC key could not be re-encoded as PKCS#8.
    #[error("failed encoding EC private key as PKCS#8")]
    EncodePkcs8(pkcs8::Error),
}
