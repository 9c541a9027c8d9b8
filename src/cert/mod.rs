//! `Certificate` and `PrivateKey` types and helpers.
//!
//! These types wrap DER-encoded bytes and validate them at construction time.

use crate::cert::error::{CertificateError, PrivateKeyError};
use crate::cert::parsing::parse_der_encoded_bytes_as_x509_certificate;
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _, ObjectIdentifier, PrivateKeyInfo};
use x509_parser::certificate::X509Certificate;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub(crate) mod parsing;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// A single DER-encoded X.509 certificate.
///
/// Invariant: instances are always validated as parseable DER-encoded X.509.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    /// Returns the certificate bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn parsed(&self) -> Result<X509Certificate<'_>, CertificateError> {
        parse_der_encoded_bytes_as_x509_certificate(&self.0)
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Certificate {
    type Error = CertificateError;

    fn try_from(der_bytes: &[u8]) -> Result<Self, Self::Error> {
        parse_der_encoded_bytes_as_x509_certificate(der_bytes)?;
        Ok(Self(Vec::from(der_bytes)))
    }
}

impl TryFrom<Vec<u8>> for Certificate {
    type Error = CertificateError;

    fn try_from(der_bytes: Vec<u8>) -> Result<Self, Self::Error> {
        parse_der_encoded_bytes_as_x509_certificate(&der_bytes)?;
        Ok(Self(der_bytes))
    }
}

/// Encoding of a private key as it was found in the bundle.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PrivateKeyFormat {
    /// PKCS#8 `PrivateKeyInfo` (PEM label `PRIVATE KEY`).
    Pkcs8,
    /// PKCS#1 `RSAPrivateKey` (PEM label `RSA PRIVATE KEY`).
    Pkcs1,
    /// SEC1 `ECPrivateKey` (PEM label `EC PRIVATE KEY`).
    Sec1,
}

impl PrivateKeyFormat {
    /// Returns a stable string representation of the format.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pkcs8 => "PKCS#8",
            Self::Pkcs1 => "PKCS#1",
            Self::Sec1 => "SEC1",
        }
    }
}

/// Public-key algorithm of a private key, as far as signing is concerned.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum KeyAlgorithm {
    /// RSA of any modulus size.
    Rsa,
    /// ECDSA over NIST P-256.
    EcP256,
    /// ECDSA over NIST P-384.
    EcP384,
    /// Any other algorithm, or a curve that cannot be determined.
    Other,
}

impl KeyAlgorithm {
    /// Returns a stable string representation of the algorithm.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::EcP256 => "EC P-256",
            Self::EcP384 => "EC P-384",
            Self::Other => "unknown",
        }
    }
}

/// A DER-encoded private key.
///
/// Invariant: instances are always decodable for their algorithm. EC keys on P-256 and P-384
/// are held as PKCS#8 whatever encoding they were read from, with the public key embedded.
///
/// This type is zeroized on drop.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    der: Vec<u8>,
    #[zeroize(skip)]
    format: PrivateKeyFormat,
    #[zeroize(skip)]
    algorithm: KeyAlgorithm,
}

impl PrivateKey {
    /// Creates a `PrivateKey` from PKCS#1 `RSAPrivateKey` DER bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PrivateKeyError::DecodePkcs1`] if the bytes are not an RSA private key.
    pub fn from_pkcs1_der(bytes: &[u8]) -> Result<Self, PrivateKeyError> {
        pkcs1::RsaPrivateKey::try_from(bytes).map_err(PrivateKeyError::DecodePkcs1)?;
        Ok(Self {
            der: Vec::from(bytes),
            format: PrivateKeyFormat::Pkcs1,
            algorithm: KeyAlgorithm::Rsa,
        })
    }

    /// Creates a `PrivateKey` from SEC1 `ECPrivateKey` DER bytes.
    ///
    /// The key is re-encoded as PKCS#8.
    ///
    /// # Errors
    ///
    /// Returns [`PrivateKeyError::DecodeSec1`] if the bytes are not a P-256 or P-384 key.
    pub fn from_sec1_der(bytes: &[u8]) -> Result<Self, PrivateKeyError> {
        let (der, algorithm) = if let Ok(key) = p256::SecretKey::from_sec1_der(bytes) {
            let der = key.to_pkcs8_der().map_err(PrivateKeyError::EncodePkcs8)?;
            (der, KeyAlgorithm::EcP256)
        } else if let Ok(key) = p384::SecretKey::from_sec1_der(bytes) {
            let der = key.to_pkcs8_der().map_err(PrivateKeyError::EncodePkcs8)?;
            (der, KeyAlgorithm::EcP384)
        } else {
            return Err(PrivateKeyError::DecodeSec1);
        };

        Ok(Self {
            der: der.as_bytes().to_vec(),
            format: PrivateKeyFormat::Sec1,
            algorithm,
        })
    }

    fn from_pkcs8_der(bytes: &[u8]) -> Result<Self, PrivateKeyError> {
        let info = PrivateKeyInfo::try_from(bytes).map_err(PrivateKeyError::DecodePkcs8)?;

        let algorithm = if info.algorithm.oid == RSA_ENCRYPTION {
            pkcs1::RsaPrivateKey::try_from(info.private_key)
                .map_err(PrivateKeyError::DecodePkcs1)?;
            KeyAlgorithm::Rsa
        } else if info.algorithm.oid == EC_PUBLIC_KEY {
            match info.algorithm.parameters_oid() {
                Ok(curve) if curve == SECP256R1 => KeyAlgorithm::EcP256,
                Ok(curve) if curve == SECP384R1 => KeyAlgorithm::EcP384,
                _ => KeyAlgorithm::Other,
            }
        } else {
            KeyAlgorithm::Other
        };

        let der = match algorithm {
            KeyAlgorithm::EcP256 => p256::SecretKey::from_pkcs8_der(bytes)
                .map_err(PrivateKeyError::DecodePkcs8)?
                .to_pkcs8_der()
                .map_err(PrivateKeyError::EncodePkcs8)?
                .as_bytes()
                .to_vec(),
            KeyAlgorithm::EcP384 => p384::SecretKey::from_pkcs8_der(bytes)
                .map_err(PrivateKeyError::DecodePkcs8)?
                .to_pkcs8_der()
                .map_err(PrivateKeyError::EncodePkcs8)?
                .as_bytes()
                .to_vec(),
            KeyAlgorithm::Rsa | KeyAlgorithm::Other => Vec::from(bytes),
        };

        Ok(Self {
            der,
            format: PrivateKeyFormat::Pkcs8,
            algorithm,
        })
    }

    /// Returns the private key bytes: PKCS#1 for keys read as PKCS#1, PKCS#8 otherwise.
    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    /// Returns the encoding the key was found in.
    pub fn format(&self) -> PrivateKeyFormat {
        self.format
    }

    /// Returns the key's algorithm.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Returns the PKCS#1 `RSAPrivateKey` encoding of an RSA key.
    ///
    /// Returns `None` for non-RSA keys.
    pub fn rsa_pkcs1_der(&self) -> Option<&[u8]> {
        match (self.algorithm, self.format) {
            (KeyAlgorithm::Rsa, PrivateKeyFormat::Pkcs1) => Some(&self.der),
            (KeyAlgorithm::Rsa, _) => PrivateKeyInfo::try_from(self.der.as_slice())
                .ok()
                .map(|info| info.private_key),
            _ => None,
        }
    }

    /// Returns `true` if this key is the private half of the subject public key of
    /// `certificate`.
    ///
    /// Keys of an unsupported algorithm never match.
    pub fn matches(&self, certificate: &Certificate) -> bool {
        let Ok(parsed) = certificate.parsed() else {
            return false;
        };
        let public_key: &[u8] = &parsed.public_key().subject_public_key.data;

        match self.algorithm {
            KeyAlgorithm::Rsa => {
                let private = self
                    .rsa_pkcs1_der()
                    .and_then(|der| pkcs1::RsaPrivateKey::try_from(der).ok());
                let public = pkcs1::RsaPublicKey::try_from(public_key).ok();
                match (private, public) {
                    (Some(private), Some(public)) => {
                        private.modulus == public.modulus
                            && private.public_exponent == public.public_exponent
                    }
                    _ => false,
                }
            }
            KeyAlgorithm::EcP256 => matches!(
                (
                    p256::SecretKey::from_pkcs8_der(&self.der),
                    p256::PublicKey::from_sec1_bytes(public_key),
                ),
                (Ok(secret), Ok(public)) if secret.public_key() == public
            ),
            KeyAlgorithm::EcP384 => matches!(
                (
                    p384::SecretKey::from_pkcs8_der(&self.der),
                    p384::PublicKey::from_sec1_bytes(public_key),
                ),
                (Ok(secret), Ok(public)) if secret.public_key() == public
            ),
            KeyAlgorithm::Other => false,
        }
    }
}

impl AsRef<[u8]> for PrivateKey {
    fn as_ref(&self) -> &[u8] {
        &self.der
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = PrivateKeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_pkcs8_der(bytes)
    }
}

impl TryFrom<Vec<u8>> for PrivateKey {
    type Error = PrivateKeyError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_pkcs8_der(&bytes)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("format", &self.format)
            .field("algorithm", &self.algorithm)
            .field("len", &self.der.len())
            .finish()
    }
}
