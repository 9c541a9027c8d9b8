//! Internal parsing and validation helpers.

use crate::cert::error::CertificateError;
use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::nom::Err;

/// Parses the given DER-encoded bytes as exactly one X.509 certificate.
///
/// Returns a [`CertificateError`] if the input is not a parseable DER-encoded X.509 certificate
/// or if bytes remain after it.
pub(crate) fn parse_der_encoded_bytes_as_x509_certificate(
    der_bytes: &[u8],
) -> Result<X509Certificate<'_>, CertificateError> {
    match x509_parser::parse_x509_certificate(der_bytes) {
        Ok((rest, _)) if !rest.is_empty() => Err(CertificateError::TrailingData(rest.len())),
        Ok((_, cert)) => Ok(cert),
        Err(Err::Incomplete(_)) => Err(CertificateError::ParseX509Certificate(
            X509Error::InvalidCertificate,
        )),
        Err(Err::Error(e) | Err::Failure(e)) => Err(CertificateError::ParseX509Certificate(e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn self_signed_der() -> Vec<u8> {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["fpa.example".to_string()]).unwrap();
        params.self_signed(&key_pair).unwrap().der().to_vec()
    }

    #[test]
    fn test_parse_single_certificate() {
        let der = self_signed_der();
        assert!(parse_der_encoded_bytes_as_x509_certificate(&der).is_ok());
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let mut der = self_signed_der();
        der.extend_from_slice(&[0, 0, 0]);

        assert_eq!(
            parse_der_encoded_bytes_as_x509_certificate(&der).unwrap_err(),
            CertificateError::TrailingData(3)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_der_encoded_bytes_as_x509_certificate(b"garbage"),
            Err(CertificateError::ParseX509Certificate(_))
        ));
    }
}
