use super::errors::CredentialError;
use super::options::ClientOptions;
use crate::bundle::CertificateBundle;
use crate::cert::{KeyAlgorithm, PrivateKey};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const GRANT_TYPE: &str = "client_credentials";
const ALL_TENANTS: &str = "*";

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// An OAuth2 client-credentials token request, ready to be POSTed as a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    endpoint: Url,
    form: Vec<(&'static str, String)>,
}

impl TokenRequest {
    /// Returns the token endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the form parameters in a stable order.
    pub fn form(&self) -> &[(&'static str, String)] {
        &self.form
    }

    /// Returns the value of a form parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A client-certificate credential for one tenant, bound to one certificate bundle.
///
/// The credential signs client assertions with the bundle's private key and advertises the
/// leaf certificate through its SHA-256 thumbprint. It performs no network I/O:
/// [`ClientCertificateCredential::token_request`] produces the request an HTTP client sends.
#[derive(Clone)]
pub struct ClientCertificateCredential {
    tenant_id: String,
    client_id: String,
    additionally_allowed_tenants: Vec<String>,
    bundle: Arc<CertificateBundle>,
    options: ClientOptions,
    authority: Url,
    algorithm: Algorithm,
    signing_key: EncodingKey,
}

impl fmt::Debug for ClientCertificateCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificateCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "additionally_allowed_tenants",
                &self.additionally_allowed_tenants,
            )
            .field("bundle", &self.bundle)
            .field("authority", &self.authority.as_str())
            .field("algorithm", &self.algorithm)
            .field("signing_key", &"<EncodingKey>")
            .finish()
    }
}

impl ClientCertificateCredential {
    /// Creates a credential for `tenant_id` signing with the key in `bundle`.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidClientId`] if `client_id` is blank.
    /// - [`CredentialError::InvalidTenantId`] if `tenant_id` or an additionally allowed tenant
    ///   is malformed.
    /// - [`CredentialError::InvalidAuthorityHost`] if the authority host is not `https`.
    /// - [`CredentialError::UnsupportedKey`] if the key cannot sign with RS256, ES256 or ES384.
    pub fn new(
        tenant_id: &str,
        client_id: &str,
        bundle: Arc<CertificateBundle>,
        additionally_allowed_tenants: &[String],
        options: ClientOptions,
    ) -> Result<Self, CredentialError> {
        if client_id.trim().is_empty() {
            return Err(CredentialError::InvalidClientId);
        }
        validate_tenant_id(tenant_id)?;
        for tenant in additionally_allowed_tenants {
            if tenant != ALL_TENANTS {
                validate_tenant_id(tenant)?;
            }
        }

        let authority = authority_url(&options.authority_host, tenant_id)?;
        let (algorithm, signing_key) = signing_key(bundle.private_key())?;

        Ok(Self {
            tenant_id: tenant_id.to_owned(),
            client_id: client_id.to_owned(),
            additionally_allowed_tenants: additionally_allowed_tenants.to_vec(),
            bundle,
            options,
            authority,
            algorithm,
            signing_key,
        })
    }

    /// Returns the tenant this credential was issued for.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Returns the application (client) ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the tenants tokens may additionally be requested for.
    pub fn additionally_allowed_tenants(&self) -> &[String] {
        &self.additionally_allowed_tenants
    }

    /// Returns the bundle the credential signs with.
    pub fn bundle(&self) -> &Arc<CertificateBundle> {
        &self.bundle
    }

    /// Returns the start of the validity period of the leaf certificate.
    pub fn not_before(&self) -> OffsetDateTime {
        self.bundle.not_before()
    }

    /// Returns the base64url SHA-256 thumbprint of the leaf certificate (`x5t#S256`).
    pub fn certificate_thumbprint(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.bundle.sha256_thumbprint())
    }

    /// Returns the JWS algorithm used for client assertions.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the authority of the credential's own tenant: `{authority_host}/{tenant}/`.
    pub fn authority(&self) -> &Url {
        &self.authority
    }

    /// Returns the tenant a token request for `requested` must target.
    ///
    /// `None` and the credential's own tenant resolve to the credential's tenant. Any other
    /// tenant must be additionally allowed, or `*` must be.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidTenantId`] if `requested` is malformed and
    /// [`CredentialError::TenantNotAllowed`] if it is not allowed.
    pub fn resolve_tenant<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, CredentialError> {
        let Some(requested) = requested else {
            return Ok(&self.tenant_id);
        };
        if requested == self.tenant_id {
            return Ok(&self.tenant_id);
        }
        validate_tenant_id(requested)?;

        let allowed = self
            .additionally_allowed_tenants
            .iter()
            .any(|t| t == ALL_TENANTS || t.eq_ignore_ascii_case(requested));
        if allowed {
            Ok(requested)
        } else {
            Err(CredentialError::TenantNotAllowed {
                tenant: self.tenant_id.clone(),
                requested: requested.to_owned(),
            })
        }
    }

    /// Returns the v2.0 token endpoint for the resolved tenant.
    ///
    /// # Errors
    ///
    /// Returns the error of [`ClientCertificateCredential::resolve_tenant`].
    pub fn token_endpoint(&self, tenant: Option<&str>) -> Result<Url, CredentialError> {
        let tenant = self.resolve_tenant(tenant)?;
        let authority = if tenant == self.tenant_id {
            self.authority.clone()
        } else {
            authority_url(&self.options.authority_host, tenant)?
        };
        authority
            .join("oauth2/v2.0/token")
            .map_err(|e| CredentialError::InvalidAuthorityHost(e.to_string()))
    }

    /// Signs a client assertion JWT for `audience`.
    ///
    /// The header carries the leaf thumbprint (`x5t#S256`) and, when enabled in the options,
    /// the certificate chain (`x5c`). The assertion is valid from now for the configured
    /// assertion lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Signing`] if the key rejects the signing operation.
    pub fn client_assertion(&self, audience: &str) -> Result<String, CredentialError> {
        let mut header = Header::new(self.algorithm);
        header.x5t_s256 = Some(self.certificate_thumbprint());
        if self.options.send_certificate_chain {
            header.x5c = Some(
                self.bundle
                    .cert_chain()
                    .iter()
                    .map(|cert| STANDARD.encode(cert.as_bytes()))
                    .collect(),
            );
        }

        let now = self.options.clock.now().unix_timestamp();
        let lifetime = i64::try_from(self.options.assertion_lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = AssertionClaims {
            aud: audience,
            iss: &self.client_id,
            sub: &self.client_id,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(lifetime),
        };

        Ok(jsonwebtoken::encode(&header, &claims, &self.signing_key)?)
    }

    /// Builds the client-credentials token request for `scopes`.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NoScopes`] if `scopes` is empty.
    /// - Errors of [`ClientCertificateCredential::resolve_tenant`] and
    ///   [`ClientCertificateCredential::client_assertion`].
    pub fn token_request(&self, scopes: &[&str], tenant: Option<&str>) -> Result<TokenRequest, CredentialError> {
        if scopes.is_empty() {
            return Err(CredentialError::NoScopes);
        }
        let endpoint = self.token_endpoint(tenant)?;
        let assertion = self.client_assertion(endpoint.as_str())?;

        Ok(TokenRequest {
            endpoint,
            form: vec![
                ("client_id", self.client_id.clone()),
                ("scope", scopes.join(" ")),
                ("grant_type", GRANT_TYPE.to_owned()),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE.to_owned()),
                ("client_assertion", assertion),
            ],
        })
    }
}

fn validate_tenant_id(tenant_id: &str) -> Result<(), CredentialError> {
    // Dot-only IDs are path segments that URL normalization would resolve away.
    let valid = !tenant_id.is_empty()
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !tenant_id.chars().all(|c| c == '.');
    if valid {
        Ok(())
    } else {
        Err(CredentialError::InvalidTenantId(tenant_id.to_owned()))
    }
}

fn authority_url(host: &Url, tenant_id: &str) -> Result<Url, CredentialError> {
    if host.scheme() != "https" || host.host_str().is_none() {
        return Err(CredentialError::InvalidAuthorityHost(host.to_string()));
    }
    let base = host.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/{tenant_id}/"))
        .map_err(|e| CredentialError::InvalidAuthorityHost(e.to_string()))
}

fn signing_key(key: &PrivateKey) -> Result<(Algorithm, EncodingKey), CredentialError> {
    let algorithm = key.algorithm();
    match algorithm {
        KeyAlgorithm::Rsa => match key.rsa_pkcs1_der() {
            Some(der) => Ok((Algorithm::RS256, EncodingKey::from_rsa_der(der))),
            None => Err(unsupported(key, algorithm)),
        },
        // jsonwebtoken expects EC keys as PKCS#8.
        KeyAlgorithm::EcP256 => Ok((Algorithm::ES256, EncodingKey::from_ec_der(key.as_bytes()))),
        KeyAlgorithm::EcP384 => Ok((Algorithm::ES384, EncodingKey::from_ec_der(key.as_bytes()))),
        KeyAlgorithm::Other => Err(unsupported(key, algorithm)),
    }
}

fn unsupported(key: &PrivateKey, algorithm: KeyAlgorithm) -> CredentialError {
    CredentialError::UnsupportedKey {
        format: key.format().as_str(),
        algorithm: algorithm.as_str(),
    }
}
