use super::client_certificate::ClientCertificateCredential;
use super::errors::CredentialError;
use super::options::ClientOptions;
use crate::watching_reader::WatchingCertificateReader;
use time::OffsetDateTime;

/// Source of first-party application credentials.
///
/// Consumers depend on this trait so tests can substitute a double for
/// [`CredentialRetriever`].
pub trait FirstPartyCredentialRetriever: Send + Sync {
    /// Returns a new credential for `tenant_id`, built from the current certificate.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if the credential cannot be constructed.
    fn retrieve_credential(
        &self,
        tenant_id: &str,
        additionally_allowed_tenants: &[String],
    ) -> Result<ClientCertificateCredential, CredentialError>;
}

/// Mints client-certificate credentials from the bundle currently cached by a
/// [`WatchingCertificateReader`].
///
/// Every call builds a new credential from the bundle cached at that moment, so a
/// credential obtained after a rotation always carries the rotated certificate.
/// Credentials already handed out keep the bundle they were built with.
#[derive(Debug, Clone)]
pub struct CredentialRetriever {
    client_id: String,
    reader: WatchingCertificateReader,
    options: ClientOptions,
}

impl CredentialRetriever {
    /// Creates a retriever for the application `client_id`. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidClientId`] if `client_id` is blank.
    pub fn new(
        client_id: impl Into<String>,
        reader: WatchingCertificateReader,
        options: ClientOptions,
    ) -> Result<Self, CredentialError> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(CredentialError::InvalidClientId);
        }
        Ok(Self {
            client_id,
            reader,
            options,
        })
    }

    /// Returns a new credential for `tenant_id` built from the currently cached bundle.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if the tenant IDs are malformed or the cached key
    /// cannot sign client assertions.
    pub fn retrieve_credential(
        &self,
        tenant_id: &str,
        additionally_allowed_tenants: &[String],
    ) -> Result<ClientCertificateCredential, CredentialError> {
        ClientCertificateCredential::new(
            tenant_id,
            &self.client_id,
            self.reader.bundle(),
            additionally_allowed_tenants,
            self.options.clone(),
        )
    }

    /// Returns the start of the validity period of the currently cached leaf certificate.
    pub fn not_before(&self) -> OffsetDateTime {
        self.reader.not_before()
    }

    /// Returns the application (client) ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the reader backing this retriever.
    pub fn reader(&self) -> &WatchingCertificateReader {
        &self.reader
    }
}

impl FirstPartyCredentialRetriever for CredentialRetriever {
    fn retrieve_credential(
        &self,
        tenant_id: &str,
        additionally_allowed_tenants: &[String],
    ) -> Result<ClientCertificateCredential, CredentialError> {
        CredentialRetriever::retrieve_credential(self, tenant_id, additionally_allowed_tenants)
    }
}
