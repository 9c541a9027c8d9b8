use crate::clock::{Clock, SystemClock};
use crate::constants::{DEFAULT_ASSERTION_LIFETIME, DEFAULT_AUTHORITY_HOST};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use url::Url;

/// Options shared by every credential minted by a
/// [`CredentialRetriever`](super::CredentialRetriever).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Azure AD authority host. Defaults to `https://login.microsoftonline.com/`.
    pub authority_host: Url,
    /// Whether client assertions carry the full certificate chain in the `x5c` header.
    /// Required for subject-name/issuer authentication. Defaults to `true`.
    pub send_certificate_chain: bool,
    /// Lifetime of a signed client assertion. Defaults to 10 minutes.
    pub assertion_lifetime: Duration,
    /// Clock used to stamp client assertions.
    pub clock: Arc<dyn Clock>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST_URL.clone(),
            send_certificate_chain: true,
            assertion_lifetime: DEFAULT_ASSERTION_LIFETIME,
            clock: Arc::new(SystemClock),
        }
    }
}

// Fixed literal; parsing cannot fail.
static DEFAULT_AUTHORITY_HOST_URL: LazyLock<Url> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Url::parse(DEFAULT_AUTHORITY_HOST).expect("DEFAULT_AUTHORITY_HOST must be a valid URL")
});
