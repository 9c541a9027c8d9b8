//! Constants shared by the certificate lifecycle and its configuration.

use std::time::Duration;

/// Name of the environment variable holding the path of the first-party application
/// certificate bundle (PEM certificate chain plus private key).
pub const FPA_CERT_BUNDLE_PATH_ENV: &str = "FPA_CERT_BUNDLE_PATH";

/// Name of the environment variable holding the client ID of the first-party application.
pub const FPA_CLIENT_ID_ENV: &str = "FPA_CLIENT_ID";

/// Name of the optional environment variable overriding the poll interval, in whole seconds.
pub const FPA_CERT_POLL_INTERVAL_ENV: &str = "FPA_CERT_POLL_INTERVAL_SECS";

/// Default interval between two content checks of the certificate bundle.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com/";

/// Default lifetime of a signed client assertion.
pub const DEFAULT_ASSERTION_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// Maximum number of certificates accepted in a bundle's chain.
pub const MAX_CERT_CHAIN_LENGTH: usize = 16;
