use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("URL scheme not allowed: {0}")]
    DisallowedScheme(String),

    #[error("Address blocked: {0}")]
    BlockedAddress(String),

    #[error("Domain blocked: {0}")]
    DomainBlocked(String),

    #[error("Request timeout: {0}")]
    FetchTimeout(String),

    #[error("Network error: {0}")]
    FetchNetworkError(String),

    #[error("HTTP error {status} for {url}")]
    FetchHttpError { status: u16, url: String },

    #[error("Resource too large: {size} bytes exceeds limit of {limit} bytes")]
    ResourceTooLarge { size: u64, limit: u64 },

    #[error("Failed to extract metadata: {0}")]
    UnparsableMetadata(String),

    #[error("Invalid thumbnail URL: {0}")]
    InvalidThumbnailUrl(String),

    #[error("Thumbnail unreachable: {0}")]
    ThumbnailUnreachable(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Setup failed: {0}")]
    SetupError(String),
}

impl PreviewError {
    /// Maps a transport error from the HTTP client onto the fetch taxonomy.
    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if let Some(rejected) = Self::redirect_rejection(&err) {
            return rejected;
        }

        if err.is_timeout() {
            PreviewError::FetchTimeout(err.to_string())
        } else if let Some(status) = err.status() {
            PreviewError::FetchHttpError {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            // redirect overflow, DNS, connect and body read failures
            PreviewError::FetchNetworkError(err.to_string())
        }
    }

    /// The error our redirect policy raised to stop following `err`'s chain.
    fn redirect_rejection(err: &reqwest::Error) -> Option<Self> {
        if !err.is_redirect() {
            return None;
        }
        std::error::Error::source(err)?
            .downcast_ref::<PreviewError>()
            .cloned()
    }

    /// True for failures that mean the primary resource could not be
    /// retrieved at all, so the pipeline produces nothing.
    pub fn is_primary_fetch_failure(&self) -> bool {
        matches!(
            self,
            PreviewError::UrlParseError(_)
                | PreviewError::DisallowedScheme(_)
                | PreviewError::BlockedAddress(_)
                | PreviewError::DomainBlocked(_)
                | PreviewError::FetchTimeout(_)
                | PreviewError::FetchNetworkError(_)
                | PreviewError::FetchHttpError { .. }
                | PreviewError::ResourceTooLarge { .. }
        )
    }

    pub fn log(&self) {
        match self {
            PreviewError::UrlParseError(e) => {
                debug!(error = %e, "URL parsing failed");
            }
            PreviewError::DisallowedScheme(scheme) => {
                debug!(scheme = %scheme, "Skipping link with disallowed scheme");
            }
            PreviewError::BlockedAddress(host) | PreviewError::DomainBlocked(host) => {
                warn!(host = %host, "Link target blocked by policy");
            }
            PreviewError::FetchTimeout(e) => {
                warn!(error = %e, "Request timed out");
            }
            PreviewError::FetchNetworkError(e) => {
                warn!(error = %e, "Network error while fetching");
            }
            PreviewError::FetchHttpError { status, url } => {
                debug!(status = %status, url = %url, "Remote returned non-success status");
            }
            PreviewError::ResourceTooLarge { size, limit } => {
                warn!(size = %size, limit = %limit, "Resource exceeds size limit");
            }
            PreviewError::UnparsableMetadata(e) => {
                debug!(error = %e, "Metadata extraction degraded");
            }
            PreviewError::InvalidThumbnailUrl(e) => {
                debug!(thumb = %e, "Discarding non-absolute thumbnail");
            }
            PreviewError::ThumbnailUnreachable(e) => {
                debug!(error = %e, "Discarding unreachable thumbnail");
            }
            PreviewError::StorageError(e) => {
                error!(error = %e, "Prefetch storage failed");
            }
            PreviewError::SetupError(e) => {
                error!(error = %e, "Initialization failed");
            }
        }
    }
}
