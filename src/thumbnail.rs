//! Two-stage check of `og:image` candidates: syntax first, then reachability.

use crate::classifier::{classify, ContentKind};
use crate::fetcher::{FetchResult, Fetcher};
use crate::policy::LinkPolicy;
use crate::PreviewError;
use tracing::{debug, instrument};
use url::Url;

/// A thumbnail that parsed as an absolute URL and was fetched as an image.
#[derive(Debug, Clone)]
pub struct ValidatedThumbnail {
    /// The parsed candidate, before any redirects.
    pub url: Url,
    pub resource: FetchResult,
}

#[derive(Clone)]
pub struct ThumbnailValidator {
    fetcher: Fetcher,
    policy: LinkPolicy,
}

impl ThumbnailValidator {
    pub fn new(fetcher: Fetcher, policy: LinkPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Accepts only absolute http(s) URLs with a host that pass the link
    /// policy. Relative and protocol-relative references are rejected,
    /// never resolved against the page.
    pub fn parse_candidate(&self, candidate: &str) -> Result<Url, PreviewError> {
        let invalid = || PreviewError::InvalidThumbnailUrl(candidate.to_string());

        let url = Url::parse(candidate.trim()).map_err(|_| invalid())?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid());
        }
        self.policy.check(&url).map_err(|_| invalid())?;
        Ok(url)
    }

    #[instrument(level = "debug", skip_all, fields(page = %page, thumb = %candidate), err)]
    pub async fn validate(
        &self,
        candidate: &str,
        page: &Url,
    ) -> Result<ValidatedThumbnail, PreviewError> {
        let url = self.parse_candidate(candidate)?;

        let resource = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| PreviewError::ThumbnailUnreachable(format!("{url}: {e}")))?;
        self.policy
            .check(&resource.url)
            .map_err(|e| PreviewError::ThumbnailUnreachable(format!("{url}: {e}")))?;

        if classify(&resource) != ContentKind::Image {
            return Err(PreviewError::ThumbnailUnreachable(format!(
                "{url}: not an image ({})",
                resource.content_type.as_deref().unwrap_or("no content-type")
            )));
        }

        debug!(size = resource.body.len(), "Thumbnail accepted");
        Ok(ValidatedThumbnail { url, resource })
    }
}
