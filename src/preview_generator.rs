use crate::classifier::{classify, media_type, ContentKind};
use crate::fetcher::FetchResult;
use crate::storage::PreviewStorage;
use crate::{
    Fetcher, LinkPolicy, MetadataExtractor, PageMetadata, Preview, PreviewAssembler, PreviewError,
    PreviewGenerator, ThumbnailValidator,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The per-link pipeline: policy check, fetch, classify, then the image
/// path, extraction plus thumbnail validation for HTML, or a bare page
/// preview for anything else.
#[derive(Clone)]
pub struct LinkPreviewGenerator {
    pub fetcher: Fetcher,
    policy: LinkPolicy,
    extractor: MetadataExtractor,
    thumbnails: ThumbnailValidator,
    storage: Option<Arc<dyn PreviewStorage>>,
}

impl LinkPreviewGenerator {
    pub fn new(fetcher: Fetcher, policy: LinkPolicy) -> Self {
        Self {
            thumbnails: ThumbnailValidator::new(fetcher.clone(), policy.clone()),
            fetcher,
            policy,
            extractor: MetadataExtractor::new(),
            storage: None,
        }
    }

    /// Routes prefetched image bytes to `storage` instead of pointing
    /// clients at the remote URL.
    pub fn with_storage(mut self, storage: Arc<dyn PreviewStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Hands `resource` to storage when configured. Any storage failure
    /// falls back to the remote URL.
    async fn prefetched_uri(&self, resource: &FetchResult) -> Option<String> {
        let storage = self.storage.as_ref()?;
        let content_type = media_type(resource).unwrap_or_else(|| "application/octet-stream".into());

        match storage.store(&resource.body, &content_type).await {
            Ok(uri) => {
                debug!(uri = %uri, source = %resource.url, "Stored prefetched media");
                Some(uri)
            }
            Err(e) => {
                e.log();
                None
            }
        }
    }

    async fn document_preview(&self, resource: FetchResult) -> Preview {
        let metadata = self.extractor.extract(&resource.text());

        let thumb = match metadata.image.as_deref() {
            Some(candidate) => match self.thumbnails.validate(candidate, &resource.url).await {
                Ok(validated) => Some(
                    self.prefetched_uri(&validated.resource)
                        .await
                        .unwrap_or_else(|| candidate.trim().to_string()),
                ),
                Err(e) => {
                    e.log();
                    None
                }
            },
            None => None,
        };

        PreviewAssembler::document(&resource.url, metadata, thumb)
    }
}

#[async_trait]
impl PreviewGenerator for LinkPreviewGenerator {
    #[instrument(level = "debug", skip(self), err)]
    async fn generate_preview(&self, url: &str) -> Result<Preview, PreviewError> {
        let url = self.policy.check_str(url)?;
        let resource = self.fetcher.fetch(&url).await?;
        // the fetcher may have been built with a laxer policy than ours
        self.policy.check(&resource.url)?;

        let preview = match classify(&resource) {
            ContentKind::Image => {
                debug!(link = %resource.url, "Resource is an image");
                let thumb = self.prefetched_uri(&resource).await;
                PreviewAssembler::image(&resource.url, thumb)
            }
            ContentKind::Html => self.document_preview(resource).await,
            ContentKind::Other => {
                debug!(
                    link = %resource.url,
                    content_type = ?resource.content_type,
                    "Not extracting from non-HTML resource"
                );
                PreviewAssembler::document(&resource.url, PageMetadata::default(), None)
            }
        };

        Ok(preview)
    }
}
