use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod assembler;
mod classifier;
mod error;
mod extractor;
mod fetcher;
mod links;
#[cfg(feature = "logging")]
mod logging;
mod message;
mod policy;
mod preview_generator;
mod preview_service;
mod storage;
mod thumbnail;
#[cfg(feature = "logging")]
mod utils;

pub use assembler::{PreviewAssembler, UNTITLED_PAGE};
pub use classifier::{classify, media_type, ContentKind};
pub use error::PreviewError;
pub use extractor::{MetadataExtractor, PageMetadata};
pub use fetcher::{FetchResult, Fetcher, FetcherConfig, DEFAULT_USER_AGENT};
pub use links::{extract_links, strip_formatting, LinkCandidate};
#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_preview_card, setup_logging, LogConfig};
pub use message::{Message, MessageId, NetworkContext, PreviewEvent, PREVIEW_EVENT};
pub use policy::{LinkPolicy, LinkPolicyConfig};
pub use preview_generator::LinkPreviewGenerator;
pub use preview_service::{
    PreviewService, PreviewServiceConfig, PreviewTasks, MAX_CONCURRENT_REQUESTS,
};
#[cfg(feature = "cache")]
pub use storage::{MemoryStorage, StoredMedia};
pub use storage::PreviewStorage;
pub use thumbnail::{ThumbnailValidator, ValidatedThumbnail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Link,
    Image,
}

/// Preview record attached to a message, in the shape clients render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    #[serde(rename = "type")]
    pub kind: PreviewKind,
    /// Display title; empty for images.
    pub head: String,
    /// Display description; empty when absent.
    pub body: String,
    /// Absolute URL of a validated thumbnail, or empty.
    pub thumb: String,
    /// Canonical URL of the previewed resource, after redirects.
    pub link: String,
}

/// Runs one link through fetch, classification and extraction.
#[async_trait]
pub trait PreviewGenerator {
    async fn generate_preview(&self, url: &str) -> Result<Preview, PreviewError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_serializes_in_client_shape() {
        let preview = Preview {
            kind: PreviewKind::Link,
            head: "test title".into(),
            body: "simple description".into(),
            thumb: String::new(),
            link: "http://localhost:9002/basic".into(),
        };

        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "link",
                "head": "test title",
                "body": "simple description",
                "thumb": "",
                "link": "http://localhost:9002/basic",
            })
        );

        let back: Preview = serde_json::from_value(json).unwrap();
        assert_eq!(back, preview);
    }
}
