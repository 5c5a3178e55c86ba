use crate::links::{extract_links, LinkCandidate};
use crate::message::{Message, NetworkContext, PreviewEvent};
use crate::storage::PreviewStorage;
#[cfg(feature = "logging")]
use crate::{log_error_card, log_preview_card};
use crate::{
    Fetcher, FetcherConfig, LinkPolicy, LinkPolicyConfig, LinkPreviewGenerator, Preview,
    PreviewAssembler, PreviewError, PreviewGenerator,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Default cap on simultaneous outbound fetches per service.
pub const MAX_CONCURRENT_REQUESTS: usize = 16;

/// PreviewService drives link previews for incoming messages.
///
/// Every link in a message gets its own task; tasks share nothing but the
/// fetch semaphore and the message's preview list.
#[derive(Clone)]
pub struct PreviewService {
    pub generator: Arc<LinkPreviewGenerator>,
    assembler: PreviewAssembler,
    enabled: bool,
    // Max Concurrent Requests
    semaphore: Arc<Semaphore>,
}

impl PreviewService {
    /// Creates a service with default limits, publishing to `events`.
    pub fn new(events: UnboundedSender<PreviewEvent>) -> Result<Self, PreviewError> {
        Self::new_with_config(PreviewServiceConfig::new(), events)
    }

    /// Creates a service together with the receiving end of its event channel.
    pub fn with_channel(
        config: PreviewServiceConfig,
    ) -> Result<(Self, UnboundedReceiver<PreviewEvent>), PreviewError> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self::new_with_config(config, tx)?, rx))
    }

    pub fn new_with_config(
        config: PreviewServiceConfig,
        events: UnboundedSender<PreviewEvent>,
    ) -> Result<Self, PreviewError> {
        debug!("Initializing PreviewService with custom configuration");

        let policy = LinkPolicy::new(config.policy);
        let fetcher = Fetcher::new_with_policy(config.fetcher, policy.clone())?;
        let mut generator = LinkPreviewGenerator::new(fetcher, policy);

        match (config.prefetch_storage, config.storage) {
            (true, Some(storage)) => generator = generator.with_storage(storage),
            (true, None) => warn!("Prefetch storage enabled but no storage attached"),
            (false, _) => {}
        }

        let permits = config.max_concurrent_requests.max(1);

        Ok(Self {
            generator: Arc::new(generator),
            assembler: PreviewAssembler::new(events),
            enabled: config.enabled,
            semaphore: Arc::new(Semaphore::new(permits)),
        })
    }

    /// Generates one preview without touching any message.
    #[instrument(level = "debug", skip(self))]
    pub async fn generate_preview(&self, url: &str) -> Result<Preview, PreviewError> {
        let _permit = self.semaphore.acquire().await.map_err(|_| {
            PreviewError::FetchNetworkError("concurrency limiter closed".to_string())
        })?;

        self.generator.generate_preview(url).await
    }

    /// Starts one pipeline per link found in `message`.
    ///
    /// Returns immediately; previews land on the message and the event
    /// channel as pipelines finish, in completion order. Failures stay
    /// inside their pipeline. Must be called from within a Tokio runtime.
    #[instrument(level = "debug", skip_all, fields(message = %message.id(), network = %network.name()))]
    pub fn process(&self, message: &Message, network: &NetworkContext) -> PreviewTasks {
        if !self.enabled {
            debug!("Link previews disabled");
            return PreviewTasks::default();
        }

        let links = extract_links(message.text());
        if links.is_empty() {
            return PreviewTasks::default();
        }
        debug!(count = links.len(), "Starting preview pipelines");

        let cancel = network.cancellation().child_token();
        let handles = links
            .into_iter()
            .map(|candidate| {
                let service = self.clone();
                let message = message.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { service.run_pipeline(candidate, message, cancel).await })
            })
            .collect();

        PreviewTasks { handles, cancel }
    }

    async fn run_pipeline(
        &self,
        candidate: LinkCandidate,
        message: Message,
        cancel: CancellationToken,
    ) -> bool {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(link = %candidate.as_str(), "Pipeline cancelled");
                return false;
            }
            outcome = self.generate_preview(candidate.as_str()) => outcome,
        };

        match outcome {
            Ok(preview) => {
                #[cfg(feature = "logging")]
                log_preview_card(&preview, candidate.as_str());
                self.assembler.deliver(&message, preview, &cancel).await
            }
            Err(e) if e.is_primary_fetch_failure() => {
                #[cfg(feature = "logging")]
                log_error_card(candidate.as_str(), &e);
                e.log();
                false
            }
            Err(e) => {
                debug!(
                    link = %candidate.as_str(),
                    error = %e,
                    "Pipeline ended without a preview"
                );
                false
            }
        }
    }
}

/// Handle on the pipelines started for one message.
///
/// Dropping it detaches the pipelines; they keep running.
#[derive(Debug, Default)]
pub struct PreviewTasks {
    handles: Vec<JoinHandle<bool>>,
    cancel: CancellationToken,
}

impl PreviewTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops every pipeline of this message; none of them emits afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for all pipelines and returns how many delivered a preview.
    pub async fn settled(self) -> usize {
        futures::future::join_all(self.handles)
            .await
            .into_iter()
            .filter(|joined| matches!(joined, Ok(true)))
            .count()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PreviewServiceConfig {
    /// Master switch for link previews.
    pub enabled: bool,
    /// Route prefetched images through `storage`.
    pub prefetch_storage: bool,
    pub max_concurrent_requests: usize,
    pub fetcher: FetcherConfig,
    pub policy: LinkPolicyConfig,
    #[serde(skip)]
    pub storage: Option<Arc<dyn PreviewStorage>>,
}

impl Default for PreviewServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewServiceConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            prefetch_storage: false,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
            fetcher: FetcherConfig::default(),
            policy: LinkPolicyConfig::default(),
            storage: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_fetcher_config(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_policy(mut self, policy: LinkPolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        self.max_concurrent_requests = max_concurrent_requests;
        self
    }

    /// Enables prefetch storage backed by `storage`.
    pub fn with_prefetch_storage(mut self, storage: Arc<dyn PreviewStorage>) -> Self {
        self.prefetch_storage = true;
        self.storage = Some(storage);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageId;
    use std::time::Duration;

    #[test]
    fn config_deserializes_from_host_settings() {
        let config: PreviewServiceConfig = serde_json::from_str(
            r#"{
                "prefetch_storage": true,
                "max_concurrent_requests": 4,
                "fetcher": { "timeout_ms": 2000, "max_response_size": 1024 },
                "policy": { "block_private_addresses": true }
            }"#,
        )
        .unwrap();

        assert!(config.enabled);
        assert!(config.prefetch_storage);
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.fetcher.timeout, Duration::from_secs(2));
        assert_eq!(config.fetcher.max_redirects, 5);
        assert_eq!(config.fetcher.max_response_size, 1024);
        assert!(config.policy.block_private_addresses);
        assert!(config.storage.is_none());
    }

    #[tokio::test]
    async fn disabled_service_starts_nothing() {
        let (service, mut rx) =
            PreviewService::with_channel(PreviewServiceConfig::new().with_enabled(false)).unwrap();
        let message = Message::new(MessageId(1), "http://example.com/");

        let tasks = service.process(&message, &NetworkContext::new("test"));
        assert!(tasks.is_empty());
        assert_eq!(tasks.settled().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn text_without_links_starts_nothing() {
        let (service, _rx) = PreviewService::with_channel(PreviewServiceConfig::new()).unwrap();
        let message = Message::new(MessageId(2), "no links, just words");

        let tasks = service.process(&message, &NetworkContext::new("test"));
        assert_eq!(tasks.len(), 0);
    }

    #[tokio::test]
    async fn disallowed_schemes_produce_nothing() {
        let (service, mut rx) = PreviewService::with_channel(PreviewServiceConfig::new()).unwrap();
        let message = Message::new(MessageId(3), "grab ftp://files.example.com/a.iso");

        let tasks = service.process(&message, &NetworkContext::new("test"));
        assert_eq!(tasks.settled().await, 0);
        assert_eq!(message.preview_count().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let (service, _rx) = PreviewService::with_channel(
            PreviewServiceConfig::new().with_max_concurrent_requests(0),
        )
        .unwrap();
        assert_eq!(service.semaphore.available_permits(), 1);
    }
}
