use crate::extractor::PageMetadata;
use crate::message::{Message, PreviewEvent};
use crate::{Preview, PreviewKind};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Shown as `head` when a page has no usable title.
pub const UNTITLED_PAGE: &str = "Untitled page";

/// Builds finished previews and publishes them.
#[derive(Clone)]
pub struct PreviewAssembler {
    events: UnboundedSender<PreviewEvent>,
}

impl PreviewAssembler {
    pub fn new(events: UnboundedSender<PreviewEvent>) -> Self {
        Self { events }
    }

    /// An image is its own thumbnail unless storage handed back a local URI.
    pub fn image(link: &Url, thumb: Option<String>) -> Preview {
        Preview {
            kind: PreviewKind::Image,
            head: String::new(),
            body: String::new(),
            thumb: thumb.unwrap_or_else(|| link.to_string()),
            link: link.to_string(),
        }
    }

    pub fn document(link: &Url, metadata: PageMetadata, thumb: Option<String>) -> Preview {
        Preview {
            kind: PreviewKind::Link,
            head: metadata
                .title
                .unwrap_or_else(|| UNTITLED_PAGE.to_string()),
            body: metadata.description.unwrap_or_default(),
            thumb: thumb.unwrap_or_default(),
            link: link.to_string(),
        }
    }

    /// Appends `preview` to the message and emits `msg:preview`.
    ///
    /// The cancellation check, the append and the send happen under the
    /// message's write lock, so nothing is published once `cancel` fired
    /// and concurrent completions never lose an entry. Returns whether the
    /// preview was delivered.
    pub async fn deliver(
        &self,
        message: &Message,
        preview: Preview,
        cancel: &CancellationToken,
    ) -> bool {
        let mut previews = message.previews.write().await;
        if cancel.is_cancelled() {
            debug!(message = %message.id(), link = %preview.link, "Dropping preview after teardown");
            return false;
        }

        previews.push(preview.clone());

        let event = PreviewEvent {
            id: message.id(),
            preview,
        };
        if self.events.send(event).is_err() {
            debug!(message = %message.id(), "No listener for preview events");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageId;
    use tokio::sync::mpsc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn image_preview_points_at_itself() {
        let link = url("http://localhost:9002/real-test-image.png");
        let preview = PreviewAssembler::image(&link, None);
        assert_eq!(preview.kind, PreviewKind::Image);
        assert_eq!(preview.thumb, preview.link);
        assert!(preview.head.is_empty());
        assert!(preview.body.is_empty());
    }

    #[test]
    fn document_without_title_is_untitled() {
        let preview = PreviewAssembler::document(
            &url("http://localhost:9002/thumb-no-title"),
            PageMetadata::default(),
            Some("http://localhost:9002/real-test-image.png".into()),
        );
        assert_eq!(preview.kind, PreviewKind::Link);
        assert_eq!(preview.head, UNTITLED_PAGE);
        assert_eq!(preview.body, "");
        assert_eq!(preview.thumb, "http://localhost:9002/real-test-image.png");
    }

    #[test]
    fn document_keeps_extracted_fields() {
        let preview = PreviewAssembler::document(
            &url("http://localhost:9002/basic"),
            PageMetadata {
                title: Some("test title".into()),
                description: Some("simple description".into()),
                image: Some("/ignored.png".into()),
            },
            None,
        );
        assert_eq!(preview.head, "test title");
        assert_eq!(preview.body, "simple description");
        assert_eq!(preview.thumb, "");
        assert_eq!(preview.link, "http://localhost:9002/basic");
    }

    #[tokio::test]
    async fn deliver_appends_and_emits_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = PreviewAssembler::new(tx);
        let message = Message::new(MessageId(1), "http://example.com/");
        let preview = PreviewAssembler::image(&url("http://example.com/a.png"), None);

        assert!(
            assembler
                .deliver(&message, preview.clone(), &CancellationToken::new())
                .await
        );

        assert_eq!(message.previews().await, vec![preview.clone()]);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, MessageId(1));
        assert_eq!(event.preview, preview);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn nothing_is_delivered_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = PreviewAssembler::new(tx);
        let message = Message::new(MessageId(2), "");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let preview = PreviewAssembler::image(&url("http://example.com/a.png"), None);
        assert!(!assembler.deliver(&message, preview, &cancel).await);
        assert_eq!(message.preview_count().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_listener_still_appends() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let assembler = PreviewAssembler::new(tx);
        let message = Message::new(MessageId(3), "");

        let preview = PreviewAssembler::image(&url("http://example.com/a.png"), None);
        assert!(
            assembler
                .deliver(&message, preview, &CancellationToken::new())
                .await
        );
        assert_eq!(message.preview_count().await, 1);
    }
}
