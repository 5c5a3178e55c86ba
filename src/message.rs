//! The slice of the chat subsystem the preview engine talks to.

use crate::Preview;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Name of the client event carrying a finished preview.
pub const PREVIEW_EVENT: &str = "msg:preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat message. Clones share the same preview list.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    text: String,
    pub(crate) previews: Arc<RwLock<Vec<Preview>>>,
}

impl Message {
    pub fn new(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            previews: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Snapshot of the previews attached so far, in completion order.
    pub async fn previews(&self) -> Vec<Preview> {
        self.previews.read().await.clone()
    }

    pub async fn preview_count(&self) -> usize {
        self.previews.read().await.len()
    }
}

/// The network/channel a message arrived on. Tearing it down cancels every
/// preview pipeline started for its messages.
#[derive(Debug, Clone)]
pub struct NetworkContext {
    name: String,
    cancel: CancellationToken,
}

impl NetworkContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// `msg:preview` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewEvent {
    pub id: MessageId,
    pub preview: Preview,
}
