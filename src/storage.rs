use crate::PreviewError;
use async_trait::async_trait;

/// Where prefetched media goes when prefetch storage is switched on.
///
/// `store` returns the URI clients should load instead of the remote URL.
#[async_trait]
pub trait PreviewStorage: Send + Sync {
    async fn store(&self, data: &[u8], content_type: &str) -> Result<String, PreviewError>;
}

#[cfg(feature = "cache")]
pub use memory::{MemoryStorage, StoredMedia};

#[cfg(feature = "cache")]
mod memory {
    use super::PreviewStorage;
    use crate::PreviewError;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredMedia {
        pub content_type: String,
        pub data: Arc<Vec<u8>>,
    }

    /// In-process storage keyed by content hash, handy for tests and for
    /// hosts that serve prefetched media from memory.
    #[derive(Clone)]
    pub struct MemoryStorage {
        prefix: String,
        media: Arc<DashMap<String, StoredMedia>>,
    }

    impl Default for MemoryStorage {
        fn default() -> Self {
            Self::new("storage/")
        }
    }

    impl MemoryStorage {
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                media: Arc::new(DashMap::new()),
            }
        }

        pub fn get(&self, uri: &str) -> Option<StoredMedia> {
            self.media.get(uri).map(|entry| entry.clone())
        }

        pub fn len(&self) -> usize {
            self.media.len()
        }

        pub fn is_empty(&self) -> bool {
            self.media.is_empty()
        }
    }

    #[async_trait]
    impl PreviewStorage for MemoryStorage {
        async fn store(&self, data: &[u8], content_type: &str) -> Result<String, PreviewError> {
            if data.is_empty() {
                return Err(PreviewError::StorageError("refusing to store empty media".into()));
            }

            let extension = content_type
                .split(';')
                .next()
                .and_then(|essence| essence.trim().strip_prefix("image/"))
                .filter(|ext| !ext.is_empty())
                .unwrap_or("bin");
            let uri = format!("{}{:x}.{}", self.prefix, md5::compute(data), extension);

            self.media.insert(
                uri.clone(),
                StoredMedia {
                    content_type: content_type.to_string(),
                    data: Arc::new(data.to_vec()),
                },
            );
            Ok(uri)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn identical_media_share_a_uri() {
            let storage = MemoryStorage::default();
            let a = storage.store(b"png-bytes", "image/png").await.unwrap();
            let b = storage.store(b"png-bytes", "image/png").await.unwrap();

            assert_eq!(a, b);
            assert!(a.starts_with("storage/"));
            assert!(a.ends_with(".png"));
            assert_eq!(storage.len(), 1);
            assert_eq!(storage.get(&a).unwrap().data.as_slice(), b"png-bytes");
        }

        #[tokio::test]
        async fn unknown_types_get_generic_extension() {
            let storage = MemoryStorage::new("/media/");
            let uri = storage.store(b"x", "application/octet-stream").await.unwrap();
            assert!(uri.starts_with("/media/"));
            assert!(uri.ends_with(".bin"));
        }

        #[tokio::test]
        async fn empty_media_is_an_error() {
            let storage = MemoryStorage::default();
            assert!(matches!(
                storage.store(b"", "image/png").await,
                Err(PreviewError::StorageError(_))
            ));
            assert!(storage.is_empty());
        }
    }
}
