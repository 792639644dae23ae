//! In-process remote store.
//!
//! Behaves like a remote bucket that lives in memory: used by the test
//! suites and handy for local experiments. It can be switched offline to
//! exercise upstream-failure paths, and counts the calls it receives.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use cas::ContentHash;
use dashmap::DashMap;

use super::{RemoteError, RemoteStore, Visibility};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub visibility: Visibility,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ContentHash, StoredObject>,
    offline: AtomicBool,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object directly, bypassing `put` and its counter.
    pub fn insert(&self, key: ContentHash, data: impl Into<Bytes>, content_type: &str) {
        self.objects.insert(
            key,
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
                visibility: Visibility::PublicRead,
            },
        );
    }

    pub fn object(&self, key: &ContentHash) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &ContentHash) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// While offline every call fails with [`RemoteError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &ContentHash) -> Result<Option<Vec<u8>>, RemoteError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Offline);
        }
        Ok(self.objects.get(key).map(|entry| entry.data.to_vec()))
    }

    async fn put(
        &self,
        key: &ContentHash,
        data: Bytes,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), RemoteError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Offline);
        }
        self.objects.insert(
            key.clone(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                visibility,
            },
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory ({} objects)", self.objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        let key = ContentHash::from_data(b"abc");

        store
            .put(&key, Bytes::from_static(b"abc"), "image/png", Visibility::Private)
            .await
            .unwrap();

        assert_eq!(store.get(&key).await.unwrap(), Some(b"abc".to_vec()));
        let object = store.object(&key).unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.visibility, Visibility::Private);
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let store = MemoryStore::new();
        let key = ContentHash::from_data(b"abc");
        store.insert(key.clone(), b"abc".to_vec(), "image/png");
        store.set_offline(true);

        assert!(matches!(store.get(&key).await, Err(RemoteError::Offline)));
        assert!(matches!(
            store
                .put(&key, Bytes::new(), "image/png", Visibility::PublicRead)
                .await,
            Err(RemoteError::Offline)
        ));

        store.set_offline(false);
        assert!(store.get(&key).await.unwrap().is_some());
    }
}
