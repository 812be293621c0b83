//! Channel Registry
//!
//! Maps channel ids to [`Channel`] instances. Channels are created lazily on
//! first reference, exactly once per id even when joiners race.
//!
//! By default a channel stays registered for the lifetime of the process.
//! With eviction enabled, a channel left empty by its last subscriber is
//! removed; joins and evictions both run under the registry lock so a joiner
//! can never end up in a channel that is no longer registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::channel::Channel;
use super::connection::{ConnectionHandle, ConnectionId};
use super::messages::User;

/// Configuration for the channel registry
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Remove channels once their last subscriber leaves
    pub evict_empty_channels: bool,
}

/// Snapshot of registry size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub channels: usize,
    pub subscribers: usize,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channels, {} subscribers", self.channels, self.subscribers)
    }
}

/// Process-wide lookup of channels by id
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    config: RegistryConfig,
}

impl ChannelRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Return the channel for `channel_id`, creating it if absent
    pub async fn get_or_create(&self, channel_id: &str) -> Arc<Channel> {
        if let Some(channel) = self.channels.read().await.get(channel_id) {
            return Arc::clone(channel);
        }

        let mut channels = self.channels.write().await;
        Self::entry(&mut channels, channel_id)
    }

    /// Look up a channel without creating it
    pub async fn get(&self, channel_id: &str) -> Option<Arc<Channel>> {
        self.channels.read().await.get(channel_id).cloned()
    }

    /// Resolve `channel_id` and subscribe `handle` to it.
    ///
    /// The registry lock is held across the join so a concurrent eviction
    /// cannot remove the channel in between.
    pub async fn join(
        &self,
        channel_id: &str,
        handle: ConnectionHandle,
        user: User,
    ) -> Arc<Channel> {
        let mut channels = self.channels.write().await;
        let channel = Self::entry(&mut channels, channel_id);
        channel.join(handle, user).await;
        channel
    }

    /// Unsubscribe a connection from `channel`, evicting the channel if it
    /// is now empty and eviction is enabled. Returns false if the connection
    /// was not subscribed.
    pub async fn leave(&self, channel: &Arc<Channel>, connection_id: ConnectionId) -> bool {
        let removed = channel.leave(connection_id).await;

        if self.config.evict_empty_channels {
            self.evict_if_empty(channel).await;
        }

        removed
    }

    /// Remove `channel` from the registry if it has no subscribers
    async fn evict_if_empty(&self, channel: &Arc<Channel>) {
        let mut channels = self.channels.write().await;

        let registered = channels
            .get(channel.id())
            .is_some_and(|current| Arc::ptr_eq(current, channel));
        if registered && channel.is_empty().await {
            channels.remove(channel.id());
            tracing::debug!(channel_id = %channel.id(), "Evicted empty channel");
        }
    }

    /// Number of registered channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Current registry size
    pub async fn stats(&self) -> RegistryStats {
        let channels: Vec<Arc<Channel>> = self.channels.read().await.values().cloned().collect();

        let mut subscribers = 0;
        for channel in &channels {
            subscribers += channel.subscriber_count().await;
        }

        RegistryStats {
            channels: channels.len(),
            subscribers,
        }
    }

    fn entry(channels: &mut HashMap<String, Arc<Channel>>, channel_id: &str) -> Arc<Channel> {
        let channel = channels.entry(channel_id.to_string()).or_insert_with(|| {
            tracing::debug!(channel_id = %channel_id, "Created channel");
            Arc::new(Channel::new(channel_id))
        });
        Arc::clone(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::messages::RelayMessage;

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let registry = ChannelRegistry::default();

        let first = registry.get_or_create("room-a").await;
        let second = registry.get_or_create("room-a").await;
        let other = registry.get_or_create("room-b").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.channel_count().await, 2);
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let registry = ChannelRegistry::default();
        assert!(registry.get("missing").await.is_none());
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_creates_once() {
        let registry = Arc::new(ChannelRegistry::default());

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create("fresh").await })
            })
            .collect();

        let mut channels = Vec::new();
        for task in tasks {
            channels.push(task.await.unwrap());
        }

        assert_eq!(registry.channel_count().await, 1);
        assert!(channels.iter().all(|c| Arc::ptr_eq(c, &channels[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_share_one_channel() {
        let registry = Arc::new(ChannelRegistry::default());

        let mut tasks = Vec::new();
        for i in 0..64u64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (handle, queue) = ConnectionHandle::new(8);
                let channel = registry.join("fresh", handle, User::new(i)).await;
                (channel, queue)
            }));
        }

        let mut joined = Vec::new();
        for task in tasks {
            joined.push(task.await.unwrap());
        }

        let channel = registry.get("fresh").await.unwrap();
        assert_eq!(registry.channel_count().await, 1);
        assert_eq!(channel.subscriber_count().await, 64);
        for (other, _queue) in &joined {
            assert!(Arc::ptr_eq(&channel, other));
        }
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let registry = ChannelRegistry::default();

        let (h1, mut q1) = ConnectionHandle::new(4);
        let (h2, mut q2) = ConnectionHandle::new(4);
        let room_a = registry.join("room-a", h1, User::new(1)).await;
        let _room_b = registry.join("room-b", h2, User::new(2)).await;

        let msg = RelayMessage::from_user(&User::new(1), "only a");
        room_a.broadcast(&msg, false).await.unwrap();

        assert_eq!(q1.next_frame().await.as_deref(), Some(msg.encode().unwrap().as_str()));
        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(50), q2.next_frame()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_channels_persist_without_eviction() {
        let registry = ChannelRegistry::default();
        let (handle, _queue) = ConnectionHandle::new(4);

        let channel = registry.join("room-a", handle.clone(), User::new(1)).await;
        assert!(registry.leave(&channel, handle.id()).await);
        assert!(!registry.leave(&channel, handle.id()).await);

        assert_eq!(registry.channel_count().await, 1);
        assert!(Arc::ptr_eq(&channel, &registry.get_or_create("room-a").await));
    }

    #[tokio::test]
    async fn test_eviction_removes_empty_channel() {
        let registry = ChannelRegistry::new(RegistryConfig {
            evict_empty_channels: true,
        });
        let (h1, _q1) = ConnectionHandle::new(4);
        let (h2, _q2) = ConnectionHandle::new(4);

        let channel = registry.join("room-a", h1.clone(), User::new(1)).await;
        registry.join("room-a", h2.clone(), User::new(2)).await;

        registry.leave(&channel, h1.id()).await;
        assert_eq!(registry.channel_count().await, 1);

        registry.leave(&channel, h2.id()).await;
        assert_eq!(registry.channel_count().await, 0);

        let recreated = registry.get_or_create("room-a").await;
        assert!(!Arc::ptr_eq(&channel, &recreated));
    }

    #[tokio::test]
    async fn test_stale_leave_does_not_evict_replacement() {
        let registry = ChannelRegistry::new(RegistryConfig {
            evict_empty_channels: true,
        });
        let (h1, _q1) = ConnectionHandle::new(4);
        let (h2, _q2) = ConnectionHandle::new(4);

        let old = registry.join("room-a", h1.clone(), User::new(1)).await;
        registry.leave(&old, h1.id()).await;

        let current = registry.join("room-a", h2, User::new(2)).await;
        registry.leave(&old, h1.id()).await;

        let registered = registry.get("room-a").await.unwrap();
        assert!(Arc::ptr_eq(&registered, &current));
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = ChannelRegistry::default();
        let (h1, _q1) = ConnectionHandle::new(4);
        let (h2, _q2) = ConnectionHandle::new(4);
        let (h3, _q3) = ConnectionHandle::new(4);

        registry.join("room-a", h1, User::new(1)).await;
        registry.join("room-a", h2, User::new(2)).await;
        registry.join("room-b", h3, User::new(3)).await;

        let stats = registry.stats().await;
        assert_eq!(
            stats,
            RegistryStats {
                channels: 2,
                subscribers: 3
            }
        );
        assert_eq!(stats.to_string(), "2 channels, 3 subscribers");
    }
}
