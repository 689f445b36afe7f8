//! User id -> remote thread id mapping.
//!
//! Backed by a bounded in-memory cache: the registry never outlives the
//! process, and users idle longer than the configured TTL (or pushed out by
//! the capacity bound) simply get a fresh remote thread on their next message.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::{debug, info, warn};

const DEFAULT_MAX_USERS: u64 = 10_000;
const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationThread {
    pub thread_id: String,
    /// Advisory only; eviction is driven by the cache's idle TTL.
    pub last_interaction: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    pub max_users: u64,
    pub idle_ttl: Duration,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_users: DEFAULT_MAX_USERS,
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreadRegistry {
    threads: Cache<String, ConversationThread>,
}

impl ThreadRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        let max_capacity = limits.max_users.max(1);
        let threads = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(limits.idle_ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        info!(
            "ThreadRegistry initialized: max_users={}, idle_ttl={:?}",
            max_capacity, limits.idle_ttl
        );
        Self { threads }
    }

    pub fn get_thread_id(&self, user_id: &str) -> Option<String> {
        match self.threads.get(user_id) {
            Some(thread) => {
                debug!("found thread_id {} for user_id {}", thread.thread_id, user_id);
                Some(thread.thread_id)
            }
            None => {
                debug!("no thread_id found for user_id {}", user_id);
                None
            }
        }
    }

    /// Insert or overwrite; overwriting drops the user's conversation context.
    pub fn add_thread(&self, user_id: &str, thread_id: &str) {
        if let Some(existing) = self.threads.get(user_id) {
            if existing.thread_id != thread_id {
                warn!(
                    "overwriting thread_id {} for user_id {} with new thread_id {}",
                    existing.thread_id, user_id, thread_id
                );
            }
        }
        self.threads.insert(
            user_id.to_string(),
            ConversationThread {
                thread_id: thread_id.to_string(),
                last_interaction: Utc::now(),
            },
        );
        info!("associated thread_id {} with user_id {}", thread_id, user_id);
    }

    pub fn remove_thread(&self, user_id: &str) -> Option<String> {
        match self.threads.remove(user_id) {
            Some(thread) => {
                info!(
                    "removed thread mapping for user_id {} (was thread_id {})",
                    user_id, thread.thread_id
                );
                Some(thread.thread_id)
            }
            None => {
                debug!("no thread mapping to remove for user_id {}", user_id);
                None
            }
        }
    }

    /// Record a message append for `user_id`.
    pub fn touch(&self, user_id: &str) {
        if let Some(mut thread) = self.threads.get(user_id) {
            thread.last_interaction = Utc::now();
            self.threads.insert(user_id.to_string(), thread);
        }
    }

    pub fn last_interaction(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.threads.get(user_id).map(|thread| thread.last_interaction)
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new(RegistryLimits::default())
    }
}
