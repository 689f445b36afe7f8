//! Per-user conversation orchestration on top of the run driver.

use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::driver::{PollConfig, RunDriver, RunOutcome};
use crate::registry::{RegistryLimits, ThreadRegistry};
use crate::runtime::{AssistantApiError, AssistantRuntime, ListOrder, MessageRole};
use crate::tools::{ToolContext, ToolExecutor};

const DEFAULT_MESSAGE_SCAN_LIMIT: u32 = 20;

/// User-facing texts for the non-happy paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTexts {
    /// Run completed but produced no assistant text.
    pub fallback_no_text: String,
    pub run_failed: String,
    pub timeout: String,
    pub generic_error: String,
}

impl Default for ReplyTexts {
    fn default() -> Self {
        Self {
            fallback_no_text: "No encontré una respuesta para tu mensaje. ¿Podrías reformularlo?"
                .to_string(),
            run_failed: "Lo siento, no pude procesar tu mensaje en este momento.".to_string(),
            timeout: "Lo siento, la respuesta está tardando demasiado. Por favor, inténtalo de nuevo en unos minutos."
                .to_string(),
            generic_error: "Lo siento, ocurrió un error inesperado. Por favor, inténtalo más tarde."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub assistant_id: String,
    pub poll: PollConfig,
    pub registry: RegistryLimits,
    pub replies: ReplyTexts,
    /// How many recent messages to scan for the run's answer.
    pub message_scan_limit: u32,
}

impl GatewayConfig {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            poll: PollConfig::default(),
            registry: RegistryLimits::default(),
            replies: ReplyTexts::default(),
            message_scan_limit: DEFAULT_MESSAGE_SCAN_LIMIT,
        }
    }
}

pub struct AssistantGateway {
    runtime: Arc<dyn AssistantRuntime>,
    tools: Arc<ToolExecutor>,
    registry: ThreadRegistry,
    /// One lock per user so a user's messages are handled one at a time.
    user_locks: Cache<String, Arc<Mutex<()>>>,
    config: GatewayConfig,
}

impl AssistantGateway {
    pub fn new(
        runtime: Arc<dyn AssistantRuntime>,
        tools: Arc<ToolExecutor>,
        config: GatewayConfig,
    ) -> Self {
        let registry = ThreadRegistry::new(config.registry);
        let user_locks = Cache::builder()
            .max_capacity(config.registry.max_users.max(1))
            .time_to_idle(config.registry.idle_ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            runtime,
            tools,
            registry,
            user_locks,
            config,
        }
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    pub fn assistant_id(&self) -> &str {
        &self.config.assistant_id
    }

    /// Always returns a non-empty reply; failures are logged and turned into
    /// one of the configured apology texts.
    pub async fn process_message(&self, user_id: &str, text: &str) -> String {
        let lock = self
            .user_locks
            .get_with(user_id.to_string(), || Arc::new(Mutex::new(())));
        let _guard = lock.lock().await;

        match self.converse(user_id, text).await {
            Ok(reply) => reply,
            Err(err) => {
                error!("failed to process message for user {}: {}", user_id, err);
                self.config.replies.generic_error.clone()
            }
        }
    }

    async fn converse(&self, user_id: &str, text: &str) -> Result<String, AssistantApiError> {
        let thread_id = self.append_user_message(user_id, text).await?;

        let run_id = self
            .runtime
            .create_run(&thread_id, &self.config.assistant_id)
            .await?;
        info!(
            "started run {} on thread {} for user {}",
            run_id, thread_id, user_id
        );

        let ctx = ToolContext { user_id };
        let outcome = RunDriver::new(self.runtime.as_ref(), self.tools.as_ref(), self.config.poll)
            .run_to_completion(&thread_id, &run_id, &ctx)
            .await;

        if outcome.is_success() {
            return self.latest_reply(&thread_id, &run_id).await;
        }
        warn!(
            "run {} on thread {} for user {} finished as {}",
            run_id,
            thread_id,
            user_id,
            outcome.label()
        );
        Ok(self.apology(&outcome))
    }

    /// Appends to the user's thread, replacing a thread the runtime no longer
    /// knows with one fresh thread. Returns the thread used.
    async fn append_user_message(&self, user_id: &str, text: &str) -> Result<String, AssistantApiError> {
        let thread_id = match self.registry.get_thread_id(user_id) {
            Some(thread_id) => thread_id,
            None => return self.start_thread(user_id, text).await,
        };

        match self
            .runtime
            .append_message(&thread_id, MessageRole::User, text)
            .await
        {
            Ok(_) => {
                self.registry.touch(user_id);
                Ok(thread_id)
            }
            Err(AssistantApiError::NotFound(body)) => {
                warn!(
                    "thread {} for user {} no longer exists ({}); starting a new one",
                    thread_id, user_id, body
                );
                self.registry.remove_thread(user_id);
                self.start_thread(user_id, text).await
            }
            Err(err) => Err(err),
        }
    }

    async fn start_thread(&self, user_id: &str, text: &str) -> Result<String, AssistantApiError> {
        let thread_id = self.runtime.create_thread().await?;
        info!("created thread {} for user {}", thread_id, user_id);
        self.registry.add_thread(user_id, &thread_id);
        self.runtime
            .append_message(&thread_id, MessageRole::User, text)
            .await?;
        Ok(thread_id)
    }

    /// Newest assistant message written after the user's message. Messages
    /// tagged with another run id are skipped.
    async fn latest_reply(&self, thread_id: &str, run_id: &str) -> Result<String, AssistantApiError> {
        let messages = self
            .runtime
            .list_messages(thread_id, ListOrder::Desc, self.config.message_scan_limit)
            .await?;

        for message in messages {
            if message.role == MessageRole::User {
                break;
            }
            if message.run_id.as_deref().is_some_and(|id| id != run_id) {
                continue;
            }
            let reply = message.plain_text();
            let reply = reply.trim();
            if !reply.is_empty() {
                return Ok(reply.to_string());
            }
        }

        warn!(
            "run {} on thread {} completed without assistant text",
            run_id, thread_id
        );
        Ok(self.config.replies.fallback_no_text.clone())
    }

    fn apology(&self, outcome: &RunOutcome) -> String {
        let replies = &self.config.replies;
        let base = match outcome {
            RunOutcome::Timeout => &replies.timeout,
            _ => &replies.run_failed,
        };
        match outcome.error_code() {
            Some(code) => format!("{} (estado: {}, código: {})", base, outcome.label(), code),
            None => format!("{} (estado: {})", base, outcome.label()),
        }
    }
}
