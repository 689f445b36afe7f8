//! Inbound WhatsApp message -> assistant reply -> outbound WhatsApp message.

use std::sync::Arc;
use std::time::Duration;

use assistant_module::AssistantGateway;
use futures::future::join_all;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use send_messages_module::MessagingGateway;
use tracing::{debug, error, info, warn};

use crate::webhook::{extract_inbound_texts, InboundText, WhatsAppWebhook};

const SEEN_MESSAGE_CAPACITY: u64 = 50_000;
const SEEN_MESSAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct MessageRelay {
    assistant: Arc<AssistantGateway>,
    messenger: Arc<dyn MessagingGateway>,
    /// Message ids already accepted; WhatsApp redelivers unacknowledged events.
    seen: Cache<String, ()>,
}

impl MessageRelay {
    pub fn new(assistant: Arc<AssistantGateway>, messenger: Arc<dyn MessagingGateway>) -> Self {
        Self {
            assistant,
            messenger,
            seen: Cache::builder()
                .max_capacity(SEEN_MESSAGE_CAPACITY)
                .time_to_live(SEEN_MESSAGE_TTL)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// New answerable messages of a delivery; redelivered ids are dropped.
    pub fn accept(&self, payload: &WhatsAppWebhook) -> Vec<InboundText> {
        extract_inbound_texts(payload)
            .into_iter()
            .filter(|message| {
                let entry = self.seen.entry(message.message_id.clone()).or_insert(());
                if !entry.is_fresh() {
                    info!(
                        "skipping redelivered whatsapp message {} from {}",
                        message.message_id, message.from
                    );
                }
                entry.is_fresh()
            })
            .collect()
    }

    pub async fn handle_payload(&self, payload: WhatsAppWebhook) {
        let messages = self.accept(&payload);
        if messages.is_empty() {
            debug!("webhook delivery had no new messages");
            return;
        }
        join_all(messages.iter().map(|message| self.relay_message(message))).await;
    }

    pub async fn relay_message(&self, message: &InboundText) {
        info!(
            "relaying whatsapp message {} from {}",
            message.message_id, message.from
        );
        let reply = self
            .assistant
            .process_message(&message.from, &message.text)
            .await;

        match self.messenger.send_text(&message.from, &reply).await {
            Ok(delivery) => info!(
                "replied to {} for message {} ({} part(s))",
                message.from,
                message.message_id,
                delivery.message_ids.len()
            ),
            Err(err) => {
                error!(
                    "failed to send reply to {} for message {}: {}",
                    message.from, message.message_id, err
                );
                return;
            }
        }

        if let Err(err) = self.messenger.mark_read(&message.message_id).await {
            warn!(
                "failed to mark whatsapp message {} as read: {}",
                message.message_id, err
            );
        }
    }
}
