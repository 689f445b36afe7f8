//! WhatsApp Cloud API webhook payloads (inbound).
//!
//! Everything except the message envelope is optional so that new fields or
//! event kinds never make a delivery unparseable.

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppWebhook {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WhatsAppEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WhatsAppChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: WhatsAppValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppValue {
    #[serde(default)]
    pub contacts: Vec<WhatsAppContact>,
    #[serde(default)]
    pub messages: Vec<WhatsAppMessage>,
    #[serde(default)]
    pub statuses: Vec<WhatsAppStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppContact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<WhatsAppProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppProfile {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<WhatsAppText>,
    #[serde(default)]
    pub button: Option<WhatsAppButton>,
    #[serde(default)]
    pub interactive: Option<WhatsAppInteractive>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppText {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppButton {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppInteractive {
    #[serde(default)]
    pub button_reply: Option<WhatsAppReplyOption>,
    #[serde(default)]
    pub list_reply: Option<WhatsAppReplyOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppReplyOption {
    #[serde(default)]
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub recipient_id: String,
}

/// A user message the relay can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub message_id: String,
    /// Sender's WhatsApp id; also the conversation's user id.
    pub from: String,
    pub profile_name: Option<String>,
    pub text: String,
}

impl WhatsAppMessage {
    fn text_content(&self) -> Option<&str> {
        let text = match self.message_type.as_str() {
            "text" => self.text.as_ref().map(|text| text.body.as_str()),
            "button" => self.button.as_ref().map(|button| button.text.as_str()),
            "interactive" => self.interactive.as_ref().and_then(|interactive| {
                interactive
                    .button_reply
                    .as_ref()
                    .or(interactive.list_reply.as_ref())
                    .map(|reply| reply.title.as_str())
            }),
            _ => None,
        }?;
        Some(text).filter(|text| !text.trim().is_empty())
    }
}

/// All answerable messages of a delivery, in payload order. Status updates
/// and media messages are skipped.
pub fn extract_inbound_texts(payload: &WhatsAppWebhook) -> Vec<InboundText> {
    let mut inbound = Vec::new();
    for entry in &payload.entry {
        for change in &entry.changes {
            for status in &change.value.statuses {
                debug!(
                    "whatsapp status {} for message {} to {}",
                    status.status, status.id, status.recipient_id
                );
            }
            for message in &change.value.messages {
                let Some(text) = message.text_content() else {
                    debug!(
                        "ignoring whatsapp message {} of type {} from {}",
                        message.id, message.message_type, message.from
                    );
                    continue;
                };
                let profile_name = change
                    .value
                    .contacts
                    .iter()
                    .find(|contact| contact.wa_id == message.from)
                    .and_then(|contact| contact.profile.as_ref())
                    .map(|profile| profile.name.clone())
                    .filter(|name| !name.is_empty());
                inbound.push(InboundText {
                    message_id: message.id.clone(),
                    from: message.from.clone(),
                    profile_name,
                    text: text.to_string(),
                });
            }
        }
    }
    inbound
}
