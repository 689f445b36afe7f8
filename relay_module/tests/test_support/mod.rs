#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assistant_module::tools::contacts::{ContactStore, InMemoryContactStore};
use assistant_module::{
    AssistantApiError, AssistantGateway, AssistantRun, AssistantRuntime, GatewayConfig, ListOrder,
    MessageRole, PollConfig, RunStatus, ThreadMessage, ToolExecutor, ToolOutput,
};
use async_trait::async_trait;
use relay_module::{AppState, MessageRelay};
use send_messages_module::{DeliveryResult, MessagingGateway, SendError};

/// Runtime whose runs complete immediately with a fixed reply.
pub struct CannedRuntime {
    reply: String,
    threads: AtomicUsize,
}

impl CannedRuntime {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            threads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssistantRuntime for CannedRuntime {
    async fn create_thread(&self) -> Result<String, AssistantApiError> {
        let n = self.threads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("thread_{}", n))
    }

    async fn append_message(
        &self,
        _thread_id: &str,
        _role: MessageRole,
        _content: &str,
    ) -> Result<String, AssistantApiError> {
        Ok("msg_user".to_string())
    }

    async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<String, AssistantApiError> {
        Ok("run_1".to_string())
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<AssistantRun, AssistantApiError> {
        Ok(AssistantRun::new(run_id, RunStatus::Completed))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        _outputs: &[ToolOutput],
    ) -> Result<(), AssistantApiError> {
        Ok(())
    }

    async fn list_messages(
        &self,
        _thread_id: &str,
        _order: ListOrder,
        _limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantApiError> {
        Ok(vec![ThreadMessage::text(
            "msg_reply",
            MessageRole::Assistant,
            self.reply.clone(),
        )])
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub read: Mutex<Vec<String>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn read(&self) -> Vec<String> {
        self.read.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingGateway for RecordingMessenger {
    async fn send_text(&self, recipient_id: &str, body: &str) -> Result<DeliveryResult, SendError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), body.to_string()));
        Ok(DeliveryResult {
            message_ids: vec!["wamid.OUT".to_string()],
        })
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), SendError> {
        self.read.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

pub fn fast_gateway_config(assistant_id: &str) -> GatewayConfig {
    let mut config = GatewayConfig::new(assistant_id);
    config.poll = PollConfig {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    };
    config
}

pub fn gateway(runtime: Arc<dyn AssistantRuntime>, contacts: Arc<dyn ContactStore>) -> Arc<AssistantGateway> {
    let tools = ToolExecutor::new(&["add_contact".to_string()], contacts, None).unwrap();
    Arc::new(AssistantGateway::new(
        runtime,
        Arc::new(tools),
        fast_gateway_config("asst_test"),
    ))
}

pub struct TestApp {
    pub state: AppState,
    pub messenger: Arc<RecordingMessenger>,
    pub contacts: Arc<InMemoryContactStore>,
}

pub fn test_app(app_secret: Option<&str>, debug_endpoints: bool) -> TestApp {
    let contacts = Arc::new(InMemoryContactStore::new());
    let messenger = Arc::new(RecordingMessenger::default());
    let assistant = gateway(Arc::new(CannedRuntime::new("El curso es en mayo.")), contacts.clone());
    let relay = Arc::new(MessageRelay::new(assistant.clone(), messenger.clone()));
    TestApp {
        state: AppState {
            relay,
            assistant,
            contacts: contacts.clone(),
            verify_token: "verify-me".to_string(),
            app_secret: app_secret.map(str::to_string),
            debug_endpoints,
        },
        messenger,
        contacts,
    }
}

pub fn text_payload(message_id: &str, from: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA_ID",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15551234567", "phone_number_id": "1234567890"},
                    "contacts": [{"profile": {"name": "Ana"}, "wa_id": from}],
                    "messages": [{
                        "from": from,
                        "id": message_id,
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": body}
                    }]
                }
            }]
        }]
    })
}
