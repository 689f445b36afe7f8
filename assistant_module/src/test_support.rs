//! Scripted in-process runtime for driver and gateway tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::runtime::{
    AssistantApiError, AssistantRun, AssistantRuntime, ListOrder, MessageRole, RunStatus,
    ThreadMessage, ToolOutput,
};
use crate::tools::contacts::InMemoryContactStore;
use crate::tools::knowledge::KnowledgeBase;
use crate::tools::ToolExecutor;

pub(crate) enum PollStep {
    Run(AssistantRun),
    Error,
}

#[derive(Default)]
struct ScriptState {
    polls: VecDeque<PollStep>,
    /// Messages returned by `list_messages`, oldest first.
    messages: Vec<ThreadMessage>,
    reply_on_run: Option<String>,
    missing_threads: HashSet<String>,
    fail_submit: bool,
    fail_create_thread: bool,

    created_threads: Vec<String>,
    appended: Vec<(String, String)>,
    runs_created: Vec<(String, String)>,
    poll_count: usize,
    submitted: Vec<Vec<ToolOutput>>,
}

/// Answers `get_run` from a queue of steps; once the queue is empty every
/// poll reports `in_progress`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedRuntime {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_run(&self, run: AssistantRun) {
        self.state.lock().unwrap().polls.push_back(PollStep::Run(run));
    }

    pub(crate) fn push_status(&self, status: RunStatus) {
        self.push_run(AssistantRun::new("run_1", status));
    }

    pub(crate) fn push_poll_error(&self) {
        self.state.lock().unwrap().polls.push_back(PollStep::Error);
    }

    /// Every created run answers with this assistant text once listed.
    pub(crate) fn reply_with(&self, text: &str) {
        self.state.lock().unwrap().reply_on_run = Some(text.to_string());
    }

    pub(crate) fn mark_thread_missing(&self, thread_id: &str) {
        self.state
            .lock()
            .unwrap()
            .missing_threads
            .insert(thread_id.to_string());
    }

    pub(crate) fn fail_submit(&self) {
        self.state.lock().unwrap().fail_submit = true;
    }

    pub(crate) fn fail_create_thread(&self) {
        self.state.lock().unwrap().fail_create_thread = true;
    }

    pub(crate) fn created_threads(&self) -> Vec<String> {
        self.state.lock().unwrap().created_threads.clone()
    }

    pub(crate) fn appended(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().appended.clone()
    }

    pub(crate) fn runs_created(&self) -> usize {
        self.state.lock().unwrap().runs_created.len()
    }

    pub(crate) fn poll_count(&self) -> usize {
        self.state.lock().unwrap().poll_count
    }

    pub(crate) fn submitted(&self) -> Vec<Vec<ToolOutput>> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl AssistantRuntime for ScriptedRuntime {
    async fn create_thread(&self) -> Result<String, AssistantApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_thread {
            return Err(AssistantApiError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        let id = format!("thread_{}", state.created_threads.len() + 1);
        state.created_threads.push(id.clone());
        Ok(id)
    }

    async fn append_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String, AssistantApiError> {
        let mut state = self.state.lock().unwrap();
        if state.missing_threads.contains(thread_id) {
            return Err(AssistantApiError::NotFound(format!(
                "No thread found with id '{}'.",
                thread_id
            )));
        }
        state
            .appended
            .push((thread_id.to_string(), content.to_string()));
        let id = format!("msg_{}", state.messages.len() + 1);
        state
            .messages
            .push(ThreadMessage::text(id.clone(), role, content));
        Ok(id)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<String, AssistantApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .runs_created
            .push((thread_id.to_string(), assistant_id.to_string()));
        let run_id = format!("run_{}", state.runs_created.len());
        if let Some(reply) = state.reply_on_run.clone() {
            let mut message =
                ThreadMessage::text(format!("msg_{}", state.messages.len() + 1), MessageRole::Assistant, reply);
            message.run_id = Some(run_id.clone());
            state.messages.push(message);
        }
        Ok(run_id)
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<AssistantRun, AssistantApiError> {
        let mut state = self.state.lock().unwrap();
        state.poll_count += 1;
        match state.polls.pop_front() {
            Some(PollStep::Run(mut run)) => {
                run.id = run_id.to_string();
                Ok(run)
            }
            Some(PollStep::Error) => Err(AssistantApiError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            None => Ok(AssistantRun::new(run_id, RunStatus::InProgress)),
        }
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<(), AssistantApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            return Err(AssistantApiError::Status {
                status: 400,
                body: "run is not awaiting tool outputs".to_string(),
            });
        }
        state.submitted.push(outputs.to_vec());
        Ok(())
    }

    async fn list_messages(
        &self,
        _thread_id: &str,
        order: ListOrder,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantApiError> {
        let state = self.state.lock().unwrap();
        let mut messages = state.messages.clone();
        if order == ListOrder::Desc {
            messages.reverse();
        }
        messages.truncate(limit as usize);
        Ok(messages)
    }
}

pub(crate) fn executor_with_store(store: Arc<InMemoryContactStore>) -> ToolExecutor {
    let knowledge = KnowledgeBase::from_value(serde_json::json!({
        "evento": {"fecha": "mayo de 2025", "sede": "Madrid"}
    }))
    .unwrap();
    ToolExecutor::new(
        &["add_contact".to_string(), "get_event_info".to_string()],
        store,
        Some(knowledge),
    )
    .unwrap()
}
