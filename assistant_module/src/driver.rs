//! Drives a single remote run to a terminal outcome.
//!
//! The loop polls the run, resolves `requires_action` by executing the
//! requested tool calls and submitting their outputs in one batch, and gives
//! up once a monotonic deadline has passed. A timed out run is left as is on
//! the remote side.

use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::runtime::{AssistantRun, AssistantRuntime, RunLastError, RunStatus, ToolCall, ToolOutput};
use crate::tools::{error_output, ToolContext, ToolExecutor};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Remote terminal failure (`failed`, `cancelled`, `expired`, `incomplete`).
    Failed {
        status: RunStatus,
        last_error: Option<RunLastError>,
    },
    Timeout,
    ErrorPolling,
    ErrorSubmittingTools,
    ErrorUnhandledAction(String),
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Failed { status, .. } => status.as_str(),
            RunOutcome::Timeout => "timeout",
            RunOutcome::ErrorPolling => "error_polling",
            RunOutcome::ErrorSubmittingTools => "error_submitting_tools",
            RunOutcome::ErrorUnhandledAction(_) => "error_unhandled_action",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    /// Remote error code, if the runtime reported one.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            RunOutcome::Failed {
                last_error: Some(last_error),
                ..
            } if !last_error.code.is_empty() => Some(last_error.code.as_str()),
            _ => None,
        }
    }
}

pub struct RunDriver<'a> {
    runtime: &'a dyn AssistantRuntime,
    tools: &'a ToolExecutor,
    config: PollConfig,
}

impl<'a> RunDriver<'a> {
    pub fn new(runtime: &'a dyn AssistantRuntime, tools: &'a ToolExecutor, config: PollConfig) -> Self {
        Self {
            runtime,
            tools,
            config,
        }
    }

    pub async fn run_to_completion(
        &self,
        thread_id: &str,
        run_id: &str,
        ctx: &ToolContext<'_>,
    ) -> RunOutcome {
        let deadline = Instant::now() + self.config.timeout;

        loop {
            let run = match self.runtime.get_run(thread_id, run_id).await {
                Ok(run) => run,
                Err(err) => {
                    error!(
                        "failed to poll run {} on thread {} for user {}: {}",
                        run_id, thread_id, ctx.user_id, err
                    );
                    return RunOutcome::ErrorPolling;
                }
            };

            match run.status {
                RunStatus::Completed => {
                    info!("run {} on thread {} completed", run_id, thread_id);
                    return RunOutcome::Completed;
                }
                status if status.is_terminal_failure() => {
                    match run.last_error.as_ref() {
                        Some(last_error) => error!(
                            "run {} on thread {} ended with status {}: code={} message={}",
                            run_id, thread_id, status, last_error.code, last_error.message
                        ),
                        None => error!(
                            "run {} on thread {} ended with status {} and no error details",
                            run_id, thread_id, status
                        ),
                    }
                    return RunOutcome::Failed {
                        status,
                        last_error: run.last_error,
                    };
                }
                RunStatus::RequiresAction => {
                    if let Err(outcome) = self.resolve_required_action(thread_id, &run, ctx).await {
                        return outcome;
                    }
                }
                RunStatus::Unknown => {
                    warn!(
                        "run {} on thread {} reported an unrecognized status; polling again",
                        run_id, thread_id
                    );
                }
                status => {
                    debug!("run {} on thread {} is {}", run_id, thread_id, status);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "run {} on thread {} did not finish within {:?}",
                    run_id, thread_id, self.config.timeout
                );
                return RunOutcome::Timeout;
            }
            tokio::time::sleep_until((now + self.config.interval).min(deadline)).await;
        }
    }

    async fn resolve_required_action(
        &self,
        thread_id: &str,
        run: &AssistantRun,
        ctx: &ToolContext<'_>,
    ) -> Result<(), RunOutcome> {
        let action_type = run
            .required_action
            .as_ref()
            .map(|action| action.action_type.as_str())
            .unwrap_or("");
        if action_type != "submit_tool_outputs" {
            error!(
                "run {} on thread {} requires unsupported action '{}'",
                run.id, thread_id, action_type
            );
            return Err(RunOutcome::ErrorUnhandledAction(action_type.to_string()));
        }

        let calls = run.pending_tool_calls();
        if calls.is_empty() {
            error!(
                "run {} on thread {} requested tool outputs without tool calls",
                run.id, thread_id
            );
            return Err(RunOutcome::ErrorUnhandledAction(action_type.to_string()));
        }

        info!(
            "run {} on thread {} requested {} tool call(s)",
            run.id,
            thread_id,
            calls.len()
        );
        let outputs = join_all(
            calls
                .iter()
                .map(|call| self.execute_call(thread_id, &run.id, call, ctx)),
        )
        .await;

        match self
            .runtime
            .submit_tool_outputs(thread_id, &run.id, &outputs)
            .await
        {
            Ok(()) => {
                debug!(
                    "submitted {} tool output(s) for run {} on thread {}",
                    outputs.len(),
                    run.id,
                    thread_id
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "failed to submit tool outputs for run {} on thread {}: {}",
                    run.id, thread_id, err
                );
                Err(RunOutcome::ErrorSubmittingTools)
            }
        }
    }

    async fn execute_call(
        &self,
        thread_id: &str,
        run_id: &str,
        call: &ToolCall,
        ctx: &ToolContext<'_>,
    ) -> ToolOutput {
        let output = match call.function.as_ref().filter(|_| call.call_type == "function") {
            None => {
                warn!(
                    "call {} of run {} on thread {} has unsupported type '{}'",
                    call.id, run_id, thread_id, call.call_type
                );
                error_output(format!("unsupported tool call type: {}", call.call_type))
            }
            Some(function) => match parse_arguments(&function.arguments) {
                Ok(arguments) => {
                    debug!(
                        "executing {} for call {} of run {} on thread {}",
                        function.name, call.id, run_id, thread_id
                    );
                    self.tools.execute(&function.name, &arguments, ctx).await
                }
                Err(err) => {
                    warn!(
                        "call {} of run {} on thread {} has malformed arguments for {}: {}",
                        call.id, run_id, thread_id, function.name, err
                    );
                    error_output(format!("malformed arguments: {}", err))
                }
            },
        };

        ToolOutput {
            tool_call_id: call.id.clone(),
            output: output.to_string(),
        }
    }
}

/// Blank arguments are treated as an empty object.
fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}
