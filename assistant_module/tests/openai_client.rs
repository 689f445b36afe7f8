use assistant_module::{
    ensure_assistant, AssistantApiError, AssistantProfile, AssistantRuntime, ListOrder, MessageRole,
    OpenAiAssistantsClient, RunStatus, ToolOutput, FORCE_NEW_ASSISTANT,
};
use mockito::Matcher;
use serde_json::json;

fn profile() -> AssistantProfile {
    AssistantProfile::from_toml_str(
        r#"
name = "Asistente Eventek"
model = "gpt-4o"
instructions = "Responde en español."
"#,
    )
    .unwrap()
}

#[tokio::test]
async fn thread_message_and_run_requests_carry_beta_header() {
    let mut server = mockito::Server::new_async().await;
    let thread = server
        .mock("POST", "/threads")
        .match_header("authorization", "Bearer sk-test")
        .match_header("openai-beta", "assistants=v2")
        .with_status(200)
        .with_body(r#"{"id":"thread_abc","object":"thread"}"#)
        .create_async()
        .await;
    let message = server
        .mock("POST", "/threads/thread_abc/messages")
        .match_header("openai-beta", "assistants=v2")
        .match_body(Matcher::Json(json!({"role": "user", "content": "hola"})))
        .with_status(200)
        .with_body(r#"{"id":"msg_1","object":"thread.message"}"#)
        .create_async()
        .await;
    let run = server
        .mock("POST", "/threads/thread_abc/runs")
        .match_body(Matcher::Json(json!({"assistant_id": "asst_1"})))
        .with_status(200)
        .with_body(r#"{"id":"run_1","status":"queued"}"#)
        .create_async()
        .await;

    let client = OpenAiAssistantsClient::new("sk-test", server.url());
    let thread_id = client.create_thread().await.unwrap();
    let message_id = client
        .append_message(&thread_id, MessageRole::User, "hola")
        .await
        .unwrap();
    let run_id = client.create_run(&thread_id, "asst_1").await.unwrap();

    assert_eq!(thread_id, "thread_abc");
    assert_eq!(message_id, "msg_1");
    assert_eq!(run_id, "run_1");
    thread.assert_async().await;
    message.assert_async().await;
    run.assert_async().await;
}

#[tokio::test]
async fn get_run_and_submit_tool_outputs() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/threads/thread_abc/runs/run_1")
        .with_status(200)
        .with_body(
            json!({
                "id": "run_1",
                "status": "failed",
                "last_error": {"code": "rate_limit_exceeded", "message": "slow down"}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let submit = server
        .mock("POST", "/threads/thread_abc/runs/run_1/submit_tool_outputs")
        .match_body(Matcher::Json(json!({
            "tool_outputs": [{"tool_call_id": "call_1", "output": "{\"status\":\"success\"}"}]
        })))
        .with_status(200)
        .with_body(r#"{"id":"run_1","status":"queued"}"#)
        .create_async()
        .await;

    let client = OpenAiAssistantsClient::new("sk-test", format!("{}/", server.url()));
    let run = client.get_run("thread_abc", "run_1").await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.last_error.unwrap().code, "rate_limit_exceeded");

    client
        .submit_tool_outputs(
            "thread_abc",
            "run_1",
            &[ToolOutput {
                tool_call_id: "call_1".to_string(),
                output: r#"{"status":"success"}"#.to_string(),
            }],
        )
        .await
        .unwrap();
    submit.assert_async().await;
}

#[tokio::test]
async fn list_messages_passes_order_and_limit() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/threads/thread_abc/messages")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("order".into(), "desc".into()),
            Matcher::UrlEncoded("limit".into(), "20".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "object": "list",
                "data": [{
                    "id": "msg_2",
                    "role": "assistant",
                    "run_id": "run_1",
                    "content": [{"type": "text", "text": {"value": "El curso es en mayo.", "annotations": []}}]
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = OpenAiAssistantsClient::new("sk-test", server.url());
    let messages = client
        .list_messages("thread_abc", ListOrder::Desc, 20)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].plain_text(), "El curso es en mayo.");
}

#[tokio::test]
async fn missing_thread_maps_to_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/threads/thread_gone/messages")
        .with_status(404)
        .with_body(r#"{"error":{"message":"No thread found with id 'thread_gone'."}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/threads/thread_err/messages")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let client = OpenAiAssistantsClient::new("sk-test", server.url());
    let err = client
        .append_message("thread_gone", MessageRole::User, "hola")
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantApiError::NotFound(_)));

    let err = client
        .append_message("thread_err", MessageRole::User, "hola")
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantApiError::Status { status: 500, .. }));
}

#[tokio::test]
async fn ensure_assistant_reuses_existing_id() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/assistants/asst_existing")
        .with_status(200)
        .with_body(r#"{"id":"asst_existing","object":"assistant"}"#)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/assistants")
        .expect(0)
        .create_async()
        .await;

    let client = OpenAiAssistantsClient::new("sk-test", server.url());
    let id = ensure_assistant(&client, Some("asst_existing"), &profile(), &[])
        .await
        .unwrap();
    assert_eq!(id, "asst_existing");
    create.assert_async().await;
}

#[tokio::test]
async fn ensure_assistant_creates_when_missing_or_forced() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/assistants/asst_deleted")
        .with_status(404)
        .with_body(r#"{"error":{"message":"No assistant found"}}"#)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/assistants")
        .match_body(Matcher::PartialJson(json!({
            "name": "Asistente Eventek",
            "model": "gpt-4o",
            "tools": [{"type": "function", "function": {"name": "get_event_info"}}]
        })))
        .with_status(200)
        .with_body(r#"{"id":"asst_new","object":"assistant"}"#)
        .expect(3)
        .create_async()
        .await;

    let client = OpenAiAssistantsClient::new("sk-test", server.url());
    let tools = vec![json!({"type": "function", "function": {"name": "get_event_info"}})];

    for configured in [Some("asst_deleted"), Some(FORCE_NEW_ASSISTANT), None] {
        let id = ensure_assistant(&client, configured, &profile(), &tools)
            .await
            .unwrap();
        assert_eq!(id, "asst_new");
    }
    create.assert_async().await;
}
