use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use assistant_module::tools::contacts::{ContactStore, InMemoryContactStore};
use assistant_module::tools::knowledge::KnowledgeBase;
use assistant_module::{
    ensure_assistant, AssistantGateway, AssistantProfile, GatewayConfig, OpenAiAssistantsClient,
    PollConfig, RegistryLimits, ToolExecutor,
};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use send_messages_module::WhatsAppClient;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::contact_store::MongoContactStore;
use crate::crm::{record_from_form, render_dashboard, API_LIMIT, DASHBOARD_LIMIT};
use crate::relay::MessageRelay;
use crate::verify::{verify_signature, verify_subscription};
use crate::webhook::WhatsAppWebhook;
use crate::BoxError;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<MessageRelay>,
    pub assistant: Arc<AssistantGateway>,
    pub contacts: Arc<dyn ContactStore>,
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub debug_endpoints: bool,
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let debug_endpoints = state.debug_endpoints;
    let mut app = Router::new()
        .route("/", get(dashboard))
        .route("/add_contact", post(add_contact))
        .route("/api/crm/contacts", get(list_contacts))
        .route("/health", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook));
    if debug_endpoints {
        app = app.route("/debug/simulate", post(simulate));
    }
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    app.with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
}

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let profile = AssistantProfile::load(&config.assistant_profile_path)?;
    info!(
        "loaded assistant profile {} from {}",
        profile.name,
        config.assistant_profile_path.display()
    );

    let contacts: Arc<dyn ContactStore> = match config.mongodb_uri.as_deref() {
        Some(uri) => Arc::new(MongoContactStore::connect(uri, config.mongodb_database.as_deref()).await?),
        None => {
            warn!("MONGODB_CONNECTION_STRING not set; contacts are kept in memory only");
            Arc::new(InMemoryContactStore::new())
        }
    };

    let knowledge = match config.knowledge_path.as_deref() {
        Some(path) => {
            let knowledge = KnowledgeBase::load(path)?;
            info!(
                "loaded knowledge categories from {}: {}",
                path.display(),
                knowledge.categories().join(", ")
            );
            Some(knowledge)
        }
        None => None,
    };
    let tools = Arc::new(ToolExecutor::new(&profile.tools, contacts.clone(), knowledge)?);

    let openai = OpenAiAssistantsClient::new(config.openai_api_key.clone(), config.openai_api_url.clone());
    let assistant_id = ensure_assistant(
        &openai,
        config.assistant_id.as_deref(),
        &profile,
        &tools.function_tools(),
    )
    .await?;

    let gateway_config = GatewayConfig {
        assistant_id,
        poll: PollConfig {
            interval: config.poll_interval,
            timeout: config.run_timeout,
        },
        registry: RegistryLimits {
            max_users: config.registry_capacity,
            idle_ttl: config.thread_idle_ttl,
        },
        replies: profile.replies.clone(),
        ..GatewayConfig::new(String::new())
    };
    let assistant = Arc::new(AssistantGateway::new(Arc::new(openai), tools, gateway_config));

    let messenger = Arc::new(WhatsAppClient::new(
        config.whatsapp_token.clone(),
        config.phone_number_id.clone(),
        config.whatsapp_api_url.clone(),
    ));
    let relay = Arc::new(MessageRelay::new(assistant.clone(), messenger));

    if config.whatsapp_app_secret.is_none() {
        warn!("WHATSAPP_APP_SECRET not set; webhook signatures are not verified");
    }
    if config.debug_endpoints {
        warn!("debug endpoints enabled: POST /debug/simulate");
    }

    let state = AppState {
        relay,
        assistant,
        contacts,
        verify_token: config.webhook_verify_token.clone(),
        app_secret: config.whatsapp_app_secret.clone(),
        debug_endpoints: config.debug_endpoints,
    };
    let app = build_router(state, config.max_body_bytes);

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "assistant_id": state.assistant.assistant_id(),
    }))
}

/// Query parameters for webhook verification
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    hub_mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    hub_verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    hub_challenge: Option<String>,
}

/// GET /webhook
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    match verify_subscription(
        &state.verify_token,
        params.hub_mode.as_deref(),
        params.hub_verify_token.as_deref(),
        params.hub_challenge.as_deref(),
    ) {
        Ok(challenge) => {
            info!("whatsapp webhook verified");
            (StatusCode::OK, challenge)
        }
        Err(reason) => {
            info!("whatsapp webhook verification failed: {}", reason);
            (StatusCode::FORBIDDEN, reason.to_string())
        }
    }
}

/// POST /webhook. Acknowledged right away; replies are produced in the
/// background.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(reason) = verify_signature(state.app_secret.as_deref(), &headers, &body) {
        warn!("rejected whatsapp webhook: {}", reason);
        return (StatusCode::UNAUTHORIZED, Json(json!({"status": reason})));
    }

    let payload: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            debug!("invalid whatsapp webhook body: {}", err);
            return (StatusCode::BAD_REQUEST, Json(json!({"status": "bad_json"})));
        }
    };

    let relay = state.relay.clone();
    tokio::spawn(async move {
        relay.handle_payload(payload).await;
    });
    (StatusCode::OK, Json(json!({"status": "accepted"})))
}

/// GET /
async fn dashboard(State(state): State<AppState>) -> Response {
    match state.contacts.list_recent(DASHBOARD_LIMIT).await {
        Ok(contacts) => Html(render_dashboard(&contacts, None)).into_response(),
        Err(err) => {
            error!("failed to load contacts for dashboard: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(render_dashboard(&[], Some("No se pudieron cargar los contactos."))),
            )
                .into_response()
        }
    }
}

/// POST /add_contact
async fn add_contact(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let record = match record_from_form(&form) {
        Ok(record) => record,
        Err(err) => {
            info!("rejected contact form: {}", err);
            let contacts = state
                .contacts
                .list_recent(DASHBOARD_LIMIT)
                .await
                .unwrap_or_default();
            return (
                StatusCode::BAD_REQUEST,
                Html(render_dashboard(&contacts, Some(&err.to_string()))),
            )
                .into_response();
        }
    };

    match state.contacts.insert(&record).await {
        Ok(contact_id) => {
            info!("stored contact {} from form", contact_id);
            Redirect::to("/").into_response()
        }
        Err(err) => {
            error!("failed to store contact from form: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(render_dashboard(&[], Some("No se pudo guardar el contacto."))),
            )
                .into_response()
        }
    }
}

/// GET /api/crm/contacts
async fn list_contacts(State(state): State<AppState>) -> Response {
    match state.contacts.list_recent(API_LIMIT).await {
        Ok(contacts) => Json(contacts).into_response(),
        Err(err) => {
            error!("failed to list contacts: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "store_unavailable"})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    user_id: String,
    text: String,
}

/// POST /debug/simulate
async fn simulate(State(state): State<AppState>, Json(request): Json<SimulateRequest>) -> impl IntoResponse {
    if request.user_id.trim().is_empty() || request.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "user_id and text are required"})),
        );
    }
    let reply = state
        .assistant
        .process_message(&request.user_id, &request.text)
        .await;
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "user_id": request.user_id, "reply": reply})),
    )
}
