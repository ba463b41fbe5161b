use crate::*;
use crate::openai::parse_response;
use async_trait::async_trait;
use cb_core::replies;
use cb_session::{ManualClock, Role, SessionStore, Turn};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ========== Fakes ==========

/// Agent with a fixed answer that records what it was given.
struct FakeAgent {
    reply: std::result::Result<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Vec<Turn>)>>,
}

impl FakeAgent {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(reply.into()), calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) })
    }

    fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self { reply: Err(reason.into()), calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FakeAgent {
    async fn respond(&self, message: &str, history: &[Turn]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((message.to_string(), history.to_vec()));
        match &self.reply {
            Ok(r) => Ok(r.clone()),
            Err(e) => Err(AgentError::Api { status: 503, body: e.clone() }),
        }
    }
}

/// Agent that touches the store while "thinking". Deadlocks if the
/// caller still holds the store lock.
/// Agent that opens a second session from a blocking thread while the
/// first one is being answered.
struct StoreTouchingAgent {
    store: Arc<SessionStore>,
}

#[async_trait]
impl Agent for StoreTouchingAgent {
    async fn respond(&self, _message: &str, _history: &[Turn]) -> Result<String> {
        let store = Arc::clone(&self.store);
        let count = tokio::task::spawn_blocking(move || {
            store.get_or_create("other");
            store.len()
        })
        .await
        .map_err(|e| AgentError::ToolFailed { tool: "store".into(), reason: e.to_string() })?;
        Ok(format!("{count} sessions"))
    }
}

/// Chat model that plays back scripted replies and records requests.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ChatMessage>>>,
    requests: Mutex<Vec<(Vec<ChatMessage>, Vec<ToolSpec>)>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<ChatMessage>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<(Vec<ChatMessage>, Vec<ToolSpec>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        self.requests.lock().unwrap().push((messages.to_vec(), tools.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatMessage::tool_calls(vec![ToolCall::new("loop", "consultar_divida", r#"{"cliente_id":"1"}"#)])))
    }
}

fn service(agent: Arc<dyn Agent>) -> (ConversationService, Arc<SessionStore>) {
    let store = Arc::new(SessionStore::with_clock(20, Arc::new(ManualClock::default())));
    (ConversationService::new(Arc::clone(&store), agent), store)
}

// ========== Conversation Service ==========

#[tokio::test]
async fn test_reply_recorded_in_history() {
    let agent = FakeAgent::ok("Por favor, informe seu ID de cliente.");
    let (svc, store) = service(agent.clone());

    let out = svc.handle(InboundMessage::new("5511@c.us", "Tenho uma dívida")).await;
    assert_eq!(out, Outcome::success("Por favor, informe seu ID de cliente."));
    assert_eq!(
        store.snapshot("5511@c.us").unwrap(),
        vec![Turn::human("Tenho uma dívida"), Turn::assistant("Por favor, informe seu ID de cliente.")]
    );
}

#[tokio::test]
async fn test_second_message_sees_prior_turns() {
    let agent = FakeAgent::ok("ok");
    let (svc, _) = service(agent.clone());
    svc.handle(InboundMessage::new("c", "primeira")).await;
    svc.handle(InboundMessage::new("c", "segunda")).await;

    let seen = agent.seen.lock().unwrap();
    assert!(seen[0].1.is_empty());
    assert_eq!(seen[1].0, "segunda");
    assert_eq!(seen[1].1, vec![Turn::human("primeira"), Turn::assistant("ok")]);
}

#[tokio::test]
async fn test_empty_message_short_circuits() {
    let agent = FakeAgent::ok("unused");
    let (svc, store) = service(agent.clone());
    for text in ["", "   ", "\n\t"] {
        let out = svc.handle(InboundMessage::new("new-chat", text)).await;
        assert_eq!(out, Outcome::success(replies::INVALID_MESSAGE));
    }
    assert!(!store.contains("new-chat"));
    assert!(store.is_empty());
    assert_eq!(agent.calls(), 0);
}

#[tokio::test]
async fn test_empty_message_leaves_existing_history() {
    let agent = FakeAgent::ok("ok");
    let (svc, store) = service(agent.clone());
    svc.handle(InboundMessage::new("c", "oi")).await;
    svc.handle(InboundMessage::new("c", " ")).await;
    assert_eq!(store.snapshot("c").unwrap().len(), 2);
}

#[tokio::test]
async fn test_own_message_ignored() {
    let agent = FakeAgent::ok("unused");
    let (svc, store) = service(agent.clone());
    let out = svc.handle(InboundMessage::new("c", "mensagem do bot").from_me(true)).await;
    assert_eq!(out, Outcome::ignored());
    assert_eq!(out.reply, None);
    assert_eq!(store.len(), 0);
    assert_eq!(agent.calls(), 0);
}

#[tokio::test]
async fn test_agent_failure_falls_back() {
    let agent = FakeAgent::failing("upstream down");
    let (svc, store) = service(agent.clone());
    let out = svc.handle(InboundMessage::new("c", "quero parcelar")).await;
    assert_eq!(out, Outcome::error(replies::AGENT_FAILURE));
    assert!(store.contains("c"));
    assert_eq!(store.snapshot("c").unwrap(), vec![Turn::human("quero parcelar")]);
}

#[tokio::test]
async fn test_session_usable_after_failure() {
    let store = Arc::new(SessionStore::new(20));
    let failing = ConversationService::new(Arc::clone(&store), FakeAgent::failing("boom"));
    failing.handle(InboundMessage::new("c", "primeira")).await;

    let agent = FakeAgent::ok("resposta");
    let working = ConversationService::new(Arc::clone(&store), agent.clone());
    let out = working.handle(InboundMessage::new("c", "segunda")).await;
    assert_eq!(out, Outcome::success("resposta"));
    assert_eq!(agent.seen.lock().unwrap()[0].1, vec![Turn::human("primeira")]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_chats_isolated() {
    let agent = FakeAgent::ok("ok");
    let (svc, store) = service(agent.clone());
    svc.handle(InboundMessage::new("A", "de A")).await;
    svc.handle(InboundMessage::new("B", "de B")).await;
    svc.handle(InboundMessage::new("A", "de A de novo")).await;

    assert_eq!(store.snapshot("B").unwrap(), vec![Turn::human("de B"), Turn::assistant("ok")]);
    assert_eq!(store.snapshot("A").unwrap().len(), 4);
}

#[tokio::test]
async fn test_history_window_applies() {
    let store = Arc::new(SessionStore::new(4));
    let svc = ConversationService::new(Arc::clone(&store), FakeAgent::ok("r"));
    for i in 0..3 {
        svc.handle(InboundMessage::new("c", format!("m{i}"))).await;
    }
    let turns = store.snapshot("c").unwrap();
    assert_eq!(turns, vec![Turn::human("m1"), Turn::assistant("r"), Turn::human("m2"), Turn::assistant("r")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_unlocked_during_agent_call() {
    let store = Arc::new(SessionStore::new(20));
    let agent = Arc::new(StoreTouchingAgent { store: Arc::clone(&store) });
    let svc = ConversationService::new(Arc::clone(&store), agent);
    let out = tokio::time::timeout(Duration::from_secs(5), svc.handle(InboundMessage::new("c", "oi")))
        .await
        .expect("store lock held across agent call");
    assert_eq!(out, Outcome::success("2 sessions"));
}

#[tokio::test]
async fn test_inbound_message_deserializes_without_from_me() {
    let msg: InboundMessage = serde_json::from_value(json!({"conversation_id": "c", "text": "oi"})).unwrap();
    assert!(!msg.from_me);
    assert_eq!(serde_json::to_value(ReplyStatus::Ignored).unwrap(), json!("ignored"));
}

// ========== Tool Registry ==========

#[tokio::test]
async fn test_default_registry() {
    let registry = ToolRegistry::with_defaults();
    assert_eq!(registry.names(), vec!["consultar_divida".to_string()]);
    let spec = &registry.specs()[0];
    assert_eq!(spec.parameters["required"], json!(["cliente_id"]));
}

#[tokio::test]
async fn test_debt_lookup() {
    let registry = ToolRegistry::with_defaults();
    let out = registry.invoke("consultar_divida", r#"{"cliente_id": "123"}"#).await.unwrap();
    assert_eq!(out, "Cliente 123 tem dívida de R$ 500,00 vencida em 15/08/2024.");
    let out = registry.invoke("consultar_divida", r#"{"cliente_id": 42}"#).await.unwrap();
    assert!(out.starts_with("Cliente 42 "));
}

#[tokio::test]
async fn test_debt_lookup_missing_id() {
    let registry = ToolRegistry::with_defaults();
    let err = registry.invoke("consultar_divida", "{}").await.unwrap_err();
    assert!(matches!(err, AgentError::ToolFailed { .. }));
    let err = registry.invoke("consultar_divida", "").await.unwrap_err();
    assert!(matches!(err, AgentError::ToolFailed { .. }));
}

#[tokio::test]
async fn test_registry_rejects_bad_arguments() {
    let registry = ToolRegistry::with_defaults();
    let err = registry.invoke("consultar_divida", "{not json").await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidToolArguments { .. }));
}

#[tokio::test]
async fn test_registry_unknown_tool() {
    let registry = ToolRegistry::new();
    assert!(registry.is_empty());
    let err = registry.invoke("apagar_divida", "{}").await.unwrap_err();
    assert!(matches!(err, AgentError::UnknownTool(name) if name == "apagar_divida"));
}

#[tokio::test]
async fn test_register_replaces_same_name() {
    let mut registry = ToolRegistry::with_defaults();
    registry.register(DebtLookupTool);
    assert_eq!(registry.len(), 1);
}

// ========== Tool-Calling Agent ==========

#[tokio::test]
async fn test_agent_direct_answer() {
    let model = ScriptedModel::new(vec![Ok(ChatMessage::assistant("Olá! Como posso ajudar?"))]);
    let agent = ToolCallingAgent::new(model.clone(), ToolRegistry::with_defaults());
    let history = vec![Turn::human("oi"), Turn::assistant("olá")];
    let reply = agent.respond("tenho uma dívida", &history).await.unwrap();
    assert_eq!(reply, "Olá! Como posso ajudar?");

    let (messages, tools) = &model.requests()[0];
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, ChatRole::System);
    assert_eq!(messages[1], ChatMessage::user("oi"));
    assert_eq!(messages[2], ChatMessage::assistant("olá"));
    assert_eq!(messages[3], ChatMessage::user("tenho uma dívida"));
    assert_eq!(tools.len(), 1);
}

#[tokio::test]
async fn test_agent_uses_tool_then_answers() {
    let model = ScriptedModel::new(vec![
        Ok(ChatMessage::tool_calls(vec![ToolCall::new("call_1", "consultar_divida", r#"{"cliente_id":"77"}"#)])),
        Ok(ChatMessage::assistant("Sua dívida é de R$ 500,00.")),
    ]);
    let agent = ToolCallingAgent::new(model.clone(), ToolRegistry::with_defaults());
    let reply = agent.respond("meu id é 77", &[]).await.unwrap();
    assert_eq!(reply, "Sua dívida é de R$ 500,00.");

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1].0;
    let tool_msg = second.last().unwrap();
    assert_eq!(tool_msg.role, ChatRole::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(
        tool_msg.content.as_deref(),
        Some("Cliente 77 tem dívida de R$ 500,00 vencida em 15/08/2024.")
    );
    assert_eq!(second[second.len() - 2].requested_calls().len(), 1);
}

#[tokio::test]
async fn test_agent_reports_tool_error_to_model() {
    let model = ScriptedModel::new(vec![
        Ok(ChatMessage::tool_calls(vec![ToolCall::new("c1", "nao_existe", "{}")])),
        Ok(ChatMessage::assistant("Desculpe.")),
    ]);
    let agent = ToolCallingAgent::new(model.clone(), ToolRegistry::with_defaults());
    assert_eq!(agent.respond("x", &[]).await.unwrap(), "Desculpe.");
    let tool_msg = model.requests()[1].0.last().cloned().unwrap();
    assert!(tool_msg.content.unwrap().starts_with("Error: Unknown tool"));
}

#[tokio::test]
async fn test_agent_iteration_limit() {
    let model = ScriptedModel::new(Vec::new());
    let agent = ToolCallingAgent::new(model.clone(), ToolRegistry::with_defaults()).with_max_iterations(3);
    assert_eq!(agent.respond("x", &[]).await.unwrap(), replies::NO_OUTPUT);
    assert_eq!(model.requests().len(), 3);
}

#[tokio::test]
async fn test_agent_empty_content() {
    let model = ScriptedModel::new(vec![Ok(ChatMessage { content: None, ..ChatMessage::assistant("") })]);
    let agent = ToolCallingAgent::new(model, ToolRegistry::new());
    assert_eq!(agent.respond("x", &[]).await.unwrap(), replies::NO_OUTPUT);
}

#[tokio::test]
async fn test_agent_propagates_model_error() {
    let model = ScriptedModel::new(vec![Err(AgentError::EmptyResponse)]);
    let agent = ToolCallingAgent::new(model, ToolRegistry::new());
    assert!(matches!(agent.respond("x", &[]).await, Err(AgentError::EmptyResponse)));
}

#[tokio::test]
async fn test_agent_custom_system_prompt() {
    let model = ScriptedModel::new(vec![Ok(ChatMessage::assistant("ok"))]);
    let agent = ToolCallingAgent::new(model.clone(), ToolRegistry::new()).with_system_prompt("seja breve");
    agent.respond("x", &[]).await.unwrap();
    assert_eq!(model.requests()[0].0[0], ChatMessage::system("seja breve"));
    assert!(model.requests()[0].1.is_empty());
}

#[test]
fn test_turn_to_chat_message() {
    assert_eq!(ChatMessage::from(&Turn::new(Role::Human, "a")), ChatMessage::user("a"));
    assert_eq!(ChatMessage::from(&Turn::new(Role::Assistant, "b")), ChatMessage::assistant("b"));
}

#[test]
fn test_default_prompt_mentions_customer_id() {
    assert!(prompt::SYSTEM_PROMPT.contains("ID do cliente"));
}

// ========== OpenAI Client ==========

#[test]
fn test_parse_text_response() {
    let body = json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Olá"}, "finish_reason": "stop"}]
    });
    let msg = parse_response(&body.to_string()).unwrap();
    assert_eq!(msg, ChatMessage::assistant("Olá"));
}

#[test]
fn test_parse_tool_call_response() {
    let body = json!({
        "choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "call_9", "type": "function",
                "function": {"name": "consultar_divida", "arguments": "{\"cliente_id\":\"9\"}"}}]
        }}]
    });
    let msg = parse_response(&body.to_string()).unwrap();
    assert_eq!(msg.content, None);
    assert_eq!(msg.requested_calls()[0].function.name, "consultar_divida");
}

#[test]
fn test_parse_empty_and_invalid() {
    assert!(matches!(parse_response(r#"{"choices": []}"#), Err(AgentError::EmptyResponse)));
    assert!(matches!(parse_response("not json"), Err(AgentError::Decode(_))));
}

#[test]
fn test_tool_result_serialization() {
    let v = serde_json::to_value(ChatMessage::tool_result("call_1", "done")).unwrap();
    assert_eq!(v, json!({"role": "tool", "content": "done", "tool_call_id": "call_1"}));
}

#[test]
fn test_client_requires_api_key() {
    let config = cb_core::AgentConfig::default();
    assert!(matches!(OpenAiChatModel::from_config(&config), Err(AgentError::MissingApiKey)));
    assert!(matches!(
        OpenAiChatModel::new("https://api.openai.com/v1", "  ", "gpt-4o-mini", 0.0),
        Err(AgentError::MissingApiKey)
    ));
}

#[test]
fn test_client_endpoint() {
    let model = OpenAiChatModel::new("https://api.openai.com/v1/", "sk-test", "gpt-4o-mini", 0.0).unwrap();
    assert_eq!(model.endpoint(), "https://api.openai.com/v1/chat/completions");
    assert_eq!(model.model(), "gpt-4o-mini");
}

mod mock_api {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    #[derive(Clone)]
    struct MockState {
        status: StatusCode,
        body: Value,
        seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn completions(
        State(state): State<MockState>,
        headers: HeaderMap,
        Json(request): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        state.seen.lock().unwrap().push((auth, request));
        (state.status, Json(state.body.clone()))
    }

    async fn spawn(status: StatusCode, body: Value) -> (String, MockState) {
        let state = MockState { status, body, seen: Arc::new(Mutex::new(Vec::new())) };
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), state)
    }

    #[tokio::test]
    async fn test_request_shape_and_reply() {
        let (base, state) = spawn(
            StatusCode::OK,
            json!({"choices": [{"message": {"role": "assistant", "content": "Olá!"}}]}),
        )
        .await;
        let model = OpenAiChatModel::new(&base, "sk-test", "gpt-4o-mini", 0.0).unwrap();
        let specs = ToolRegistry::with_defaults().specs();
        let reply = model
            .complete(&[ChatMessage::system("s"), ChatMessage::user("oi")], &specs)
            .await
            .unwrap();
        assert_eq!(reply.content.as_deref(), Some("Olá!"));

        let seen = state.seen.lock().unwrap();
        let (auth, request) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(request["model"], "gpt-4o-mini");
        assert_eq!(request["messages"][1], json!({"role": "user", "content": "oi"}));
        assert_eq!(request["tools"][0]["type"], "function");
        assert_eq!(request["tools"][0]["function"]["name"], "consultar_divida");
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let (base, _) = spawn(StatusCode::TOO_MANY_REQUESTS, json!({"error": {"message": "rate limited"}})).await;
        let model = OpenAiChatModel::new(&base, "sk-test", "gpt-4o-mini", 0.0).unwrap();
        let err = model.complete(&[ChatMessage::user("oi")], &[]).await.unwrap_err();
        match err {
            AgentError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("rate limited"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_with_service() {
        let (base, state) = spawn(
            StatusCode::OK,
            json!({"choices": [{"message": {"role": "assistant", "content": "Informe seu ID."}}]}),
        )
        .await;
        let model = Arc::new(OpenAiChatModel::new(&base, "sk-test", "gpt-4o-mini", 0.0).unwrap());
        let agent = Arc::new(ToolCallingAgent::new(model, ToolRegistry::with_defaults()));
        let store = Arc::new(SessionStore::new(20));
        let svc = ConversationService::new(Arc::clone(&store), agent);

        svc.handle(InboundMessage::new("c", "Tenho uma dívida")).await;
        let out = svc.handle(InboundMessage::new("c", "Quero parcelar")).await;
        assert_eq!(out, Outcome::success("Informe seu ID."));

        let seen = state.seen.lock().unwrap();
        let messages = seen[1].1["messages"].as_array().unwrap().clone();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"], "Tenho uma dívida");
        assert_eq!(messages[2]["role"], "assistant");
    }
}
