//! Question answering over a chat model with session memory and tool calls
//!
//! This module provides:
//! - **Types**: messages, tool-call records, usage counters
//! - **ConversationSession**: bounded message history for one conversation
//! - **SessionStore**: process-lifetime collection of sessions
//! - **Agent**: the orchestration loop tying model, sessions and tools together
//!
//! # Example
//!
//! ```rust,ignore
//! use colloquy::{Agent, AskRequest, Settings};
//!
//! let agent = Agent::from_settings(&Settings::from_env()?)?;
//! let outcome = agent.ask(AskRequest::new("What's the weather in Tokyo?")).await?;
//! println!("{} ({} tokens)", outcome.answer, outcome.usage.total_tokens);
//!
//! // Follow-up in the same conversation
//! let next = agent
//!     .ask(AskRequest::new("And in fahrenheit?").session(&outcome.session_id))
//!     .await?;
//! ```

pub mod conversation;
pub mod sessions;
pub mod types;

pub use conversation::ConversationSession;
pub use sessions::{SessionHandle, SessionStore};
pub use types::{
    ConversationHistory, FunctionCall, Message, Role, SessionId, ToolCallRecord, ToolCallRequest, Usage,
    WireMessage,
};

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Settings;
use crate::error::{ColloquyError, ColloquyResult};
use crate::llm::{ChatModel, ChatRequest, OpenAiProvider};
use crate::tools::{default_registry, ToolArguments, ToolRegistry};

/// Parameters for one question
#[derive(Clone)]
pub struct AskRequest {
    pub question: String,
    pub session_id: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Only used when the session is created by this request
    pub system_prompt: Option<String>,
    pub enable_tools: bool,
    /// Allow-list of tool names. `None` or empty offers every registered tool.
    pub tool_names: Option<Vec<String>>,
    /// Registry to use instead of the agent's own
    pub registry: Option<Arc<ToolRegistry>>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: None,
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            enable_tools: true,
            tool_names: None,
            registry: None,
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn enable_tools(mut self, enabled: bool) -> Self {
        self.enable_tools = enabled;
        self
    }

    pub fn tool_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

/// Result of a question
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AskOutcome {
    pub answer: String,
    pub session_id: SessionId,
    /// Summed over every model round of this question
    pub usage: Usage,
    /// Executed tool calls in the order the model requested them
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Entry point combining the model, the session store and the tool registry
pub struct Agent {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    sessions: SessionStore,
    model_name: String,
    default_temperature: f32,
    default_max_tokens: u32,
    max_tool_rounds: Option<usize>,
}

impl Agent {
    pub fn new(settings: &Settings, model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            registry,
            sessions: SessionStore::new(settings.max_conversation_history),
            model_name: settings.openai_model.clone(),
            default_temperature: settings.default_temperature,
            default_max_tokens: settings.default_max_tokens,
            max_tool_rounds: settings.max_tool_rounds,
        }
    }

    /// Agent backed by the configured OpenAI-compatible endpoint and the
    /// built-in tools
    pub fn from_settings(settings: &Settings) -> ColloquyResult<Self> {
        settings.validate()?;
        let api_key = settings
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ColloquyError::Configuration("OPENAI_API_KEY is not set".to_string()))?;
        Self::with_openai(settings, api_key)
    }

    /// Like [`Agent::from_settings`] but starts without a key. Questions then
    /// fail at the provider until one is configured.
    pub fn from_settings_lenient(settings: &Settings) -> ColloquyResult<Self> {
        settings.validate()?;
        if !settings.openai_configured() {
            warn!("OPENAI_API_KEY is not set; questions will fail until it is configured");
        }
        let api_key = settings.openai_api_key.as_deref().unwrap_or_default();
        Self::with_openai(settings, api_key)
    }

    fn with_openai(settings: &Settings, api_key: &str) -> ColloquyResult<Self> {
        let provider = OpenAiProvider::new(&settings.openai_base_url, api_key)?;
        info!(model = %settings.openai_model, "Agent initialized");
        Ok(Self::new(settings, Arc::new(provider), Arc::new(default_registry())))
    }

    /// Answer a question, running tools for as long as the model asks for them.
    ///
    /// Tool failures are fed back to the model as `{"error": ...}` results.
    /// Model-call failures abort the question.
    #[instrument(skip(self, request), fields(session_id = request.session_id.as_deref().unwrap_or("new")))]
    pub async fn ask(&self, request: AskRequest) -> ColloquyResult<AskOutcome> {
        let registry = request.registry.clone().unwrap_or_else(|| self.registry.clone());

        let handle = self
            .sessions
            .get_or_create(request.session_id.as_deref(), request.system_prompt.as_deref());
        let mut session = handle.lock().await;
        session.append(Message::user(request.question.as_str()))?;

        let tools = if request.enable_tools {
            let allow = request.tool_names.as_deref().filter(|names| !names.is_empty());
            let schemas = registry.schemas(allow);
            (!schemas.is_empty()).then_some(schemas)
        } else {
            None
        };

        let temperature = request.temperature.unwrap_or(self.default_temperature);
        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);

        let mut usage = Usage::default();
        let mut executed = Vec::new();
        let mut rounds = 0;

        loop {
            if let Some(limit) = self.max_tool_rounds {
                if rounds >= limit {
                    warn!(limit, "Model kept requesting tools, giving up");
                    return Err(ColloquyError::ToolLoopExceeded(limit));
                }
            }
            rounds += 1;

            let chat = ChatRequest {
                model: self.model_name.clone(),
                messages: session.to_wire(),
                temperature,
                max_tokens,
                tools: tools.clone(),
            };
            let response = self.model.complete(&chat).await.map_err(|e| {
                error!(round = rounds, "Model call failed: {}", e);
                e
            })?;
            usage += response.usage;
            info!(
                round = rounds,
                tool_calls = response.message.tool_calls.len(),
                total_tokens = response.usage.total_tokens,
                "Model round complete"
            );

            if !response.wants_tools() {
                let answer = response.message.content.unwrap_or_default();
                session.append(Message::assistant(answer.as_str()))?;
                return Ok(AskOutcome {
                    answer,
                    session_id: session.id().to_string(),
                    usage,
                    tool_calls: executed,
                });
            }

            let calls = response.message.tool_calls;
            session.append(Message::assistant_tool_calls(response.message.content, calls.clone()))?;

            // Calls are independent; results still go in request order.
            let records = join_all(calls.iter().map(|call| run_tool_call(&registry, call))).await;
            for (call, record) in calls.iter().zip(records) {
                let content = serde_json::to_string(&record.result)?;
                session.append(Message::tool_result(
                    call.id.as_str(),
                    call.function.name.as_str(),
                    content,
                ))?;
                executed.push(record);
            }
        }
    }

    pub async fn history(&self, session_id: &str) -> Option<ConversationHistory> {
        self.sessions.history(session_id).await
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.delete(session_id)
    }

    pub fn list_sessions(&self) -> Vec<SessionId> {
        self.sessions.list_ids()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Parse, dispatch and record one tool call. Never fails: bad argument
/// payloads become an empty argument set and errors become the result.
async fn run_tool_call(registry: &ToolRegistry, call: &ToolCallRequest) -> ToolCallRecord {
    let name = &call.function.name;

    let arguments = match serde_json::from_str::<Value>(&call.function.arguments) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool = %name, "Tool arguments are not an object: {}", other);
            ToolArguments::new()
        }
        Err(e) => {
            warn!(tool = %name, "Could not parse tool arguments: {}", e);
            ToolArguments::new()
        }
    };

    let result = match registry.execute(name, &arguments).await {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = %name, "Tool call failed: {}", e);
            json!({ "error": e.to_string() })
        }
    };
    debug!(tool = %name, result = %result, "Tool call finished");

    ToolCallRecord {
        tool_name: name.clone(),
        arguments,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ProviderError, ProviderErrorKind, ScriptedModel};

    fn usage(prompt: u64, completion: u64) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    fn agent_with(model: Arc<ScriptedModel>, settings: Settings) -> Agent {
        Agent::new(&settings, model, Arc::new(default_registry()))
    }

    fn agent(model: Arc<ScriptedModel>) -> Agent {
        agent_with(model, Settings::default())
    }

    #[tokio::test]
    async fn test_ask_creates_new_session() {
        let model = Arc::new(ScriptedModel::new([ChatResponse::text("Hello!", usage(10, 5))]));
        let agent = agent(model.clone());

        let outcome = agent.ask(AskRequest::new("Hi")).await.unwrap();
        assert_eq!(outcome.answer, "Hello!");
        assert_eq!(outcome.usage, usage(10, 5));
        assert!(outcome.tool_calls.is_empty());
        assert_eq!(agent.list_sessions(), vec![outcome.session_id.clone()]);

        let history = agent.history(&outcome.session_id).await.unwrap();
        let roles: Vec<Role> = history.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_ask_uses_defaults_and_overrides() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::text("a", usage(1, 1)),
            ChatResponse::text("b", usage(1, 1)),
        ]));
        let agent = agent(model.clone());

        agent.ask(AskRequest::new("one")).await.unwrap();
        agent
            .ask(AskRequest::new("two").temperature(0.2).max_tokens(50))
            .await
            .unwrap();

        let requests = model.requests();
        assert_eq!(requests[0].model, "gpt-4-turbo-preview");
        assert_eq!(requests[0].temperature, 0.7);
        assert_eq!(requests[0].max_tokens, 1000);
        assert_eq!(requests[1].temperature, 0.2);
        assert_eq!(requests[1].max_tokens, 50);
    }

    #[tokio::test]
    async fn test_conversation_context_is_kept() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::text("Nice to meet you, Ada.", usage(10, 5)),
            ChatResponse::text("Your name is Ada.", usage(20, 5)),
        ]));
        let agent = agent(model.clone());

        let first = agent
            .ask(AskRequest::new("My name is Ada.").system_prompt("Be brief."))
            .await
            .unwrap();
        let second = agent
            .ask(
                AskRequest::new("What is my name?")
                    .session(&first.session_id)
                    .system_prompt("Ignored"),
            )
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);

        let sent = &model.requests()[1].messages;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[0].content.as_deref(), Some("Be brief."));
        assert_eq!(sent[2].content.as_deref(), Some("Nice to meet you, Ada."));
        assert_eq!(sent[3].content.as_deref(), Some("What is my name?"));
    }

    #[tokio::test]
    async fn test_two_tool_calls_in_one_round() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::tool_calls(
                vec![
                    ToolCallRequest::new("call_1", "check_transaction_status", r#"{"transaction_id":"TXN-001"}"#),
                    ToolCallRequest::new("call_2", "get_weather", r#"{"location":"London","unit":"fahrenheit"}"#),
                ],
                usage(100, 20),
            ),
            ChatResponse::text("TXN-001 is completed and London is 50F.", usage(150, 15)),
        ]));
        let agent = agent(model.clone());

        let outcome = agent
            .ask(AskRequest::new("Check TXN-001 and the weather in London"))
            .await
            .unwrap();

        assert_eq!(outcome.answer, "TXN-001 is completed and London is 50F.");
        assert_eq!(outcome.usage, usage(250, 35));
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(outcome.tool_calls[0].tool_name, "check_transaction_status");
        assert_eq!(outcome.tool_calls[0].result["status"], "completed");
        assert_eq!(outcome.tool_calls[1].tool_name, "get_weather");
        assert_eq!(outcome.tool_calls[1].arguments["unit"], "fahrenheit");
        assert_eq!(outcome.tool_calls[1].result["temperature"], json!(50.0));

        let history = agent.history(&outcome.session_id).await.unwrap();
        let roles: Vec<Role> = history.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert_eq!(history.messages[1].tool_calls.as_ref().unwrap().len(), 2);
        assert!(history.messages[1].content.is_none());
        assert_eq!(history.messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(history.messages[3].name.as_deref(), Some("get_weather"));

        let second_round = &model.requests()[1];
        assert_eq!(second_round.messages.len(), 4);
        let tool_content: Value =
            serde_json::from_str(second_round.messages[2].content.as_deref().unwrap()).unwrap();
        assert_eq!(tool_content["transaction_id"], "TXN-001");
    }

    #[tokio::test]
    async fn test_chained_rounds_accumulate_usage() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::tool_calls(
                vec![ToolCallRequest::new("c1", "calculate", r#"{"expression":"125 * 48"}"#)],
                usage(50, 10),
            ),
            ChatResponse::tool_calls(
                vec![ToolCallRequest::new("c2", "calculate", r#"{"expression":"6000 + 67"}"#)],
                usage(70, 10),
            ),
            ChatResponse::text("6067", usage(90, 2)),
        ]));
        let agent = agent(model.clone());

        let outcome = agent.ask(AskRequest::new("What is 125 * 48 + 67?")).await.unwrap();
        assert_eq!(outcome.answer, "6067");
        assert_eq!(outcome.usage, usage(210, 22));
        assert_eq!(outcome.tool_calls[0].result["result"], json!(6000));
        assert_eq!(outcome.tool_calls[1].result["result"], json!(6067));
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_tool_faults_become_error_results() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::tool_calls(
                vec![
                    ToolCallRequest::new("c1", "launch_rockets", "{}"),
                    ToolCallRequest::new("c2", "get_weather", "not json at all"),
                    ToolCallRequest::new("c3", "calculate", "[1, 2]"),
                ],
                usage(10, 10),
            ),
            ChatResponse::text("Sorry, something went wrong.", usage(10, 10)),
        ]));
        let agent = agent(model);

        let outcome = agent.ask(AskRequest::new("Do things")).await.unwrap();
        assert_eq!(outcome.tool_calls.len(), 3);

        assert_eq!(
            outcome.tool_calls[0].result,
            json!({"error": "Tool 'launch_rockets' not found in registry"})
        );
        assert!(outcome.tool_calls[1].arguments.is_empty());
        assert!(outcome.tool_calls[1].result["error"]
            .as_str()
            .unwrap()
            .contains("location"));
        assert!(outcome.tool_calls[2].arguments.is_empty());
        assert!(outcome.tool_calls[2].result.get("error").is_some());

        let history = agent.history(&outcome.session_id).await.unwrap();
        assert_eq!(history.messages.len(), 6);
    }

    #[tokio::test]
    async fn test_tool_filtering() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::text("a", usage(1, 1)),
            ChatResponse::text("b", usage(1, 1)),
            ChatResponse::text("c", usage(1, 1)),
            ChatResponse::text("d", usage(1, 1)),
        ]));
        let agent = agent(model.clone());

        agent.ask(AskRequest::new("q").tool_names(["calculate"])).await.unwrap();
        agent.ask(AskRequest::new("q")).await.unwrap();
        agent.ask(AskRequest::new("q").enable_tools(false)).await.unwrap();
        agent.ask(AskRequest::new("q").tool_names(["unknown"])).await.unwrap();

        let requests = model.requests();
        let only = requests[0].tools.as_ref().unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name(), "calculate");
        assert_eq!(requests[1].tools.as_ref().unwrap().len(), 3);
        assert!(requests[2].tools.is_none());
        assert!(requests[3].tools.is_none());
    }

    #[tokio::test]
    async fn test_registry_override() {
        let mut scoped = ToolRegistry::new();
        scoped.register(crate::tools::Calculate);

        let model = Arc::new(ScriptedModel::new([
            ChatResponse::tool_calls(
                vec![ToolCallRequest::new("c1", "get_weather", r#"{"location":"Tokyo"}"#)],
                usage(1, 1),
            ),
            ChatResponse::text("done", usage(1, 1)),
        ]));
        let agent = agent(model.clone());

        let outcome = agent
            .ask(AskRequest::new("q").registry(Arc::new(scoped)))
            .await
            .unwrap();
        assert_eq!(model.requests()[0].tools.as_ref().unwrap().len(), 1);
        assert_eq!(
            outcome.tool_calls[0].result,
            json!({"error": "Tool 'get_weather' not found in registry"})
        );
    }

    #[tokio::test]
    async fn test_empty_final_content() {
        let model = Arc::new(ScriptedModel::default());
        model.push(ChatResponse {
            message: Default::default(),
            ..ChatResponse::text("", usage(3, 0))
        });
        let agent = agent(model);

        let outcome = agent.ask(AskRequest::new("q")).await.unwrap();
        assert_eq!(outcome.answer, "");
        let history = agent.history(&outcome.session_id).await.unwrap();
        assert_eq!(history.messages[1].content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let model = Arc::new(ScriptedModel::default());
        model.push_error(ProviderError::from_status(401, "bad key"));
        let agent = agent(model);

        let err = agent.ask(AskRequest::new("q").session("s1")).await.unwrap_err();
        match err {
            ColloquyError::Provider(e) => assert_eq!(e.kind, ProviderErrorKind::Auth),
            other => panic!("unexpected error: {other}"),
        }
        // The question stays in the session
        assert_eq!(agent.history("s1").await.unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_round_limit() {
        let settings = Settings {
            max_tool_rounds: Some(2),
            ..Settings::default()
        };
        let looping = || {
            ChatResponse::tool_calls(
                vec![ToolCallRequest::new("c", "calculate", r#"{"expression":"1+1"}"#)],
                usage(1, 1),
            )
        };
        let model = Arc::new(ScriptedModel::new([looping(), looping(), looping()]));
        let agent = agent_with(model.clone(), settings);

        let err = agent.ask(AskRequest::new("loop")).await.unwrap_err();
        assert!(matches!(err, ColloquyError::ToolLoopExceeded(2)));
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_history_trimming_during_tool_rounds() {
        let settings = Settings {
            max_conversation_history: 3,
            ..Settings::default()
        };
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::tool_calls(
                vec![ToolCallRequest::new("c1", "calculate", r#"{"expression":"1+1"}"#)],
                usage(1, 1),
            ),
            ChatResponse::text("2", usage(1, 1)),
        ]));
        let agent = agent_with(model, settings);

        let outcome = agent
            .ask(AskRequest::new("1+1?").system_prompt("sys"))
            .await
            .unwrap();
        let history = agent.history(&outcome.session_id).await.unwrap();
        assert_eq!(history.messages.len(), 3);
        assert_eq!(history.messages[0].role, Role::System);
        assert_eq!(history.messages[2].content.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_session_management() {
        let model = Arc::new(ScriptedModel::new([
            ChatResponse::text("a", usage(1, 1)),
            ChatResponse::text("b", usage(1, 1)),
        ]));
        let agent = agent(model);

        agent.ask(AskRequest::new("q").session("one")).await.unwrap();
        agent.ask(AskRequest::new("q").session("two")).await.unwrap();

        let mut ids = agent.list_sessions();
        ids.sort();
        assert_eq!(ids, vec!["one", "two"]);
        assert!(agent.delete_session("one"));
        assert!(!agent.delete_session("one"));
        assert!(agent.history("one").await.is_none());
    }

    #[test]
    fn test_from_settings_requires_key() {
        let err = Agent::from_settings(&Settings::default()).err().unwrap();
        assert!(matches!(err, ColloquyError::Configuration(_)));

        let settings = Settings {
            openai_api_key: Some("sk-test".to_string()),
            ..Settings::default()
        };
        let agent = Agent::from_settings(&settings).unwrap();
        assert_eq!(agent.registry().len(), 3);
        assert_eq!(agent.model_name(), "gpt-4-turbo-preview");
    }

    #[test]
    fn test_from_settings_lenient_starts_without_key() {
        let agent = Agent::from_settings_lenient(&Settings::default()).unwrap();
        assert_eq!(agent.registry().len(), 3);

        let invalid = Settings {
            max_conversation_history: 0,
            ..Settings::default()
        };
        assert!(Agent::from_settings_lenient(&invalid).is_err());
    }

    #[tokio::test]
    async fn test_empty_session_id_gets_fresh_id() {
        let model = Arc::new(ScriptedModel::new([ChatResponse::text("a", usage(1, 1))]));
        let agent = agent(model);

        let outcome = agent.ask(AskRequest::new("q").session("")).await.unwrap();
        assert!(!outcome.session_id.is_empty());
        assert_eq!(agent.list_sessions(), vec![outcome.session_id.clone()]);
        assert!(agent.history(&outcome.session_id).await.is_some());
    }

    /// Answers "re: <last user message>" after yielding to the scheduler
    struct YieldingModel;

    #[async_trait::async_trait]
    impl ChatModel for YieldingModel {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            let last = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .and_then(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse::text(format!("re: {}", last), usage(1, 1)))
        }
    }

    #[tokio::test]
    async fn test_concurrent_asks_on_one_session_do_not_interleave() {
        let agent = Agent::new(&Settings::default(), Arc::new(YieldingModel), Arc::new(default_registry()));

        let (first, second) = tokio::join!(
            agent.ask(AskRequest::new("first").session("shared")),
            agent.ask(AskRequest::new("second").session("shared")),
        );
        first.unwrap();
        second.unwrap();

        let history = agent.history("shared").await.unwrap();
        let roles: Vec<Role> = history.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);

        // Each answer directly follows its own question
        for pair in history.messages.chunks(2) {
            let question = pair[0].content.as_deref().unwrap();
            assert_eq!(pair[1].content.as_deref(), Some(format!("re: {}", question).as_str()));
        }
    }

    /// Sleeps for `delay_ms`, then records its name in a shared log
    struct Timed {
        name: &'static str,
        delay_ms: u64,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl crate::tools::Tool for Timed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Finishes after a fixed delay"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _arguments: &ToolArguments) -> anyhow::Result<Value> {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            self.log.lock().unwrap().push(self.name);
            Ok(json!({ "tool": self.name }))
        }
    }

    #[tokio::test]
    async fn test_round_tools_run_concurrently_and_keep_request_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(Timed { name: "slow", delay_ms: 100, log: log.clone() });
        registry.register(Timed { name: "fast", delay_ms: 0, log: log.clone() });

        let model = Arc::new(ScriptedModel::new([
            ChatResponse::tool_calls(
                vec![ToolCallRequest::new("c1", "slow", "{}"), ToolCallRequest::new("c2", "fast", "{}")],
                usage(1, 1),
            ),
            ChatResponse::text("done", usage(1, 1)),
        ]));
        let agent = Agent::new(&Settings::default(), model, Arc::new(registry));

        let outcome = agent.ask(AskRequest::new("go")).await.unwrap();

        // The fast tool finished first, so both were in flight together
        assert_eq!(*log.lock().unwrap(), vec!["fast", "slow"]);

        let names: Vec<&str> = outcome.tool_calls.iter().map(|c| c.tool_name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast"]);

        let history = agent.history(&outcome.session_id).await.unwrap();
        let tool_ids: Vec<&str> = history
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(tool_ids, vec!["c1", "c2"]);
    }
}
