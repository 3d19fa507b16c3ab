//! Conversation orchestration.
//!
//! A turn streams the model's output until it either finishes or asks for a
//! tool. A tool request is invoked, its result appended to the history as a
//! single tool message, and generation resumes over the extended history.
//! This repeats until the model answers without a tool call.

use std::mem;
use std::time::Duration;

use async_stream::try_stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::model::{
    Backend, EventStream, Message, ModelEvent, ModelRequest, Part, PendingToolCall, Role,
    ToolCall, ToolResult,
};
use crate::tools::{ToolError, ToolHost};
use crate::{Error, Result};

/// What a turn does when a tool call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorPolicy {
    /// End the turn and surface the error to the caller.
    #[default]
    Abort,
    /// Hand the error to the model as the tool result and resume.
    ReportToModel,
}

/// Per-turn settings.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Sampling temperature for the first completion request.
    pub temperature: f32,
    /// Sampling temperature for requests that resume after a tool result.
    pub resume_temperature: f32,
    /// Maximum number of tool calls in one turn.
    pub max_tool_calls: usize,
    /// Upper bound on one tool invocation. `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
    pub on_tool_error: ToolErrorPolicy,
    /// Prepended when the history carries no system message.
    pub system_prompt: Option<String>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            resume_temperature: 0.5,
            max_tool_calls: 8,
            tool_timeout: None,
            on_tool_error: ToolErrorPolicy::Abort,
            system_prompt: None,
        }
    }
}

/// Something that happened during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A fragment of generated text.
    Text(String),
    /// A tool message that was appended to the history.
    ToolResult(Message),
    /// The turn ended with a final answer.
    Completed(Completion),
}

/// The outcome of a finished turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The full history, including every message this turn appended.
    pub messages: Vec<Message>,
    /// All text streamed during the turn.
    pub text: String,
}

enum TurnState {
    Generating(EventStream),
    ToolRequested(PendingToolCall),
    Invoking(ToolCall),
    Resuming,
    Done,
}

impl TurnState {
    fn name(&self) -> &'static str {
        match self {
            Self::Generating(_) => "generating",
            Self::ToolRequested(_) => "tool_requested",
            Self::Invoking(_) => "invoking",
            Self::Resuming => "resuming",
            Self::Done => "done",
        }
    }
}

/// Drives model turns against a backend and a tool host.
pub struct Orchestrator<B, H> {
    backend: B,
    tools: H,
    config: TurnConfig,
}

impl<B: Backend, H: ToolHost> Orchestrator<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self {
            backend,
            tools,
            config: TurnConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn tools(&self) -> &H {
        &self.tools
    }

    /// Run one turn over `history`.
    ///
    /// The returned stream ends after [`TurnEvent::Completed`] or the first
    /// error. Dropping it abandons any in-flight model stream or tool call.
    pub fn run_turn(&self, history: Vec<Message>) -> BoxStream<'_, Result<TurnEvent>> {
        Box::pin(try_stream! {
            let mut messages = self.with_system_prompt(history);
            let mut text = String::new();
            let mut segment = String::new();
            let mut calls = 0usize;

            let events = self.backend.stream(self.request(&messages, self.config.temperature)).await?;
            let mut state = TurnState::Generating(events);

            loop {
                trace!(state = state.name(), "turn state");
                state = match state {
                    TurnState::Generating(mut events) => {
                        let mut next = TurnState::Done;
                        while let Some(event) = events.next().await {
                            match event? {
                                ModelEvent::Text(delta) => {
                                    segment.push_str(&delta);
                                    text.push_str(&delta);
                                    yield TurnEvent::Text(delta);
                                }
                                ModelEvent::ToolCalls(batch) => {
                                    if let Some(call) = first_call(batch) {
                                        next = TurnState::ToolRequested(call);
                                        break;
                                    }
                                }
                                ModelEvent::Finished(reason) => {
                                    debug!(?reason, "generation finished");
                                }
                            }
                        }
                        next
                    }
                    TurnState::ToolRequested(pending) => {
                        calls += 1;
                        if calls > self.config.max_tool_calls {
                            Err::<(), _>(Error::ToolCallLimitExceeded(self.config.max_tool_calls))?;
                        }
                        match pending.parse_arguments() {
                            Ok(args) => TurnState::Invoking(ToolCall {
                                id: pending.id,
                                name: pending.name,
                                input: Value::Object(args),
                            }),
                            Err(error) => {
                                let call = ToolCall {
                                    id: pending.id,
                                    name: pending.name,
                                    input: Value::String(pending.arguments),
                                };
                                let result = self.on_failure(&call, error)?;
                                let message = tool_message(mem::take(&mut segment), call, result);
                                messages.push(message.clone());
                                yield TurnEvent::ToolResult(message);
                                TurnState::Resuming
                            }
                        }
                    }
                    TurnState::Invoking(call) => {
                        let result = match self.invoke(&call).await {
                            Ok(output) => ToolResult::Success {
                                tool_call_id: call.id.clone(),
                                output,
                            },
                            Err(error) => self.on_failure(&call, error)?,
                        };
                        let message = tool_message(mem::take(&mut segment), call, result);
                        messages.push(message.clone());
                        yield TurnEvent::ToolResult(message);
                        TurnState::Resuming
                    }
                    TurnState::Resuming => {
                        let request = self.request(&messages, self.config.resume_temperature);
                        TurnState::Generating(self.backend.stream(request).await?)
                    }
                    TurnState::Done => {
                        if !segment.is_empty() {
                            messages.push(Message::assistant(mem::take(&mut segment)));
                        }
                        debug!(tool_calls = calls, messages = messages.len(), "turn complete");
                        yield TurnEvent::Completed(Completion {
                            messages: mem::take(&mut messages),
                            text: mem::take(&mut text),
                        });
                        break;
                    }
                };
            }
        })
    }

    fn with_system_prompt(&self, mut history: Vec<Message>) -> Vec<Message> {
        if let Some(prompt) = &self.config.system_prompt
            && !history.iter().any(|m| m.role == Role::System)
        {
            history.insert(0, Message::system(prompt.clone()));
        }
        history
    }

    fn request<'a>(&'a self, messages: &'a [Message], temperature: f32) -> ModelRequest<'a> {
        ModelRequest {
            messages,
            tools: self.tools.specs(),
            temperature: Some(temperature),
        }
    }

    async fn invoke(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
        debug!(tool = %call.name, id = %call.id, "invoking tool");
        match self.config.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, self.tools.execute(call))
                .await
                .map_err(|_| ToolError::Timeout(limit.as_millis() as u64))?,
            None => self.tools.execute(call).await,
        }
    }

    fn on_failure(&self, call: &ToolCall, error: ToolError) -> Result<ToolResult> {
        warn!(tool = %call.name, id = %call.id, %error, policy = ?self.config.on_tool_error, "tool call failed");
        match self.config.on_tool_error {
            ToolErrorPolicy::Abort => Err(Error::Tool(error)),
            ToolErrorPolicy::ReportToModel => Ok(ToolResult::Failure {
                tool_call_id: call.id.clone(),
                error,
            }),
        }
    }
}

/// Honor the first call of a batch; later ones are dropped.
fn first_call(batch: Vec<PendingToolCall>) -> Option<PendingToolCall> {
    let mut calls = batch.into_iter();
    let first = calls.next()?;
    for ignored in calls {
        warn!(tool = %ignored.name, id = %ignored.id, "ignoring additional tool call in batch");
    }
    Some(first)
}

fn tool_message(preamble: String, call: ToolCall, result: ToolResult) -> Message {
    let message = Message::tool_result(call, result);
    if preamble.is_empty() {
        return message;
    }
    let mut parts = vec![Part::Text(preamble)];
    parts.extend(message.parts);
    Message::from_parts(Role::Tool, parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FinishReason, ToolSpec};
    use crate::providers::mock::ScriptedBackend;
    use crate::tools::{EmptyToolHost, InvocationRegistry, RegistryOptions};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Tool host returning scripted outcomes and recording each call.
    struct ScriptedTools {
        specs: Vec<ToolSpec>,
        outcomes: Mutex<VecDeque<std::result::Result<Value, ToolError>>>,
        calls: Mutex<Vec<ToolCall>>,
        delay: Option<Duration>,
        finished: AtomicBool,
    }

    impl ScriptedTools {
        fn new(outcomes: impl IntoIterator<Item = std::result::Result<Value, ToolError>>) -> Self {
            Self {
                specs: vec![ToolSpec {
                    name: "lookup".into(),
                    description: "Look something up".into(),
                    schema: json!({"type": "object", "properties": {}, "required": []}),
                }],
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
                delay: None,
                finished: AtomicBool::new(false),
            }
        }

        fn calls(&self) -> Vec<ToolCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolHost for ScriptedTools {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
            self.calls.lock().unwrap().push(call.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.finished.store(true, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }
    }

    fn pending(id: &str, name: &str, arguments: &str) -> PendingToolCall {
        PendingToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn tool_turn(calls: Vec<PendingToolCall>) -> Vec<ModelEvent> {
        vec![
            ModelEvent::ToolCalls(calls),
            ModelEvent::Finished(FinishReason::ToolCalls),
        ]
    }

    fn text_turn(text: &str) -> Vec<ModelEvent> {
        vec![
            ModelEvent::Text(text.into()),
            ModelEvent::Finished(FinishReason::Stop),
        ]
    }

    async fn collect<B: Backend, H: ToolHost>(
        orchestrator: &Orchestrator<B, H>,
        history: Vec<Message>,
    ) -> Vec<Result<TurnEvent>> {
        orchestrator.run_turn(history).collect().await
    }

    fn completion(events: &[Result<TurnEvent>]) -> &Completion {
        match events.last() {
            Some(Ok(TurnEvent::Completed(completion))) => completion,
            other => panic!("turn did not complete: {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_turn_streams_text_and_completes() {
        let backend = ScriptedBackend::new([vec![
            ModelEvent::Text("Hel".into()),
            ModelEvent::Text("lo".into()),
            ModelEvent::Finished(FinishReason::Stop),
        ]]);
        let orchestrator = Orchestrator::new(backend, EmptyToolHost);
        let history = vec![Message::user("hi")];

        let events = collect(&orchestrator, history.clone()).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(TurnEvent::Text(ref t)) if t == "Hel"));
        assert!(matches!(events[1], Ok(TurnEvent::Text(ref t)) if t == "lo"));

        let done = completion(&events);
        assert_eq!(done.text, "Hello");
        assert_eq!(
            done.messages,
            vec![Message::user("hi"), Message::assistant("Hello")]
        );

        let requests = orchestrator.backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, history);
        assert!(requests[0].tools.is_empty());
        assert_eq!(requests[0].temperature, Some(0.5));
    }

    #[tokio::test]
    async fn tool_result_is_appended_before_resuming() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"widgets": []})))
            .expect(1)
            .mount(&server)
            .await;
        let description = openapi::ApiDescription::from_value(json!({
            "servers": [{ "url": server.uri() }],
            "paths": { "/widgets": { "get": { "operationId": "listWidgets" } } }
        }))
        .unwrap();
        let registry =
            InvocationRegistry::from_description(&description, RegistryOptions::default()).unwrap();

        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("call_1", "listWidgets", "{}")]),
            text_turn("There are no widgets."),
        ]);
        let orchestrator = Orchestrator::new(backend, registry);
        let history = vec![Message::user("What widgets do we have?")];

        let events = collect(&orchestrator, history.clone()).await;

        let expected_tool_message = Message::tool_result(
            ToolCall {
                id: "call_1".into(),
                name: "listWidgets".into(),
                input: json!({}),
            },
            ToolResult::Success {
                tool_call_id: "call_1".into(),
                output: json!({"widgets": []}),
            },
        );
        assert_eq!(
            events[0].as_ref().unwrap(),
            &TurnEvent::ToolResult(expected_tool_message.clone())
        );

        let requests = orchestrator.backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools, ["listWidgets"]);
        let mut resumed_over = history.clone();
        resumed_over.push(expected_tool_message);
        assert_eq!(requests[1].messages, resumed_over);

        let done = completion(&events);
        assert_eq!(done.text, "There are no widgets.");
        assert_eq!(done.messages.len(), 3);
    }

    #[tokio::test]
    async fn malformed_arguments_end_the_turn_without_resuming() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("call_1", "lookup", "{not json")]),
            text_turn("unreachable"),
        ]);
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([]));

        let events = collect(&orchestrator, vec![Message::user("go")]).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(Error::Tool(ToolError::ArgumentParse { ref name, .. })) if name == "lookup"
        ));
        assert_eq!(orchestrator.backend.requests().len(), 1);
        assert!(orchestrator.tools.calls().is_empty());
    }

    #[tokio::test]
    async fn chained_calls_append_results_in_order() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", r#"{"step": 1}"#)]),
            tool_turn(vec![pending("c2", "lookup", r#"{"step": 2}"#)]),
            tool_turn(vec![pending("c3", "lookup", r#"{"step": 3}"#)]),
            text_turn("done"),
        ]);
        let tools = ScriptedTools::new([Ok(json!(1)), Ok(json!(2)), Ok(json!(3))]);
        let orchestrator = Orchestrator::new(backend, tools);
        let history = vec![Message::user("chain")];

        let events = collect(&orchestrator, history.clone()).await;
        let done = completion(&events);

        let requests = orchestrator.backend.requests();
        assert_eq!(requests.len(), 4);
        for (n, request) in requests.iter().enumerate() {
            assert_eq!(request.messages.len(), history.len() + n);
            assert_eq!(request.messages[..], done.messages[..history.len() + n]);
        }

        let ids: Vec<_> = done.messages[1..4]
            .iter()
            .map(|m| m.tool_results()[0].tool_call_id().to_string())
            .collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        let outputs: Vec<_> = done.messages[1..4]
            .iter()
            .map(|m| m.tool_results()[0].content())
            .collect();
        assert_eq!(outputs, [json!(1), json!(2), json!(3)]);
        assert_eq!(done.messages[4], Message::assistant("done"));
    }

    #[tokio::test]
    async fn exceeding_the_call_limit_fails() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "{}")]),
            tool_turn(vec![pending("c2", "lookup", "{}")]),
            text_turn("unreachable"),
        ]);
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([])).with_config(
            TurnConfig {
                max_tool_calls: 1,
                ..TurnConfig::default()
            },
        );

        let events = collect(&orchestrator, vec![Message::user("go")]).await;

        assert!(matches!(
            events.last(),
            Some(Err(Error::ToolCallLimitExceeded(1)))
        ));
        assert_eq!(orchestrator.backend.requests().len(), 2);
        assert_eq!(orchestrator.tools.calls().len(), 1);
    }

    #[tokio::test]
    async fn only_the_first_call_of_a_batch_runs() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![
                pending("c1", "lookup", r#"{"q": "first"}"#),
                pending("c2", "lookup", r#"{"q": "second"}"#),
            ]),
            text_turn("ok"),
        ]);
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([Ok(json!("found"))]));

        let events = collect(&orchestrator, vec![Message::user("go")]).await;
        let done = completion(&events);

        let calls = orchestrator.tools.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].input, json!({"q": "first"}));
        assert_eq!(done.messages[1].tool_results().len(), 1);
    }

    #[tokio::test]
    async fn abort_policy_surfaces_tool_failures() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "{}")]),
            text_turn("unreachable"),
        ]);
        let failure = ToolError::ApiCall {
            operation_id: "lookup".into(),
            status: 500,
        };
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([Err(failure.clone())]));

        let events = collect(&orchestrator, vec![Message::user("go")]).await;

        assert!(matches!(events.last(), Some(Err(Error::Tool(e))) if *e == failure));
        assert_eq!(orchestrator.backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn report_policy_feeds_failures_back_to_the_model() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "{}")]),
            text_turn("Sorry, the lookup failed."),
        ]);
        let failure = ToolError::ApiCall {
            operation_id: "lookup".into(),
            status: 404,
        };
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([Err(failure.clone())]))
            .with_config(TurnConfig {
                on_tool_error: ToolErrorPolicy::ReportToModel,
                ..TurnConfig::default()
            });

        let events = collect(&orchestrator, vec![Message::user("go")]).await;
        let done = completion(&events);

        let requests = orchestrator.backend.requests();
        assert_eq!(requests.len(), 2);
        let resumed_with = &requests[1].messages[1];
        assert_eq!(
            resumed_with.tool_results()[0],
            &ToolResult::Failure {
                tool_call_id: "c1".into(),
                error: failure,
            }
        );
        assert_eq!(done.text, "Sorry, the lookup failed.");
    }

    #[tokio::test]
    async fn report_policy_also_covers_malformed_arguments() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "{oops")]),
            text_turn("Let me try again."),
        ]);
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([])).with_config(
            TurnConfig {
                on_tool_error: ToolErrorPolicy::ReportToModel,
                ..TurnConfig::default()
            },
        );

        let events = collect(&orchestrator, vec![Message::user("go")]).await;
        let done = completion(&events);

        let call = done.messages[1].tool_calls()[0];
        assert_eq!(call.input, Value::String("{oops".into()));
        assert!(matches!(
            done.messages[1].tool_results()[0],
            ToolResult::Failure { error: ToolError::ArgumentParse { .. }, .. }
        ));
        assert!(orchestrator.tools.calls().is_empty());
    }

    #[tokio::test]
    async fn slow_tools_time_out() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "{}")]),
            text_turn("unreachable"),
        ]);
        let mut tools = ScriptedTools::new([Ok(json!("late"))]);
        tools.delay = Some(Duration::from_secs(30));
        let orchestrator = Orchestrator::new(backend, tools).with_config(TurnConfig {
            tool_timeout: Some(Duration::from_millis(20)),
            ..TurnConfig::default()
        });

        let events = collect(&orchestrator, vec![Message::user("go")]).await;

        assert!(matches!(
            events.last(),
            Some(Err(Error::Tool(ToolError::Timeout(20))))
        ));
    }

    #[tokio::test]
    async fn dropping_the_turn_abandons_the_running_tool() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "{}")]),
            text_turn("unreachable"),
        ]);
        let mut tools = ScriptedTools::new([Ok(json!("late"))]);
        tools.delay = Some(Duration::from_millis(200));
        let orchestrator = Orchestrator::new(backend, tools);

        let mut turn = orchestrator.run_turn(vec![Message::user("go")]);
        let polled = tokio::time::timeout(Duration::from_millis(50), turn.next()).await;
        assert!(polled.is_err(), "turn should still be waiting on the tool");
        assert_eq!(orchestrator.tools.calls().len(), 1);

        drop(turn);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!orchestrator.tools.finished.load(Ordering::SeqCst));
        assert_eq!(orchestrator.backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn resumption_keeps_tools_and_uses_resume_temperature() {
        let backend = ScriptedBackend::new([
            tool_turn(vec![pending("c1", "lookup", "")]),
            text_turn("ok"),
        ]);
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([Ok(json!({}))]))
            .with_config(TurnConfig {
                temperature: 0.9,
                resume_temperature: 0.2,
                ..TurnConfig::default()
            });

        collect(&orchestrator, vec![Message::user("go")]).await;

        let requests = orchestrator.backend.requests();
        assert_eq!(requests[0].temperature, Some(0.9));
        assert_eq!(requests[1].temperature, Some(0.2));
        assert_eq!(requests[1].tools, ["lookup"]);
    }

    #[tokio::test]
    async fn text_before_a_tool_call_travels_with_the_tool_message() {
        let backend = ScriptedBackend::new([
            vec![
                ModelEvent::Text("Checking. ".into()),
                ModelEvent::ToolCalls(vec![pending("c1", "lookup", "{}")]),
            ],
            text_turn("Found it."),
        ]);
        let orchestrator = Orchestrator::new(backend, ScriptedTools::new([Ok(json!(42))]));

        let events = collect(&orchestrator, vec![Message::user("go")]).await;
        let done = completion(&events);

        assert_eq!(done.text, "Checking. Found it.");
        assert_eq!(done.messages[1].role, Role::Tool);
        assert_eq!(done.messages[1].text(), "Checking. ");
        assert_eq!(done.messages[2], Message::assistant("Found it."));
    }

    #[tokio::test]
    async fn system_prompt_is_prepended_once() {
        let backend = ScriptedBackend::new([text_turn("a"), text_turn("b")]);
        let orchestrator = Orchestrator::new(backend, EmptyToolHost).with_config(TurnConfig {
            system_prompt: Some("Be brief.".into()),
            ..TurnConfig::default()
        });

        collect(&orchestrator, vec![Message::user("one")]).await;
        collect(
            &orchestrator,
            vec![Message::system("Custom."), Message::user("two")],
        )
        .await;

        let requests = orchestrator.backend.requests();
        assert_eq!(
            requests[0].messages,
            vec![Message::system("Be brief."), Message::user("one")]
        );
        assert_eq!(
            requests[1].messages,
            vec![Message::system("Custom."), Message::user("two")]
        );
    }

    #[tokio::test]
    async fn unknown_tool_on_empty_host_aborts() {
        let backend = ScriptedBackend::new([tool_turn(vec![pending("c1", "ghost", "{}")])]);
        let orchestrator = Orchestrator::new(backend, EmptyToolHost);

        let events = collect(&orchestrator, vec![Message::user("go")]).await;

        assert!(matches!(
            events.last(),
            Some(Err(Error::Tool(ToolError::OperationNotFound(name)))) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn backend_errors_end_the_turn() {
        let orchestrator = Orchestrator::new(ScriptedBackend::new([]), EmptyToolHost);
        let events = collect(&orchestrator, vec![Message::user("go")]).await;
        assert!(matches!(events.as_slice(), [Err(Error::Model(_))]));
    }
}
