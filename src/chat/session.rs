// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation session
//!
//! A [`ConversationSession`] owns the history of one conversation and runs
//! its turns. Each turn is driven by a background task that opens the
//! stream, decodes it, splits reasoning from the answer, and hands the
//! tagged chunks to the caller through a bounded channel. A slow consumer
//! therefore stalls the socket read instead of growing a buffer.
//!
//! ```text
//! ask() -> Turn (Stream<Item = StreamChunk>) -> finish() -> TurnOutput
//!                  \-- drop / abandon(): nothing is appended
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::{ReasoningConfig, Settings};
use crate::error::{PolainError, Result};
use crate::llm::message::MessageContent;
use crate::llm::provider::{ChatRequest, ChatTransport};
use crate::models::ModelRegistry;

use super::history::{History, HistoryManager};
use super::prompts::SystemPrompts;
use super::reasoning::ReasoningSplitter;
use super::sse::decode_stream;
use super::streaming::{StreamChunk, TurnAccumulator, TurnOutput};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// One conversation: its history plus the machinery to run turns against it
pub struct ConversationSession {
    transport: Arc<dyn ChatTransport>,
    registry: Arc<ModelRegistry>,
    history: HistoryManager,
    tags: ReasoningConfig,
    private: bool,
    channel_capacity: usize,
    /// Token of the turn in flight, 0 when idle
    active: Arc<AtomicU64>,
    next_token: u64,
    /// Producer of the turn in flight
    abort: Option<AbortHandle>,
}

impl ConversationSession {
    pub fn new(transport: Arc<dyn ChatTransport>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            transport,
            registry,
            history: HistoryManager::default(),
            tags: ReasoningConfig::default(),
            private: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            active: Arc::new(AtomicU64::new(0)),
            next_token: 0,
            abort: None,
        }
    }

    /// Create a session configured from settings
    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn ChatTransport>,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        Self::new(transport, registry)
            .with_prompts(SystemPrompts::from_settings(settings))
            .with_reasoning_tags(settings.reasoning.clone())
            .with_private(settings.defaults.private)
            .with_channel_capacity(settings.defaults.channel_capacity)
    }

    /// Set the system prompt table
    pub fn with_prompts(mut self, prompts: SystemPrompts) -> Self {
        self.history = HistoryManager::new(prompts);
        self
    }

    /// Set the reasoning delimiters
    pub fn with_reasoning_tags(mut self, tags: ReasoningConfig) -> Self {
        self.tags = tags;
        self
    }

    /// Set the `private` request flag
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Set the hand-off channel capacity (at least 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn history(&self) -> &History {
        self.history.history()
    }

    /// Replace the history, e.g. with one the caller edited.
    ///
    /// The system prompt is re-checked on the next turn.
    pub fn set_history(&mut self, history: History) {
        self.history.set_history(history);
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Whether a turn is in flight
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }

    /// Start a turn.
    ///
    /// Injects the system prompt if needed, appends the user message and
    /// starts streaming. The returned [`Turn`] yields tagged chunks as they
    /// arrive; pass it to [`finish`](Self::finish) to commit the answer.
    /// Attaching images for a model without vision is not checked here.
    pub async fn ask(
        &mut self,
        prompt: impl Into<MessageContent>,
        model: &str,
    ) -> Result<Turn> {
        if self.is_busy() {
            return Err(PolainError::TurnInProgress);
        }

        if !self.registry.is_loaded() {
            // Failure is logged by the registry; lookups fall back to defaults.
            let _ = self.registry.load().await;
        }
        let definition = self.registry.lookup(model);

        self.history.ensure_system_prompt(model);
        let sent = self.history.append_user(prompt).clone();

        let request = ChatRequest::new(model, sent.messages().to_vec()).with_private(self.private);
        let splitter = ReasoningSplitter::with_tags(definition.reasoning, &self.tags);
        let (sender, receiver) = mpsc::channel(self.channel_capacity);

        self.next_token += 1;
        let token = self.next_token;
        self.active.store(token, Ordering::SeqCst);

        tracing::info!(
            model = %model,
            reasoning = definition.reasoning,
            messages = sent.len(),
            "starting turn"
        );

        let task = tokio::spawn(produce(
            Arc::clone(&self.transport),
            request,
            splitter,
            sender,
        ));
        self.abort = Some(task.abort_handle());

        Ok(Turn {
            receiver,
            accumulator: TurnAccumulator::new(),
            error: None,
            task,
            model: model.to_string(),
            sent,
            in_flight: InFlight {
                slot: Arc::clone(&self.active),
                token,
            },
        })
    }

    /// Drain a turn and commit the answer to history.
    ///
    /// The visible content is appended as the assistant message even when
    /// it is empty or the stream broke; reasoning is never stored. The
    /// result then reports, in order: a transport failure, an answer with
    /// no visible content ([`PolainError::EmptyResponse`]), or the output.
    /// A turn cut off by [`reset`](Self::reset) appends nothing and yields
    /// [`PolainError::TurnAbandoned`]. A turn started by another session is
    /// rejected with [`PolainError::InvalidInput`] and dropped.
    pub async fn finish(&mut self, mut turn: Turn) -> Result<TurnOutput> {
        if !Arc::ptr_eq(&turn.in_flight.slot, &self.active) {
            return Err(PolainError::InvalidInput(
                "turn was started by a different session".to_string(),
            ));
        }

        while turn.next().await.is_some() {}

        let token = turn.in_flight.token;
        if self.active.load(Ordering::SeqCst) != token {
            tracing::debug!(model = %turn.model, "turn was abandoned by a reset");
            return Err(PolainError::TurnAbandoned);
        }
        self.abort = None;

        let error = turn.error.take();
        let output = std::mem::take(&mut turn.accumulator).finish();
        drop(turn);

        self.history.append_assistant(output.content.clone());

        if let Some(e) = error {
            tracing::warn!("Turn ended with a transport error: {}", e);
            return Err(e);
        }
        if output.content.trim().is_empty() {
            tracing::warn!("Turn produced no visible content");
            return Err(PolainError::EmptyResponse);
        }

        tracing::info!(
            chars = output.content.len(),
            reasoning_chars = output.reasoning.len(),
            "turn finished"
        );
        Ok(output)
    }

    /// Start a new conversation.
    ///
    /// A turn in flight is stopped; its [`Turn`] ends early and
    /// [`finish`](Self::finish) reports it as abandoned.
    pub fn reset(&mut self) {
        if let Some(handle) = self.abort.take() {
            tracing::debug!("stopping turn in flight");
            handle.abort();
        }
        self.active.store(0, Ordering::SeqCst);
        self.history.reset();
    }
}

/// Background half of a turn: network read, decode, split, hand off
async fn produce(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    mut splitter: ReasoningSplitter,
    sender: mpsc::Sender<Result<StreamChunk>>,
) {
    let body = match transport.open_stream(&request).await {
        Ok(body) => body,
        Err(e) => {
            let _ = sender.send(Err(e)).await;
            return;
        }
    };

    let mut chunks = Box::pin(decode_stream(body));
    while let Some(item) = chunks.next().await {
        match item {
            Ok(chunk) => {
                for tagged in splitter.push(chunk) {
                    if sender.send(Ok(tagged)).await.is_err() {
                        tracing::debug!("turn receiver dropped, stopping producer");
                        return;
                    }
                }
            }
            Err(e) => {
                if let Some(rest) = splitter.flush() {
                    let _ = sender.send(Ok(rest)).await;
                }
                let _ = sender.send(Err(e)).await;
                return;
            }
        }
    }

    if let Some(rest) = splitter.flush() {
        let _ = sender.send(Ok(rest)).await;
    }
}

/// Clears the session's in-flight marker, unless a reset already did
#[derive(Debug)]
struct InFlight {
    slot: Arc<AtomicU64>,
    token: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.token, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// A turn in flight.
///
/// Yields the tagged chunks in arrival order. The stream ends at the
/// finish reason, at the end of the body, or at a transport error (kept for
/// [`ConversationSession::finish`]). Dropping a turn stops its producer and
/// closes the connection; history keeps the user message and gets no
/// assistant message.
#[derive(Debug)]
pub struct Turn {
    receiver: mpsc::Receiver<Result<StreamChunk>>,
    accumulator: TurnAccumulator,
    error: Option<PolainError>,
    task: JoinHandle<()>,
    model: String,
    sent: History,
    in_flight: InFlight,
}

impl Turn {
    pub fn model(&self) -> &str {
        &self.model
    }

    /// History as sent with the request (ending with the user message)
    pub fn history(&self) -> &History {
        &self.sent
    }

    /// Everything received so far, split into answer and reasoning
    pub fn accumulated(&self) -> &TurnAccumulator {
        &self.accumulator
    }

    /// Transport error that ended the stream, if any
    pub fn error(&self) -> Option<&PolainError> {
        self.error.as_ref()
    }

    /// Give up on the turn
    pub fn abandon(self) {
        tracing::info!(model = %self.model, "turn abandoned");
    }
}

impl Stream for Turn {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamChunk>> {
        let this = &mut *self;
        if this.error.is_some() {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.accumulator.push(&chunk);
                Poll::Ready(Some(chunk))
            }
            Poll::Ready(Some(Err(e))) => {
                this.error = Some(e);
                Poll::Ready(None)
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::llm::message::{Message, Role};
    use crate::llm::mock_provider::{sse_delta, MockResponse, MockTransport};
    use crate::models::ModelDefinition;

    use std::time::{Duration, Instant};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry() -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::from_models(vec![
            ModelDefinition::new("openai").with_vision(),
            ModelDefinition::new("deepseek-reasoning").with_reasoning(),
        ]))
    }

    fn session(transport: &MockTransport) -> ConversationSession {
        ConversationSession::new(Arc::new(transport.clone()), registry())
            .with_prompts(SystemPrompts::new("default prompt"))
    }

    async fn collect(turn: &mut Turn) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = turn.next().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_hello_turn_builds_history() {
        let transport =
            MockTransport::new().with_response(MockResponse::deltas("r1", &["Hel", "lo!"]));
        let mut session = session(&transport);

        let mut turn = session.ask("hello", "openai").await.unwrap();
        assert_eq!(turn.history().len(), 2);
        let chunks = collect(&mut turn).await;
        assert!(chunks.iter().all(|c| !c.thinking));
        assert!(chunks.last().unwrap().is_final());

        let output = session.finish(turn).await.unwrap();
        assert_eq!(output.content, "Hello!");
        assert_eq!(output.id.as_deref(), Some("r1"));
        assert_eq!(
            session.history().messages(),
            &[
                Message::system("default prompt"),
                Message::user("hello"),
                Message::assistant("Hello!"),
            ]
        );

        let request = &transport.recorded_requests()[0];
        assert!(request.stream);
        assert!(request.private);
        assert_eq!(request.model, "openai");
        assert_eq!(request.messages.len(), 2);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_reasoning_model_splits_and_stores_answer_only() {
        let transport = MockTransport::new().with_response(MockResponse::deltas(
            "r1",
            &["<think>", "plan", "</think>", "answer"],
        ));
        let mut session = session(&transport);

        let mut turn = session.ask("solve", "deepseek-reasoning").await.unwrap();
        let chunks = collect(&mut turn).await;
        let tagged: Vec<(&str, bool)> = chunks
            .iter()
            .map(|c| (c.content.as_str(), c.thinking))
            .collect();
        assert_eq!(
            &tagged[..4],
            &[("", true), ("plan", true), ("", true), ("answer", false)]
        );
        assert!(chunks.last().unwrap().is_final());

        let output = session.finish(turn).await.unwrap();
        assert_eq!(output.reasoning, "plan");
        assert_eq!(session.history().last(), Some(&Message::assistant("answer")));
    }

    #[tokio::test]
    async fn test_non_reasoning_model_keeps_tags() {
        let transport =
            MockTransport::new().with_response(MockResponse::deltas("r1", &["<think>x</think>"]));
        let mut session = session(&transport);

        let turn = session.ask("hi", "openai").await.unwrap();
        let output = session.finish(turn).await.unwrap();
        assert_eq!(output.content, "<think>x</think>");
        assert!(output.reasoning.is_empty());
    }

    #[tokio::test]
    async fn test_empty_response_appends_then_errors() {
        let transport =
            MockTransport::new().with_response(MockResponse::deltas("r1", &["  ", "\n"]));
        let mut session = session(&transport);

        let turn = session.ask("hi", "openai").await.unwrap();
        let err = session.finish(turn).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResponse);
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.history().last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_reasoning_only_response_is_empty() {
        let transport = MockTransport::new()
            .with_response(MockResponse::deltas("r1", &["<think>only thoughts</think>"]));
        let mut session = session(&transport);

        let turn = session.ask("hi", "deepseek-reasoning").await.unwrap();
        let err = session.finish(turn).await.unwrap_err();
        assert!(matches!(err, PolainError::EmptyResponse));
        assert_eq!(session.history().last(), Some(&Message::assistant("")));
    }

    #[tokio::test]
    async fn test_connect_error_yields_no_chunks() {
        let transport = MockTransport::new().with_response(MockResponse::connect_error("refused"));
        let mut session = session(&transport);

        let mut turn = session.ask("hi", "openai").await.unwrap();
        assert!(collect(&mut turn).await.is_empty());
        assert!(turn.error().is_some());

        let err = session.finish(turn).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(session.history().last(), Some(&Message::assistant("")));
    }

    #[tokio::test]
    async fn test_stream_error_keeps_partial_answer() {
        let transport = MockTransport::new().with_response(
            MockResponse::chunks([sse_delta("r1", "partial")]).with_stream_error("reset"),
        );
        let mut session = session(&transport);

        let turn = session.ask("hi", "openai").await.unwrap();
        let err = session.finish(turn).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(session.history().last(), Some(&Message::assistant("partial")));
    }

    #[tokio::test]
    async fn test_abandoned_turn_appends_nothing() {
        let transport = MockTransport::new()
            .with_response(MockResponse::chunks([sse_delta("r1", "partial")]).hanging());
        let mut session = session(&transport);

        let mut turn = session.ask("hi", "openai").await.unwrap();
        let len_after_user = session.history().len();
        assert_eq!(turn.next().await.unwrap().content, "partial");
        assert!(session.is_busy());

        turn.abandon();
        assert_eq!(session.history().len(), len_after_user);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_second_ask_while_in_flight_is_rejected() {
        let transport = MockTransport::new()
            .with_response(MockResponse::chunks([sse_delta("r1", "x")]).hanging());
        let mut session = session(&transport);

        let turn = session.ask("first", "openai").await.unwrap();
        let err = session.ask("second", "openai").await.unwrap_err();
        assert!(matches!(err, PolainError::TurnInProgress));
        assert_eq!(session.history().len(), 2);

        drop(turn);
        assert!(session.ask("third", "openai").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_mid_stream_abandons_turn() {
        let transport = MockTransport::new()
            .with_response(MockResponse::chunks([sse_delta("r1", "partial")]).hanging());
        let mut session = session(&transport);

        let turn = session.ask("hi", "openai").await.unwrap();
        session.reset();
        assert!(!session.is_busy());

        let err = session.finish(turn).await.unwrap_err();
        assert!(matches!(err, PolainError::TurnAbandoned));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_second_turn_replays_answer_not_reasoning() {
        let transport = MockTransport::new().with_responses(vec![
            MockResponse::deltas("r1", &["<think>secret</think>", "first"]),
            MockResponse::deltas("r2", &["second"]),
        ]);
        let mut session = session(&transport);

        let turn = session.ask("one", "deepseek-reasoning").await.unwrap();
        session.finish(turn).await.unwrap();
        let turn = session.ask("two", "deepseek-reasoning").await.unwrap();
        session.finish(turn).await.unwrap();

        let second = &transport.recorded_requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[0].role, Role::System);
        assert_eq!(second.messages[2].text(), "first");
        assert_eq!(session.history().len(), 5);
    }

    #[tokio::test]
    async fn test_small_channel_still_delivers_everything() {
        let deltas: Vec<String> = (0..50).map(|i| format!("{} ", i)).collect();
        let refs: Vec<&str> = deltas.iter().map(String::as_str).collect();
        let transport = MockTransport::new().with_response(MockResponse::deltas("r1", &refs));
        let mut session = session(&transport).with_channel_capacity(1);

        let turn = session.ask("count", "openai").await.unwrap();
        let output = session.finish(turn).await.unwrap();
        assert_eq!(output.content, deltas.concat());
    }

    #[tokio::test]
    async fn test_stalled_listing_does_not_hold_up_the_turn() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let registry = ModelRegistry::with_url(server.uri()).with_timeout(Duration::from_millis(200));

        let transport = MockTransport::new().with_response(MockResponse::deltas("r1", &["hi"]));
        let mut session = ConversationSession::new(Arc::new(transport), Arc::new(registry));

        let started = Instant::now();
        let turn = session.ask("hello", "openai").await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(session.finish(turn).await.unwrap().content, "hi");
    }

    #[tokio::test]
    async fn test_failed_listing_is_not_refetched_every_turn() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let transport = MockTransport::new().with_responses(vec![
            MockResponse::deltas("r1", &["one"]),
            MockResponse::deltas("r2", &["two"]),
            MockResponse::deltas("r3", &["three"]),
        ]);
        let mut session = ConversationSession::new(
            Arc::new(transport),
            Arc::new(ModelRegistry::with_url(server.uri())),
        );

        for _ in 0..3 {
            let turn = session.ask("again", "openai").await.unwrap();
            session.finish(turn).await.unwrap();
        }
        assert_eq!(session.history().len(), 7);
    }

    #[tokio::test]
    async fn test_turn_from_another_session_is_rejected() {
        let first = MockTransport::new().with_response(MockResponse::deltas("a", &["from a"]));
        let second = MockTransport::new().with_response(MockResponse::deltas("b", &["from b"]));
        let mut a = session(&first);
        let mut b = session(&second);

        let turn_a = a.ask("hi", "openai").await.unwrap();
        let turn_b = b.ask("hi", "openai").await.unwrap();

        let err = b.finish(turn_a).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(b.history().len(), 2);
        assert!(!a.is_busy());

        assert_eq!(b.finish(turn_b).await.unwrap().content, "from b");
        assert_eq!(b.history().last(), Some(&Message::assistant("from b")));
    }
}
