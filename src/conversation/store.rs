//! Conversation store: the session's transcript and status snapshot, with
//! broadcast change notifications for whatever renders them.
//!
//! Operations take `&self` and may run concurrently. Every transcript
//! mutation happens inside one write section, so appends are serialized and
//! none are lost. Appends land in the order operations resolve, not the order
//! they were started.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use super::client::ProxyApi;
use crate::error::ClientError;
use crate::onboarding::{DayCompletion, Message, UserStatus};

/// Shown when the chat endpoint answers with an error status.
pub const ENDPOINT_FAILURE_REPLY: &str = "I'm having trouble responding. Please try again.";

/// Shown when the chat endpoint cannot be reached at all.
pub const TRANSPORT_FAILURE_REPLY: &str = "Error connecting to server. Please try again.";

const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Change notifications for observers of the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A message was appended at `index`.
    MessageAppended { index: usize, message: Message },
    /// The status snapshot was replaced.
    StatusReplaced(UserStatus),
    /// The session was shut down.
    Closed,
}

/// What a `send_message` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Input was blank; nothing appended, nothing sent.
    Skipped,
    /// The assistant's reply was appended.
    Replied,
    /// The proxy answered with an error; the endpoint fallback was appended.
    EndpointFailed,
    /// The proxy was unreachable; the connection fallback was appended.
    TransportFailed,
    /// The session closed before the reply arrived.
    Cancelled,
}

/// Owns one conversation session: transcript plus latest status.
pub struct ConversationStore {
    api: Arc<dyn ProxyApi>,
    transcript: RwLock<Vec<Message>>,
    status: RwLock<Option<UserStatus>>,
    tx: broadcast::Sender<StoreEvent>,
    closed: watch::Sender<bool>,
}

impl ConversationStore {
    /// Create an empty store. No network calls are made.
    pub fn new(api: Arc<dyn ProxyApi>) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            api,
            transcript: RwLock::new(Vec::new()),
            status: RwLock::new(None),
            tx,
            closed,
        })
    }

    /// Create a store and load the initial status snapshot.
    ///
    /// A failed initial fetch leaves the status absent; the session still
    /// starts.
    pub async fn start(api: Arc<dyn ProxyApi>) -> Arc<Self> {
        let store = Self::new(api);
        if let Err(e) = store.fetch_user_status().await {
            warn!(error = %e, "Initial status fetch failed");
        }
        store
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Change events as a stream. Lagged receivers yield an error item.
    pub fn changes(&self) -> BroadcastStream<StoreEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Snapshot of the transcript.
    pub async fn transcript(&self) -> Vec<Message> {
        self.transcript.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.transcript.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transcript.read().await.is_empty()
    }

    /// Latest known status, if any fetch has succeeded.
    pub async fn status(&self) -> Option<UserStatus> {
        self.status.read().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// End the session. In-flight calls resolve as cancelled and their
    /// results are discarded; later operations do nothing.
    pub fn shutdown(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        info!("Conversation session closed");
        // Ok if no observers are listening
        let _ = self.tx.send(StoreEvent::Closed);
    }

    /// Send a user message.
    ///
    /// The user's message is appended before the network call; exactly one
    /// assistant message (reply or fallback) follows once it resolves. The
    /// history sent upstream excludes the message being sent.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Skipped;
        }
        if self.is_closed() {
            return SendOutcome::Cancelled;
        }

        let memory = {
            let mut transcript = self.transcript.write().await;
            let memory = transcript.clone();
            self.push_locked(&mut transcript, Message::user(text));
            memory
        };

        match self.guarded(self.api.chat(text, &memory)).await {
            Ok(reply) => {
                self.append(Message::assistant(reply)).await;
                SendOutcome::Replied
            }
            Err(ClientError::Cancelled) => {
                debug!("Reply discarded, session closed");
                SendOutcome::Cancelled
            }
            Err(ClientError::Status { status, message }) => {
                warn!(status, %message, "Chat endpoint failed");
                self.append(Message::assistant(ENDPOINT_FAILURE_REPLY)).await;
                SendOutcome::EndpointFailed
            }
            Err(e) => {
                warn!(error = %e, "Failed to send message");
                self.append(Message::assistant(TRANSPORT_FAILURE_REPLY)).await;
                SendOutcome::TransportFailed
            }
        }
    }

    /// Mark the current onboarding day complete.
    ///
    /// On success the server's confirmation is appended and the status is
    /// refreshed. On failure nothing is appended; the error is returned for
    /// the caller to surface.
    pub async fn mark_day_complete(&self) -> Result<DayCompletion, ClientError> {
        let completion = self
            .guarded(self.api.mark_day_complete())
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to mark day complete"))?;

        self.append(Message::assistant(completion.message.clone()))
            .await;

        if let Err(e) = self.fetch_user_status().await {
            debug!(error = %e, "Status refresh after day completion failed");
        }

        Ok(completion)
    }

    /// Refresh the status snapshot. On failure the previous snapshot stays.
    pub async fn fetch_user_status(&self) -> Result<UserStatus, ClientError> {
        let status = self
            .guarded(self.api.user_status())
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to fetch user status"))?;

        *self.status.write().await = Some(status.clone());
        debug!(step = status.onboarding_step, "Status replaced");
        let _ = self.tx.send(StoreEvent::StatusReplaced(status.clone()));

        Ok(status)
    }

    /// Fetch the export document. The transcript is not touched.
    pub async fn export_data(&self) -> Result<serde_json::Value, ClientError> {
        self.guarded(self.api.export_data()).await
    }

    async fn append(&self, message: Message) {
        let mut transcript = self.transcript.write().await;
        self.push_locked(&mut transcript, message);
    }

    fn push_locked(&self, transcript: &mut Vec<Message>, message: Message) {
        let index = transcript.len();
        transcript.push(message.clone());
        let _ = self.tx.send(StoreEvent::MessageAppended { index, message });
    }

    /// Run a proxy call unless the session closes first.
    async fn guarded<T, F>(&self, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        if self.is_closed() {
            return Err(ClientError::Cancelled);
        }
        let closed = self.closed.subscribe();
        tokio::select! {
            result = call => {
                if self.is_closed() {
                    Err(ClientError::Cancelled)
                } else {
                    result
                }
            }
            () = wait_closed(closed) => Err(ClientError::Cancelled),
        }
    }
}

async fn wait_closed(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Store dropped; the call branch decides.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::Notify;

    enum ChatBehavior {
        Echo,
        Status(u16),
        Unreachable,
    }

    /// Scripted proxy for store tests.
    struct StubProxy {
        chat: ChatBehavior,
        status_ok: Mutex<bool>,
        mark_ok: bool,
        chat_calls: AtomicUsize,
        status_calls: AtomicUsize,
        memories: Mutex<Vec<Vec<Message>>>,
        gate: Option<Arc<Notify>>,
        step: AtomicUsize,
    }

    impl StubProxy {
        fn new(chat: ChatBehavior) -> Self {
            Self {
                chat,
                status_ok: Mutex::new(true),
                mark_ok: true,
                chat_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
                memories: Mutex::new(Vec::new()),
                gate: None,
                step: AtomicUsize::new(2),
            }
        }

        fn status_json(step: usize) -> UserStatus {
            serde_json::from_value(serde_json::json!({
                "username": "alice",
                "onboarding_step": step,
                "onboarding_complete": step == 7,
                "created_at": "2024-03-01T09:30:00",
                "last_message_at": "2024-03-02T10:00:00"
            }))
            .unwrap()
        }
    }

    #[async_trait]
    impl ProxyApi for StubProxy {
        async fn chat(&self, message: &str, memory: &[Message]) -> Result<String, ClientError> {
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            self.memories.lock().unwrap().push(memory.to_vec());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.chat {
                ChatBehavior::Echo => Ok(format!("echo: {message}")),
                ChatBehavior::Status(status) => Err(ClientError::Status {
                    status,
                    message: "Failed to generate response".into(),
                }),
                ChatBehavior::Unreachable => {
                    Err(ClientError::Transport("connection refused".into()))
                }
            }
        }

        async fn user_status(&self) -> Result<UserStatus, ClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if *self.status_ok.lock().unwrap() {
                Ok(Self::status_json(self.step.load(Ordering::SeqCst)))
            } else {
                Err(ClientError::Status {
                    status: 500,
                    message: "Failed to fetch status".into(),
                })
            }
        }

        async fn mark_day_complete(&self) -> Result<DayCompletion, ClientError> {
            if !self.mark_ok {
                return Err(ClientError::Status {
                    status: 500,
                    message: "Failed to process request".into(),
                });
            }
            let step = self.step.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(DayCompletion {
                status: Self::status_json(step),
                message: format!("Day {step}/7 unlocked"),
                extra: Default::default(),
            })
        }

        async fn export_data(&self) -> Result<serde_json::Value, ClientError> {
            Ok(serde_json::json!({"user": {"username": "alice"}}))
        }
    }

    #[tokio::test]
    async fn send_appends_user_then_reply() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::new(api.clone());

        let outcome = store.send_message("  hello there  ").await;
        assert_eq!(outcome, SendOutcome::Replied);

        let transcript = store.transcript().await;
        assert_eq!(
            transcript,
            vec![
                Message::user("hello there"),
                Message::assistant("echo: hello there"),
            ]
        );
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::new(api.clone());

        for input in ["", "   ", "\n\t "] {
            assert_eq!(store.send_message(input).await, SendOutcome::Skipped);
        }
        assert!(store.is_empty().await);
        assert_eq!(api.chat_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn each_send_grows_transcript_by_two() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::new(api.clone());

        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            store.send_message(text).await;
            assert_eq!(store.len().await, (i + 1) * 2);
        }
    }

    #[tokio::test]
    async fn memory_excludes_the_message_being_sent() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::new(api.clone());

        store.send_message("first").await;
        store.send_message("second").await;

        let memories = api.memories.lock().unwrap().clone();
        assert!(memories[0].is_empty());
        assert_eq!(
            memories[1],
            vec![Message::user("first"), Message::assistant("echo: first")]
        );
        assert!(!memories[1].contains(&Message::user("second")));
    }

    #[tokio::test]
    async fn user_message_appears_before_reply_resolves() {
        let gate = Arc::new(Notify::new());
        let mut stub = StubProxy::new(ChatBehavior::Echo);
        stub.gate = Some(gate.clone());
        let store = ConversationStore::new(Arc::new(stub));

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.send_message("are you there?").await }
        });

        // Wait until the optimistic append is visible.
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.len().await < 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("user message never appeared");

        assert_eq!(store.transcript().await, vec![Message::user("are you there?")]);

        gate.notify_one();
        assert_eq!(pending.await.unwrap(), SendOutcome::Replied);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn endpoint_failure_uses_endpoint_fallback() {
        let store = ConversationStore::new(Arc::new(StubProxy::new(ChatBehavior::Status(500))));

        assert_eq!(store.send_message("hi").await, SendOutcome::EndpointFailed);
        let transcript = store.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1], Message::assistant(ENDPOINT_FAILURE_REPLY));
    }

    #[tokio::test]
    async fn transport_failure_uses_connection_fallback() {
        let store = ConversationStore::new(Arc::new(StubProxy::new(ChatBehavior::Unreachable)));

        assert_eq!(store.send_message("hi").await, SendOutcome::TransportFailed);
        let transcript = store.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1], Message::assistant(TRANSPORT_FAILURE_REPLY));
        assert_ne!(ENDPOINT_FAILURE_REPLY, TRANSPORT_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn start_fetches_status_once() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::start(api.clone()).await;

        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.status().await.unwrap().onboarding_step, 2);
    }

    #[tokio::test]
    async fn failed_status_fetch_keeps_previous_snapshot() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::start(api.clone()).await;
        let before = store.status().await;
        assert!(before.is_some());

        *api.status_ok.lock().unwrap() = false;
        assert!(store.fetch_user_status().await.is_err());
        assert_eq!(store.status().await, before);
    }

    #[tokio::test]
    async fn failed_initial_fetch_leaves_status_absent() {
        let stub = StubProxy::new(ChatBehavior::Echo);
        *stub.status_ok.lock().unwrap() = false;
        let store = ConversationStore::start(Arc::new(stub)).await;
        assert!(store.status().await.is_none());
    }

    #[tokio::test]
    async fn mark_day_complete_appends_confirmation_and_refreshes() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::start(api.clone()).await;

        let completion = store.mark_day_complete().await.unwrap();
        assert_eq!(completion.message, "Day 3/7 unlocked");
        assert_eq!(
            store.transcript().await,
            vec![Message::assistant("Day 3/7 unlocked")]
        );
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.status().await.unwrap().onboarding_step, 3);
    }

    #[tokio::test]
    async fn mark_day_complete_failure_is_reported_not_appended() {
        let mut stub = StubProxy::new(ChatBehavior::Echo);
        stub.mark_ok = false;
        let api = Arc::new(stub);
        let store = ConversationStore::start(api.clone()).await;

        let err = store.mark_day_complete().await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
        assert!(store.is_empty().await);
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_operations_lose_no_appends() {
        let api = Arc::new(StubProxy::new(ChatBehavior::Echo));
        let store = ConversationStore::new(api.clone());

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.send_message(&format!("msg {i}")).await;
            }));
        }
        let marker = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_day_complete().await.is_ok() })
        };
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(marker.await.unwrap());

        let transcript = store.transcript().await;
        assert_eq!(transcript.len(), 21);
        for i in 0..10 {
            let text = format!("msg {i}");
            assert!(transcript.contains(&Message::user(text.clone())));
            assert!(transcript.contains(&Message::assistant(format!("echo: {text}"))));
        }
    }

    #[tokio::test]
    async fn events_follow_appends_in_order() {
        let store = ConversationStore::new(Arc::new(StubProxy::new(ChatBehavior::Echo)));
        let mut rx = store.subscribe();

        store.send_message("ping").await;

        match rx.recv().await.unwrap() {
            StoreEvent::MessageAppended { index, message } => {
                assert_eq!(index, 0);
                assert_eq!(message, Message::user("ping"));
            }
            other => panic!("Expected MessageAppended, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            StoreEvent::MessageAppended { index, message } => {
                assert_eq!(index, 1);
                assert_eq!(message, Message::assistant("echo: ping"));
            }
            other => panic!("Expected MessageAppended, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_refresh_is_broadcast() {
        let store = ConversationStore::new(Arc::new(StubProxy::new(ChatBehavior::Echo)));
        let mut changes = store.changes();

        store.fetch_user_status().await.unwrap();

        match changes.next().await.unwrap().unwrap() {
            StoreEvent::StatusReplaced(status) => assert_eq!(status.username, "alice"),
            other => panic!("Expected StatusReplaced, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_discards_in_flight_reply() {
        let gate = Arc::new(Notify::new());
        let mut stub = StubProxy::new(ChatBehavior::Echo);
        stub.gate = Some(gate.clone());
        let store = ConversationStore::new(Arc::new(stub));

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.send_message("bye").await }
        });
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.len().await < 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        store.shutdown();
        assert_eq!(pending.await.unwrap(), SendOutcome::Cancelled);
        assert_eq!(store.transcript().await, vec![Message::user("bye")]);

        // Closed sessions ignore further input.
        assert_eq!(store.send_message("again").await, SendOutcome::Cancelled);
        assert!(matches!(
            store.fetch_user_status().await,
            Err(ClientError::Cancelled)
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn export_does_not_touch_transcript() {
        let store = ConversationStore::new(Arc::new(StubProxy::new(ChatBehavior::Echo)));
        let doc = store.export_data().await.unwrap();
        assert_eq!(doc["user"]["username"], "alice");
        assert!(store.is_empty().await);
    }
}
