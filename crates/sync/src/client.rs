//! Offline-durable sync client.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

use parlor_core::records::ChatRecord;
use parlor_core::sync::{
    ConnectionState, ConnectionStatus, SyncFrame, SyncQueueItem, OFFLINE_QUEUE_STORAGE_KEY,
    RECONNECT_INTERVAL_SECS,
};

use crate::error::{Result, SyncError};
use crate::events::{EventBus, SubscriptionToken, SyncEvent, SyncEventKind};
use crate::persist::KeyValuePersistence;
use crate::queue::OfflineQueue;
use crate::transport::{FrameSink, FrameStream, Transport};

/// Configuration for the sync client.
#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    /// Fixed delay between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Storage key the offline queue is persisted under.
    pub queue_storage_key: String,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(RECONNECT_INTERVAL_SECS),
            queue_storage_key: OFFLINE_QUEUE_STORAGE_KEY.to_string(),
        }
    }
}

/// What `send` did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Transmitted over the live channel.
    Sent,
    /// Appended to the durable offline queue.
    Queued,
}

/// Offline-durable sync client.
///
/// Owns the connection lifecycle, the durable offline queue, and the event
/// bus. Constructed once at the composition root with an injected
/// [`Transport`] and [`KeyValuePersistence`]; cheap to clone, clones share
/// state.
///
/// Mutations reach the remote on a best-effort basis: callers write to the
/// local record store first and only then hand the mutation to this
/// client, so nothing here is ever the sole copy of user data.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    persistence: Arc<dyn KeyValuePersistence>,
    events: EventBus,
    config: SyncClientConfig,
    state: Mutex<ClientState>,
    sink: tokio::sync::Mutex<Option<Box<dyn FrameSink>>>,
}

struct ClientState {
    enabled: bool,
    connection: ConnectionState,
    queue: OfflineQueue,
    flush_in_progress: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Create a client and restore the offline queue from persistence, so
    /// a reload never loses queued mutations. The client starts disabled.
    pub fn new(
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn KeyValuePersistence>,
        config: SyncClientConfig,
    ) -> Self {
        let queue = OfflineQueue::load(persistence.as_ref(), &config.queue_storage_key);
        if !queue.is_empty() {
            info!("[Sync] Restored {} queued mutation(s)", queue.len());
        }
        Self {
            inner: Arc::new(ClientInner {
                transport,
                persistence,
                events: EventBus::new(),
                config,
                state: Mutex::new(ClientState {
                    enabled: false,
                    connection: ConnectionState::Disconnected,
                    queue,
                    flush_in_progress: false,
                    reconnect_timer: None,
                    reader_task: None,
                }),
                sink: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Allow the client to hold a live connection and start connecting.
    pub async fn enable_sync(&self) {
        {
            let mut state = self.lock_state();
            if state.enabled {
                return;
            }
            state.enabled = true;
        }
        info!("[Sync] Sync enabled");
        self.connect().await;
    }

    /// Force-disconnect and suppress automatic reconnection until
    /// `enable_sync` is called again. Cancels any pending reconnect timer
    /// deterministically. The offline queue is left untouched.
    pub async fn disable_sync(&self) {
        let was_connected;
        {
            let mut state = self.lock_state();
            state.enabled = false;
            was_connected = state.connection == ConnectionState::Connected;
            state.connection = ConnectionState::Disconnected;
            if let Some(timer) = state.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(reader) = state.reader_task.take() {
                reader.abort();
            }
        }
        self.inner.sink.lock().await.take();
        info!("[Sync] Sync disabled");
        if was_connected {
            self.inner.events.emit(&SyncEvent::Disconnected);
        }
    }

    /// Register a handler for one event kind.
    pub fn subscribe(
        &self,
        kind: SyncEventKind,
        handler: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.inner.events.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.events.unsubscribe(token)
    }

    /// Connectivity state plus the current queue length.
    pub fn connection_status(&self) -> ConnectionStatus {
        let state = self.lock_state();
        ConnectionStatus {
            enabled: state.enabled,
            state: state.connection,
            queued_items: state.queue.len(),
        }
    }

    /// Transmit a frame now if connected, otherwise append it to the
    /// durable offline queue (persisted before this returns). Transport
    /// failures degrade to queueing; they never surface as errors.
    pub async fn send(&self, frame: SyncFrame) -> SendOutcome {
        if self.connection_state() == ConnectionState::Connected {
            let send_result = {
                let mut sink = self.inner.sink.lock().await;
                match sink.as_mut() {
                    Some(sink) => sink.send(&frame).await,
                    None => Err(SyncError::ConnectionClosed),
                }
            };
            match send_result {
                Ok(()) => return SendOutcome::Sent,
                Err(err) => {
                    warn!("[Sync] Send failed, queueing: {}", err);
                    self.handle_connection_lost(true).await;
                }
            }
        }
        self.enqueue(frame);
        SendOutcome::Queued
    }

    /// Best-effort immediate sync of one chat.
    ///
    /// On failure the mutation is queued for later replay and the error is
    /// returned, so the caller can show "saved locally, pending network"
    /// while still trusting durability.
    pub async fn sync_chat(&self, chat: &ChatRecord) -> Result<()> {
        match self.inner.transport.sync_chat(chat).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.send(SyncFrame::ChatChanged { chat: chat.clone() }).await;
                Err(err)
            }
        }
    }

    /// Best-effort immediate sync of one setting. Same failure contract as
    /// [`SyncClient::sync_chat`].
    pub async fn sync_setting(&self, key: &str, value: Value) -> Result<()> {
        match self.inner.transport.sync_setting(key, &value).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.send(SyncFrame::SettingChanged {
                    key: key.to_string(),
                    value,
                })
                .await;
                Err(err)
            }
        }
    }

    /// Every chat the remote service holds. The remote is a supplementary
    /// source of truth behind the local store: failures degrade to an
    /// empty list.
    pub async fn get_all_chats(&self) -> Vec<ChatRecord> {
        match self.inner.transport.fetch_all_chats().await {
            Ok(chats) => chats,
            Err(err) => {
                warn!("[Sync] Failed to fetch remote chats: {}", err);
                Vec::new()
            }
        }
    }

    /// Every setting the remote service holds; failures degrade to an
    /// empty map.
    pub async fn get_all_settings(&self) -> BTreeMap<String, Value> {
        match self.inner.transport.fetch_all_settings().await {
            Ok(settings) => settings,
            Err(err) => {
                warn!("[Sync] Failed to fetch remote settings: {}", err);
                BTreeMap::new()
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn connection_state(&self) -> ConnectionState {
        self.lock_state().connection
    }

    /// Append to the queue tail and persist synchronously.
    fn enqueue(&self, frame: SyncFrame) {
        let mut state = self.lock_state();
        state.queue.push_back(SyncQueueItem::new(frame));
        state.queue.persist(self.inner.persistence.as_ref());
        debug!("[Sync] Queued mutation ({} pending)", state.queue.len());
    }

    async fn connect(&self) {
        {
            let mut state = self.lock_state();
            if !state.enabled || state.connection != ConnectionState::Disconnected {
                return;
            }
            state.connection = ConnectionState::Connecting;
        }

        match self.inner.transport.connect().await {
            Ok((sink, stream)) => {
                *self.inner.sink.lock().await = Some(sink);
                let reader = tokio::spawn({
                    let client = self.clone();
                    async move { client.read_loop(stream).await }
                });
                let disabled_meanwhile = {
                    let mut state = self.lock_state();
                    if state.enabled {
                        state.connection = ConnectionState::Connected;
                        state.reader_task = Some(reader);
                        false
                    } else {
                        reader.abort();
                        true
                    }
                };
                if disabled_meanwhile {
                    self.inner.sink.lock().await.take();
                    return;
                }
                info!("[Sync] Connected");
                self.inner.events.emit(&SyncEvent::Connected);
                self.flush_queue().await;
            }
            Err(err) => {
                warn!("[Sync] Connect failed: {}", err);
                self.lock_state().connection = ConnectionState::Disconnected;
                self.schedule_reconnect();
            }
        }
    }

    async fn read_loop(self, mut stream: Box<dyn FrameStream>) {
        loop {
            match stream.next().await {
                Some(Ok(frame)) => self.handle_frame(frame),
                Some(Err(err)) => {
                    warn!("[Sync] Transport read error: {}", err);
                    break;
                }
                None => {
                    debug!("[Sync] Channel closed by remote");
                    break;
                }
            }
        }
        self.handle_connection_lost(false).await;
    }

    fn handle_frame(&self, frame: SyncFrame) {
        self.inner.events.emit(&SyncEvent::Message(frame.clone()));
        let event = match frame {
            SyncFrame::ChatChanged { chat } => SyncEvent::ChatChanged(chat),
            SyncFrame::SettingChanged { key, value } => SyncEvent::SettingChanged { key, value },
            SyncFrame::BulkImport => SyncEvent::BulkImport,
            SyncFrame::AllDataCleared => SyncEvent::AllDataCleared,
        };
        self.inner.events.emit(&event);
    }

    /// Transition to `disconnected` and schedule a reconnect if allowed.
    ///
    /// `abort_reader` must be false when called from the reader task
    /// itself, which is already terminating.
    async fn handle_connection_lost(&self, abort_reader: bool) {
        let was_connected;
        {
            let mut state = self.lock_state();
            if !state.enabled && state.connection == ConnectionState::Disconnected {
                return; // disable_sync already tore everything down
            }
            was_connected = state.connection == ConnectionState::Connected;
            state.connection = ConnectionState::Disconnected;
            match state.reader_task.take() {
                Some(reader) if abort_reader => reader.abort(),
                _ => {}
            }
        }
        self.inner.sink.lock().await.take();
        if was_connected {
            self.inner.events.emit(&SyncEvent::Disconnected);
        }
        self.schedule_reconnect();
    }

    /// Schedule exactly one reconnect attempt after the fixed interval.
    fn schedule_reconnect(&self) {
        let mut state = self.lock_state();
        if !state.enabled || state.reconnect_timer.is_some() {
            return;
        }
        let delay = self.inner.config.reconnect_interval;
        debug!("[Sync] Reconnecting in {:?}", delay);
        let client = self.clone();
        state.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.lock_state().reconnect_timer = None;
            client.connect().await;
        }));
    }

    /// Drain the offline queue head-to-tail over the live connection.
    ///
    /// Only ever triggered by the transition into `connected`; the
    /// in-progress flag guards against re-entrant callbacks. A
    /// transmission failure pushes the failed item back onto the front of
    /// the queue and stops the flush until the next successful connect.
    async fn flush_queue(&self) {
        {
            let mut state = self.lock_state();
            if state.flush_in_progress || state.queue.is_empty() {
                return;
            }
            state.flush_in_progress = true;
        }

        let mut sent = 0_usize;
        let mut failed = false;
        loop {
            let item = { self.lock_state().queue.pop_front() };
            let Some(item) = item else { break };

            let result = {
                let mut sink = self.inner.sink.lock().await;
                match sink.as_mut() {
                    Some(sink) => sink.send(&item.frame).await,
                    None => Err(SyncError::ConnectionClosed),
                }
            };
            match result {
                Ok(()) => sent += 1,
                Err(err) => {
                    warn!("[Sync] Flush interrupted after {} item(s): {}", sent, err);
                    self.lock_state().queue.push_front(item);
                    failed = true;
                    break;
                }
            }
        }

        {
            let mut state = self.lock_state();
            state.queue.persist(self.inner.persistence.as_ref());
            state.flush_in_progress = false;
        }
        if sent > 0 {
            info!("[Sync] Flushed {} queued mutation(s)", sent);
        }
        if failed {
            self.handle_connection_lost(true).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryKeyValueStore;
    use crate::transport::FrameSink;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct MockSink {
        sent: Arc<Mutex<Vec<SyncFrame>>>,
        failures_left: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSink for MockSink {
        async fn send(&mut self, frame: &SyncFrame) -> Result<()> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SyncError::ConnectionClosed);
            }
            self.sent.lock().expect("sent lock").push(frame.clone());
            Ok(())
        }
    }

    struct MockStream {
        rx: mpsc::UnboundedReceiver<SyncFrame>,
    }

    #[async_trait]
    impl FrameStream for MockStream {
        async fn next(&mut self) -> Option<Result<SyncFrame>> {
            self.rx.recv().await.map(Ok)
        }
    }

    /// Scriptable in-memory transport.
    struct MockTransport {
        /// Outcome per connect attempt, head first; empty means success.
        connect_plan: Mutex<VecDeque<bool>>,
        connects: AtomicUsize,
        sent: Arc<Mutex<Vec<SyncFrame>>>,
        /// Number of channel sends that fail before sends succeed again.
        send_failures: Arc<AtomicUsize>,
        /// When set, the request/response endpoints fail.
        requests_fail: AtomicBool,
        inbound: Mutex<Option<mpsc::UnboundedSender<SyncFrame>>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connect_plan: Mutex::new(VecDeque::new()),
                connects: AtomicUsize::new(0),
                sent: Arc::new(Mutex::new(Vec::new())),
                send_failures: Arc::new(AtomicUsize::new(0)),
                requests_fail: AtomicBool::new(false),
                inbound: Mutex::new(None),
            })
        }

        fn plan_connects(&self, outcomes: &[bool]) {
            *self.connect_plan.lock().expect("plan lock") = outcomes.iter().copied().collect();
        }

        fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        fn sent_frames(&self) -> Vec<SyncFrame> {
            self.sent.lock().expect("sent lock").clone()
        }

        fn push_inbound(&self, frame: SyncFrame) {
            let guard = self.inbound.lock().expect("inbound lock");
            guard
                .as_ref()
                .expect("live channel")
                .send(frame)
                .expect("push inbound frame");
        }

        /// Drop the inbound sender: the client's reader sees a close.
        fn close_channel(&self) {
            self.inbound.lock().expect("inbound lock").take();
        }

        fn request_error() -> SyncError {
            SyncError::api(502, "remote service offline")
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&self) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let planned_ok = self
                .connect_plan
                .lock()
                .expect("plan lock")
                .pop_front()
                .unwrap_or(true);
            if !planned_ok {
                return Err(SyncError::ConnectionClosed);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.inbound.lock().expect("inbound lock") = Some(tx);
            Ok((
                Box::new(MockSink {
                    sent: self.sent.clone(),
                    failures_left: self.send_failures.clone(),
                }),
                Box::new(MockStream { rx }),
            ))
        }

        async fn sync_chat(&self, chat: &ChatRecord) -> Result<()> {
            if self.requests_fail.load(Ordering::SeqCst) {
                return Err(Self::request_error());
            }
            self.sent
                .lock()
                .expect("sent lock")
                .push(SyncFrame::ChatChanged { chat: chat.clone() });
            Ok(())
        }

        async fn sync_setting(&self, key: &str, value: &Value) -> Result<()> {
            if self.requests_fail.load(Ordering::SeqCst) {
                return Err(Self::request_error());
            }
            self.sent.lock().expect("sent lock").push(SyncFrame::SettingChanged {
                key: key.to_string(),
                value: value.clone(),
            });
            Ok(())
        }

        async fn fetch_all_chats(&self) -> Result<Vec<ChatRecord>> {
            if self.requests_fail.load(Ordering::SeqCst) {
                return Err(Self::request_error());
            }
            Ok(Vec::new())
        }

        async fn fetch_all_settings(&self) -> Result<BTreeMap<String, Value>> {
            if self.requests_fail.load(Ordering::SeqCst) {
                return Err(Self::request_error());
            }
            Ok(BTreeMap::new())
        }
    }

    fn test_config() -> SyncClientConfig {
        SyncClientConfig {
            reconnect_interval: Duration::from_millis(10),
            queue_storage_key: "test.offline-queue".to_string(),
        }
    }

    fn client_with(
        transport: Arc<MockTransport>,
        persistence: Arc<MemoryKeyValueStore>,
    ) -> SyncClient {
        SyncClient::new(transport, persistence, test_config())
    }

    fn setting_frame(key: &str) -> SyncFrame {
        SyncFrame::SettingChanged {
            key: key.to_string(),
            value: serde_json::json!(1),
        }
    }

    fn chat_record(id: &str) -> ChatRecord {
        ChatRecord {
            id: id.to_string(),
            title: "t".to_string(),
            model: None,
            messages: Vec::new(),
            created_at: 1,
            updated_at: 2,
        }
    }

    fn record_events(client: &SyncClient) -> Arc<Mutex<Vec<SyncEventKind>>> {
        let log: Arc<Mutex<Vec<SyncEventKind>>> = Arc::new(Mutex::new(Vec::new()));
        for kind in [SyncEventKind::Connected, SyncEventKind::Disconnected] {
            let sink = log.clone();
            client.subscribe(kind, move |event| {
                sink.lock().expect("event log lock").push(event.kind());
            });
        }
        log
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn offline_mutations_flush_in_fifo_order() {
        let transport = MockTransport::new();
        let persistence = Arc::new(MemoryKeyValueStore::new());
        let client = client_with(transport.clone(), persistence);

        for key in ["a", "b", "c"] {
            assert_eq!(client.send(setting_frame(key)).await, SendOutcome::Queued);
        }
        assert_eq!(client.connection_status().queued_items, 3);

        client.enable_sync().await;

        assert_eq!(
            transport.sent_frames(),
            vec![setting_frame("a"), setting_frame("b"), setting_frame("c")]
        );
        assert_eq!(client.connection_status().queued_items, 0);
    }

    #[tokio::test]
    async fn queue_survives_a_reload() {
        let transport = MockTransport::new();
        let persistence = Arc::new(MemoryKeyValueStore::new());

        {
            let client = client_with(transport.clone(), persistence.clone());
            client.send(setting_frame("pending")).await;
        }

        // New client over the same persistence, as after a process restart.
        let restored = client_with(transport.clone(), persistence);
        assert_eq!(restored.connection_status().queued_items, 1);

        restored.enable_sync().await;
        assert_eq!(transport.sent_frames(), vec![setting_frame("pending")]);
        assert_eq!(restored.connection_status().queued_items, 0);
    }

    #[tokio::test]
    async fn failed_connect_schedules_exactly_one_retry() {
        let transport = MockTransport::new();
        transport.plan_connects(&[false, true]);
        let client = client_with(transport.clone(), Arc::new(MemoryKeyValueStore::new()));
        let events = record_events(&client);

        client.send(setting_frame("queued-offline")).await;
        client.enable_sync().await;
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(
            client.connection_status().state,
            ConnectionState::Disconnected
        );

        let probe = transport.clone();
        wait_until(move || probe.sent_frames().len() == 1).await;

        assert_eq!(transport.connect_count(), 2);
        assert_eq!(client.connection_status().state, ConnectionState::Connected);
        // One flush per reconnection: the queued item went out exactly once.
        assert_eq!(transport.sent_frames(), vec![setting_frame("queued-offline")]);
        assert_eq!(
            *events.lock().expect("event log lock"),
            vec![SyncEventKind::Connected]
        );
    }

    #[tokio::test]
    async fn channel_close_emits_disconnected_and_reconnects() {
        let transport = MockTransport::new();
        let client = client_with(transport.clone(), Arc::new(MemoryKeyValueStore::new()));
        let events = record_events(&client);

        client.enable_sync().await;
        assert_eq!(client.connection_status().state, ConnectionState::Connected);

        transport.close_channel();
        let probe = events.clone();
        wait_until(move || probe.lock().expect("event log lock").len() == 3).await;

        assert_eq!(transport.connect_count(), 2);
        assert_eq!(client.connection_status().state, ConnectionState::Connected);
        assert_eq!(
            *events.lock().expect("event log lock"),
            vec![
                SyncEventKind::Connected,
                SyncEventKind::Disconnected,
                SyncEventKind::Connected
            ]
        );
    }

    #[tokio::test]
    async fn mid_flush_failure_preserves_order_across_reconnect() {
        let transport = MockTransport::new();
        let client = client_with(transport.clone(), Arc::new(MemoryKeyValueStore::new()));

        for key in ["a", "b", "c"] {
            client.send(setting_frame(key)).await;
        }
        // First channel send fails: "a" goes back to the front of the queue.
        transport.send_failures.store(1, Ordering::SeqCst);

        client.enable_sync().await;
        let probe = transport.clone();
        wait_until(move || probe.sent_frames().len() == 3).await;

        assert_eq!(
            transport.sent_frames(),
            vec![setting_frame("a"), setting_frame("b"), setting_frame("c")]
        );
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(client.connection_status().queued_items, 0);
    }

    #[tokio::test]
    async fn disable_cancels_the_pending_reconnect_timer() {
        let transport = MockTransport::new();
        transport.plan_connects(&[false]);
        let client = SyncClient::new(
            transport.clone(),
            Arc::new(MemoryKeyValueStore::new()),
            SyncClientConfig {
                reconnect_interval: Duration::from_millis(30),
                queue_storage_key: "test.offline-queue".to_string(),
            },
        );

        client.enable_sync().await;
        assert_eq!(transport.connect_count(), 1);

        client.disable_sync().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The timer was cancelled: no stray reconnect fired.
        assert_eq!(transport.connect_count(), 1);
        let status = client.connection_status();
        assert!(!status.enabled);
        assert_eq!(status.state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disable_does_not_clear_the_queue() {
        let transport = MockTransport::new();
        let client = client_with(transport, Arc::new(MemoryKeyValueStore::new()));

        client.send(setting_frame("keep-me")).await;
        client.disable_sync().await;

        assert_eq!(client.connection_status().queued_items, 1);
    }

    #[tokio::test]
    async fn send_while_connected_transmits_immediately() {
        let transport = MockTransport::new();
        let client = client_with(transport.clone(), Arc::new(MemoryKeyValueStore::new()));
        client.enable_sync().await;

        let outcome = client.send(setting_frame("live")).await;

        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(client.connection_status().queued_items, 0);
        assert_eq!(transport.sent_frames(), vec![setting_frame("live")]);
    }

    #[tokio::test]
    async fn sync_chat_failure_queues_and_rethrows() {
        let transport = MockTransport::new();
        transport.requests_fail.store(true, Ordering::SeqCst);
        let client = client_with(transport, Arc::new(MemoryKeyValueStore::new()));

        let err = client
            .sync_chat(&chat_record("c1"))
            .await
            .expect_err("request must fail");

        assert_eq!(err.status_code(), Some(502));
        // The mutation is still durably queued for later replay.
        assert_eq!(client.connection_status().queued_items, 1);
    }

    #[tokio::test]
    async fn read_queries_degrade_to_empty_results() {
        let transport = MockTransport::new();
        transport.requests_fail.store(true, Ordering::SeqCst);
        let client = client_with(transport, Arc::new(MemoryKeyValueStore::new()));

        assert!(client.get_all_chats().await.is_empty());
        assert!(client.get_all_settings().await.is_empty());
    }

    #[tokio::test]
    async fn inbound_frames_reach_subscribers_in_order() {
        let transport = MockTransport::new();
        let client = client_with(transport.clone(), Arc::new(MemoryKeyValueStore::new()));

        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let message_sink = log.clone();
        client.subscribe(SyncEventKind::Message, move |_| {
            message_sink.lock().expect("log lock").push("message".to_string());
        });
        let chat_sink = log.clone();
        client.subscribe(SyncEventKind::ChatChanged, move |event| {
            if let SyncEvent::ChatChanged(chat) = event {
                chat_sink
                    .lock()
                    .expect("log lock")
                    .push(format!("chat:{}", chat.id));
            }
        });
        let cleared_sink = log.clone();
        client.subscribe(SyncEventKind::AllDataCleared, move |_| {
            cleared_sink.lock().expect("log lock").push("cleared".to_string());
        });

        client.enable_sync().await;
        transport.push_inbound(SyncFrame::ChatChanged {
            chat: chat_record("remote-1"),
        });
        transport.push_inbound(SyncFrame::AllDataCleared);

        let probe = log.clone();
        wait_until(move || probe.lock().expect("log lock").len() == 4).await;

        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["message", "chat:remote-1", "message", "cleared"]
        );
    }
}
