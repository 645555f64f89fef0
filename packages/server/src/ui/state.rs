//! Shared application state.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use kakehashi_shared::time::Clock;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    domain::{ConnectionRegistry, ProtocolClient, RoomRepository},
    usecase::{
        ConnectClientUseCase, DisconnectClientUseCase, ForwardClientMessageUseCase,
        GetRoomsUseCase, HandleProtocolEventUseCase, RelayQueue,
    },
};

/// Number of recent transaction ids remembered for de-duplication
const TRANSACTION_LOG_CAPACITY: usize = 1024;

/// Shared application state
pub struct AppState {
    /// Event Ingress (homeserver → store / relay queue)
    pub handle_protocol_event_usecase: Arc<HandleProtocolEventUseCase>,
    /// Register a WebSocket connection
    pub connect_client_usecase: Arc<ConnectClientUseCase>,
    /// Deregister a WebSocket connection
    pub disconnect_client_usecase: Arc<DisconnectClientUseCase>,
    /// Ingress-from-Client (WebSocket → homeserver)
    pub forward_client_message_usecase: Arc<ForwardClientMessageUseCase>,
    /// Room listing
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// Registry, read by the debug endpoint
    pub registry: Arc<dyn ConnectionRegistry>,
    /// Token the homeserver must present on pushed transactions
    pub hs_token: String,
    /// Recently processed transaction ids
    pub transactions: TransactionLog,
    /// Raised once on process shutdown
    pub shutdown: watch::Receiver<bool>,
}

/// Collaborators needed to build an [`AppState`]
pub struct Dependencies {
    pub repository: Arc<dyn RoomRepository>,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub protocol_client: Arc<dyn ProtocolClient>,
    pub relay_queue: RelayQueue,
    pub clock: Arc<dyn Clock>,
    pub hs_token: String,
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(deps: Dependencies) -> Self {
        Self {
            handle_protocol_event_usecase: Arc::new(HandleProtocolEventUseCase::new(
                deps.repository.clone(),
                deps.relay_queue,
                deps.clock,
            )),
            connect_client_usecase: Arc::new(ConnectClientUseCase::new(deps.registry.clone())),
            disconnect_client_usecase: Arc::new(DisconnectClientUseCase::new(
                deps.registry.clone(),
            )),
            forward_client_message_usecase: Arc::new(ForwardClientMessageUseCase::new(
                deps.protocol_client,
            )),
            get_rooms_usecase: Arc::new(GetRoomsUseCase::new(deps.repository)),
            registry: deps.registry,
            hs_token: deps.hs_token,
            transactions: TransactionLog::new(TRANSACTION_LOG_CAPACITY),
            shutdown: deps.shutdown,
        }
    }
}

/// Bounded memory of processed transaction ids.
///
/// The homeserver retries a transaction until it is acknowledged, so the same
/// id can arrive more than once. An id is recorded only after every event in
/// it has been handled; an attempt that is cancelled part way (the homeserver
/// dropped the request) leaves it unrecorded so the retry is processed again.
pub struct TransactionLog {
    capacity: usize,
    inner: Mutex<TransactionLogInner>,
}

#[derive(Default)]
struct TransactionLogInner {
    completed: HashSet<String>,
    order: VecDeque<String>,
    in_progress: HashSet<String>,
}

/// Result of trying to start processing a transaction
pub enum TransactionStart<'a> {
    /// Not seen before; process it and call [`TransactionGuard::complete`]
    Started(TransactionGuard<'a>),
    /// Already fully processed
    Completed,
    /// Another request with the same id is still being processed
    InProgress,
}

impl TransactionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(TransactionLogInner::default()),
        }
    }

    /// Mark `txn_id` as in progress unless it is completed or already running.
    pub fn begin(&self, txn_id: &str) -> TransactionStart<'_> {
        let mut inner = self.inner.lock();
        if inner.completed.contains(txn_id) {
            return TransactionStart::Completed;
        }
        if !inner.in_progress.insert(txn_id.to_string()) {
            return TransactionStart::InProgress;
        }
        TransactionStart::Started(TransactionGuard {
            log: self,
            txn_id: txn_id.to_string(),
            completed: false,
        })
    }

    fn finish(&self, txn_id: &str, completed: bool) {
        let mut inner = self.inner.lock();
        inner.in_progress.remove(txn_id);
        if !completed || !inner.completed.insert(txn_id.to_string()) {
            return;
        }
        inner.order.push_back(txn_id.to_string());
        if inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.completed.remove(&oldest);
            }
        }
    }
}

/// Holds a transaction id in progress; dropping it without
/// [`complete`](Self::complete) releases the id unrecorded.
pub struct TransactionGuard<'a> {
    log: &'a TransactionLog,
    txn_id: String,
    completed: bool,
}

impl TransactionGuard<'_> {
    /// Record the transaction as fully processed
    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.log.finish(&self.txn_id, self.completed);
    }
}
