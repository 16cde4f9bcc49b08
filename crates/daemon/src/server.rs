// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.
//!
//! Each connection is a session bound to a caller pid. A session may issue
//! any number of requests; a `Semop` holds the session until the batch
//! applies or fails. When the last session of a pid closes, the pid's
//! blocked batches are interrupted and its undo ledgers are applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use svsem_core::{
    Batch, CallerId, Cancellation, LocalSemaphoreSet, SemError, SetId, SetLimits, SetRegistry,
    SystemClock, TracedSemaphoreSet,
};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Caller recorded for administrative changes from an unidentified peer
const ANONYMOUS: CallerId = CallerId(0);

/// Semaphore sets plus the sessions attached to them
pub struct Broker {
    registry: SetRegistry,
    /// Open sessions per caller
    sessions: Mutex<HashMap<CallerId, usize>>,
    start_time: Instant,
    shutdown: Notify,
}

impl Broker {
    pub fn new(limits: SetLimits) -> Self {
        let registry = SetRegistry::with_factory(
            limits,
            Box::new(|id, key, nsems, limits| {
                Arc::new(TracedSemaphoreSet::new(LocalSemaphoreSet::with_clock(
                    id,
                    key,
                    nsems,
                    limits,
                    SystemClock,
                )))
            }),
        );
        Self {
            registry,
            sessions: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
            shutdown: Notify::new(),
        }
    }

    pub fn registry(&self) -> &SetRegistry {
        &self.registry
    }

    /// Number of batches blocked across all sets
    pub fn blocked(&self) -> usize {
        self.registry.blocked()
    }

    /// Resolves once a client has requested shutdown
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await
    }

    /// Number of open sessions for `caller`
    pub fn sessions(&self, caller: CallerId) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(&caller).copied().unwrap_or(0)
    }

    fn attach(&self, caller: CallerId) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        *sessions.entry(caller).or_insert(0) += 1;
    }

    /// Drop one session of `caller`; the last one reaps the caller
    fn release(&self, caller: CallerId) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(&caller) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                // Reap before the caller disappears so observers never see
                // a closed caller with pending undo
                self.reap(caller);
                sessions.remove(&caller);
            }
            None => {}
        }
    }

    /// Interrupt what `caller` still has blocked, then apply its undo ledgers
    pub fn reap(&self, caller: CallerId) {
        let woken = self.registry.interrupt(caller);
        let adjusted = self.registry.reap(caller);
        if woken > 0 || adjusted > 0 {
            info!(caller = %caller, woken, adjusted, "caller gone, undo applied");
        }
    }

    /// Handle a request that never blocks
    pub fn handle_request(&self, caller: Option<CallerId>, request: Request) -> Response {
        let caller = caller.unwrap_or(ANONYMOUS);
        match request {
            Request::Ping => Response::Pong,

            Request::Hello { .. } => Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            },

            Request::Status => Response::Status {
                uptime_secs: self.start_time.elapsed().as_secs(),
                sets: self.registry.len(),
                blocked: self.registry.blocked(),
            },

            Request::Shutdown => {
                self.shutdown.notify_one();
                Response::ShuttingDown
            }

            Request::Create {
                key,
                nsems,
                exclusive,
            } => match self.registry.create(key, nsems, exclusive) {
                Ok(id) => Response::Created { id },
                Err(error) => Response::Failed { error },
            },

            Request::Remove { id } => self.registry.remove(id).into(),

            Request::Show { id } => match self.registry.get(id) {
                Ok(set) => Response::Set {
                    set: set.snapshot(),
                },
                Err(error) => Response::Failed { error },
            },

            Request::List => Response::Sets {
                sets: self.registry.list(),
            },

            Request::SetValue { id, index, value } => self
                .registry
                .get(id)
                .and_then(|set| set.set_value(caller, index, value))
                .into(),

            Request::SetAll { id, values } => self
                .registry
                .get(id)
                .and_then(|set| set.set_all(caller, &values))
                .into(),

            Request::Semop { .. } => Response::Error {
                message: "semop must be sent on a session".to_string(),
            },

            Request::Interrupt { pid } => Response::Interrupted {
                woken: self.registry.interrupt(CallerId(pid)),
            },

            Request::NamedCreate {
                name,
                value,
                exclusive,
            } => match self.registry.create_named(caller, &name, value, exclusive) {
                Ok(id) => Response::Created { id },
                Err(error) => Response::Failed { error },
            },

            Request::NamedPost { name } => self.registry.post_named(caller, &name).into(),

            Request::NamedUnlink { name } => self.registry.unlink_named(&name).into(),
        }
    }
}

type Incoming = Result<Request, ProtocolError>;

/// One client connection
struct Session {
    broker: Arc<Broker>,
    caller: Option<CallerId>,
}

impl Session {
    fn new(broker: Arc<Broker>, caller: Option<CallerId>) -> Self {
        if let Some(caller) = caller {
            broker.attach(caller);
        }
        Self { broker, caller }
    }

    fn set_caller(&mut self, caller: CallerId) {
        if self.caller == Some(caller) {
            return;
        }
        self.broker.attach(caller);
        if let Some(previous) = self.caller.replace(caller) {
            self.broker.release(previous);
        }
    }

    async fn run(
        &mut self,
        requests: &mut mpsc::Receiver<Incoming>,
        writer: &mut OwnedWriteHalf,
    ) -> Result<(), ServerError> {
        while let Some(next) = requests.recv().await {
            let request = match next {
                Ok(request) => request,
                Err(ProtocolError::ConnectionClosed) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(ProtocolError::Timeout) => {
                    error!("Request read timeout");
                    return Err(ServerError::Timeout);
                }
                Err(e) => {
                    error!("Failed to read request: {}", e);
                    return Err(ServerError::Protocol(e));
                }
            };

            debug!("Received request: {:?}", request);

            let response = match request {
                Request::Hello { version, pid } => {
                    if let Some(pid) = pid {
                        self.set_caller(CallerId(pid));
                    }
                    debug!(client_version = %version, caller = ?self.caller, "hello");
                    Response::Hello {
                        version: PROTOCOL_VERSION.to_string(),
                    }
                }
                Request::Semop { id, ops } => match self.semop(id, ops, requests).await {
                    Some(response) => response,
                    // Client left while the batch was blocked
                    None => return Ok(()),
                },
                other => self.broker.handle_request(self.caller, other),
            };

            debug!("Sending response: {:?}", response);

            protocol::write_response(writer, &response, DEFAULT_TIMEOUT)
                .await
                .map_err(ServerError::Protocol)?;
        }
        Ok(())
    }

    /// Apply a batch on a blocking thread while watching the connection
    async fn semop(
        &self,
        id: SetId,
        ops: Batch,
        requests: &mut mpsc::Receiver<Incoming>,
    ) -> Option<Response> {
        let Some(caller) = self.caller else {
            return Some(Response::Error {
                message: "caller pid unknown; send Hello with a pid first".to_string(),
            });
        };

        let broker = Arc::clone(&self.broker);
        let cancel = Cancellation::new();
        let mut task = tokio::task::spawn_blocking({
            let cancel = cancel.clone();
            move || broker.registry().apply_cancellable(caller, id, &ops, &cancel)
        });

        tokio::select! {
            joined = &mut task => Some(match joined {
                Ok(result) => applied(result),
                Err(e) => Response::Error {
                    message: format!("semop task failed: {}", e),
                },
            }),
            // Anything arriving while blocked means the client gave up
            _ = requests.recv() => {
                // Covers a batch that has not parked yet as well as one that has
                cancel.cancel();
                self.broker.registry().wake(id);
                debug!(caller = %caller, set = %id, "client left while blocked");
                if let Ok(Ok(())) = task.await {
                    debug!(caller = %caller, set = %id, "batch applied after client left");
                }
                None
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(caller) = self.caller.take() {
            self.broker.release(caller);
        }
    }
}

/// Handle a single client connection until it closes
pub async fn handle_connection(broker: Arc<Broker>, stream: UnixStream) -> Result<(), ServerError> {
    let peer = stream
        .peer_cred()
        .ok()
        .and_then(|cred| cred.pid())
        .and_then(|pid| u32::try_from(pid).ok())
        .map(CallerId);

    let (mut reader, mut writer) = stream.into_split();

    // A separate reader notices the client leaving while a batch is blocked
    let (tx, mut requests) = mpsc::channel(1);
    let reader_task = tokio::spawn(async move {
        loop {
            let next = protocol::next_request(&mut reader, DEFAULT_TIMEOUT).await;
            let done = next.is_err();
            if tx.send(next).await.is_err() || done {
                break;
            }
        }
    });

    let mut session = Session::new(broker, peer);
    let result = session.run(&mut requests, &mut writer).await;
    reader_task.abort();
    drop(session);

    if let Err(e) = &result {
        warn!(caller = ?peer, "session ended: {}", e);
    }
    result
}

/// Map the outcome of a batch onto the wire
fn applied(result: Result<(), SemError>) -> Response {
    match result {
        Ok(()) => Response::Applied,
        Err(error) => Response::Failed { error },
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
