//! The store task and the contract the ranking layer consumes.
//!
//! ## single owner
//!
//! One tokio task exclusively owns the [`Keyspace`]. Every message (a
//! single request, a batch, or a script) runs to completion inside that
//! task before the next one is looked at. That is the whole atomicity
//! story: no mutex, no optimistic retry, and no reader ever observes half
//! of a batch.
//!
//! ## per-message oneshot replies
//!
//! Each [`StoreMessage`] carries its own reply channel, so callers wait
//! only on their own future and there is no shared response queue.
//!
//! ## backpressure via bounded channel
//!
//! The mpsc buffer bounds how many submissions can be queued. Senders
//! wait for capacity instead of growing an unbounded queue.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::keyspace::Keyspace;
use crate::request::{dispatch, StoreRequest, StoreResponse};
use crate::script::Script;

/// Default channel buffer. Large enough to absorb bursts without putting
/// meaningful back-pressure on callers.
const STORE_BUFFER: usize = 256;

/// The ordered-set store capability contract.
///
/// Implementations must execute each submission atomically: a batch
/// applies all of its requests with nothing interleaved, and a script's
/// steps see no concurrent writes. Errors are transport failures; the
/// store guarantees that a failed submission applied fully or not at all.
pub trait OrderedSetStore: Clone + Send + Sync + 'static {
    /// Executes a single request.
    fn execute(
        &self,
        request: StoreRequest,
    ) -> impl Future<Output = Result<StoreResponse, StoreError>> + Send;

    /// Executes requests in order as one atomic unit. Replies match the
    /// request order.
    fn execute_batch(
        &self,
        requests: Vec<StoreRequest>,
    ) -> impl Future<Output = Result<Vec<StoreResponse>, StoreError>> + Send;

    /// Evaluates a script as one atomic unit and returns its output.
    fn eval<S: Script>(&self, script: S) -> impl Future<Output = Result<S::Output, StoreError>> + Send;
}

/// Configuration for the in-process store task.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// mpsc channel capacity for pending submissions.
    pub buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            buffer: STORE_BUFFER,
        }
    }
}

type ScriptJob = Box<dyn FnOnce(&mut Keyspace) + Send>;

/// A submission bundled with its reply channel.
enum StoreMessage {
    Single {
        request: StoreRequest,
        reply: oneshot::Sender<StoreResponse>,
    },
    Batch {
        requests: Vec<StoreRequest>,
        reply: oneshot::Sender<Vec<StoreResponse>>,
    },
    /// A type-erased script; the closure owns its own reply channel.
    Script(ScriptJob),
}

/// A cloneable handle for submitting work to the store task.
///
/// `Clone` is cheap: it wraps the mpsc sender. The task shuts down once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreMessage>,
}

impl std::fmt::Debug for StoreMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreMessage::Single { request, .. } => f.debug_tuple("Single").field(request).finish(),
            StoreMessage::Batch { requests, .. } => {
                f.debug_tuple("Batch").field(&requests.len()).finish()
            }
            StoreMessage::Script(_) => f.write_str("Script"),
        }
    }
}

impl StoreHandle {
    async fn submit(&self, msg: StoreMessage) -> Result<(), StoreError> {
        self.tx.send(msg).await.map_err(|_| StoreError::Unavailable)
    }
}

impl OrderedSetStore for StoreHandle {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.submit(StoreMessage::Single { request, reply }).await?;
        rx.await.map_err(|_| StoreError::Unavailable)
    }

    async fn execute_batch(
        &self,
        requests: Vec<StoreRequest>,
    ) -> Result<Vec<StoreResponse>, StoreError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let (reply, rx) = oneshot::channel();
        self.submit(StoreMessage::Batch { requests, reply }).await?;
        rx.await.map_err(|_| StoreError::Unavailable)
    }

    async fn eval<S: Script>(&self, script: S) -> Result<S::Output, StoreError> {
        let (reply, rx) = oneshot::channel();
        let job: ScriptJob = Box::new(move |ks: &mut Keyspace| {
            // the caller may have given up waiting; nothing to do then
            let _ = reply.send(script.run(ks));
        });
        self.submit(StoreMessage::Script(job)).await?;
        rx.await.map_err(|_| StoreError::Unavailable)
    }
}

/// Spawns the store task on the current tokio runtime and returns the
/// handle for talking to it.
pub fn spawn_store(config: StoreConfig) -> StoreHandle {
    let (tx, rx) = mpsc::channel(config.buffer.max(1));
    tokio::spawn(run_store(rx));
    StoreHandle { tx }
}

/// The store's main loop. Returns when every handle has been dropped.
async fn run_store(mut rx: mpsc::Receiver<StoreMessage>) {
    let mut keyspace = Keyspace::new();
    info!("store task started");

    while let Some(msg) = rx.recv().await {
        process_message(msg, &mut keyspace);

        // drain whatever queued up while we were busy before awaiting again
        while let Ok(msg) = rx.try_recv() {
            process_message(msg, &mut keyspace);
        }
    }

    info!(keys = keyspace.len(), "store task stopped");
}

fn process_message(msg: StoreMessage, keyspace: &mut Keyspace) {
    match msg {
        StoreMessage::Single { request, reply } => {
            let _ = reply.send(dispatch(keyspace, &request));
        }
        StoreMessage::Batch { requests, reply } => {
            debug!(requests = requests.len(), "executing batch");
            let responses = requests
                .iter()
                .map(|request| dispatch(keyspace, request))
                .collect();
            let _ = reply.send(responses);
        }
        StoreMessage::Script(job) => job(keyspace),
    }
}
