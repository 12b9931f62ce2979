//! Matches responses to the requests waiting for them.
//!
//! Every outbound request or batch registers a one-shot completion under its id.
//! Inbound responses are routed by removing that entry, so each caller is resolved
//! at most once and unknown ids fall through untouched.

use std::collections::{HashMap, hash_map::Entry};

use obsws_lib::protocol::{RequestBatchResponse, RequestId, RequestResponse};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ClientError;

pub(crate) type Completion<T> = oneshot::Receiver<Result<T, ClientError>>;

enum Pending {
    Single(oneshot::Sender<Result<RequestResponse, ClientError>>),
    Batch(oneshot::Sender<Result<RequestBatchResponse, ClientError>>),
}

#[derive(Default)]
pub(crate) struct Correlator {
    pending: Mutex<HashMap<RequestId, Pending>>,
}

impl Correlator {
    pub(crate) fn register_request(&self, id: RequestId) -> Completion<RequestResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, Pending::Single(tx));
        rx
    }

    pub(crate) fn register_batch(&self, id: RequestId) -> Completion<RequestBatchResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, Pending::Batch(tx));
        rx
    }

    pub(crate) fn complete_request(&self, response: RequestResponse) -> bool {
        let mut pending = self.pending.lock();
        let Entry::Occupied(entry) = pending.entry(response.request_id.clone()) else {
            debug!("no pending request for id {}", response.request_id);
            return false;
        };
        if !matches!(entry.get(), Pending::Single(_)) {
            return false;
        }
        match entry.remove() {
            Pending::Single(tx) => tx.send(Ok(response)).is_ok(),
            Pending::Batch(_) => false,
        }
    }

    pub(crate) fn complete_batch(&self, response: RequestBatchResponse) -> bool {
        let mut pending = self.pending.lock();
        let Entry::Occupied(entry) = pending.entry(response.request_id.clone()) else {
            debug!("no pending batch for id {}", response.request_id);
            return false;
        };
        if !matches!(entry.get(), Pending::Batch(_)) {
            return false;
        }
        match entry.remove() {
            Pending::Batch(tx) => tx.send(Ok(response)).is_ok(),
            Pending::Single(_) => false,
        }
    }

    /// Resolves the entry for `id` with `error`, whatever kind it is.
    pub(crate) fn fail(&self, id: &RequestId, error: ClientError) -> bool {
        let Some(pending) = self.pending.lock().remove(id) else {
            debug!("no pending request for id {}", id);
            return false;
        };
        match pending {
            Pending::Single(tx) => tx.send(Err(error)).is_ok(),
            Pending::Batch(tx) => tx.send(Err(error)).is_ok(),
        }
    }

    /// Drops the entry for `id` without resolving it.
    pub(crate) fn forget(&self, id: &RequestId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    /// Fails every outstanding request; returns how many there were.
    pub(crate) fn fail_all(&self, error: impl Fn() -> ClientError) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            match pending {
                Pending::Single(tx) => {
                    let _ = tx.send(Err(error()));
                }
                Pending::Batch(tx) => {
                    let _ = tx.send(Err(error()));
                }
            }
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}
