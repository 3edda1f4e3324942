// crates/engine/src/adapters/http.rs

//! Application-supplied HTTP transport.
//!
//! The engine never talks to the network itself: it hands a request (keyed
//! by a unique id) to the delegate's `send`, and the application later calls
//! [`RequestTracker::notify_response`] with the same id — from whatever
//! thread its transport completes on.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use url::Url;

use crate::domain::error::{EngineError, EngineResult, NetworkCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub id: RequestId,
  pub method: HttpMethod,
  pub url: Url,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub id: RequestId,
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

/// Application transport. `cancel` is advisory; a request already completed
/// may still be notified.
pub trait HttpDelegate: Send + Sync {
  fn send(&self, request: HttpRequest);
  fn cancel(&self, id: RequestId);
}

/// Correlates in-flight requests with their completions by request id.
#[derive(Debug, Default)]
pub struct RequestTracker {
  next_id: AtomicU64,
  pending: Mutex<HashMap<RequestId, mpsc::Sender<HttpResponse>>>,
}

impl RequestTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Allocate a request id and the channel its completion will arrive on.
  pub fn begin(&self) -> (RequestId, mpsc::Receiver<HttpResponse>) {
    let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = mpsc::channel();
    if let Ok(mut pending) = self.pending.lock() {
      pending.insert(id, tx);
    }
    (id, rx)
  }

  /// Deliver a completion. May be called from any thread.
  pub fn notify_response(&self, response: HttpResponse) -> EngineResult<()> {
    let sender = self
      .pending
      .lock()
      .ok()
      .and_then(|mut pending| pending.remove(&response.id));
    match sender {
      Some(tx) => {
        // A receiver dropped after timeout is not an error to the notifier.
        let _ = tx.send(response);
        Ok(())
      }
      None => Err(EngineError::BadInput(format!(
        "no pending request with id {}",
        response.id
      ))),
    }
  }

  /// Drop a pending request (after timeout or cancellation).
  pub fn forget(&self, id: RequestId) {
    if let Ok(mut pending) = self.pending.lock() {
      pending.remove(&id);
    }
  }

  /// Block for the completion of `id`, cancelling through the delegate on
  /// timeout.
  pub fn await_response(
    &self,
    id: RequestId,
    rx: &mpsc::Receiver<HttpResponse>,
    timeout: Duration,
    http: &dyn HttpDelegate,
  ) -> EngineResult<HttpResponse> {
    match rx.recv_timeout(timeout) {
      Ok(response) => Ok(response),
      Err(mpsc::RecvTimeoutError::Timeout) => {
        http.cancel(id);
        self.forget(id);
        Err(EngineError::Network {
          category: NetworkCategory::Timeout,
          http_status: None,
        })
      }
      Err(mpsc::RecvTimeoutError::Disconnected) => {
        self.forget(id);
        Err(EngineError::Cancelled)
      }
    }
  }
}
