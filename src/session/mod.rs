//! Per-server registration state.
//!
//! A [`Session`] owns the mutation registry, the single active response
//! observer, and a broadcast channel of observed responses. It is a cheap
//! cloneable handle; the HTTP pipeline and the test code hold clones of the
//! same session, and separate servers never share one.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use axum::http::StatusCode;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::body::ResponseBody;
use crate::mutation::{MutationEntry, Registry, StatusEntry};

pub mod scenario;

pub use scenario::{Scenario, ScenarioOverride};

const EVENT_BUFFER: usize = 64;

/// Callback receiving the final status and body of every response.
pub type Observer = Arc<dyn Fn(StatusCode, &ResponseBody) + Send + Sync>;

/// A response as it was handed to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedResponse {
    pub path: String,
    pub status: u16,
    pub body: ResponseBody,
}

struct SessionInner {
    registry: RwLock<Registry>,
    observer: RwLock<Observer>,
    events: broadcast::Sender<ObservedResponse>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(SessionInner {
                registry: RwLock::new(Registry::new()),
                observer: RwLock::new(noop_observer()),
                events,
            }),
        }
    }

    /// Start registering overrides for one literal request path.
    pub fn respond_to(&self, path: impl Into<String>) -> ResponseOverride {
        ResponseOverride {
            session: self.clone(),
            path: path.into(),
        }
    }

    /// Replace the response observer.
    pub fn on_response<F>(&self, observer: F) -> &Self
    where
        F: Fn(StatusCode, &ResponseBody) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = observer;
        self
    }

    /// Drop every registered override and detach the observer.
    pub fn reset(&self) -> &Self {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = noop_observer();
        log::debug!("[Session] Registry and observer reset");
        self
    }

    /// Receive every response handled after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ObservedResponse> {
        self.inner.events.subscribe()
    }

    /// Stream of observed responses; lagged items are skipped.
    pub fn stream(&self) -> impl Stream<Item = ObservedResponse> + Send + 'static {
        BroadcastStream::new(self.subscribe())
            .filter_map(|result| async move { result.ok() })
    }

    /// Snapshot of the current registry.
    pub fn registry(&self) -> Registry {
        self.with_registry(Registry::clone)
    }

    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&registry)
    }

    fn register(&self, f: impl FnOnce(&mut Registry)) {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut registry);
    }

    /// Hand the final response to the observer, then to subscribers.
    pub(crate) fn notify(&self, path: &str, status: StatusCode, body: &ResponseBody) {
        // Cloned out so the observer may re-register without deadlocking.
        let observer = self
            .inner
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        observer(status, body);

        let _ = self.inner.events.send(ObservedResponse {
            path: path.to_string(),
            status: status.as_u16(),
            body: body.clone(),
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry())
            .field("subscribers", &self.inner.events.receiver_count())
            .finish()
    }
}

fn noop_observer() -> Observer {
    Arc::new(|_, _| {})
}

/// Path-scoped registration builder returned by [`Session::respond_to`].
///
/// Each call records its entry immediately; the builder only carries the
/// path so calls can be chained.
#[derive(Debug, Clone)]
pub struct ResponseOverride {
    session: Session,
    path: String,
}

impl ResponseOverride {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Patch the fixture body at `pointer` with `value`.
    pub fn and_replace(self, pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        let entry = MutationEntry {
            path: self.path.clone(),
            pointer: pointer.into(),
            value: value.into(),
        };
        log::debug!(
            "[Session] Registered patch {} for {}",
            entry.pointer,
            entry.path
        );
        self.session.register(|registry| registry.add_mutation(entry));
        self
    }

    /// Answer this path with `status` instead of 200.
    pub fn with_status(self, status: u16) -> Self {
        let entry = StatusEntry {
            path: self.path.clone(),
            status,
        };
        log::debug!("[Session] Registered status {} for {}", status, self.path);
        self.session.register(|registry| registry.add_status(entry));
        self
    }
}
