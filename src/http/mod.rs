//! HTTP surface of the mock server.
//!
//! [`MockServer`] owns one [`Session`] and at most one running Axum server
//! bound to it. Start and stop are idempotent; dropping the server signals
//! the listener to shut down.

mod routes;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;

use anyhow::Context;
use axum::http::StatusCode;
use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::body::ResponseBody;
use crate::config::ServerConfig;
use crate::fixtures::FixtureCatalog;
use crate::pipeline::ResponsePipeline;
use crate::session::{ResponseOverride, Session};

pub use routes::{build_router, cors_layer, run_http_server, serve_fixture, MockHttpState};

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

pub struct MockServer {
    config: ServerConfig,
    session: Session,
    running: Mutex<Option<RunningServer>>,
}

impl MockServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session: Session::new(),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn respond_to(&self, path: impl Into<String>) -> ResponseOverride {
        self.session.respond_to(path)
    }

    pub fn on_response<F>(&self, observer: F) -> &Self
    where
        F: Fn(StatusCode, &ResponseBody) + Send + Sync + 'static,
    {
        self.session.on_response(observer);
        self
    }

    pub fn reset(&self) -> &Self {
        self.session.reset();
        self
    }

    /// Router serving this server's fixtures and session, without a listener.
    pub fn router(&self) -> Router {
        let catalog = FixtureCatalog::new(self.config.fixtures_dir.clone());
        let pipeline = ResponsePipeline::new(catalog, self.session.clone());
        build_router(MockHttpState::new(pipeline, &self.config.cors), &self.config.cors)
    }

    /// Bind the configured address and start serving in the background.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// the port is 0. Calling this while already running returns the current
    /// address.
    pub async fn start(&self) -> anyhow::Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            if !server.task.is_finished() {
                warn!("Mock fixture server already running on {}", server.addr);
                return Ok(server.addr);
            }
        }

        let requested = self.config.socket_addr();
        let listener = TcpListener::bind(requested)
            .await
            .with_context(|| format!("binding mock fixture listener on {}", requested))?;
        let addr = listener
            .local_addr()
            .context("reading mock fixture listener address")?;

        let (shutdown, signal) = oneshot::channel();
        let task = tokio::spawn(run_http_server(listener, self.router(), signal));

        info!(
            "Mock fixture server listening on {} (fixtures: {})",
            addr,
            self.config.fixtures_dir.display()
        );
        *running = Some(RunningServer {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stop serving and wait for in-flight requests to finish.
    pub async fn stop(&self) -> anyhow::Result<()> {
        let Some(server) = self.running.lock().await.take() else {
            return Ok(());
        };

        let _ = server.shutdown.send(());
        server
            .task
            .await
            .context("joining mock fixture server task")??;
        info!("Mock fixture server on {} stopped", server.addr);
        Ok(())
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .await
            .as_ref()
            .filter(|server| !server.task.is_finished())
            .map(|server| server.addr)
    }

    pub async fn is_running(&self) -> bool {
        self.local_addr().await.is_some()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(server) = self.running.get_mut().take() {
            let _ = server.shutdown.send(());
        }
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}
