//! One-shot background requests whose results are collected on the GUI thread.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::api_client::ApiClient;

/// The worker went away without sending a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLost;

impl fmt::Display for TaskLost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("background request was dropped")
    }
}

/// Receiving end of a request running on the runtime.
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    /// Non-blocking; `None` while the request is still running.
    pub fn poll(&mut self) -> Option<Result<T, TaskLost>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(TaskLost)),
        }
    }
}

/// Runs `fut` on the runtime and repaints once it has finished.
pub fn spawn<T, Fut>(runtime: &Handle, ctx: &egui::Context, fut: Fut) -> Pending<T>
where
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let ctx = ctx.clone();
    runtime.spawn(async move {
        // the receiver is gone when the view was closed meanwhile
        let _ = tx.send(fut.await);
        ctx.request_repaint();
    });
    Pending { rx }
}

/// An authenticated API client plus the runtime its requests run on.
#[derive(Clone)]
pub struct Backend {
    api: Arc<ApiClient>,
    runtime: Handle,
}

impl Backend {
    pub fn new(api: Arc<ApiClient>, runtime: Handle) -> Self {
        Self { api, runtime }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn spawn<T, F, Fut>(&self, ctx: &egui::Context, request: F) -> Pending<T>
    where
        F: FnOnce(Arc<ApiClient>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        spawn(&self.runtime, ctx, request(self.api.clone()))
    }
}
