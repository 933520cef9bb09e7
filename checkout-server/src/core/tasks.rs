//! Background task management
//!
//! Registers long-running tasks, wraps them to catch panics, and shuts
//! them down together through a shared cancellation token.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Long-lived background worker
    Worker,
    /// Timer-driven maintenance task
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Background task registry
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for tasks to observe the shutdown signal
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register and start a background task
    ///
    /// The future is wrapped to catch panics; a panicking task is
    /// logged, never silently lost.
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let wrapped = async move {
            let result: Result<(), Box<dyn std::any::Any + Send>> =
                AssertUnwindSafe(future).catch_unwind().await;
            if let Err(panic_info) = result {
                let message = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(task = %name, kind = %kind, "Background task panicked: {message}");
            }
        };

        tracing::info!(task = %name, kind = %kind, "Background task started");
        self.tasks.push(RegisteredTask {
            name,
            kind,
            handle: tokio::spawn(wrapped),
        });
    }

    /// Move the registered tasks out, leaving an empty registry
    ///
    /// Lets callers hold the registry behind a sync lock and still
    /// await shutdown outside the lock.
    pub fn take_all(&mut self) -> BackgroundTasks {
        BackgroundTasks {
            tasks: std::mem::take(&mut self.tasks),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Signal shutdown and wait (bounded) for every task to exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            match tokio::time::timeout(Duration::from_secs(5), task.handle).await {
                Ok(_) => {
                    tracing::info!(task = %task.name, kind = %task.kind, "Background task stopped")
                }
                Err(_) => {
                    tracing::warn!(
                        task = %task.name,
                        kind = %task.kind,
                        "Background task did not stop in time, aborting"
                    );
                }
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
