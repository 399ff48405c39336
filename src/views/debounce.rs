//! Debounced search input.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Whether a settled search term should trigger a refresh.
///
/// Only the empty term and terms of at least three characters query.
pub fn should_query(term: &str) -> bool {
    let len = term.chars().count();
    len == 0 || len >= 3
}

/// Single-slot search input: only the latest keystroke is kept, and the
/// callback runs once the input has been quiet for the configured period.
pub struct SearchDebouncer {
    input: watch::Sender<Option<String>>,
    task: JoinHandle<()>,
}

impl SearchDebouncer {
    /// Start the debouncer. Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(quiet: Duration, on_settled: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (input, mut rx) = watch::channel(None::<String>);

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                loop {
                    match tokio::time::timeout(quiet, rx.changed()).await {
                        Ok(Ok(())) => continue,
                        Ok(Err(_)) => return,
                        Err(_) => break,
                    }
                }

                let term = rx.borrow_and_update().clone();
                match term {
                    Some(term) if should_query(&term) => on_settled(term).await,
                    Some(term) => tracing::trace!(%term, "Search term too short"),
                    None => {}
                }
            }
        });

        Self { input, task }
    }

    /// Replace the pending search term.
    pub fn push(&self, term: impl Into<String>) {
        self.input.send_replace(Some(term.into()));
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
