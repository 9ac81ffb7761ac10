//! Mode worker lifecycle.
//!
//! Each behavior mode owns one or more workers. A worker is a thread with
//! a shared stop flag; stopping sets the flag and joins, so a worker is
//! fully terminated before the caller proceeds. Workers are also joined
//! on drop to prevent thread leaks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct Worker {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a named worker. The closure receives the stop flag and must
    /// check it at least once per polling interval.
    pub fn spawn<F>(name: &str, body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_for_thread))
            .ok();
        if handle.is_none() {
            tracing::error!(worker = name, "failed to spawn worker thread");
        }
        Self {
            name: name.to_string(),
            stop,
            handle,
        }
    }

    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Signal stop and block until the thread has fully exited.
    pub fn stop_and_join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(worker = %self.name, "worker joined"),
                Err(e) => tracing::warn!(worker = %self.name, ?e, "worker panicked during shutdown"),
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.join_inner();
    }
}
