//! Droppable task handle for Actor processors

use std::future::Future;
use tokio::task::AbortHandle;

/// Handle to a spawned processor task. Dropping the handle aborts the task.
///
/// Actors share their handle through an `Arc`, so the processor keeps running
/// for as long as any clone of the owning Actor is alive.
#[derive(Debug)]
pub struct TaskHandle {
    abort_handle: AbortHandle,
}

impl TaskHandle {
    /// Spawns `future` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[track_caller]
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join_handle = tokio::spawn(future);
        Self {
            abort_handle: join_handle.abort_handle(),
        }
    }

    pub fn abort(&self) {
        self.abort_handle.abort();
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.abort_handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = TaskHandle::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(250)).await;
        drop(handle);
        let ticks_at_drop = ticks.load(Ordering::SeqCst);
        assert_eq!(ticks_at_drop, 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), ticks_at_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_finishes_task() {
        let handle = TaskHandle::spawn(std::future::pending());
        assert!(!handle.is_finished());

        handle.abort();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.is_finished());
    }
}
