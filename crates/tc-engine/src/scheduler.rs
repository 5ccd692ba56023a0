//! Deferred hard removal, keyed by entity id.
//!
//! Scheduling spawns one sleeping task per entity. When the delay elapses
//! the id is sent on the due channel; the owner then calls
//! [`RemovalScheduler::complete`] and, only if that returns true, removes the
//! entity. A cancelled or already-completed id never completes twice.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct RemovalScheduler {
    delay: Duration,
    pending: HashMap<Uuid, CancellationToken>,
    due_tx: mpsc::UnboundedSender<Uuid>,
    /// Parent of every task token; cancelling it stops them all.
    root: CancellationToken,
}

impl RemovalScheduler {
    pub fn new(delay: Duration, root: CancellationToken) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            delay,
            pending: HashMap::new(),
            due_tx,
            root,
        };
        (scheduler, due_rx)
    }

    /// Returns false when `id` is already pending.
    pub fn schedule(&mut self, id: Uuid) -> bool {
        if self.pending.contains_key(&id) {
            return false;
        }
        let token = self.root.child_token();
        let task_token = token.clone();
        let tx = self.due_tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(id);
                }
            }
        });
        self.pending.insert(id, token);
        tracing::debug!(%id, delay_ms = delay.as_millis() as u64, "removal scheduled");
        true
    }

    /// Claim a due id. False if it was cancelled or already claimed.
    pub fn complete(&mut self, id: Uuid) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn cancel(&mut self, id: Uuid) -> bool {
        match self.pending.remove(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, token) in self.pending.drain() {
            token.cancel();
        }
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for RemovalScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (mut scheduler, mut due) = RemovalScheduler::new(DELAY, CancellationToken::new());
        let id = Uuid::new_v4();
        assert!(scheduler.schedule(id));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(due.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(due.recv().await, Some(id));
        assert!(scheduler.complete(id));
        assert!(!scheduler.complete(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_schedule_is_noop() {
        let (mut scheduler, mut due) = RemovalScheduler::new(DELAY, CancellationToken::new());
        let id = Uuid::new_v4();
        assert!(scheduler.schedule(id));
        assert!(!scheduler.schedule(id));
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(due.recv().await, Some(id));
        assert!(due.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (mut scheduler, mut due) = RemovalScheduler::new(DELAY, CancellationToken::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        scheduler.schedule(a);
        scheduler.schedule(b);
        assert!(scheduler.cancel(a));
        assert!(!scheduler.cancel(a));

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(due.recv().await, Some(b));
        assert!(due.try_recv().is_err());
        assert!(!scheduler.is_pending(a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_root_cancel_stops_everything() {
        let root = CancellationToken::new();
        let (mut scheduler, mut due) = RemovalScheduler::new(DELAY, root.clone());
        scheduler.schedule(Uuid::new_v4());
        scheduler.schedule(Uuid::new_v4());
        root.cancel();

        tokio::time::sleep(DELAY * 2).await;
        assert!(due.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_after_complete() {
        let (mut scheduler, mut due) = RemovalScheduler::new(DELAY, CancellationToken::new());
        let id = Uuid::new_v4();
        scheduler.schedule(id);
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(due.recv().await, Some(id));
        assert!(scheduler.complete(id));
        assert!(scheduler.schedule(id));
    }
}
