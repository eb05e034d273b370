//! # Task Queue
//!
//! The only path from a network context into the world context. Network
//! tasks push value-typed [`WorldTask`]s; the world loop pulls them one at a
//! time in arrival order. Perishable tasks that waited longer than
//! [`DISPATCHER_TASK_EXPIRATION_MS`] are dropped on pickup.
//!
//! # Example
//!
//! ```rust,no_run
//! use ots_game::dispatcher::{TaskQueue, WorldTask};
//! use ots_protocol::Urgency;
//!
//! # async fn demo() {
//! let (queue, mut receiver) = TaskQueue::new();
//! queue.enqueue(WorldTask::Think, Urgency::Normal).ok();
//! while let Some(task) = receiver.next().await {
//!     // apply `task` to the world
//! #   let _ = task;
//! }
//! # }
//! ```

use crate::error::{GameError, Result};
use crate::session::ConnectionHandle;
use ots_core::{AccountId, ClientOs, ConnectionId, CreatureId, PlayerGuid, DISPATCHER_TASK_EXPIRATION_MS};
use ots_protocol::{Command, Urgency};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Identity resolved by the first-message handshake
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub connection: ConnectionHandle,
    pub guid: PlayerGuid,
    pub account_id: AccountId,
    pub os: ClientOs,
    pub version: u16,
}

/// Work for the world context
#[derive(Debug, Clone)]
pub enum WorldTask {
    Login(LoginRequest),
    /// Attach a replacing connection once the grace delay has passed
    Connect {
        connection: ConnectionId,
        player: CreatureId,
    },
    Command {
        connection: ConnectionId,
        command: Command,
    },
    /// The transport of a connection closed
    Release {
        connection: ConnectionId,
    },
    Think,
}

#[derive(Debug)]
struct QueuedTask {
    task: WorldTask,
    urgency: Urgency,
    enqueued_at: Instant,
}

impl QueuedTask {
    fn new(task: WorldTask, urgency: Urgency) -> Self {
        Self {
            task,
            urgency,
            enqueued_at: Instant::now(),
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.urgency == Urgency::Perishable
            && now.duration_since(self.enqueued_at) > Duration::from_millis(DISPATCHER_TASK_EXPIRATION_MS)
    }
}

/// Sending half, cloned into every connection
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<QueuedTask>,
}

/// Receiving half, owned by the world loop
#[derive(Debug)]
pub struct TaskReceiver {
    rx: mpsc::UnboundedReceiver<QueuedTask>,
}

impl TaskQueue {
    pub fn new() -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, TaskReceiver { rx })
    }

    /// Queue a task behind everything already queued
    pub fn enqueue(&self, task: WorldTask, urgency: Urgency) -> Result<()> {
        self.tx
            .send(QueuedTask::new(task, urgency))
            .map_err(|_| GameError::QueueClosed)
    }

    /// Queue a task once `delay` has passed
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue_delayed(&self, task: WorldTask, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(QueuedTask::new(task, Urgency::Normal)).is_err() {
                tracing::debug!("World loop gone; delayed task dropped");
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl TaskReceiver {
    fn accept(queued: QueuedTask) -> Option<WorldTask> {
        if queued.is_stale(Instant::now()) {
            tracing::debug!("Dropping stale task: {:?}", queued.task);
            return None;
        }
        Some(queued.task)
    }

    /// Next live task; `None` once every sender is gone
    pub async fn next(&mut self) -> Option<WorldTask> {
        loop {
            let queued = self.rx.recv().await?;
            if let Some(task) = Self::accept(queued) {
                return Some(task);
            }
        }
    }

    /// Next live task if one is ready
    pub fn try_next(&mut self) -> Option<WorldTask> {
        while let Ok(queued) = self.rx.try_recv() {
            if let Some(task) = Self::accept(queued) {
                return Some(task);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(connection: u64) -> WorldTask {
        WorldTask::Command {
            connection: ConnectionId::new(connection),
            command: Command::ReceivePing,
        }
    }

    #[test]
    fn test_tasks_keep_order() {
        let (queue, mut receiver) = TaskQueue::new();
        for connection in 1..=3 {
            queue.enqueue(command(connection), Urgency::Normal).unwrap();
        }

        for expected in 1..=3 {
            match receiver.try_next() {
                Some(WorldTask::Command { connection, .. }) => assert_eq!(connection.get(), expected),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn test_stale_perishable_tasks_are_dropped() {
        let old = Instant::now() - Duration::from_millis(DISPATCHER_TASK_EXPIRATION_MS + 500);

        let stale = QueuedTask {
            task: command(1),
            urgency: Urgency::Perishable,
            enqueued_at: old,
        };
        assert!(TaskReceiver::accept(stale).is_none());

        let patient = QueuedTask {
            task: command(2),
            urgency: Urgency::Normal,
            enqueued_at: old,
        };
        assert!(TaskReceiver::accept(patient).is_some());

        let fresh = QueuedTask::new(command(3), Urgency::Perishable);
        assert!(TaskReceiver::accept(fresh).is_some());
    }

    #[test]
    fn test_closed_queue_reports_error() {
        let (queue, receiver) = TaskQueue::new();
        drop(receiver);
        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(WorldTask::Think, Urgency::Normal), Err(GameError::QueueClosed));
    }

    #[tokio::test]
    async fn test_delayed_task_arrives() {
        let (queue, mut receiver) = TaskQueue::new();
        queue.enqueue_delayed(WorldTask::Think, Duration::from_millis(10));
        let task = tokio::time::timeout(Duration::from_secs(1), receiver.next()).await;
        assert!(matches!(task, Ok(Some(WorldTask::Think))));
    }
}
