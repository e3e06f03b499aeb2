//! Local change notifications emitted after task mutations so connected
//! clients can observe updates in real time. Delivery is best-effort: a
//! send with no subscribers is not an error.

use serde::Serialize;
use tokio::sync::broadcast;
use ts_rs::TS;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum TaskEventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskEvent {
    pub board_id: Uuid,
    pub task_id: Uuid,
    pub kind: TaskEventKind,
}

impl TaskEvent {
    pub fn new(board_id: Uuid, task_id: Uuid, kind: TaskEventKind) -> Self {
        Self {
            board_id,
            task_id,
            kind,
        }
    }
}

#[derive(Clone)]
pub struct TaskEventPublisher {
    tx: broadcast::Sender<TaskEvent>,
}

impl TaskEventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}

impl Default for TaskEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
