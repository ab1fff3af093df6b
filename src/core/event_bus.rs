//! Run events for external observers (streaming gateways, dashboards).
//! Emission is fire-and-forget: a full or absent channel never blocks or
//! fails the run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainEvent {
    ChainStarted {
        chain_id: String,
        execution_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        node_id: String,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    NodeFinished {
        node_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    BranchSelected {
        node_id: String,
        branch: String,
        timestamp: DateTime<Utc>,
    },
    ChainCompleted {
        chain_id: String,
        execution_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Cheap cloneable sender wrapper; a `None` channel makes every emit a
/// no-op so the hot path pays nothing without listeners.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    tx: Option<mpsc::Sender<ChainEvent>>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<ChainEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn emit(&self, event: ChainEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Create a bounded event channel for one run.
pub fn create_event_channel() -> (mpsc::Sender<ChainEvent>, mpsc::Receiver<ChainEvent>) {
    mpsc::channel(256)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let (tx, mut rx) = create_event_channel();
        let emitter = EventEmitter::new(tx);
        emitter
            .emit(ChainEvent::NodeStarted {
                node_id: "n1".into(),
                node_type: "tool".into(),
                timestamp: Utc::now(),
            })
            .await;

        match rx.recv().await.unwrap() {
            ChainEvent::NodeStarted { node_id, .. } => assert_eq!(node_id, "n1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_emitter_is_noop() {
        let emitter = EventEmitter::disabled();
        assert!(!emitter.is_active());
        emitter
            .emit(ChainEvent::ChainStarted {
                chain_id: "c".into(),
                execution_id: "e".into(),
                timestamp: Utc::now(),
            })
            .await;
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ChainEvent::NodeFinished {
            node_id: "n".into(),
            success: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "node_finished");
        assert_eq!(json["success"], true);
    }
}
