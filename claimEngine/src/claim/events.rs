use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::claim::path_recorder::RejectReason;
use crate::claim::validation::ValidationFailure;
use crate::models::territory::{Territory, TerritoryId};

/// Transition and diagnostic notifications emitted by a claim engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimEvent {
    TrackingStarted { started_at: DateTime<Utc> },
    SampleRejected { reason: RejectReason },
    LoopClosed { distance_to_start: f64, point_count: usize },
    Validating { point_count: usize },
    Completed(Territory),
    Failed(ValidationFailure),
    Cancelled,
    Persisted { territory_id: TerritoryId },
    PersistenceFailed { territory_id: TerritoryId, cause: String },
}

impl ClaimEvent {
    /// Terminal events end an attempt; everything else is progress or diagnostics.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimEvent::Completed(_) | ClaimEvent::Failed(_) | ClaimEvent::Cancelled)
    }
}

/// Fans events out to every live subscriber. Dropped receivers are pruned on the next emit.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<ClaimEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ClaimEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: ClaimEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
