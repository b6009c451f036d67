//! Typed publish/subscribe channel between the orchestration core and the views.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::controller::RequestToken;
use crate::models::{AnalysisResult, DateRange, Field, Provider, Selection, TrendSeries, VegetationIndex};

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    FieldsLoaded(Arc<Vec<Field>>),
    /// Load failed; the previously loaded list is still current.
    FieldsFailed(String),
    FieldSelected(Field),
    SelectionCleared,
    ProviderChanged(Option<Provider>),
    IndexChanged(VegetationIndex),
    DateRangeChanged(DateRange),
    AnalysisRequested {
        token: RequestToken,
        selection: Selection,
    },
    AnalysisSettled {
        token: RequestToken,
        result: Arc<AnalysisResult>,
    },
    AnalysisFailed {
        token: RequestToken,
        message: String,
    },
    TrendSettled {
        token: RequestToken,
        series: Arc<TrendSeries>,
    },
    TrendFailed {
        token: RequestToken,
        message: String,
    },
    AuthRequired,
    SignedOut,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Publishing with no subscribers is fine; the event is simply dropped.
    pub fn publish(&self, event: MonitorEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event published with no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Drains every event currently queued on `receiver`. A lagging receiver skips
/// the overwritten events and keeps going.
pub fn drain(receiver: &mut broadcast::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!("Event receiver lagged, skipped {} events", skipped);
            }
            Err(_) => break,
        }
    }
    events
}
