pub mod actions;
pub mod dedupe;
pub mod evaluator;

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::{Event, Reading, Severity};
use crate::notifications::NotifierHandle;
use crate::signals::thresholds::ThresholdCatalog;
use dedupe::Deduplicator;

/// Turns single readings into at most one admitted, actioned event.
pub struct AlertEngine {
    catalog: Arc<ThresholdCatalog>,
    dedupe: Deduplicator,
    notifier: NotifierHandle,
}

impl AlertEngine {
    pub fn new(
        catalog: Arc<ThresholdCatalog>,
        dedupe: Deduplicator,
        notifier: NotifierHandle,
    ) -> Self {
        Self {
            catalog,
            dedupe,
            notifier,
        }
    }

    /// Evaluate, suppress duplicates, attach the action label and hand the
    /// event to the notifier. Never waits on delivery.
    pub async fn evaluate_reading(&self, reading: &Reading) -> Option<Event> {
        let mut event = evaluator::evaluate(&self.catalog, reading)?;

        if !self.dedupe.admit(reading.category(), &event).await {
            return None;
        }

        let action = actions::resolve(&event.event_type);
        event.automated_action = Some(action);

        if event.severity == Severity::Critical {
            info!(
                "{} at home {} (sensor {}), action {}",
                event.event_type,
                event.home_id,
                event.sensor_id,
                action.as_str()
            );
        } else {
            debug!("{} at home {}", event.event_type, event.home_id);
        }

        self.notifier.submit(event.clone());
        Some(event)
    }
}
