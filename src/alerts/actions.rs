use crate::core::{AutomatedAction, EventType};

/// Remediation label for an admitted event.
pub fn resolve(event_type: &EventType) -> AutomatedAction {
    match event_type {
        EventType::LeakDetected | EventType::LeakWarning => AutomatedAction::ValveClosed,
        EventType::GasLeakCritical => AutomatedAction::GasShutoffActivated,
        EventType::FreezeWarning => AutomatedAction::HvacHeatMode,
        _ => AutomatedAction::AlertSent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaks_close_the_valve() {
        assert_eq!(resolve(&EventType::LeakDetected), AutomatedAction::ValveClosed);
        assert_eq!(resolve(&EventType::LeakWarning), AutomatedAction::ValveClosed);
    }

    #[test]
    fn critical_gas_shuts_off_supply() {
        assert_eq!(resolve(&EventType::GasLeakCritical), AutomatedAction::GasShutoffActivated);
        // warnings only alert
        assert_eq!(resolve(&EventType::GasLeakWarning), AutomatedAction::AlertSent);
    }

    #[test]
    fn freeze_switches_hvac_to_heat() {
        assert_eq!(resolve(&EventType::FreezeWarning), AutomatedAction::HvacHeatMode);
    }

    #[test]
    fn everything_else_alerts() {
        for event_type in [
            EventType::MoistureAlert,
            EventType::CoCritical,
            EventType::StructuralCritical,
            EventType::FilterClogged,
            EventType::AirQualityCritical,
            EventType::Other("roof_damage".into()),
        ] {
            assert_eq!(resolve(&event_type), AutomatedAction::AlertSent, "{event_type}");
        }
    }
}
