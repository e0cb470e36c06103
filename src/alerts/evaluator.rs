//! Per-reading alert rules.
//!
//! Each category has a fixed priority order and the first rule that fires
//! wins, so a reading raises at most one event. Only the reading's own
//! payload is inspected.

use crate::core::{
    AirReading, Event, EventType, GasReading, HvacReading, Reading, ReadingValues, Severity,
    StructuralReading, WaterReading,
};
use crate::signals::thresholds::ThresholdCatalog;

pub fn evaluate(catalog: &ThresholdCatalog, reading: &Reading) -> Option<Event> {
    match &reading.values {
        ReadingValues::Water(w) => evaluate_water(catalog, reading, w),
        ReadingValues::Gas(g) => evaluate_gas(catalog, reading, g),
        ReadingValues::Structural(s) => evaluate_structural(catalog, reading, s),
        ReadingValues::Hvac(h) => evaluate_hvac(catalog, reading, h),
        ReadingValues::Air(a) => evaluate_air(catalog, reading, a),
        ReadingValues::Energy(_) => None,
    }
}

fn evaluate_water(catalog: &ThresholdCatalog, r: &Reading, w: &WaterReading) -> Option<Event> {
    let t = &catalog.water;

    if let Some(score) = r.anomaly_score() {
        if score >= t.leak_critical {
            return Some(
                Event::from_reading(
                    r,
                    EventType::LeakDetected,
                    Severity::Critical,
                    "Critical water leak detected by ML model",
                )
                .with_sensor_value(score),
            );
        }
        if score >= t.leak_warning {
            return Some(
                Event::from_reading(
                    r,
                    EventType::LeakWarning,
                    Severity::Warning,
                    "Potential water leak detected",
                )
                .with_sensor_value(score),
            );
        }
    }

    if w.moisture_detected {
        return Some(Event::from_reading(
            r,
            EventType::MoistureAlert,
            Severity::Warning,
            "Moisture detected in monitored area",
        ));
    }

    if let Some(pressure) = w.pressure {
        if pressure < t.pressure_low {
            return Some(
                Event::from_reading(
                    r,
                    EventType::LowPressure,
                    Severity::Warning,
                    "Water pressure below normal range",
                )
                .with_sensor_value(pressure)
                .with_threshold(t.pressure_low),
            );
        }
    }

    None
}

/// Life safety path: methane is checked before carbon monoxide.
fn evaluate_gas(catalog: &ThresholdCatalog, r: &Reading, g: &GasReading) -> Option<Event> {
    let t = &catalog.gas;

    if let Some(methane) = g.methane_ppm {
        if methane >= t.methane_critical {
            return Some(
                Event::from_reading(
                    r,
                    EventType::GasLeakCritical,
                    Severity::Critical,
                    "CRITICAL: Dangerous methane levels detected - evacuate immediately",
                )
                .with_sensor_value(methane)
                .with_threshold(t.methane_critical),
            );
        }
        if methane >= t.methane_warning {
            return Some(
                Event::from_reading(
                    r,
                    EventType::GasLeakWarning,
                    Severity::Warning,
                    "Elevated methane levels detected",
                )
                .with_sensor_value(methane)
                .with_threshold(t.methane_warning),
            );
        }
    }

    if let Some(co) = g.co_ppm {
        if co >= t.co_critical {
            return Some(
                Event::from_reading(
                    r,
                    EventType::CoCritical,
                    Severity::Critical,
                    "CRITICAL: Dangerous carbon monoxide levels - evacuate immediately",
                )
                .with_sensor_value(co)
                .with_threshold(t.co_critical),
            );
        }
        if co >= t.co_warning {
            return Some(
                Event::from_reading(
                    r,
                    EventType::CoWarning,
                    Severity::Warning,
                    "Elevated carbon monoxide levels detected",
                )
                .with_sensor_value(co)
                .with_threshold(t.co_warning),
            );
        }
    }

    None
}

fn evaluate_structural(
    catalog: &ThresholdCatalog,
    r: &Reading,
    s: &StructuralReading,
) -> Option<Event> {
    let t = &catalog.structural;
    let crack = s.crack_displacement?;
    (crack >= t.crack_critical).then(|| {
        Event::from_reading(
            r,
            EventType::StructuralCritical,
            Severity::Critical,
            "Critical foundation movement detected",
        )
        .with_sensor_value(crack)
        .with_threshold(t.crack_critical)
    })
}

fn evaluate_hvac(catalog: &ThresholdCatalog, r: &Reading, h: &HvacReading) -> Option<Event> {
    let t = &catalog.hvac;

    if let Some(eff) = h.efficiency_score {
        if eff < t.efficiency_warning {
            return Some(
                Event::from_reading(
                    r,
                    EventType::HvacEfficiencyLow,
                    Severity::Warning,
                    "HVAC efficiency below optimal range",
                )
                .with_sensor_value(eff)
                .with_threshold(t.efficiency_warning),
            );
        }
    }

    if h.filter_pressure_drop.is_some_and(|p| p >= t.filter_clogged) {
        return Some(Event::from_reading(
            r,
            EventType::FilterClogged,
            Severity::Info,
            "HVAC filter needs replacement",
        ));
    }

    None
}

fn evaluate_air(catalog: &ThresholdCatalog, r: &Reading, a: &AirReading) -> Option<Event> {
    let t = &catalog.air;
    let pm25 = a.pm25?;
    (pm25 >= t.pm25_critical).then(|| {
        Event::from_reading(
            r,
            EventType::AirQualityCritical,
            Severity::Critical,
            "Hazardous air quality - take immediate action",
        )
        .with_sensor_value(pm25)
    })
}
