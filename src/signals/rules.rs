use chrono::{DateTime, Duration, Utc};

use crate::core::{Category, Event, EventType, Reading, ReadingValues, Severity};
use crate::signals::thresholds::{
    AirThresholds, GasThresholds, HvacThresholds, StructuralThresholds, ThresholdCatalog,
    WaterThresholds,
};

const BASELINE: f64 = 100.0;
/// Ceiling applied to the water score when a home sent no water readings.
const WATER_NO_DATA_CEILING: f64 = 50.0;

/// Reduces one category's reading window plus the home's recent events
/// into a 0-100 health score (100 = no risk found).
///
/// Every scorer starts at 100 and only ever deducts; the result never
/// goes below 0.
pub trait CategoryScorer {
    fn category(&self) -> Category;
    fn score(&self, readings: &[&Reading], events: &[Event], now: DateTime<Utc>) -> f64;
}

/// One scorer per category, in `Category::ALL` order.
pub fn default_scorers(catalog: &ThresholdCatalog) -> Vec<Box<dyn CategoryScorer + Send + Sync>> {
    Category::ALL
        .iter()
        .map(|category| scorer_for(*category, catalog))
        .collect()
}

fn scorer_for(
    category: Category,
    catalog: &ThresholdCatalog,
) -> Box<dyn CategoryScorer + Send + Sync> {
    match category {
        Category::Water => Box::new(WaterScorer(catalog.water.clone())),
        Category::Gas => Box::new(GasScorer(catalog.gas.clone())),
        Category::Structural => Box::new(StructuralScorer(catalog.structural.clone())),
        Category::Hvac => Box::new(HvacScorer(catalog.hvac.clone())),
        Category::Air => Box::new(AirScorer(catalog.air.clone())),
        Category::Energy => Box::new(EnergyScorer),
        Category::Fire => Box::new(FireScorer),
    }
}

fn age(event: &Event, now: DateTime<Utc>) -> Duration {
    now - event.timestamp
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for fewer than two samples.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// --- Individual Scorers ---

struct WaterScorer(WaterThresholds);
impl CategoryScorer for WaterScorer {
    fn category(&self) -> Category { Category::Water }
    fn score(&self, readings: &[&Reading], events: &[Event], now: DateTime<Utc>) -> f64 {
        let t = &self.0;
        let mut score = BASELINE;

        for event in events {
            if matches!(event.event_type, EventType::LeakDetected | EventType::MoistureAlert) {
                let age = age(event, now);
                if age < Duration::days(7) {
                    score -= 30.0;
                } else if age < Duration::days(30) {
                    score -= 15.0;
                }
            }
        }

        if readings.is_empty() {
            return score.min(WATER_NO_DATA_CEILING).max(0.0);
        }

        let pressures: Vec<f64> = readings
            .iter()
            .filter_map(|r| match &r.values {
                ReadingValues::Water(w) => w.pressure,
                _ => None,
            })
            .collect();

        if !pressures.is_empty() {
            let avg = mean(&pressures);
            let sd = std_dev(&pressures);

            // Unstable pressure. Undefined for a non-positive mean.
            if avg > 0.0 && sd / avg > t.pressure_variation {
                score -= 10.0;
            }
            if avg < t.pressure_low {
                score -= 15.0;
            } else if avg > t.pressure_high {
                score -= 10.0;
            }
        }

        for reading in readings {
            if reading.anomaly_score().is_some_and(|s| s > t.anomaly) {
                score -= 5.0;
            }
        }

        score.max(0.0)
    }
}

/// Life safety: the largest deductions of any category.
struct GasScorer(GasThresholds);
impl CategoryScorer for GasScorer {
    fn category(&self) -> Category { Category::Gas }
    fn score(&self, readings: &[&Reading], events: &[Event], now: DateTime<Utc>) -> f64 {
        let t = &self.0;
        let mut score = BASELINE;

        for event in events {
            if matches!(event.event_type, EventType::GasLeak | EventType::CoAlert) {
                if event.severity == Severity::Critical {
                    score -= 50.0;
                } else if age(event, now) < Duration::days(7) {
                    score -= 25.0;
                }
            }
        }

        for reading in readings {
            if let ReadingValues::Gas(g) = &reading.values {
                if g.methane_ppm.is_some_and(|m| m > t.methane_elevated) {
                    score -= 5.0;
                }
                if g.co_ppm.is_some_and(|co| co > t.co_elevated) {
                    score -= 5.0;
                }
            }
        }

        score.max(0.0)
    }
}

struct StructuralScorer(StructuralThresholds);
impl CategoryScorer for StructuralScorer {
    fn category(&self) -> Category { Category::Structural }
    fn score(&self, readings: &[&Reading], events: &[Event], _now: DateTime<Utc>) -> f64 {
        let t = &self.0;
        let mut score = BASELINE;

        let structural_events = events
            .iter()
            .filter(|e| {
                matches!(
                    e.event_type,
                    EventType::FoundationMovement | EventType::CrackDetected
                )
            })
            .count();
        score -= 20.0 * structural_events as f64;

        for reading in readings {
            if let ReadingValues::Structural(s) = &reading.values {
                if s.tilt_x.is_some_and(|x| x.abs() > t.tilt) {
                    score -= 10.0;
                }
                if s.crack_displacement.is_some_and(|c| c > t.crack_warning) {
                    score -= 15.0;
                }
            }
        }

        score.max(0.0)
    }
}

struct HvacScorer(HvacThresholds);
impl CategoryScorer for HvacScorer {
    fn category(&self) -> Category { Category::Hvac }
    fn score(&self, readings: &[&Reading], _events: &[Event], _now: DateTime<Utc>) -> f64 {
        let t = &self.0;
        let mut score = BASELINE;

        for reading in readings {
            if let ReadingValues::Hvac(h) = &reading.values {
                if let Some(eff) = h.efficiency_score {
                    if eff < t.efficiency_warning {
                        score -= 25.0;
                    } else if eff < t.efficiency_optimal {
                        score -= 10.0;
                    }
                }
                if h.filter_pressure_drop.is_some_and(|p| p >= t.filter_clogged) {
                    score -= 15.0;
                }
            }
        }

        score.max(0.0)
    }
}

struct AirScorer(AirThresholds);
impl CategoryScorer for AirScorer {
    fn category(&self) -> Category { Category::Air }
    fn score(&self, readings: &[&Reading], _events: &[Event], _now: DateTime<Utc>) -> f64 {
        let t = &self.0;
        let mut score = BASELINE;

        for reading in readings {
            if let ReadingValues::Air(a) = &reading.values {
                if let Some(co2) = a.co2_ppm {
                    if co2 > t.co2_warning {
                        score -= 15.0;
                    } else if co2 > t.co2_elevated {
                        score -= 5.0;
                    }
                }
                if let Some(pm25) = a.pm25 {
                    if pm25 > t.pm25_warning {
                        score -= 15.0;
                    } else if pm25 > t.pm25_moderate {
                        score -= 5.0;
                    }
                }
                if a.voc_index.is_some_and(|v| v > t.voc_warning) {
                    score -= 10.0;
                }
            }
        }

        score.max(0.0)
    }
}

/// Placeholder: energy readings carry no scoring rules yet.
struct EnergyScorer;
impl CategoryScorer for EnergyScorer {
    fn category(&self) -> Category { Category::Energy }
    fn score(&self, _readings: &[&Reading], _events: &[Event], _now: DateTime<Utc>) -> f64 {
        BASELINE
    }
}

/// Event-only: there is no fire sensor payload.
struct FireScorer;
impl CategoryScorer for FireScorer {
    fn category(&self) -> Category { Category::Fire }
    fn score(&self, _readings: &[&Reading], events: &[Event], _now: DateTime<Utc>) -> f64 {
        let fire_events = events
            .iter()
            .filter(|e| matches!(e.event_type, EventType::SmokeDetected | EventType::FireAlert))
            .count();
        (BASELINE - 40.0 * fire_events as f64).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        AirReading, Anomaly, GasReading, HvacReading, StructuralReading, WaterReading,
    };

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn make_reading(values: ReadingValues) -> Reading {
        Reading {
            timestamp: now(),
            home_id: "home-1".to_string(),
            sensor_id: "sensor-1".to_string(),
            values,
            anomaly: None,
        }
    }

    fn water(pressure: f64) -> Reading {
        make_reading(ReadingValues::Water(WaterReading {
            pressure: Some(pressure),
            ..WaterReading::default()
        }))
    }

    fn make_event(event_type: EventType, severity: Severity, days_ago: i64) -> Event {
        let reading = make_reading(ReadingValues::Water(WaterReading::default()));
        let mut event = Event::from_reading(&reading, event_type, severity, "test");
        event.timestamp = now() - Duration::days(days_ago);
        event
    }

    fn score(category: Category, readings: &[Reading], events: &[Event]) -> f64 {
        let refs: Vec<&Reading> = readings.iter().collect();
        scorer_for(category, &ThresholdCatalog::default()).score(&refs, events, now())
    }

    #[test]
    fn water_no_data_is_capped_at_fifty() {
        assert_eq!(score(Category::Water, &[], &[]), 50.0);
    }

    #[test]
    fn water_no_data_keeps_event_deductions() {
        let events = vec![make_event(EventType::LeakDetected, Severity::Critical, 1)];
        // 100 - 30 = 70, then capped to 50
        assert_eq!(score(Category::Water, &[], &events), 50.0);

        let events = vec![
            make_event(EventType::LeakDetected, Severity::Critical, 1),
            make_event(EventType::MoistureAlert, Severity::Warning, 2),
        ];
        // 100 - 60 = 40, already under the cap
        assert_eq!(score(Category::Water, &[], &events), 40.0);
    }

    #[test]
    fn water_event_age_buckets_are_exclusive() {
        let readings = vec![water(50.0)];
        let recent = vec![make_event(EventType::LeakDetected, Severity::Critical, 3)];
        assert_eq!(score(Category::Water, &readings, &recent), 70.0);

        let older = vec![make_event(EventType::MoistureAlert, Severity::Warning, 10)];
        assert_eq!(score(Category::Water, &readings, &older), 85.0);

        let stale = vec![make_event(EventType::LeakDetected, Severity::Critical, 45)];
        assert_eq!(score(Category::Water, &readings, &stale), 100.0);
    }

    #[test]
    fn water_ignores_unrelated_events() {
        let readings = vec![water(50.0)];
        let events = vec![make_event(EventType::GasLeak, Severity::Critical, 1)];
        assert_eq!(score(Category::Water, &readings, &events), 100.0);
    }

    #[test]
    fn water_low_mean_pressure() {
        assert_eq!(score(Category::Water, &[water(25.0), water(25.0)], &[]), 85.0);
    }

    #[test]
    fn water_high_mean_pressure() {
        assert_eq!(score(Category::Water, &[water(90.0), water(90.0)], &[]), 90.0);
    }

    #[test]
    fn water_unstable_pressure() {
        // mean 50, population stdev 20 -> cv 0.4
        assert_eq!(score(Category::Water, &[water(30.0), water(70.0)], &[]), 90.0);
    }

    #[test]
    fn water_zero_pressure_skips_variation() {
        // mean 0: variation check skipped, low pressure still applies
        assert_eq!(score(Category::Water, &[water(0.0), water(0.0)], &[]), 85.0);
    }

    #[test]
    fn water_anomalies_deduct_per_reading() {
        let mut readings = vec![water(50.0), water(50.0), water(50.0)];
        readings[0].anomaly = Some(Anomaly {
            score: 0.8,
            kind: "flow".into(),
            description: String::new(),
        });
        readings[1].anomaly = Some(Anomaly {
            score: 0.71,
            kind: "flow".into(),
            description: String::new(),
        });
        readings[2].anomaly = Some(Anomaly {
            score: 0.7,
            kind: "flow".into(),
            description: String::new(),
        });
        assert_eq!(score(Category::Water, &readings, &[]), 90.0);
    }

    #[test]
    fn std_dev_is_population() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-9);
        assert_eq!(std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn gas_critical_event_regardless_of_age() {
        let events = vec![make_event(EventType::GasLeak, Severity::Critical, 20)];
        assert_eq!(score(Category::Gas, &[], &events), 50.0);
    }

    #[test]
    fn gas_warning_event_only_when_recent() {
        let recent = vec![make_event(EventType::CoAlert, Severity::Warning, 2)];
        assert_eq!(score(Category::Gas, &[], &recent), 75.0);
        let old = vec![make_event(EventType::CoAlert, Severity::Warning, 8)];
        assert_eq!(score(Category::Gas, &[], &old), 100.0);
    }

    #[test]
    fn gas_elevated_readings() {
        let readings = vec![
            make_reading(ReadingValues::Gas(GasReading {
                methane_ppm: Some(150.0),
                co_ppm: Some(6.0),
                gas_alarm: false,
            })),
            make_reading(ReadingValues::Gas(GasReading {
                methane_ppm: Some(100.0),
                co_ppm: Some(5.0),
                gas_alarm: false,
            })),
        ];
        assert_eq!(score(Category::Gas, &readings, &[]), 90.0);
    }

    #[test]
    fn gas_clamped_at_zero() {
        let events: Vec<Event> = (0..3)
            .map(|_| make_event(EventType::GasLeak, Severity::Critical, 1))
            .collect();
        assert_eq!(score(Category::Gas, &[], &events), 0.0);
    }

    #[test]
    fn structural_hvac_air_clamped_at_zero() {
        let structural: Vec<Reading> = (0..5)
            .map(|_| {
                make_reading(ReadingValues::Structural(StructuralReading {
                    tilt_x: Some(1.0),
                    crack_displacement: Some(3.0),
                    ..StructuralReading::default()
                }))
            })
            .collect();
        assert_eq!(score(Category::Structural, &structural, &[]), 0.0);

        let hvac: Vec<Reading> = (0..3)
            .map(|_| {
                make_reading(ReadingValues::Hvac(HvacReading {
                    efficiency_score: Some(50.0),
                    filter_pressure_drop: Some(2.0),
                    ..HvacReading::default()
                }))
            })
            .collect();
        assert_eq!(score(Category::Hvac, &hvac, &[]), 0.0);

        let air: Vec<Reading> = (0..3)
            .map(|_| {
                make_reading(ReadingValues::Air(AirReading {
                    co2_ppm: Some(1500.0),
                    pm25: Some(50.0),
                    voc_index: Some(400.0),
                    ..AirReading::default()
                }))
            })
            .collect();
        assert_eq!(score(Category::Air, &air, &[]), 0.0);
    }

    #[test]
    fn water_with_readings_clamped_at_zero() {
        let events: Vec<Event> = (0..4)
            .map(|_| make_event(EventType::LeakDetected, Severity::Critical, 1))
            .collect();
        let readings: Vec<Reading> = (0..3)
            .map(|_| {
                let mut reading = water(10.0);
                reading.anomaly = Some(Anomaly {
                    score: 0.95,
                    kind: "flow".into(),
                    description: String::new(),
                });
                reading
            })
            .collect();
        assert_eq!(score(Category::Water, &readings, &events), 0.0);
    }

    #[test]
    fn every_score_stays_within_bounds() {
        let readings = vec![
            water(200.0),
            water(0.0),
            make_reading(ReadingValues::Gas(GasReading {
                methane_ppm: Some(9000.0),
                co_ppm: Some(500.0),
                gas_alarm: true,
            })),
            make_reading(ReadingValues::Structural(StructuralReading {
                tilt_x: Some(-4.0),
                crack_displacement: Some(9.0),
                ..StructuralReading::default()
            })),
            make_reading(ReadingValues::Hvac(HvacReading {
                efficiency_score: Some(10.0),
                filter_pressure_drop: Some(5.0),
                ..HvacReading::default()
            })),
            make_reading(ReadingValues::Air(AirReading {
                co2_ppm: Some(5000.0),
                pm25: Some(300.0),
                voc_index: Some(500.0),
                ..AirReading::default()
            })),
        ];
        let events: Vec<Event> = [
            EventType::LeakDetected,
            EventType::GasLeak,
            EventType::CrackDetected,
            EventType::SmokeDetected,
        ]
        .into_iter()
        .cycle()
        .take(40)
        .map(|event_type| make_event(event_type, Severity::Critical, 2))
        .collect();

        for category in Category::ALL {
            for (readings, events) in [(&readings[..], &events[..]), (&[][..], &[][..])] {
                let value = score(category, readings, events);
                assert!((0.0..=100.0).contains(&value), "{category}: {value}");
            }
        }
    }

    #[test]
    fn structural_events_and_readings() {
        let events = vec![make_event(EventType::FoundationMovement, Severity::Warning, 25)];
        let readings = vec![
            make_reading(ReadingValues::Structural(StructuralReading {
                tilt_x: Some(-0.6),
                crack_displacement: Some(2.5),
                ..StructuralReading::default()
            })),
            make_reading(ReadingValues::Structural(StructuralReading {
                tilt_x: Some(0.5),
                crack_displacement: Some(2.0),
                ..StructuralReading::default()
            })),
        ];
        // 100 - 20 - 10 - 15
        assert_eq!(score(Category::Structural, &readings, &events), 55.0);
    }

    #[test]
    fn hvac_efficiency_bands_and_filter() {
        let hvac = |eff: f64, filter: f64| {
            make_reading(ReadingValues::Hvac(HvacReading {
                efficiency_score: Some(eff),
                filter_pressure_drop: Some(filter),
                ..HvacReading::default()
            }))
        };
        assert_eq!(score(Category::Hvac, &[hvac(65.0, 0.5)], &[]), 75.0);
        assert_eq!(score(Category::Hvac, &[hvac(70.0, 0.5)], &[]), 90.0);
        assert_eq!(score(Category::Hvac, &[hvac(85.0, 0.5)], &[]), 100.0);
        assert_eq!(score(Category::Hvac, &[hvac(90.0, 1.5)], &[]), 85.0);
    }

    #[test]
    fn air_bands() {
        let air = |co2: f64, pm25: f64, voc: f64| {
            make_reading(ReadingValues::Air(AirReading {
                co2_ppm: Some(co2),
                pm25: Some(pm25),
                voc_index: Some(voc),
                ..AirReading::default()
            }))
        };
        assert_eq!(score(Category::Air, &[air(400.0, 5.0, 100.0)], &[]), 100.0);
        assert_eq!(score(Category::Air, &[air(900.0, 20.0, 100.0)], &[]), 90.0);
        assert_eq!(score(Category::Air, &[air(1000.0, 35.0, 300.0)], &[]), 90.0);
        assert_eq!(score(Category::Air, &[air(1200.0, 40.0, 350.0)], &[]), 60.0);
    }

    #[test]
    fn energy_is_constant() {
        let events = vec![make_event(EventType::FireAlert, Severity::Critical, 1)];
        assert_eq!(score(Category::Energy, &[], &events), 100.0);
    }

    #[test]
    fn fire_from_events_only() {
        let events = vec![
            make_event(EventType::SmokeDetected, Severity::Warning, 1),
            make_event(EventType::FireAlert, Severity::Critical, 29),
        ];
        assert_eq!(score(Category::Fire, &[], &events), 20.0);

        let events: Vec<Event> = (0..4)
            .map(|_| make_event(EventType::FireAlert, Severity::Critical, 1))
            .collect();
        assert_eq!(score(Category::Fire, &[], &events), 0.0);
    }

    #[test]
    fn scorers_ignore_foreign_payloads() {
        let readings = vec![water(10.0)];
        assert_eq!(score(Category::Gas, &readings, &[]), 100.0);
        assert_eq!(score(Category::Air, &readings, &[]), 100.0);
    }

    #[test]
    fn default_scorers_cover_every_category() {
        let scorers = default_scorers(&ThresholdCatalog::default());
        let categories: Vec<Category> = scorers.iter().map(|s| s.category()).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }
}
