pub mod pipeline;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The seven risk domains a home is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Water,
    Gas,
    Structural,
    Hvac,
    Air,
    Energy,
    Fire,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Water,
        Category::Gas,
        Category::Structural,
        Category::Hvac,
        Category::Air,
        Category::Energy,
        Category::Fire,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Water => "water",
            Category::Gas => "gas",
            Category::Structural => "structural",
            Category::Hvac => "hvac",
            Category::Air => "air",
            Category::Energy => "energy",
            Category::Fire => "fire",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ML anomaly annotation attached upstream of this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub score: f64, // 0.0-1.0
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// A single sensor data point. Produced by ingestion, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub home_id: String,
    pub sensor_id: String,
    pub values: ReadingValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<Anomaly>,
}

impl Reading {
    pub fn category(&self) -> Category {
        self.values.category()
    }

    pub fn anomaly_score(&self) -> Option<f64> {
        self.anomaly.as_ref().map(|a| a.score)
    }
}

/// Typed payload per sensor family, tagged by `sensor_type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor_type", rename_all = "snake_case")]
pub enum ReadingValues {
    Water(WaterReading),
    Gas(GasReading),
    Structural(StructuralReading),
    Hvac(HvacReading),
    Air(AirReading),
    Energy(EnergyReading),
}

impl ReadingValues {
    pub fn category(&self) -> Category {
        match self {
            ReadingValues::Water(_) => Category::Water,
            ReadingValues::Gas(_) => Category::Gas,
            ReadingValues::Structural(_) => Category::Structural,
            ReadingValues::Hvac(_) => Category::Hvac,
            ReadingValues::Air(_) => Category::Air,
            ReadingValues::Energy(_) => Category::Energy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterReading {
    pub flow_rate: Option<f64>,   // L/min
    pub pressure: Option<f64>,    // PSI
    pub temperature: Option<f64>, // Celsius
    pub moisture_detected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasReading {
    pub methane_ppm: Option<f64>,
    pub co_ppm: Option<f64>,
    pub gas_alarm: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralReading {
    pub tilt_x: Option<f64>, // degrees
    pub tilt_y: Option<f64>,
    pub crack_displacement: Option<f64>, // mm
    pub vibration_magnitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvacReading {
    pub supply_temp: Option<f64>,
    pub return_temp: Option<f64>,
    pub filter_pressure_drop: Option<f64>,
    pub current_draw: Option<f64>, // amps
    pub efficiency_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirReading {
    pub co2_ppm: Option<f64>,
    pub pm25: Option<f64>, // µg/m³
    pub pm10: Option<f64>,
    pub voc_index: Option<f64>,
    pub humidity: Option<f64>, // %
    pub air_temp: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyReading {
    pub solar_power: Option<f64>, // W
    pub grid_power: Option<f64>,
    pub battery_power: Option<f64>,
    pub battery_soc: Option<f64>, // %
    pub home_power: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Event kinds raised by the evaluator or recorded by external workflows.
/// Unknown kinds survive a round trip through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    LeakDetected,
    LeakWarning,
    MoistureAlert,
    LowPressure,
    GasLeakCritical,
    GasLeakWarning,
    CoCritical,
    CoWarning,
    GasLeak,
    CoAlert,
    StructuralCritical,
    FoundationMovement,
    CrackDetected,
    HvacEfficiencyLow,
    FilterClogged,
    FreezeWarning,
    AirQualityCritical,
    SmokeDetected,
    FireAlert,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::LeakDetected => "leak_detected",
            EventType::LeakWarning => "leak_warning",
            EventType::MoistureAlert => "moisture_alert",
            EventType::LowPressure => "low_pressure",
            EventType::GasLeakCritical => "gas_leak_critical",
            EventType::GasLeakWarning => "gas_leak_warning",
            EventType::CoCritical => "co_critical",
            EventType::CoWarning => "co_warning",
            EventType::GasLeak => "gas_leak",
            EventType::CoAlert => "co_alert",
            EventType::StructuralCritical => "structural_critical",
            EventType::FoundationMovement => "foundation_movement",
            EventType::CrackDetected => "crack_detected",
            EventType::HvacEfficiencyLow => "hvac_efficiency_low",
            EventType::FilterClogged => "filter_clogged",
            EventType::FreezeWarning => "freeze_warning",
            EventType::AirQualityCritical => "air_quality_critical",
            EventType::SmokeDetected => "smoke_detected",
            EventType::FireAlert => "fire_alert",
            EventType::Other(s) => s,
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "leak_detected" => EventType::LeakDetected,
            "leak_warning" => EventType::LeakWarning,
            "moisture_alert" => EventType::MoistureAlert,
            "low_pressure" => EventType::LowPressure,
            "gas_leak_critical" => EventType::GasLeakCritical,
            "gas_leak_warning" => EventType::GasLeakWarning,
            "co_critical" => EventType::CoCritical,
            "co_warning" => EventType::CoWarning,
            "gas_leak" => EventType::GasLeak,
            "co_alert" => EventType::CoAlert,
            "structural_critical" => EventType::StructuralCritical,
            "foundation_movement" => EventType::FoundationMovement,
            "crack_detected" => EventType::CrackDetected,
            "hvac_efficiency_low" => EventType::HvacEfficiencyLow,
            "filter_clogged" => EventType::FilterClogged,
            "freeze_warning" => EventType::FreezeWarning,
            "air_quality_critical" => EventType::AirQualityCritical,
            "smoke_detected" => EventType::SmokeDetected,
            "fire_alert" => EventType::FireAlert,
            _ => EventType::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation label attached to an admitted event. Execution is external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomatedAction {
    ValveClosed,
    GasShutoffActivated,
    HvacHeatMode,
    AlertSent,
}

impl AutomatedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomatedAction::ValveClosed => "valve_closed",
            AutomatedAction::GasShutoffActivated => "gas_shutoff_activated",
            AutomatedAction::HvacHeatMode => "hvac_heat_mode",
            AutomatedAction::AlertSent => "alert_sent",
        }
    }
}

/// A detected incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub home_id: String,
    pub sensor_id: String,
    pub event_type: EventType,
    pub severity: Severity,
    pub description: String,
    pub sensor_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub automated_action: Option<AutomatedAction>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claim_prevented: bool,
    #[serde(default)]
    pub estimated_savings: f64,
}

impl Event {
    /// A fresh, unresolved event raised by `reading`.
    pub fn from_reading(
        reading: &Reading,
        event_type: EventType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: reading.timestamp,
            home_id: reading.home_id.clone(),
            sensor_id: reading.sensor_id.clone(),
            event_type,
            severity,
            description: description.into(),
            sensor_value: None,
            threshold_value: None,
            automated_action: None,
            resolved: false,
            resolved_at: None,
            claim_prevented: false,
            estimated_savings: 0.0,
        }
    }

    pub fn with_sensor_value(mut self, value: f64) -> Self {
        self.sensor_value = Some(value);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold_value = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,      // ≥85
    Medium,   // ≥70
    High,     // ≥50
    Critical, // <50
}

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            RiskTier::Low
        } else if score >= 70.0 {
            RiskTier::Medium
        } else if score >= 50.0 {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

/// One scoring cycle's output for one home. Append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScores {
    pub timestamp: DateTime<Utc>,
    pub home_id: String,
    pub water_score: f64,
    pub gas_score: f64,
    pub structural_score: f64,
    pub hvac_score: f64,
    pub air_score: f64,
    pub energy_score: f64,
    pub fire_score: f64,
    pub overall_score: f64,
    pub risk_tier: RiskTier,
    pub confidence: f64,
    pub model_version: String,
}

impl RiskScores {
    pub fn score(&self, category: Category) -> f64 {
        match category {
            Category::Water => self.water_score,
            Category::Gas => self.gas_score,
            Category::Structural => self.structural_score,
            Category::Hvac => self.hvac_score,
            Category::Air => self.air_score,
            Category::Energy => self.energy_score,
            Category::Fire => self.fire_score,
        }
    }

    pub fn set_score(&mut self, category: Category, score: f64) {
        let slot = match category {
            Category::Water => &mut self.water_score,
            Category::Gas => &mut self.gas_score,
            Category::Structural => &mut self.structural_score,
            Category::Hvac => &mut self.hvac_score,
            Category::Air => &mut self.air_score,
            Category::Energy => &mut self.energy_score,
            Category::Fire => &mut self.fire_score,
        };
        *slot = score;
    }
}

/// A monitored property and the carrier that insures it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub home_id: String,
    pub carrier_id: String,
    pub policy_number: String,
    pub active: bool,
}

/// Where and how to deliver a carrier's webhooks.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookTarget {
    pub url: String,
    pub secret: String,
}
