//! Versioned alerting thresholds and category weights.
//!
//! Both are plain immutable values built once at startup (from defaults or
//! the `[thresholds]` / `[weights]` config sections) and handed to the
//! scorers, evaluator and aggregator. Comparison operators live with the
//! rules that use them, not here.

use serde::Deserialize;

use crate::core::Category;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdCatalog {
    pub water: WaterThresholds,
    pub gas: GasThresholds,
    pub structural: StructuralThresholds,
    pub hvac: HvacThresholds,
    pub air: AirThresholds,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaterThresholds {
    /// ML anomaly score for a critical leak.
    pub leak_critical: f64,
    pub leak_warning: f64,
    pub pressure_low: f64,  // PSI
    pub pressure_high: f64, // PSI
    /// Coefficient of variation above which pressure is unstable.
    pub pressure_variation: f64,
    /// Per-reading anomaly score counted against the water score.
    pub anomaly: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GasThresholds {
    pub methane_elevated: f64, // ppm
    pub methane_warning: f64,
    pub methane_critical: f64,
    pub co_elevated: f64, // ppm
    pub co_warning: f64,
    pub co_critical: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StructuralThresholds {
    pub tilt: f64,          // degrees
    pub crack_warning: f64, // mm
    pub crack_critical: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HvacThresholds {
    pub efficiency_warning: f64,
    pub efficiency_optimal: f64,
    pub filter_clogged: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AirThresholds {
    pub co2_elevated: f64, // ppm
    pub co2_warning: f64,
    pub pm25_moderate: f64, // µg/m³
    pub pm25_warning: f64,
    pub pm25_critical: f64,
    pub voc_warning: f64,
}

impl Default for WaterThresholds {
    fn default() -> Self {
        Self {
            leak_critical: 0.9,
            leak_warning: 0.7,
            pressure_low: 30.0,
            pressure_high: 80.0,
            pressure_variation: 0.2,
            anomaly: 0.7,
        }
    }
}

impl Default for GasThresholds {
    fn default() -> Self {
        Self {
            methane_elevated: 100.0,
            methane_warning: 1000.0,
            methane_critical: 5000.0,
            co_elevated: 5.0,
            co_warning: 35.0,
            co_critical: 100.0,
        }
    }
}

impl Default for StructuralThresholds {
    fn default() -> Self {
        Self {
            tilt: 0.5,
            crack_warning: 2.0,
            crack_critical: 5.0,
        }
    }
}

impl Default for HvacThresholds {
    fn default() -> Self {
        Self {
            efficiency_warning: 70.0,
            efficiency_optimal: 85.0,
            filter_clogged: 1.5,
        }
    }
}

impl Default for AirThresholds {
    fn default() -> Self {
        Self {
            co2_elevated: 800.0,
            co2_warning: 1000.0,
            pm25_moderate: 12.0,
            pm25_warning: 35.0,
            pm25_critical: 150.0,
            voc_warning: 300.0,
        }
    }
}

/// Weights of each category in the overall score. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub gas: f64, // life safety
    pub water: f64,
    pub structural: f64,
    pub hvac: f64,
    pub air: f64,
    pub energy: f64,
    pub fire: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            gas: 0.25,
            water: 0.20,
            structural: 0.15,
            hvac: 0.10,
            air: 0.10,
            energy: 0.10,
            fire: 0.10,
        }
    }
}

impl CategoryWeights {
    const TOLERANCE: f64 = 1e-9;

    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Water => self.water,
            Category::Gas => self.gas,
            Category::Structural => self.structural,
            Category::Hvac => self.hvac,
            Category::Air => self.air,
            Category::Energy => self.energy,
            Category::Fire => self.fire,
        }
    }

    pub fn sum(&self) -> f64 {
        Category::ALL.iter().map(|c| self.weight(*c)).sum()
    }

    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= Self::TOLERANCE
            && Category::ALL.iter().all(|c| self.weight(*c) >= 0.0)
    }
}
