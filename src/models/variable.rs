use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitConversion {
    KelvinToCelsius,
    MetersToMillimeters,
}

impl UnitConversion {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            UnitConversion::KelvinToCelsius => value - 273.15,
            UnitConversion::MetersToMillimeters => value * 1000.0,
        }
    }

    pub fn target_units(&self) -> &'static str {
        match self {
            UnitConversion::KelvinToCelsius => "°C",
            UnitConversion::MetersToMillimeters => "mm",
        }
    }
}

/// How daily values are combined into weeks and months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalAggregation {
    Mean,
    Sum, // accumulated variables
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub short_name: &'static str,
    pub conversion: Option<UnitConversion>,
    pub aggregation: TemporalAggregation,
}

impl VariableDescriptor {
    const fn new(
        key: &'static str,
        label: &'static str,
        short_name: &'static str,
        conversion: Option<UnitConversion>,
        aggregation: TemporalAggregation,
    ) -> Self {
        Self {
            key,
            label,
            short_name,
            conversion,
            aggregation,
        }
    }

    pub fn is_accumulated(&self) -> bool {
        self.aggregation == TemporalAggregation::Sum
    }
}

impl std::fmt::Display for VariableDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

const ERA5_LAND_VARIABLES: [VariableDescriptor; 10] = [
    VariableDescriptor::new(
        "10m_u_component_of_wind",
        "10 metre U wind component",
        "u10",
        None,
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new(
        "10m_v_component_of_wind",
        "10 metre V wind component",
        "v10",
        None,
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new(
        "2m_dewpoint_temperature",
        "2 metre dewpoint temperature",
        "d2m",
        Some(UnitConversion::KelvinToCelsius),
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new(
        "2m_temperature",
        "2 metre temperature",
        "t2m",
        Some(UnitConversion::KelvinToCelsius),
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new("runoff", "Runoff", "ro", None, TemporalAggregation::Sum),
    VariableDescriptor::new(
        "soil_temperature_level_1",
        "Soil temperature level 1",
        "stl1",
        Some(UnitConversion::KelvinToCelsius),
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new(
        "volumetric_soil_water_layer_1",
        "Volumetric soil water layer 1",
        "swvl1",
        None,
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new(
        "volumetric_soil_water_layer_2",
        "Volumetric soil water layer 2",
        "swvl2",
        None,
        TemporalAggregation::Mean,
    ),
    VariableDescriptor::new(
        "total_precipitation",
        "Total precipitation",
        "tp",
        Some(UnitConversion::MetersToMillimeters),
        TemporalAggregation::Sum,
    ),
    VariableDescriptor::new(
        "total_evaporation",
        "Total evaporation",
        "e",
        None,
        TemporalAggregation::Sum,
    ),
];

/// Read-only table of supported ERA5-Land variables.
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    entries: Vec<VariableDescriptor>,
}

impl VariableRegistry {
    pub fn era5_land() -> Self {
        Self::from_entries(ERA5_LAND_VARIABLES.to_vec())
    }

    pub fn from_entries(entries: Vec<VariableDescriptor>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[VariableDescriptor] {
        &self.entries
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|v| v.key == key)
    }

    pub fn by_key(&self, key: &str) -> Result<&VariableDescriptor> {
        self.entries
            .iter()
            .find(|v| v.key == key)
            .ok_or_else(|| PipelineError::UnsupportedVariable(key.to_string()))
    }

    pub fn by_label(&self, label: &str) -> Result<&VariableDescriptor> {
        self.entries
            .iter()
            .find(|v| v.label == label)
            .ok_or_else(|| PipelineError::UnsupportedVariable(label.to_string()))
    }

    /// Accepts either a registry key or a human label.
    pub fn resolve(&self, name: &str) -> Result<&VariableDescriptor> {
        self.by_key(name).or_else(|_| self.by_label(name))
    }

    /// Registry entries for every enabled toggle.
    pub fn from_toggles(&self, toggles: &VariableToggles) -> Result<Vec<&VariableDescriptor>> {
        let keys = toggles.enabled_keys();
        if keys.is_empty() {
            return Err(PipelineError::Config(
                "No variable selected for download".to_string(),
            ));
        }

        let mut selected = Vec::with_capacity(keys.len());
        for key in keys {
            selected.push(self.by_key(key)?);
        }
        Ok(selected)
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::era5_land()
    }
}

/// Per-variable switches for the multi-variable extraction flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableToggles {
    pub temperature: bool,
    pub dewpoint: bool,
    pub precipitation: bool,
    pub evaporation: bool,
    pub runoff: bool,
    pub soil_temperature: bool,
    pub soil_water: bool,
    pub soil_water_2: bool,
    pub wind_u: bool,
    pub wind_v: bool,
}

impl VariableToggles {
    pub fn enabled_keys(&self) -> Vec<&'static str> {
        [
            (self.wind_u, "10m_u_component_of_wind"),
            (self.wind_v, "10m_v_component_of_wind"),
            (self.dewpoint, "2m_dewpoint_temperature"),
            (self.temperature, "2m_temperature"),
            (self.runoff, "runoff"),
            (self.soil_temperature, "soil_temperature_level_1"),
            (self.soil_water, "volumetric_soil_water_layer_1"),
            (self.soil_water_2, "volumetric_soil_water_layer_2"),
            (self.precipitation, "total_precipitation"),
            (self.evaporation, "total_evaporation"),
        ]
        .into_iter()
        .filter_map(|(enabled, key)| enabled.then_some(key))
        .collect()
    }
}
