//! Scenario file parsing
//!
//! Scenario sources are line-oriented text. A line starting with `#` that
//! contains the requested scenario name (case-insensitive substring) opens
//! that section; any other `#` line closes it. Data lines inside an open
//! section are `name value1 value2 ...` with optional single quotes around
//! the name. Sensors may carry sequences of different lengths.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::registers::SensorKind;

/// One parsed scenario: per-sensor ordered value sequences.
///
/// Parsed once per menu selection and held immutable for the run.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    sensors: HashMap<String, Vec<i64>>,
}

impl Scenario {
    /// Parse the requested scenario section out of a textual source.
    ///
    /// An unmatched scenario name yields an empty mapping; the caller must
    /// treat that as "no data". Duplicate sensor names within one section
    /// keep the later entry and log a warning.
    pub fn parse(source: &str, scenario_name: &str) -> Scenario {
        let needle = scenario_name.to_lowercase();
        let mut sensors: HashMap<String, Vec<i64>> = HashMap::new();
        let mut in_section = false;

        for line in source.lines() {
            let line = line.trim();

            if let Some(header) = line.strip_prefix('#') {
                in_section = header.to_lowercase().contains(&needle);
                continue;
            }
            if !in_section || line.is_empty() {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(raw_name) = tokens.next() else {
                continue;
            };
            let name = raw_name.trim_matches('\'').to_string();
            let values: Vec<i64> = tokens.filter_map(|t| t.parse().ok()).collect();

            if sensors.insert(name.clone(), values).is_some() {
                warn!(
                    sensor = %name,
                    scenario = %scenario_name,
                    "duplicate sensor entry in scenario section, keeping the later one"
                );
            }
        }

        Scenario {
            name: scenario_name.to_string(),
            sensors,
        }
    }

    /// Load and parse a scenario from a file on disk
    pub fn from_file(path: impl AsRef<Path>, scenario_name: &str) -> Result<Scenario> {
        let source = std::fs::read_to_string(path)?;
        Ok(Scenario::parse(&source, scenario_name))
    }

    /// Scenario name as requested by the caller
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the requested name matched no section
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Value for a sensor at a step index, `None` once its sequence is
    /// exhausted (the sensor is omitted for that step, never defaulted)
    pub fn value_at(&self, kind: SensorKind, step: usize) -> Option<f64> {
        self.sensors
            .get(kind.scenario_name())
            .and_then(|values| values.get(step))
            .map(|&v| v as f64)
    }

    /// Raw sequence for a sensor name
    pub fn sequence(&self, sensor_name: &str) -> Option<&[i64]> {
        self.sensors.get(sensor_name).map(Vec::as_slice)
    }

    /// Length of the longest sensor sequence
    pub fn max_len(&self) -> usize {
        self.sensors.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
# Sunny
'Humidity' 40 41 42
Temperature 20 21
SunRadiation 800 810 820 830

# Rainstorm
Humidity 90 91
Temperature 12 11
Pressure 960
";

    #[test]
    fn test_parse_extracts_only_requested_section() {
        let scenario = Scenario::parse(SOURCE, "Sunny");
        assert_eq!(scenario.sequence("Humidity"), Some(&[40, 41, 42][..]));
        assert_eq!(scenario.sequence("Temperature"), Some(&[20, 21][..]));
        assert_eq!(scenario.sequence("SunRadiation"), Some(&[800, 810, 820, 830][..]));
        assert!(scenario.sequence("Pressure").is_none());
    }

    #[test]
    fn test_parse_closes_section_at_next_marker() {
        let scenario = Scenario::parse(SOURCE, "Rainstorm");
        assert_eq!(scenario.sequence("Humidity"), Some(&[90, 91][..]));
        assert_eq!(scenario.sequence("Pressure"), Some(&[960][..]));
        assert!(scenario.sequence("SunRadiation").is_none());
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let source = "# Sunny Day\nHumidity 10\n";
        let scenario = Scenario::parse(source, "sunny");
        assert_eq!(scenario.sequence("Humidity"), Some(&[10][..]));
    }

    #[test]
    fn test_quotes_are_stripped_from_names() {
        let scenario = Scenario::parse(SOURCE, "Sunny");
        assert!(scenario.sequence("Humidity").is_some());
        assert!(scenario.sequence("'Humidity'").is_none());
    }

    #[test]
    fn test_unmatched_name_yields_empty_mapping() {
        let scenario = Scenario::parse(SOURCE, "Blizzard");
        assert!(scenario.is_empty());
    }

    #[test]
    fn test_duplicate_sensor_keeps_later_entry() {
        let source = "# Sunny\nHumidity 10 11\nHumidity 50 51\n";
        let scenario = Scenario::parse(source, "Sunny");
        assert_eq!(scenario.sequence("Humidity"), Some(&[50, 51][..]));
    }

    #[test]
    fn test_value_at_honors_per_sensor_lengths() {
        let scenario = Scenario::parse(SOURCE, "Sunny");
        assert_eq!(scenario.value_at(SensorKind::Temperature, 1), Some(21.0));
        assert_eq!(scenario.value_at(SensorKind::Temperature, 2), None);
        assert_eq!(scenario.value_at(SensorKind::Humidity, 2), Some(42.0));
        assert_eq!(scenario.value_at(SensorKind::Pressure, 0), None);
    }

    #[test]
    fn test_max_len_spans_unequal_sequences() {
        let scenario = Scenario::parse(SOURCE, "Sunny");
        assert_eq!(scenario.max_len(), 4);
        assert_eq!(Scenario::parse(SOURCE, "none").max_len(), 0);
    }
}
