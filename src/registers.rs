//! Register map and sensor domain model
//!
//! The field device exposes eight sensors through holding registers and
//! twelve discrete states through coils. The register addresses below match
//! the device's fixed point table; they are not configurable.

use chrono::NaiveDateTime;
use rand::Rng;

/// First coil address polled each step
pub const COIL_BASE_ADDRESS: u16 = 0;

/// Width of the coil vector captured per step
pub const COIL_COUNT: usize = 12;

/// The fixed set of simulated sensors, discriminated by kind.
///
/// Declaration order is the canonical processing order for writes and
/// read-back within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Humidity,
    Temperature,
    Irradiance,
    Pressure,
    GarageMotion,
    BathroomMotion,
    BedroomMotion,
    LivingRoomMotion,
}

impl SensorKind {
    /// All sensors in canonical order
    pub const ALL: [SensorKind; 8] = [
        SensorKind::Humidity,
        SensorKind::Temperature,
        SensorKind::Irradiance,
        SensorKind::Pressure,
        SensorKind::GarageMotion,
        SensorKind::BathroomMotion,
        SensorKind::BedroomMotion,
        SensorKind::LivingRoomMotion,
    ];

    /// Holding-register address on the field device
    pub fn register(&self) -> u16 {
        match self {
            SensorKind::Temperature => 1025,
            SensorKind::Irradiance => 1026,
            SensorKind::Humidity => 1028,
            SensorKind::GarageMotion => 1029,
            SensorKind::BedroomMotion => 1030,
            SensorKind::BathroomMotion => 1031,
            SensorKind::LivingRoomMotion => 1032,
            SensorKind::Pressure => 1033,
        }
    }

    /// Sensor name as it appears in scenario files
    pub fn scenario_name(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "Humidity",
            SensorKind::Temperature => "Temperature",
            SensorKind::Irradiance => "SunRadiation",
            SensorKind::Pressure => "Pressure",
            SensorKind::GarageMotion => "Motion_Sensor_Garage",
            SensorKind::BathroomMotion => "Motion_Sensor_Bathroom",
            SensorKind::BedroomMotion => "Motion_Sensor_Bedroom",
            SensorKind::LivingRoomMotion => "Motion_Sensor_LR",
        }
    }

    /// Historian table holding this sensor's readings
    pub fn table(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "humidity_data",
            SensorKind::Temperature => "temperature_data",
            SensorKind::Irradiance => "irradiance_data",
            SensorKind::Pressure => "pressure_data",
            SensorKind::GarageMotion => "garage_data",
            SensorKind::BathroomMotion => "bathroom_data",
            SensorKind::BedroomMotion => "bedroom_data",
            SensorKind::LivingRoomMotion => "lr_data",
        }
    }

    /// Value column name inside the historian table
    pub fn column(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "humidity",
            SensorKind::Temperature => "temperature",
            SensorKind::Irradiance => "irradiance",
            SensorKind::Pressure => "pressure",
            SensorKind::GarageMotion => "garage",
            SensorKind::BathroomMotion => "bathroom",
            SensorKind::BedroomMotion => "bedroom",
            SensorKind::LivingRoomMotion => "lr",
        }
    }

    /// Draw one value from this sensor's declared domain.
    ///
    /// Analog quantities are continuous ranges rounded to two decimals;
    /// motion sensors are boolean flags encoded as 0/1.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        match self {
            SensorKind::Temperature => round2(rng.gen_range(15.00..=30.00)),
            SensorKind::Pressure => round2(rng.gen_range(950.00..=1050.00)),
            SensorKind::Irradiance => round2(rng.gen_range(0.0..=1000.0)),
            SensorKind::Humidity => round2(rng.gen_range(0.0..=100.0)),
            SensorKind::GarageMotion
            | SensorKind::BathroomMotion
            | SensorKind::BedroomMotion
            | SensorKind::LivingRoomMotion => {
                if rng.gen_bool(0.5) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One sensor value captured from the device at a step timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_register_map_is_unique() {
        let mut addresses: Vec<u16> = SensorKind::ALL.iter().map(|k| k.register()).collect();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), SensorKind::ALL.len());
    }

    #[test]
    fn test_table_names_match_columns() {
        for kind in SensorKind::ALL {
            assert_eq!(kind.table(), format!("{}_data", kind.column()));
        }
    }

    #[test]
    fn test_sampled_values_stay_in_domain() {
        let mut rng = thread_rng();
        for _ in 0..200 {
            let t = SensorKind::Temperature.sample(&mut rng);
            assert!((15.0..=30.0).contains(&t), "temperature {} out of range", t);

            let p = SensorKind::Pressure.sample(&mut rng);
            assert!((950.0..=1050.0).contains(&p), "pressure {} out of range", p);

            let i = SensorKind::Irradiance.sample(&mut rng);
            assert!((0.0..=1000.0).contains(&i), "irradiance {} out of range", i);

            let h = SensorKind::Humidity.sample(&mut rng);
            assert!((0.0..=100.0).contains(&h), "humidity {} out of range", h);

            let m = SensorKind::GarageMotion.sample(&mut rng);
            assert!(m == 0.0 || m == 1.0, "motion flag {} not boolean", m);
        }
    }

    #[test]
    fn test_analog_samples_round_to_two_decimals() {
        let mut rng = thread_rng();
        for _ in 0..50 {
            let v = SensorKind::Humidity.sample(&mut rng);
            let scaled = v * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-9);
        }
    }
}
