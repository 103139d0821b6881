//! Step-driven simulation loop
//!
//! One run is a strictly sequential series of steps. Each step writes the
//! available sensor values to the device, reads the full fixed sensor set
//! back, polls the coil block, derives events and persists everything under
//! a single shared timestamp. The step body ([`execute_step`]) is decoupled
//! from prompting and persistence so it can be unit-tested against a bus
//! double.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use crate::bridge::RegisterBus;
use crate::error::{Result, SimSrvError};
use crate::events::{derive_events, Event};
use crate::historian::Historian;
use crate::registers::{SensorKind, SensorReading, COIL_BASE_ADDRESS, COIL_COUNT};
use crate::scenario::Scenario;

/// Minimum operator-requested step count
pub const MIN_STEPS: usize = 1;

/// Maximum step count; also the hard cap on scripted replay length
pub const MAX_STEPS: usize = 20;

/// Validate an operator-requested step count against [MIN_STEPS, MAX_STEPS]
pub fn validate_step_count(requested: i64) -> Result<usize> {
    if (MIN_STEPS as i64..=MAX_STEPS as i64).contains(&requested) {
        Ok(requested as usize)
    } else {
        Err(SimSrvError::InvalidStepCount(requested))
    }
}

/// Values a scenario contributes at one step index, in canonical sensor
/// order. Sensors whose sequence is exhausted are omitted, not defaulted.
pub fn scripted_values(scenario: &Scenario, step: usize) -> Vec<(SensorKind, f64)> {
    SensorKind::ALL
        .iter()
        .filter_map(|&kind| scenario.value_at(kind, step).map(|value| (kind, value)))
        .collect()
}

/// Everything one step produced, all sharing one timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub readings: Vec<SensorReading>,
    pub events: Vec<Event>,
}

/// Run one simulation step against the device.
///
/// Writes each supplied value, then reads back the FULL fixed sensor set
/// (not only what was written) to capture actual device state. A failed
/// register read skips that sensor for the step; a failed coil poll yields
/// no events. Write failures abort the step, as the device state would be
/// undefined.
pub async fn execute_step<B: RegisterBus>(
    bus: &mut B,
    values: &[(SensorKind, f64)],
    timestamp: NaiveDateTime,
) -> Result<StepOutcome> {
    for &(kind, value) in values {
        bus.write_register(kind.register(), value).await?;
    }

    let mut readings = Vec::with_capacity(SensorKind::ALL.len());
    for kind in SensorKind::ALL {
        match bus.read_registers(kind.register(), 1).await {
            Ok(registers) if !registers.is_empty() => readings.push(SensorReading {
                kind,
                timestamp,
                value: f64::from(registers[0]),
            }),
            Ok(_) => warn!(sensor = ?kind, "empty register response, sensor skipped"),
            Err(e) => warn!(sensor = ?kind, error = %e, "register read failed, sensor skipped"),
        }
    }

    let events = match bus.read_coils(COIL_BASE_ADDRESS, COIL_COUNT as u16).await {
        Ok(coils) => derive_events(&coils, timestamp)?,
        Err(e) => {
            warn!(error = %e, "coil poll failed, no events this step");
            Vec::new()
        }
    };

    Ok(StepOutcome { readings, events })
}

/// Orchestrates simulation runs over explicit device and store handles.
///
/// Owns both handles for the process lifetime; dropping the driver releases
/// the device connection on every exit path.
pub struct SimulationDriver<B: RegisterBus> {
    bus: B,
    historian: Historian,
    step_interval: Duration,
}

impl<B: RegisterBus> SimulationDriver<B> {
    pub fn new(bus: B, historian: Historian, step_interval: Duration) -> SimulationDriver<B> {
        SimulationDriver {
            bus,
            historian,
            step_interval,
        }
    }

    /// Replay a parsed scenario for the requested number of steps.
    ///
    /// Returns the number of steps executed. Step indices run 0..20 at
    /// most; sensors with shorter sequences drop out of later steps.
    pub async fn run_scripted(&mut self, scenario: &Scenario, requested_steps: i64) -> Result<usize> {
        let steps = validate_step_count(requested_steps)?;
        if scenario.is_empty() {
            return Err(SimSrvError::EmptyScenario(scenario.name().to_string()));
        }

        info!(scenario = %scenario.name(), steps, "starting scripted replay");
        for step in 0..steps {
            let values = scripted_values(scenario, step);
            self.run_step(step, &values).await?;
            if step + 1 < steps {
                tokio::time::sleep(self.step_interval).await;
            }
        }
        Ok(steps)
    }

    /// Generate one randomized value per sensor per step
    pub async fn run_randomized(&mut self, requested_steps: i64) -> Result<usize> {
        let steps = validate_step_count(requested_steps)?;

        info!(steps, "starting randomized run");
        for step in 0..steps {
            let values: Vec<(SensorKind, f64)> = {
                let mut rng = rand::thread_rng();
                SensorKind::ALL
                    .iter()
                    .map(|&kind| (kind, kind.sample(&mut rng)))
                    .collect()
            };
            self.run_step(step, &values).await?;
            if step + 1 < steps {
                tokio::time::sleep(self.step_interval).await;
            }
        }
        Ok(steps)
    }

    /// One full step: device exchange, then persistence, under one
    /// timestamp. A persistence failure aborts the step and surfaces to
    /// the caller; the menu loop resumes afterwards.
    async fn run_step(&mut self, step: usize, values: &[(SensorKind, f64)]) -> Result<()> {
        let timestamp = Local::now().naive_local();
        let outcome = execute_step(&mut self.bus, values, timestamp).await?;

        for reading in &outcome.readings {
            self.historian.insert_reading(reading).await?;
        }
        for event in &outcome.events {
            self.historian.insert_event(event).await?;
        }

        info!(
            step,
            written = values.len(),
            readings = outcome.readings.len(),
            events = outcome.events.len(),
            "step persisted"
        );
        Ok(())
    }
}
