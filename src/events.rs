//! Coil-to-event derivation
//!
//! The device exposes twelve coils; each set bit maps to exactly one
//! semantic domain event. The mapping is an explicit enumerated table with
//! bounds checking, so a coil vector of the wrong width is rejected instead
//! of read out of bounds.

use chrono::NaiveDateTime;

use crate::error::{Result, SimSrvError};
use crate::registers::COIL_COUNT;

/// Discrete states signalled by the device's coil block, one per coil index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilEvent {
    Fan,
    Sunny,
    Storm,
    Dehumidifier,
    GarageLightbulb,
    BedroomLightbulb,
    BathroomLightbulb,
    LivingRoomLightbulb,
    Tornado,
    AlarmLight,
    Snowing,
    Heater,
}

impl CoilEvent {
    /// Coil index to event, `None` outside 0..12
    pub fn from_index(index: usize) -> Option<CoilEvent> {
        match index {
            0 => Some(CoilEvent::Fan),
            1 => Some(CoilEvent::Sunny),
            2 => Some(CoilEvent::Storm),
            3 => Some(CoilEvent::Dehumidifier),
            4 => Some(CoilEvent::GarageLightbulb),
            5 => Some(CoilEvent::BedroomLightbulb),
            6 => Some(CoilEvent::BathroomLightbulb),
            7 => Some(CoilEvent::LivingRoomLightbulb),
            8 => Some(CoilEvent::Tornado),
            9 => Some(CoilEvent::AlarmLight),
            10 => Some(CoilEvent::Snowing),
            11 => Some(CoilEvent::Heater),
            _ => None,
        }
    }

    /// Event name stored in the historian log table
    pub fn name(&self) -> &'static str {
        match self {
            CoilEvent::Fan => "Fan",
            CoilEvent::Sunny => "Sunny",
            CoilEvent::Storm => "Storm",
            CoilEvent::Dehumidifier => "Dehumidifier",
            CoilEvent::GarageLightbulb => "Garage Lightbulb",
            CoilEvent::BedroomLightbulb => "Bedroom Lightbulb",
            CoilEvent::BathroomLightbulb => "Bathroom Lightbulb",
            CoilEvent::LivingRoomLightbulb => "Living Room Lightbulb",
            CoilEvent::Tornado => "Tornado",
            CoilEvent::AlarmLight => "Alarm Light",
            CoilEvent::Snowing => "Snowing",
            CoilEvent::Heater => "Heater",
        }
    }

    /// Human-readable description stored alongside the event
    pub fn description(&self) -> &'static str {
        match self {
            CoilEvent::Fan => "The fan turned on",
            CoilEvent::Sunny => "The weather is sunny",
            CoilEvent::Storm => "A storm is occurring",
            CoilEvent::Dehumidifier => "The dehumidifier turned on",
            CoilEvent::GarageLightbulb => "The garage lightbulb turned on",
            CoilEvent::BedroomLightbulb => "The bedroom lightbulb turned on",
            CoilEvent::BathroomLightbulb => "The bathroom lightbulb turned on",
            CoilEvent::LivingRoomLightbulb => "The living room lightbulb turned on",
            CoilEvent::Tornado => "A tornado is approaching",
            CoilEvent::AlarmLight => "The alarm light turned on because of the tornado",
            CoilEvent::Snowing => "It is snowing",
            CoilEvent::Heater => "The heater turned on",
        }
    }
}

/// One derived domain event; never constructed outside derivation
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: &'static str,
    pub timestamp: NaiveDateTime,
    pub description: &'static str,
}

/// Derive events from one coil poll.
///
/// The vector must be exactly [`COIL_COUNT`] bits wide; each set bit emits
/// the matching table entry under the step timestamp, clear bits emit
/// nothing.
pub fn derive_events(coils: &[bool], timestamp: NaiveDateTime) -> Result<Vec<Event>> {
    if coils.len() != COIL_COUNT {
        return Err(SimSrvError::CoilWidthMismatch {
            expected: COIL_COUNT,
            actual: coils.len(),
        });
    }

    let mut events = Vec::new();
    for (index, on) in coils.iter().enumerate() {
        if !on {
            continue;
        }
        // from_index cannot fail here, the width was checked above
        if let Some(coil_event) = CoilEvent::from_index(index) {
            events.push(Event {
                name: coil_event.name(),
                timestamp,
                description: coil_event.description(),
            });
        }
    }
    Ok(events)
}
