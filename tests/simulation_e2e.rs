//! End-to-end runs: scenario or randomizer through the bridge and device
//! simulator into a scratch historian database.

use std::time::Duration;

use simsrv::bridge::ModbusBridge;
use simsrv::driver::SimulationDriver;
use simsrv::historian::Historian;
use simsrv::registers::SensorKind;
use simsrv::scenario::Scenario;
use simsrv::simulator::DeviceSimulator;

const SUNNY_SOURCE: &str = "\
# Sunny
'Humidity' 40 41
'Temperature' 20 21
";

struct Testbed {
    simulator: DeviceSimulator,
    historian: Historian,
    driver: SimulationDriver<ModbusBridge>,
    _dir: tempfile::TempDir,
}

async fn testbed() -> Testbed {
    let simulator = DeviceSimulator::new();
    let addr = simulator.start().await.unwrap();
    let bridge = ModbusBridge::connect(&addr.ip().to_string(), addr.port(), 1)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let historian = Historian::open(dir.path().join("e2e.db")).await.unwrap();

    let driver = SimulationDriver::new(bridge, historian.clone(), Duration::from_millis(10));
    Testbed {
        simulator,
        historian,
        driver,
        _dir: dir,
    }
}

#[tokio::test]
async fn scripted_sunny_run_persists_expected_rows() {
    let mut bed = testbed().await;

    let scenario = Scenario::parse(SUNNY_SOURCE, "Sunny");
    let executed = bed.driver.run_scripted(&scenario, 2).await.unwrap();
    assert_eq!(executed, 2);

    let humidity = bed.historian.reading_values(SensorKind::Humidity).await.unwrap();
    assert_eq!(humidity, vec![40.0, 41.0]);

    let temperature = bed
        .historian
        .reading_values(SensorKind::Temperature)
        .await
        .unwrap();
    assert_eq!(temperature, vec![20.0, 21.0]);

    // No coil was ever set, so the log table stays empty
    assert!(bed.historian.events().await.unwrap().is_empty());

    // Sensors the scenario never wrote are rejected by the device and
    // therefore contribute no rows
    let pressure = bed.historian.reading_values(SensorKind::Pressure).await.unwrap();
    assert!(pressure.is_empty());
}

#[tokio::test]
async fn readings_within_one_step_share_a_timestamp() {
    let mut bed = testbed().await;

    let scenario = Scenario::parse(SUNNY_SOURCE, "Sunny");
    bed.driver.run_scripted(&scenario, 1).await.unwrap();

    let (humidity_ts, _) = bed
        .historian
        .latest_reading(SensorKind::Humidity)
        .await
        .unwrap()
        .unwrap();
    let (temperature_ts, _) = bed
        .historian
        .latest_reading(SensorKind::Temperature)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(humidity_ts, temperature_ts);
}

#[tokio::test]
async fn empty_scenario_executes_no_step() {
    let mut bed = testbed().await;

    let scenario = Scenario::parse(SUNNY_SOURCE, "Blizzard");
    let err = bed.driver.run_scripted(&scenario, 2).await.unwrap_err();
    assert!(matches!(err, simsrv::SimSrvError::EmptyScenario(_)), "got {err}");

    for kind in SensorKind::ALL {
        assert!(bed.historian.reading_values(kind).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn randomized_run_covers_every_sensor_within_domain() {
    let mut bed = testbed().await;

    let executed = bed.driver.run_randomized(3).await.unwrap();
    assert_eq!(executed, 3);

    for kind in SensorKind::ALL {
        let values = bed.historian.reading_values(kind).await.unwrap();
        assert_eq!(values.len(), 3, "{kind:?} must have one row per step");
    }

    // Read-back goes through 16-bit registers, so persisted values are the
    // truncated integers of the sampled domains
    for value in bed.historian.reading_values(SensorKind::Temperature).await.unwrap() {
        assert!((15.0..=30.0).contains(&value), "temperature {value} out of domain");
    }
    for value in bed.historian.reading_values(SensorKind::Pressure).await.unwrap() {
        assert!((950.0..=1050.0).contains(&value), "pressure {value} out of domain");
    }
    for value in bed.historian.reading_values(SensorKind::GarageMotion).await.unwrap() {
        assert!(value == 0.0 || value == 1.0, "motion flag {value} not boolean");
    }
}

#[tokio::test]
async fn wired_coils_become_log_events() {
    let mut bed = testbed().await;

    bed.simulator.set_coil(0, true).await; // Fan
    bed.simulator.set_coil(8, true).await; // Tornado

    let scenario = Scenario::parse(SUNNY_SOURCE, "Sunny");
    bed.driver.run_scripted(&scenario, 1).await.unwrap();

    let events = bed.historian.events().await.unwrap();
    let names: Vec<&str> = events.iter().map(|(name, _, _)| name.as_str()).collect();
    assert_eq!(names, vec!["Fan", "Tornado"]);
    assert_eq!(events[0].1, events[1].1, "events share the step timestamp");
}

#[tokio::test]
async fn out_of_range_step_counts_are_rejected_before_any_io() {
    let mut bed = testbed().await;
    let scenario = Scenario::parse(SUNNY_SOURCE, "Sunny");

    for requested in [0, 21] {
        let err = bed.driver.run_scripted(&scenario, requested).await.unwrap_err();
        assert!(
            matches!(err, simsrv::SimSrvError::InvalidStepCount(n) if n == requested),
            "got {err}"
        );
    }
    assert!(bed
        .historian
        .reading_values(SensorKind::Humidity)
        .await
        .unwrap()
        .is_empty());
}
