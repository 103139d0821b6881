//! simsrv - interactive entry point
//!
//! The menu loop is a thin external surface over the simulation core: it
//! collects a scenario choice and a step count, then hands off to the
//! driver. Invalid input re-prompts without touching core state; a failed
//! run is reported and the menu resumes. Device and store handles live in
//! `main`'s scope, so both are released on every exit path.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use simsrv::bridge::ModbusBridge;
use simsrv::config::Config;
use simsrv::driver::{validate_step_count, SimulationDriver, MAX_STEPS, MIN_STEPS};
use simsrv::error::SimSrvError;
use simsrv::historian::Historian;
use simsrv::scenario::Scenario;
use simsrv::simulator::DeviceSimulator;
use simsrv::{SERVICE_NAME, SERVICE_VERSION};

/// Menu entries in display order; "Random Data" and "Exit" are special
const SCENARIOS: [&str; 7] = [
    "Rainstorm",
    "Sunny",
    "Snowing",
    "Tornado",
    "Progressive Weather",
    "Random Data",
    "Exit",
];

const RANDOM_CHOICE: usize = 6;
const EXIT_CHOICE: usize = 7;

#[derive(Parser, Debug)]
#[command(name = "simsrv", version, about = "Building-automation testbed simulator")]
struct Args {
    /// Path to the service configuration file
    #[arg(short, long, env = "SIMSRV_CONFIG", default_value = "config/simsrv.yaml")]
    config: String,

    /// Start an embedded device simulator instead of connecting to
    /// configured hardware
    #[arg(long)]
    embedded_device: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;

    info!("Starting {} v{}", SERVICE_NAME, SERVICE_VERSION);

    if args.embedded_device {
        let simulator = DeviceSimulator::new();
        let addr = simulator.start().await?;
        config.device.host = addr.ip().to_string();
        config.device.port = addr.port();
        info!("Embedded device simulator running at {}", addr);
    }

    let bridge = ModbusBridge::connect(
        &config.device.host,
        config.device.port,
        config.device.unit_id,
    )
    .await?;
    let historian = Historian::open(&config.historian.db_path).await?;

    let mut driver = SimulationDriver::new(bridge, historian.clone(), config.step_interval());
    menu_loop(&mut driver, &config).await?;

    // The bridge drops with the driver; flush the store explicitly
    drop(driver);
    historian.close().await;
    info!("{} stopped", SERVICE_NAME);
    Ok(())
}

async fn menu_loop(
    driver: &mut SimulationDriver<ModbusBridge>,
    config: &Config,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("\nSelect a scenario to simulate:");
        for (index, name) in SCENARIOS.iter().enumerate() {
            println!("{}: {}", index + 1, name);
        }
        println!("Enter your choice (1-{}):", SCENARIOS.len());

        let Some(line) = lines.next_line().await? else {
            break; // stdin closed
        };
        let choice = match parse_selection(line.trim()) {
            Ok(choice) => choice,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        if choice == EXIT_CHOICE {
            break;
        }

        let Some(steps) = prompt_step_count(&mut lines).await? else {
            break;
        };

        let result = if choice == RANDOM_CHOICE {
            driver.run_randomized(steps).await
        } else {
            run_scenario(driver, config, SCENARIOS[choice - 1], steps).await
        };

        match result {
            Ok(executed) => println!("Simulated {executed} steps."),
            Err(SimSrvError::EmptyScenario(name)) => {
                println!("No data found for scenario '{name}'.");
            }
            Err(e) => {
                error!("Simulation run failed: {}", e);
                println!("Simulation failed: {e}");
            }
        }
    }

    Ok(())
}

/// Parse a menu selection; anything outside 1..=7 re-prompts
fn parse_selection(input: &str) -> Result<usize, SimSrvError> {
    match input.parse::<usize>() {
        Ok(choice) if (1..=SCENARIOS.len()).contains(&choice) => Ok(choice),
        _ => Err(SimSrvError::InvalidSelection(format!(
            "please choose a valid number (1-{})",
            SCENARIOS.len()
        ))),
    }
}

/// Prompt until a valid step count arrives; `None` when stdin closes
async fn prompt_step_count(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Option<i64>> {
    loop {
        println!("How many data points would you like to simulate? ({MIN_STEPS}-{MAX_STEPS}):");
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        match line.trim().parse::<i64>() {
            Ok(requested) => match validate_step_count(requested) {
                Ok(_) => return Ok(Some(requested)),
                Err(_) => println!("Please enter a number between {MIN_STEPS} and {MAX_STEPS}."),
            },
            Err(_) => println!("Invalid input. Please enter a valid number."),
        }
    }
}

async fn run_scenario(
    driver: &mut SimulationDriver<ModbusBridge>,
    config: &Config,
    scenario_name: &str,
    steps: i64,
) -> Result<usize, SimSrvError> {
    let scenario = Scenario::from_file(&config.simulation.scenario_file, scenario_name)?;
    driver.run_scripted(&scenario, steps).await
}

fn init_logging() {
    let log_level =
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("{}=info", env!("CARGO_PKG_NAME")));

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
