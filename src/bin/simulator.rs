use clap::{App, Arg};
use shipbus::config::SimulationConfig;
use shipbus::controller::{spawn_controller, ControllerHandle};
use shipbus::{Simulation, SimulationError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let matches = App::new("shipbus-simulator")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🚀 Spacecraft device bus simulator driven by controller processes")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Simulation configuration (JSON)")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("ticks")
                .long("ticks")
                .value_name("COUNT")
                .help("Stop after this many ticks")
                .takes_value(true),
        )
        .get_matches();

    let config_path = matches.value_of("config").ok_or("missing --config")?;
    let max_ticks = matches.value_of("ticks").map(str::parse::<u64>).transpose()?;

    println!("🚀 Spacecraft Device Bus Simulator");
    println!("==================================");

    let config = SimulationConfig::load(config_path)?;
    let simulation = Arc::new(Mutex::new(Simulation::from_config(&config)?));
    info!("Loaded {} ship(s) from {}", config.ships.len(), config_path);

    // Start one controller per configured ship
    let watch_interval = Duration::from_millis(config.watch_interval_ms);
    let mut controllers: Vec<ControllerHandle> = Vec::new();
    for ship in &config.ships {
        let Some(controller) = &ship.controller else {
            continue;
        };
        let Some(id) = simulation.lock().await.ship_id(&ship.name) else {
            continue;
        };
        match spawn_controller(controller, id, Arc::clone(&simulation), watch_interval) {
            Ok(handle) => controllers.push(handle),
            Err(e) => error!("Ship '{}': {}", ship.name, e),
        }
    }

    let mut interval = time::interval(Duration::from_millis(config.tick_interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Ctrl+C received, shutting down");
                break;
            }
        }

        let mut sim = simulation.lock().await;
        match sim.tick() {
            Ok(()) => {}
            Err(SimulationError::ShipFault { ship, source, .. }) => {
                error!("❌ Ship '{}' fault: {}", ship, source);
            }
            Err(e) => {
                error!("❌ Simulation error: {}", e);
                break;
            }
        }

        for id in sim.faulted_ships() {
            if let Err(e) = sim.remove_ship(id) {
                warn!("Failed to remove faulted ship {}: {}", id, e);
            }
        }

        if max_ticks.is_some_and(|max| sim.tick_count() >= max) {
            info!("Reached {} ticks", sim.tick_count());
            break;
        }
    }

    for controller in &controllers {
        controller.abort();
    }
    println!("🛑 Simulator stopped");

    Ok(())
}
