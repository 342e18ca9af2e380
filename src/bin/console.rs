use clap::{App, Arg};
use colored::*;
use shipbus::config::SimulationConfig;
use shipbus::protocol::{COMMAND_ERROR, ERR, INVALID_COMMAND, INVALID_DEVICE, NULL};
use shipbus::Simulation;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::time;
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("shipbus-console")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🎛️  Interactive operator console for a simulated ship")
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
            Arg::with_name("ship")
                .short("s")
                .long("ship")
                .value_name("NAME")
                .help("Ship to talk to (defaults to the first configured ship)")
                .takes_value(true),
        )
        .get_matches();

    let config_path = matches.value_of("config").ok_or("missing --config")?;
    let config = SimulationConfig::load(config_path)?;
    let simulation = Simulation::from_config(&config)?;

    let mut ship_name = match matches.value_of("ship") {
        Some(name) => name.to_string(),
        None => config
            .ships
            .first()
            .map(|ship| ship.name.clone())
            .ok_or("configuration has no ships")?,
    };
    let mut ship = simulation
        .ship_id(&ship_name)
        .ok_or_else(|| format!("unknown ship '{ship_name}'"))?;

    let simulation = Arc::new(Mutex::new(simulation));
    let ticker = tokio::spawn(run_ticks(Arc::clone(&simulation), config.tick_interval_ms));

    println!("{}", "🎛️  Ship Console".bold().blue());
    println!("{}", "=================".blue());
    println!(
        "Talking to {}. Type protocol lines, {} to switch ship, {} to exit.",
        ship_name.bold(),
        "/ship <name>".cyan(),
        "/quit".cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", format!("{ship_name}>").green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "/quit" {
            break;
        }
        if let Some(name) = line.strip_prefix("/ship ") {
            match simulation.lock().await.ship_id(name.trim()) {
                Some(id) => {
                    ship = id;
                    ship_name = name.trim().to_string();
                }
                None => println!("{} unknown ship '{}'", "✗".red(), name.trim()),
            }
            continue;
        }

        let reply = simulation.lock().await.communicate(ship, line);
        match reply {
            Ok(reply) => print_reply(&reply),
            Err(e) => println!("{} {}", "✗".red(), e.to_string().red()),
        }
    }

    ticker.abort();
    println!("{}", "👋 Console closed".dimmed());
    Ok(())
}

async fn run_ticks(simulation: Arc<Mutex<Simulation>>, tick_interval_ms: u64) {
    let mut interval = time::interval(Duration::from_millis(tick_interval_ms));
    loop {
        interval.tick().await;
        let mut sim = simulation.lock().await;
        if let Err(e) = sim.tick() {
            error!("{}", e);
        }
        for id in sim.faulted_ships() {
            let _ = sim.remove_ship(id);
        }
    }
}

fn print_reply(reply: &str) {
    if is_error_reply(reply) {
        println!("{}", reply.red());
    } else if reply == NULL {
        println!("{}", reply.dimmed());
    } else {
        println!("{}", reply.white());
    }
}

fn is_error_reply(reply: &str) -> bool {
    matches!(reply, INVALID_COMMAND | COMMAND_ERROR | INVALID_DEVICE | ERR)
        || reply.starts_with("Error: ")
}
