use std::sync::Arc;
use std::time::Duration;

use shipbus::comms::CommunicationEngine;
use shipbus::config::ControllerConfig;
use shipbus::controller::{serve, spawn_controller, ControllerError, SharedSimulation};
use shipbus::physics::{BodyConfig, RigidBodyWorld};
use shipbus::{ShipId, Simulation, Structure, StructuralPart};
use tokio::sync::Mutex;

fn shared_simulation() -> (SharedSimulation, ShipId) {
    let mut world = RigidBodyWorld::new();
    let body = world.add_body(BodyConfig::default());
    let mut ship = Structure::ship(body);
    ship.add_part(StructuralPart::new((0.0, 0.0)), Some("hull"));

    let mut sim = Simulation::new(Box::new(world), CommunicationEngine::default(), 0.02);
    let id = sim.add_ship("scout", ship);
    (Arc::new(Mutex::new(sim)), id)
}

#[tokio::test]
async fn test_serve_answers_each_line() {
    let (sim, id) = shared_simulation();
    let input: &[u8] = b"device-count\nhull: device-type\r\nthrottle up\n";
    let mut output = Vec::new();

    serve(input, &mut output, id, sim).await.unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "1\nstructural-part\nInvalid command\n"
    );
}

#[tokio::test]
async fn test_serve_handles_missing_trailing_newline() {
    let (sim, id) = shared_simulation();
    let input: &[u8] = b"device-type";
    let mut output = Vec::new();

    serve(input, &mut output, id, sim).await.unwrap();

    assert_eq!(String::from_utf8(output).unwrap(), "ship\n");
}

#[tokio::test]
async fn test_serve_stops_when_ship_is_removed() {
    let (sim, id) = shared_simulation();
    sim.lock().await.remove_ship(id).unwrap();

    let input: &[u8] = b"device-count\ndevice-count\n";
    let mut output = Vec::new();
    serve(input, &mut output, id, Arc::clone(&sim)).await.unwrap();

    assert!(output.is_empty());
}

#[tokio::test]
async fn test_spawn_reports_missing_program() {
    let (sim, id) = shared_simulation();
    let config = ControllerConfig {
        program: "/nonexistent/shipbus-pilot".to_string(),
        args: Vec::new(),
    };

    let result = spawn_controller(&config, id, sim, Duration::from_millis(10));
    assert!(matches!(result, Err(ControllerError::Spawn { .. })));
}

#[cfg(unix)]
#[tokio::test]
async fn test_controller_round_trip() {
    let (sim, id) = shared_simulation();
    let config = ControllerConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "echo 'hull: device-type'; read reply; test \"$reply\" = structural-part".to_string(),
        ],
    };

    let handle = spawn_controller(&config, id, sim, Duration::from_millis(10)).unwrap();
    assert_eq!(handle.ship, id);
    tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("controller should exit on its own");
}

#[cfg(unix)]
#[tokio::test]
async fn test_watcher_stops_controller_of_destroyed_ship() {
    let (sim, id) = shared_simulation();
    let config = ControllerConfig {
        program: "sleep".to_string(),
        args: vec!["30".to_string()],
    };

    let handle = spawn_controller(&config, id, Arc::clone(&sim), Duration::from_millis(10)).unwrap();
    sim.lock().await.remove_ship(id).unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("watcher should kill the controller");
}

#[cfg(unix)]
#[tokio::test]
async fn test_destroyed_ship_controller_gets_hangup() {
    let (sim, id) = shared_simulation();
    let marker = std::env::temp_dir().join(format!("shipbus-hangup-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);
    let config = ControllerConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "trap 'touch \"$0\"; exit 0' HUP; while true; do sleep 0.05; done".to_string(),
            marker.display().to_string(),
        ],
    };

    let handle = spawn_controller(&config, id, Arc::clone(&sim), Duration::from_secs(2)).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    sim.lock().await.remove_ship(id).unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("controller should exit on hang-up");
    assert!(marker.exists(), "controller did not run its HUP handler");
    let _ = std::fs::remove_file(&marker);
}

#[cfg(unix)]
#[tokio::test]
async fn test_controller_ignoring_hangup_is_killed() {
    let (sim, id) = shared_simulation();
    let config = ControllerConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "trap '' HUP; exec sleep 30".to_string()],
    };

    let handle = spawn_controller(&config, id, Arc::clone(&sim), Duration::from_millis(50)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    sim.lock().await.remove_ship(id).unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("watcher should kill a controller that ignores SIGHUP");
}
