//! Controller process workers.
//!
//! Each ship may be driven by an external program. The program writes one
//! protocol line per command to its stdout and reads one reply line per
//! command from its stdin. A worker task shuttles lines between the child
//! and the ship's root device, taking the shared simulation lock for each
//! command. A watcher task hangs up on the child once its ship is destroyed,
//! and kills it if it is still running one watch interval later.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::simulation::{ShipId, Simulation};

pub type SharedSimulation = Arc<Mutex<Simulation>>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to spawn controller '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("controller '{program}' has no {pipe} pipe")]
    MissingPipe { program: String, pipe: &'static str },
}

/// Tasks attached to one running controller process.
pub struct ControllerHandle {
    pub ship: ShipId,
    pub worker: JoinHandle<()>,
    pub watcher: JoinHandle<()>,
    pub relay: JoinHandle<()>,
}

impl ControllerHandle {
    /// Waits for the controller process to exit and its pipes to close.
    pub async fn join(self) {
        let _ = self.watcher.await;
        let _ = self.worker.await;
        let _ = self.relay.await;
    }

    pub fn abort(&self) {
        self.worker.abort();
        self.watcher.abort();
        self.relay.abort();
    }
}

/// Starts `config.program` as the controller of `ship`.
pub fn spawn_controller(
    config: &ControllerConfig,
    ship: ShipId,
    simulation: SharedSimulation,
    watch_interval: Duration,
) -> Result<ControllerHandle, ControllerError> {
    let mut child = Command::new(&config.program)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ControllerError::Spawn {
            program: config.program.clone(),
            source,
        })?;

    let missing = |pipe| ControllerError::MissingPipe {
        program: config.program.clone(),
        pipe,
    };
    let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    info!("🎮 Controller '{}' started for ship {} (pid {:?})", config.program, ship, child.id());

    let label = config.program.clone();
    let worker_simulation = Arc::clone(&simulation);
    let worker = tokio::spawn(async move {
        match serve(BufReader::new(stdout), stdin, ship, worker_simulation).await {
            Ok(()) => debug!("Controller '{}' closed its output", label),
            Err(e) => warn!("Controller '{}' worker stopped: {}", label, e),
        }
    });

    let label = config.program.clone();
    let relay = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{} stderr] {}", label, line);
        }
    });

    let label = config.program.clone();
    let watcher = tokio::spawn(watch(child, label, ship, simulation, watch_interval));

    Ok(ControllerHandle {
        ship,
        worker,
        watcher,
        relay,
    })
}

/// Answers protocol lines from `reader` until EOF, writing one reply line
/// per request.
///
/// The simulation lock is held only while the command runs, never while
/// waiting on the pipes. A broken pipe or a removed ship ends the loop
/// without error.
pub async fn serve<R, W>(reader: R, mut writer: W, ship: ShipId, simulation: SharedSimulation) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = {
            let mut sim = simulation.lock().await;
            match sim.communicate(ship, &line) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!("Dropping controller request: {}", e);
                    return Ok(());
                }
            }
        };

        let written = async {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Polls the ship every `interval`; hangs up on the child once the ship is gone.
async fn watch(mut child: Child, label: String, ship: ShipId, simulation: SharedSimulation, interval: Duration) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) => info!("Controller '{}' exited with {}", label, status),
                    Err(e) => warn!("Failed to wait on controller '{}': {}", label, e),
                }
                return;
            }
            _ = ticker.tick() => {
                let destroyed = simulation.lock().await.is_destroyed(ship);
                if destroyed {
                    info!("💥 Ship {} destroyed, stopping controller '{}'", ship, label);
                    stop(&mut child, &label, interval).await;
                    return;
                }
            }
        }
    }
}

/// SIGHUP first, SIGKILL once `grace` has passed.
async fn stop(child: &mut Child, label: &str, grace: Duration) {
    match hang_up(child) {
        Ok(true) => match time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Controller '{}' hung up with {}", label, status);
                return;
            }
            Ok(Err(e)) => warn!("Failed to wait on controller '{}': {}", label, e),
            Err(_) => warn!("Controller '{}' ignored the hang-up", label),
        },
        Ok(false) => {}
        Err(e) => warn!("Failed to hang up on controller '{}': {}", label, e),
    }

    if let Err(e) = child.start_kill() {
        warn!("Failed to kill controller '{}': {}", label, e);
    }
    let _ = child.wait().await;
}

/// Returns false when there is no live process to signal.
#[cfg(unix)]
fn hang_up(child: &Child) -> nix::Result<bool> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(false);
    };
    let pid = i32::try_from(pid).map_err(|_| nix::Error::EINVAL)?;
    kill(Pid::from_raw(pid), Signal::SIGHUP)?;
    Ok(true)
}

#[cfg(not(unix))]
fn hang_up(_child: &Child) -> std::io::Result<bool> {
    Ok(false)
}
