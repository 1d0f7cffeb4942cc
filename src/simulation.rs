// src/simulation.rs - Shared plotter state and the two periodic workers
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{Config, ConfigError};
use crate::kinematics;
use crate::logger::RecordFormat;
use crate::registry::{Axis, Registry, RegistryError, Toggle};
use crate::sink::{FileSinkFactory, SinkFactory};

/// Simulated time. Advances by exactly one period per simulation tick, whatever
/// the wall clock did.
#[derive(Debug, Clone)]
pub struct SimClock {
    ticks: u64,
    period: f64,
}

impl SimClock {
    pub fn new(period: Duration) -> Self {
        Self {
            ticks: 0,
            period: period.as_secs_f64(),
        }
    }

    pub fn advance(&mut self) {
        self.ticks += 1;
    }

    /// Seconds of simulated time elapsed.
    pub fn time(&self) -> f64 {
        self.ticks as f64 * self.period
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn period(&self) -> f64 {
        self.period
    }
}

/// Everything the workers and the command path share, behind one lock.
pub struct PlotterState {
    pub registry: Registry,
    pub clock: SimClock,
}

/// One full kinematics pass: advance the clock, then step every motor.
pub fn simulation_tick(state: &mut PlotterState) {
    let PlotterState { registry, clock } = state;
    clock.advance();
    kinematics::advance(registry, clock.period());
}

/// One full logging pass at the current simulated time.
pub fn logging_tick(state: &mut PlotterState) {
    let time = state.clock.time();
    state.registry.sample_pens(time);
}

/// The plotter: registry, clock and tick periods. Every method that touches the
/// registry takes the shared lock.
pub struct Simulation {
    state: Arc<RwLock<PlotterState>>,
    simulation_period: Duration,
    logging_period: Duration,
}

impl Simulation {
    pub fn new(config: &Config, sinks: Arc<dyn SinkFactory>) -> Result<Self, ConfigError> {
        config.validate()?;
        let simulation_period = Duration::from_secs_f64(config.simulation.period);
        let logging_period = Duration::from_secs_f64(config.logging.period);
        let format = if config.logging.legacy_pen_up_marker {
            RecordFormat::Legacy
        } else {
            RecordFormat::Separated
        };
        let registry = Registry::new(sinks)
            .with_motor_defaults(config.motor)
            .with_record_format(format);
        Ok(Self {
            state: Arc::new(RwLock::new(PlotterState {
                registry,
                clock: SimClock::new(simulation_period),
            })),
            simulation_period,
            logging_period,
        })
    }

    /// Pen logs go to `<logging.directory>/<pen>.log`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let sinks = Arc::new(FileSinkFactory::new(config.logging.directory.clone()));
        Self::new(config, sinks)
    }

    pub fn state(&self) -> Arc<RwLock<PlotterState>> {
        self.state.clone()
    }

    pub fn simulation_period(&self) -> Duration {
        self.simulation_period
    }

    pub fn logging_period(&self) -> Duration {
        self.logging_period
    }

    /// Restarts the clock at zero. Only valid before `start`.
    pub(crate) async fn set_simulation_period(&mut self, period: Duration) {
        self.simulation_period = period;
        self.state.write().await.clock = SimClock::new(period);
        tracing::info!("Simulation period set to {:?}", period);
    }

    pub(crate) fn set_logging_period(&mut self, period: Duration) {
        self.logging_period = period;
        tracing::info!("Logging period set to {:?}", period);
    }

    pub async fn create_motor(&self, name: &str) -> Result<(), RegistryError> {
        self.state.write().await.registry.create_motor(name)
    }

    pub async fn create_pen(&self, name: &str) -> Result<(), RegistryError> {
        self.state.write().await.registry.create_pen(name)
    }

    pub async fn attach(&self, pen: &str, motor: &str, axis: Axis) -> Result<(), RegistryError> {
        self.state.write().await.registry.attach(pen, motor, axis)
    }

    pub async fn set_motor_max_speed(&self, motor: &str, value: f64) -> Result<(), RegistryError> {
        self.state.write().await.registry.set_max_speed(motor, value)
    }

    pub async fn set_motor_acceleration(&self, motor: &str, value: f64) -> Result<(), RegistryError> {
        self.state.write().await.registry.set_acceleration(motor, value)
    }

    pub async fn set_motor_target(&self, motor: &str, value: f64) -> Result<(), RegistryError> {
        self.state.write().await.registry.set_target(motor, value)
    }

    pub async fn toggle(&self, pen: &str, toggle: Toggle) -> Result<(), RegistryError> {
        self.state.write().await.registry.toggle(pen, toggle)
    }

    pub async fn dump(&self) -> String {
        self.state.read().await.registry.dump()
    }

    /// Spawns the simulation and logging workers. They run until the returned
    /// handle is stopped or dropped.
    pub fn start(&self) -> SimulationHandle {
        tracing::info!(
            "Starting simulation (tick {:?}, logging {:?})",
            self.simulation_period,
            self.logging_period
        );
        let (shutdown_tx, _) = broadcast::channel(1);
        let simulation = spawn_periodic(
            "Simulation",
            self.state.clone(),
            self.simulation_period,
            shutdown_tx.subscribe(),
            simulation_tick,
        );
        let logging = spawn_periodic(
            "Logging",
            self.state.clone(),
            self.logging_period,
            shutdown_tx.subscribe(),
            logging_tick,
        );
        SimulationHandle {
            shutdown_tx,
            workers: vec![simulation, logging],
        }
    }
}

/// Runs `tick` under the write lock once per `period`, first after one full period.
fn spawn_periodic(
    name: &'static str,
    state: Arc<RwLock<PlotterState>>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    tick: fn(&mut PlotterState),
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(start) = Instant::now().checked_add(period) else {
            tracing::error!("{} loop cannot schedule a period of {:?}", name, period);
            return;
        };
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("{} loop shutting down", name);
                    break;
                }
                _ = interval.tick() => {
                    let mut state = state.write().await;
                    tick(&mut *state);
                }
            }
        }
    })
}

/// Running workers. Stopping wakes them immediately instead of waiting out
/// their current period.
pub struct SimulationHandle {
    shutdown_tx: broadcast::Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl SimulationHandle {
    pub async fn stop(self) {
        tracing::info!("Stopping simulation");
        let _ = self.shutdown_tx.send(());
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Simulation worker failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TICK_PERIOD;
    use crate::sink::MemorySinkFactory;

    fn simulation(sinks: &MemorySinkFactory) -> Simulation {
        Simulation::new(&Config::default(), Arc::new(sinks.clone())).unwrap()
    }

    #[test]
    fn test_clock_advances_by_period() {
        let mut clock = SimClock::new(Duration::from_millis(100));
        assert_eq!(clock.time(), 0.0);
        for _ in 0..3 {
            clock.advance();
        }
        assert_eq!(clock.ticks(), 3);
        assert!((clock.time() - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_ticks_move_motor_and_log_pen() {
        let sinks = MemorySinkFactory::new();
        let sim = simulation(&sinks);
        sim.create_motor("m1").await.unwrap();
        sim.create_pen("p1").await.unwrap();
        sim.attach("p1", "m1", Axis::X).await.unwrap();

        let state = sim.state();
        {
            let mut s = state.write().await;
            simulation_tick(&mut s);
            logging_tick(&mut s);
            let m = s.registry.motor("m1").unwrap();
            assert!((m.position - 0.005).abs() < 1e-12);
            assert!((m.velocity - 0.1).abs() < 1e-12);
        }
        assert_eq!(sinks.lines("p1"), vec!["0.1;0.005;00"]);
    }

    #[tokio::test]
    async fn test_toggle_between_log_ticks() {
        let sinks = MemorySinkFactory::new();
        let sim = simulation(&sinks);
        sim.create_pen("p1").await.unwrap();
        let state = sim.state();

        sim.toggle("p1", Toggle::On).await.unwrap();
        logging_tick(&mut *state.write().await);
        sim.toggle("p1", Toggle::Off).await.unwrap();
        logging_tick(&mut *state.write().await);
        logging_tick(&mut *state.write().await);

        assert_eq!(sinks.lines("p1"), vec!["0;00;00", "0;--;--"]);
    }

    #[tokio::test]
    async fn test_set_simulation_period_resets_clock() {
        let sinks = MemorySinkFactory::new();
        let mut sim = simulation(&sinks);
        sim.set_simulation_period(Duration::from_millis(50)).await;
        sim.set_logging_period(Duration::from_millis(200));
        assert_eq!(sim.simulation_period(), Duration::from_millis(50));
        assert_eq!(sim.logging_period(), Duration::from_millis(200));
        let state = sim.state();
        let mut s = state.write().await;
        simulation_tick(&mut s);
        assert!((s.clock.time() - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_unschedulable_period_ends_worker_cleanly() {
        let sinks = MemorySinkFactory::new();
        let sim = simulation(&sinks);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = spawn_periodic("Logging", sim.state(), Duration::MAX, shutdown_rx, logging_tick);
        assert!(worker.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_period_runs_and_stops() {
        let sinks = MemorySinkFactory::new();
        let mut config = Config::default();
        config.simulation.period = MAX_TICK_PERIOD.as_secs_f64();
        config.logging.period = MAX_TICK_PERIOD.as_secs_f64();
        let sim = Simulation::new(&config, Arc::new(sinks.clone())).unwrap();
        sim.create_pen("p").await.unwrap();

        let handle = sim.start();
        tokio::time::sleep(MAX_TICK_PERIOD + Duration::from_secs(1)).await;
        handle.stop().await;
        assert_eq!(sim.state().read().await.clock.ticks(), 1);
        assert_eq!(sinks.lines("p").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_run_and_stop_promptly() {
        let sinks = MemorySinkFactory::new();
        let sim = simulation(&sinks);
        sim.create_motor("m1").await.unwrap();
        sim.create_pen("p1").await.unwrap();
        sim.attach("p1", "m1", Axis::Y).await.unwrap();

        let handle = sim.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let stopped_at = Instant::now();
        handle.stop().await;
        assert!(Instant::now() - stopped_at < Duration::from_millis(100));

        let ticks = sim.state().read().await.clock.ticks();
        assert!((24..=25).contains(&ticks), "ticks = {}", ticks);
        let lines = sinks.lines("p1");
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains(";00;")));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sim.state().read().await.clock.ticks(), ticks);
        assert_eq!(sinks.lines("p1").len(), 2);
    }
}
