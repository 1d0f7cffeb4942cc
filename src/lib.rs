// src/lib.rs - Multi-axis pen plotter simulator
//! Named motors chase target positions under a bang-bang controller while pens
//! attached to motor axes log their positions. A small command language builds
//! the setup, then starts and stops the simulation.

pub mod command;
pub mod config;
pub mod kinematics;
pub mod logger;
pub mod registry;
pub mod simulation;
pub mod sink;

pub use command::{BatchError, Command, CommandError, ErrorKind, Flow, Interpreter, Phase};
pub use config::{Config, ConfigError, load_config};
pub use registry::{Axis, Motor, Pen, Registry, RegistryError, Toggle};
pub use simulation::{Simulation, SimulationHandle};
pub use sink::{FileSinkFactory, MemorySinkFactory, PenSink, SinkFactory};
