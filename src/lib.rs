//! GlucoLink - game adapter for an event-pipeline glucose simulation engine
//!
//! This library compiles purpose-tagged configuration templates for the
//! external pipeline engine and orchestrates the three session kinds built
//! on top of it: turn-based gameplay stepping, background parameter
//! optimization, and synchronous replay of a recorded session.
//!
//! # Example
//!
//! ```rust
//! use glucolink::config::{build_config, Catalogue, Purpose};
//!
//! let catalogue = Catalogue::builtin();
//! let config = build_config(
//!     &catalogue,
//!     0,
//!     0,
//!     5.0 / 86_400.0,
//!     "session-in.log",
//!     "session-out.log",
//!     Purpose::Gameplay,
//!     None,
//! )
//! .unwrap();
//! assert!(config.contains("[Filter_001_"));
//! ```

pub mod config;
pub mod engine;
pub mod session;

pub use config::{build_config, replay_only_config, Catalogue, ConfigError, Purpose};
pub use engine::{DeviceEvent, Engine, EngineError, EventObserver, Execution, SignalId};
pub use session::{
    GameSession, OptimizerSession, ReplaySession, SensorReading, SessionError, StepInput,
};
