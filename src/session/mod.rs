//! Session lifecycles on top of a running [`Engine`](crate::engine::Engine):
//! foreground gameplay stepping, background parameter optimization, and
//! synchronous log replay.

pub mod gameplay;
pub mod handoff;
pub mod optimizer;
pub mod replay;

pub use gameplay::{GameSession, SensorReading, StepInput};
pub use handoff::{handoff, HandoffReceiver, HandoffSender, ReplayEntry};
pub use optimizer::{OptimizeState, OptimizerSession};
pub use replay::ReplaySession;

use crate::config::ConfigError;
use crate::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no optimized parameters are available yet")]
    NotOptimized,

    #[error("configuration exposes no optimizable parameter section")]
    NoOptimizableFilter,

    #[error("an optimization run is already in progress")]
    AlreadyRunning,
}
