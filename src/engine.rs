//! Interface boundary to the external filter-pipeline engine.
//!
//! The engine itself (filter execution, physiological models, the parameter
//! solver) lives outside this crate. Everything the sessions need from it is
//! expressed through the [`Engine`], [`Execution`] and [`EventObserver`]
//! traits so the orchestration layers can be exercised against a scripted
//! double.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::{uuid, Uuid};

/// Identifier of a signal within the pipeline, shared with the engine.
pub type SignalId = Uuid;

/// One second expressed in the engine's day-based ("rat time") timestamps.
pub const ONE_SECOND: f64 = 1.0 / (24.0 * 60.0 * 60.0);

/// The unix epoch expressed in rat time (days since 1899-12-30).
const UNIX_EPOCH_RAT: f64 = 25_569.0;

/// Convert seconds since the unix epoch to a rat-time timestamp.
pub fn unix_time_to_rat_time(unix_seconds: u64) -> f64 {
    UNIX_EPOCH_RAT + unix_seconds as f64 * ONE_SECOND
}

/// Device identifier this adapter stamps on every event it injects.
pub const GAMELINK_DEVICE_ID: Uuid = uuid!("b01f968d-5fb9-426c-9d42-6718afd8aac1");

/// Default solver (Halton-driven MetaDE) used for parameter optimization.
pub const HALTON_METADE_SOLVER_ID: Uuid = uuid!("01274b08-f721-42bc-a562-0556714c5685");

/// Signal identifiers the adapter maps to and from, as they appear in the
/// pipeline configuration grammar.
pub mod signals {
    use super::SignalId;
    use uuid::uuid;

    /// Blood glucose [mmol/L].
    pub const BG: SignalId = uuid!("f666f6c2-d7c0-43e8-8ee1-c8caa8f860e5");
    /// Interstitial glucose [mmol/L].
    pub const IG: SignalId = uuid!("3034568d-f498-455b-ac6a-bcf301f69c9e");
    /// Insulin on board [U].
    pub const IOB: SignalId = uuid!("313a1c11-6bac-46e2-8938-7353409f2fcd");
    /// Carbohydrates on board [g].
    pub const COB: SignalId = uuid!("b74aa581-538c-4b30-b764-5bd0d97b0727");
    /// Insulin actually delivered by the modeled pump [U].
    pub const DELIVERED_INSULIN: SignalId = uuid!("ee655943-06bf-4f9d-b27d-aacb3943fb91");
    /// Discrete-step synchronization pulse the model waits for.
    pub const SYNCHRONIZATION: SignalId = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

    /// Requested insulin bolus [U].
    pub const REQUESTED_BOLUS: SignalId = uuid!("22d87566-af1b-4cc7-8d11-c5e04e1e9c8a");
    /// Requested basal insulin rate [U/hr].
    pub const REQUESTED_BASAL_RATE: SignalId = uuid!("b5897bbd-1e32-408a-a0d5-c5bfecf447d9");
    /// Announced carbohydrate intake [g].
    pub const CARB_INTAKE: SignalId = uuid!("37aa6ac1-6984-4a06-92cc-a660110d0dc7");
    /// Rescue carbohydrates [g].
    pub const CARB_RESCUE: SignalId = uuid!("f24920f7-3f7b-4000-b2d0-374f940e4898");
}

/// Kind of a device event traveling through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    /// A signal level at a point in time.
    Level,
    /// Orderly shutdown request; the last event a chain observes.
    ShutDown,
}

/// One event as the pipeline sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub code: EventCode,
    pub signal_id: SignalId,
    pub device_id: Uuid,
    pub segment_id: u64,
    /// Rat-time timestamp.
    pub device_time: f64,
    pub level: f64,
}

impl DeviceEvent {
    /// A level event stamped with this adapter's device id.
    pub fn level(signal_id: SignalId, level: f64, device_time: f64, segment_id: u64) -> Self {
        Self {
            code: EventCode::Level,
            signal_id,
            device_id: GAMELINK_DEVICE_ID,
            segment_id,
            device_time,
            level,
        }
    }

    /// A shutdown event stamped with this adapter's device id.
    pub fn shutdown(device_time: f64, segment_id: u64) -> Self {
        Self {
            code: EventCode::ShutDown,
            signal_id: Uuid::nil(),
            device_id: GAMELINK_DEVICE_ID,
            segment_id,
            device_time,
            level: 0.0,
        }
    }
}

/// Failures reported by the external engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration rejected by the pipeline loader: {0}")]
    InvalidConfiguration(String),

    #[error("pipeline execution failed: {0}")]
    Execution(String),

    #[error("solver was unable to find parameters")]
    SolverFailed,

    #[error("execution already terminated")]
    Terminated,
}

/// Receives events emitted by a running pipeline.
///
/// Called synchronously from the engine's execution thread; implementations
/// may block (the replay handoff does exactly that) but must not call back
/// into the execution they observe.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &DeviceEvent);
}

/// A launched pipeline chain accepting injected events.
pub trait Execution: Send {
    fn inject(&self, event: DeviceEvent) -> Result<(), EngineError>;

    /// Tear the chain down. With `wait_for_shutdown` the call blocks until
    /// the execution thread has drained and exited.
    fn terminate(&self, wait_for_shutdown: bool) -> Result<(), EngineError>;
}

/// Everything the solver needs for one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizeRequest<'a> {
    pub configuration: &'a str,
    /// Zero-based index of the filter whose parameters are optimized.
    pub filter_index: usize,
    /// Configuration name of the parameter field, e.g. `Parameters`.
    pub parameter_name: &'a str,
    pub population_size: usize,
    pub generation_count: usize,
    pub solver_id: Uuid,
}

/// Replacement parameter vector applied to one filter before a replay run.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPatch {
    pub filter_index: usize,
    pub parameter_name: String,
    pub values: Vec<f64>,
}

/// Progress shared between the solver thread and the caller.
///
/// The cancellation flag is cooperative: the solver checks it between
/// generations, so a request only prevents the next generation from
/// starting.
#[derive(Debug, Default)]
pub struct SolverProgress {
    current: AtomicU64,
    max: AtomicU64,
    cancelled: AtomicBool,
}

impl SolverProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh run.
    pub fn reset(&self, max: u64) {
        self.current.store(0, Ordering::Release);
        self.max.store(max, Ordering::Release);
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn advance_to(&self, current: u64) {
        self.current.store(current, Ordering::Release);
    }

    /// Completed fraction in `0.0..=1.0`; zero while `max` is unset.
    pub fn fraction(&self) -> f64 {
        let max = self.max.load(Ordering::Acquire);
        if max == 0 {
            return 0.0;
        }
        self.current.load(Ordering::Acquire) as f64 / max as f64
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// The external pipeline engine.
pub trait Engine: Send + Sync {
    /// Load the configuration text and start executing it on a background
    /// thread owned by the engine. Emitted events reach `observer`.
    fn launch(
        &self,
        configuration: &str,
        observer: Arc<dyn EventObserver>,
    ) -> Result<Box<dyn Execution>, EngineError>;

    /// Run the parameter solver to completion (or cancellation) and return
    /// the optimized parameter vector.
    fn optimize(
        &self,
        request: &OptimizeRequest<'_>,
        progress: &SolverProgress,
    ) -> Result<Vec<f64>, EngineError>;

    /// Execute the configuration to completion, optionally with one filter's
    /// parameters replaced. Used to regenerate a session's outputs.
    fn replay(
        &self,
        configuration: &str,
        patch: Option<&ParameterPatch>,
    ) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rat_time_epoch() {
        assert_eq!(unix_time_to_rat_time(0), 25_569.0);
        // one minute past the epoch
        let t = unix_time_to_rat_time(60);
        assert!((t - (25_569.0 + 60.0 * ONE_SECOND)).abs() < 1e-12);
    }

    #[test]
    fn test_progress_fraction() {
        let progress = SolverProgress::new();
        assert_eq!(progress.fraction(), 0.0);

        progress.reset(100);
        progress.advance_to(25);
        assert!((progress.fraction() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cancel_flag_roundtrip() {
        let progress = SolverProgress::new();
        assert!(!progress.is_cancelled());
        progress.request_cancel();
        assert!(progress.is_cancelled());

        progress.reset(10);
        assert!(!progress.is_cancelled());
    }
}
