//! Background parameter optimization over a recorded session, followed by a
//! replay run that regenerates the session's outputs with the optimized
//! parameters in place.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{build_config, Catalogue, MetaKind, Purpose};
use crate::engine::{
    Engine, OptimizeRequest, ParameterPatch, SolverProgress, HALTON_METADE_SOLVER_ID, ONE_SECOND,
};

use super::SessionError;

/// Population size handed to the solver. May change once richer models are
/// wired in.
pub const DEFAULT_POPULATION_SIZE: usize = 86;

/// Base generation count, scaled by the caller's degree of optimization.
pub const DEFAULT_GENERATION_COUNT: usize = 10_000;

/// Lifecycle of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// State shared with the solver worker thread.
#[derive(Debug)]
struct Shared {
    state: Mutex<OptimizeState>,
    optimized: Mutex<Option<Vec<f64>>>,
    progress: SolverProgress,
}

/// Drives one optimization of the patient parameters against a recorded
/// session log, then replays the session with the result.
pub struct OptimizerSession {
    engine: Arc<dyn Engine>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,

    optimize_config: String,
    replay_config: String,
    /// Zero-based filter index carrying the optimizable parameters, in the
    /// optimization and replay documents respectively. The two differ
    /// because purpose gating renumbers sections.
    optimize_filter_index: usize,
    replay_filter_index: usize,
    parameter_name: String,
    /// `generation_count = DEFAULT_GENERATION_COUNT * degree / 100`.
    degree: u16,
}

impl OptimizerSession {
    /// Compile both the optimization and the replay document for
    /// `(class, id)` and locate the optimizable parameter section in each.
    pub fn prepare(
        engine: Arc<dyn Engine>,
        catalogue: &Catalogue,
        class: u16,
        id: u16,
        stepping_ms: u32,
        degree: u16,
        input_log: &str,
        output_log: &str,
    ) -> Result<Self, SessionError> {
        let step_size = ONE_SECOND * (stepping_ms as f64 / 1000.0);

        let mut export: Option<(usize, String)> = None;
        let optimize_config = {
            let mut on_export = |index: usize, kind: MetaKind, argument: &str| {
                if kind == MetaKind::ParameterExport {
                    export = Some((index, argument.to_owned()));
                }
            };
            build_config(
                catalogue,
                class,
                id,
                step_size,
                input_log,
                output_log,
                Purpose::Optimization,
                Some(&mut on_export),
            )?
        };
        let (optimize_filter_index, parameter_name) =
            export.ok_or(SessionError::NoOptimizableFilter)?;

        let mut replay_export: Option<usize> = None;
        let replay_config = {
            let mut on_export = |index: usize, kind: MetaKind, _argument: &str| {
                if kind == MetaKind::ParameterExport {
                    replay_export = Some(index);
                }
            };
            build_config(
                catalogue,
                class,
                id,
                step_size,
                input_log,
                output_log,
                Purpose::Replay,
                Some(&mut on_export),
            )?
        };
        let replay_filter_index = replay_export.ok_or(SessionError::NoOptimizableFilter)?;

        debug!(
            class,
            id,
            optimize_filter_index,
            replay_filter_index,
            parameter = %parameter_name,
            "optimizer session prepared"
        );

        Ok(Self {
            engine,
            shared: Arc::new(Shared {
                state: Mutex::new(OptimizeState::Idle),
                optimized: Mutex::new(None),
                progress: SolverProgress::new(),
            }),
            worker: Mutex::new(None),
            optimize_config,
            replay_config,
            optimize_filter_index,
            replay_filter_index,
            parameter_name,
            degree,
        })
    }

    /// Start the solver on a background thread. Fails if a run is already
    /// in flight.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        *self.shared.state.lock() = OptimizeState::Running;
        self.shared.progress.reset(100);

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        let configuration = self.optimize_config.clone();
        let filter_index = self.optimize_filter_index;
        let parameter_name = self.parameter_name.clone();
        let generation_count = DEFAULT_GENERATION_COUNT * self.degree as usize / 100;

        *worker = Some(thread::spawn(move || {
            let request = OptimizeRequest {
                configuration: &configuration,
                filter_index,
                parameter_name: &parameter_name,
                population_size: DEFAULT_POPULATION_SIZE,
                generation_count,
                solver_id: HALTON_METADE_SOLVER_ID,
            };
            match engine.optimize(&request, &shared.progress) {
                Ok(values) => {
                    *shared.optimized.lock() = Some(values);
                    *shared.state.lock() = OptimizeState::Succeeded;
                }
                Err(error) => {
                    warn!(%error, "parameter optimization failed");
                    *shared.state.lock() = OptimizeState::Failed;
                }
            }
        }));

        Ok(())
    }

    pub fn state(&self) -> OptimizeState {
        *self.shared.state.lock()
    }

    /// Completed fraction of the run; pinned to 1.0 once the solver has
    /// succeeded, regardless of the last progress report.
    pub fn progress_fraction(&self) -> f64 {
        if self.state() == OptimizeState::Succeeded {
            1.0
        } else {
            self.shared.progress.fraction()
        }
    }

    /// Ask the solver to stop after the current generation. With `wait`,
    /// block until the worker thread has exited.
    pub fn request_cancel(&self, wait: bool) {
        self.shared.progress.request_cancel();
        if !wait {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            // cooperative cancellation; poll until the worker notices
            while !handle.is_finished() {
                thread::sleep(Duration::from_millis(10));
            }
            let _ = handle.join();
        }
    }

    /// Wait for the solver to finish, then execute the replay document with
    /// the optimized parameters patched into its parameter section.
    pub fn replay(&self) -> Result<(), SessionError> {
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        if self.state() != OptimizeState::Succeeded {
            return Err(SessionError::NotOptimized);
        }
        let values = self
            .shared
            .optimized
            .lock()
            .clone()
            .ok_or(SessionError::NotOptimized)?;

        let patch = ParameterPatch {
            filter_index: self.replay_filter_index,
            parameter_name: self.parameter_name.clone(),
            values,
        };
        self.engine.replay(&self.replay_config, Some(&patch))?;
        Ok(())
    }

    /// The patched parameter vector, once a run has succeeded.
    pub fn optimized_parameters(&self) -> Option<Vec<f64>> {
        self.shared.optimized.lock().clone()
    }
}
