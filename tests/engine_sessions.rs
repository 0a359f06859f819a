//! Integration tests for the session lifecycles, driven against scripted
//! engine doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use glucolink::config::Catalogue;
use glucolink::engine::{
    signals, DeviceEvent, Engine, EngineError, EventCode, EventObserver, Execution,
    OptimizeRequest, ParameterPatch, SolverProgress, HALTON_METADE_SOLVER_ID,
};
use glucolink::session::{
    GameSession, OptimizeState, OptimizerSession, ReplaySession, SessionError, StepInput,
};

/// Execution double recording injected events; every synchronization pulse
/// echoes a fixed sensor state back through the observer, the way the
/// virtual patient model reacts to the pulse.
struct RecordingExecution {
    injected: Arc<Mutex<Vec<DeviceEvent>>>,
    observer: Arc<dyn EventObserver>,
    terminated: Arc<AtomicBool>,
}

impl Execution for RecordingExecution {
    fn inject(&self, event: DeviceEvent) -> Result<(), EngineError> {
        let echo = event.code == EventCode::Level && event.signal_id == signals::SYNCHRONIZATION;
        let time = event.device_time;
        self.injected.lock().push(event);
        if echo {
            self.observer
                .on_event(&DeviceEvent::level(signals::BG, 5.5, time, 1));
            self.observer
                .on_event(&DeviceEvent::level(signals::IG, 5.1, time, 1));
        }
        Ok(())
    }

    fn terminate(&self, _wait_for_shutdown: bool) -> Result<(), EngineError> {
        self.terminated.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingEngine {
    injected: Arc<Mutex<Vec<DeviceEvent>>>,
    terminated: Arc<AtomicBool>,
}

impl Engine for RecordingEngine {
    fn launch(
        &self,
        _configuration: &str,
        observer: Arc<dyn EventObserver>,
    ) -> Result<Box<dyn Execution>, EngineError> {
        Ok(Box::new(RecordingExecution {
            injected: Arc::clone(&self.injected),
            observer,
            terminated: Arc::clone(&self.terminated),
        }))
    }

    fn optimize(
        &self,
        _request: &OptimizeRequest<'_>,
        _progress: &SolverProgress,
    ) -> Result<Vec<f64>, EngineError> {
        Err(EngineError::Execution("not scripted".into()))
    }

    fn replay(
        &self,
        _configuration: &str,
        _patch: Option<&ParameterPatch>,
    ) -> Result<(), EngineError> {
        Err(EngineError::Execution("not scripted".into()))
    }
}

fn game_session(engine: &RecordingEngine) -> GameSession {
    GameSession::create(
        engine,
        &Catalogue::builtin(),
        0,
        0,
        5000,
        "session-out.log",
    )
    .expect("session should launch")
}

#[test]
fn test_create_pulses_synchronization_and_captures_state() {
    let engine = RecordingEngine::default();
    let session = game_session(&engine);

    let injected = engine.injected.lock().clone();
    assert_eq!(injected.len(), 1);
    assert_eq!(injected[0].signal_id, signals::SYNCHRONIZATION);
    assert_eq!(injected[0].segment_id, 1);

    let reading = session.reading();
    assert_eq!(reading.bg, 5.5);
    assert_eq!(reading.ig, 5.1);
    assert!(reading.iob.is_nan());
}

#[test]
fn test_step_injects_inputs_in_ascending_time_order() {
    let engine = RecordingEngine::default();
    let session = game_session(&engine);

    let inputs = [
        StepInput {
            signal: signals::REQUESTED_BOLUS,
            level: 2.0,
            relative_time: 0.7,
        },
        StepInput {
            signal: signals::CARB_INTAKE,
            level: 40.0,
            relative_time: 0.1,
        },
        StepInput {
            signal: signals::CARB_RESCUE,
            level: 15.0,
            relative_time: 0.4,
        },
    ];
    let reading = session.step(&inputs).expect("step should succeed");
    assert_eq!(reading.bg, 5.5);

    let injected = engine.injected.lock().clone();
    // initial pulse, three inputs, closing pulse
    assert_eq!(injected.len(), 5);
    assert_eq!(injected[1].signal_id, signals::CARB_INTAKE);
    assert_eq!(injected[2].signal_id, signals::CARB_RESCUE);
    assert_eq!(injected[3].signal_id, signals::REQUESTED_BOLUS);
    assert_eq!(injected[4].signal_id, signals::SYNCHRONIZATION);

    for pair in injected[1..].windows(2) {
        assert!(
            pair[0].device_time <= pair[1].device_time,
            "timestamps must be non-decreasing within a step"
        );
    }
}

#[test]
fn test_step_ties_keep_input_order() {
    let engine = RecordingEngine::default();
    let session = game_session(&engine);

    let inputs = [
        StepInput {
            signal: signals::CARB_INTAKE,
            level: 30.0,
            relative_time: 0.5,
        },
        StepInput {
            signal: signals::REQUESTED_BOLUS,
            level: 1.5,
            relative_time: 0.5,
        },
    ];
    session.step(&inputs).expect("step should succeed");

    let injected = engine.injected.lock().clone();
    assert_eq!(injected[1].signal_id, signals::CARB_INTAKE);
    assert_eq!(injected[2].signal_id, signals::REQUESTED_BOLUS);
}

#[test]
fn test_terminate_injects_shutdown_then_tears_down() {
    let engine = RecordingEngine::default();
    let session = game_session(&engine);

    session.terminate().expect("terminate should succeed");

    let injected = engine.injected.lock().clone();
    assert_eq!(injected.last().map(|e| e.code), Some(EventCode::ShutDown));
    assert!(engine.terminated.load(Ordering::Acquire));
}

/// Solver double: either returns a fixed parameter vector or spins until
/// cancelled.
struct SolverEngine {
    fail: bool,
    spin_until_cancelled: bool,
    requests: Mutex<Vec<(usize, String, usize, usize, uuid::Uuid)>>,
    replays: Mutex<Vec<(String, Option<ParameterPatch>)>>,
}

impl SolverEngine {
    fn new() -> Self {
        Self {
            fail: false,
            spin_until_cancelled: false,
            requests: Mutex::new(Vec::new()),
            replays: Mutex::new(Vec::new()),
        }
    }
}

impl Engine for SolverEngine {
    fn launch(
        &self,
        _configuration: &str,
        _observer: Arc<dyn EventObserver>,
    ) -> Result<Box<dyn Execution>, EngineError> {
        Err(EngineError::Execution("not scripted".into()))
    }

    fn optimize(
        &self,
        request: &OptimizeRequest<'_>,
        progress: &SolverProgress,
    ) -> Result<Vec<f64>, EngineError> {
        self.requests.lock().push((
            request.filter_index,
            request.parameter_name.to_owned(),
            request.population_size,
            request.generation_count,
            request.solver_id,
        ));
        if self.spin_until_cancelled {
            while !progress.is_cancelled() {
                thread::yield_now();
            }
            return Err(EngineError::SolverFailed);
        }
        if self.fail {
            return Err(EngineError::SolverFailed);
        }
        progress.advance_to(100);
        Ok(vec![0.1, 0.2, 0.3])
    }

    fn replay(
        &self,
        configuration: &str,
        patch: Option<&ParameterPatch>,
    ) -> Result<(), EngineError> {
        self.replays
            .lock()
            .push((configuration.to_owned(), patch.cloned()));
        Ok(())
    }
}

fn optimizer_session(engine: Arc<SolverEngine>, degree: u16) -> OptimizerSession {
    OptimizerSession::prepare(
        engine,
        &Catalogue::builtin(),
        0,
        0,
        5000,
        degree,
        "session-in.log",
        "session-out.log",
    )
    .expect("preparation should succeed")
}

#[test]
fn test_optimizer_success_then_replay_with_patch() {
    let engine = Arc::new(SolverEngine::new());
    let session = optimizer_session(Arc::clone(&engine), 100);

    session.start().expect("start should succeed");
    session.replay().expect("replay should succeed");

    assert_eq!(session.state(), OptimizeState::Succeeded);
    assert_eq!(session.progress_fraction(), 1.0);
    assert_eq!(session.optimized_parameters(), Some(vec![0.1, 0.2, 0.3]));

    let requests = engine.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    let (filter_index, name, population, generations, solver) = requests[0].clone();
    // the virtual patient model heads both documents
    assert_eq!(filter_index, 0);
    assert_eq!(name, "Parameters");
    assert_eq!(population, 86);
    assert_eq!(generations, 10_000);
    assert_eq!(solver, HALTON_METADE_SOLVER_ID);

    let replays = engine.replays.lock().clone();
    assert_eq!(replays.len(), 1);
    let patch = replays[0].1.as_ref().expect("replay carries the patch");
    assert_eq!(patch.filter_index, 0);
    assert_eq!(patch.parameter_name, "Parameters");
    assert_eq!(patch.values, vec![0.1, 0.2, 0.3]);
}

#[test]
fn test_optimizer_scales_generations_by_degree() {
    let engine = Arc::new(SolverEngine::new());
    let session = optimizer_session(Arc::clone(&engine), 50);

    session.start().expect("start should succeed");
    session.replay().expect("replay should succeed");

    let requests = engine.requests.lock().clone();
    assert_eq!(requests[0].3, 5_000);
}

#[test]
fn test_optimizer_failure_leaves_replay_unusable() {
    let engine = Arc::new(SolverEngine {
        fail: true,
        ..SolverEngine::new()
    });
    let session = optimizer_session(Arc::clone(&engine), 100);

    session.start().expect("start should succeed");
    let result = session.replay();
    assert!(matches!(result, Err(SessionError::NotOptimized)));
    assert_eq!(session.state(), OptimizeState::Failed);
    assert!(engine.replays.lock().is_empty());
}

#[test]
fn test_optimizer_rejects_second_start() {
    let engine = Arc::new(SolverEngine {
        spin_until_cancelled: true,
        ..SolverEngine::new()
    });
    let session = optimizer_session(Arc::clone(&engine), 100);

    session.start().expect("start should succeed");
    assert!(matches!(
        session.start(),
        Err(SessionError::AlreadyRunning)
    ));

    session.request_cancel(true);
    assert_eq!(session.state(), OptimizeState::Failed);
}

#[test]
fn test_optimizer_cancellation_stops_the_worker() {
    let engine = Arc::new(SolverEngine {
        spin_until_cancelled: true,
        ..SolverEngine::new()
    });
    let session = optimizer_session(Arc::clone(&engine), 100);

    session.start().expect("start should succeed");
    assert_eq!(session.state(), OptimizeState::Running);

    // blocks until the worker has observed the flag and exited
    session.request_cancel(true);
    assert_eq!(session.state(), OptimizeState::Failed);
    assert!(matches!(session.replay(), Err(SessionError::NotOptimized)));
}

/// Engine double that streams a scripted sequence of events from its own
/// thread, the way a pipeline replaying a log does.
struct StreamingEngine {
    events: Vec<DeviceEvent>,
}

struct StreamingExecution {
    producer: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Execution for StreamingExecution {
    fn inject(&self, _event: DeviceEvent) -> Result<(), EngineError> {
        Ok(())
    }

    fn terminate(&self, wait_for_shutdown: bool) -> Result<(), EngineError> {
        if wait_for_shutdown {
            if let Some(handle) = self.producer.lock().take() {
                let _ = handle.join();
            }
        }
        Ok(())
    }
}

impl Engine for StreamingEngine {
    fn launch(
        &self,
        _configuration: &str,
        observer: Arc<dyn EventObserver>,
    ) -> Result<Box<dyn Execution>, EngineError> {
        let events = self.events.clone();
        let producer = thread::spawn(move || {
            for event in &events {
                observer.on_event(event);
            }
        });
        Ok(Box::new(StreamingExecution {
            producer: Mutex::new(Some(producer)),
        }))
    }

    fn optimize(
        &self,
        _request: &OptimizeRequest<'_>,
        _progress: &SolverProgress,
    ) -> Result<Vec<f64>, EngineError> {
        Err(EngineError::Execution("not scripted".into()))
    }

    fn replay(
        &self,
        _configuration: &str,
        _patch: Option<&ParameterPatch>,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

#[test]
fn test_replay_session_delivers_stream_in_order_then_ends() {
    let mut events: Vec<DeviceEvent> = (0..5)
        .map(|i| DeviceEvent::level(signals::BG, i as f64, 25_569.0 + i as f64, 1))
        .collect();
    // synchronization pulses in the log are not part of the replayed stream
    events.push(DeviceEvent::level(
        signals::SYNCHRONIZATION,
        0.0,
        25_574.0,
        1,
    ));
    events.push(DeviceEvent::shutdown(25_574.0, 1));

    let engine = StreamingEngine { events };
    let session = ReplaySession::create(&engine, "recorded.log").expect("launch should succeed");

    for i in 0..5 {
        let entry = session.step().expect("stream should still be open");
        assert_eq!(entry.signal, signals::BG);
        assert_eq!(entry.level, i as f64);
    }
    assert_eq!(session.step(), None);
    assert_eq!(session.step(), None);
}

#[test]
fn test_replay_session_terminates_midstream_without_deadlock() {
    let mut events: Vec<DeviceEvent> = (0..64)
        .map(|i| DeviceEvent::level(signals::IG, i as f64, 25_569.0 + i as f64, 1))
        .collect();
    events.push(DeviceEvent::shutdown(25_633.0, 1));

    let engine = StreamingEngine { events };
    let session = ReplaySession::create(&engine, "recorded.log").expect("launch should succeed");

    // pull one entry, then abandon the stream; the blocked producer must
    // unblock and drain once the receiver is gone
    let first = session.step().expect("first entry");
    assert_eq!(first.level, 0.0);
    session.terminate().expect("terminate should succeed");
}
