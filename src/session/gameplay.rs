//! Foreground gameplay session: the turn-based host drives the simulation
//! one discrete step at a time.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{build_config, Catalogue, Purpose};
use crate::engine::{
    signals, unix_time_to_rat_time, DeviceEvent, Engine, EventCode, EventObserver, Execution,
    ONE_SECOND,
};

use super::SessionError;

/// One input value delivered within a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInput {
    pub signal: crate::engine::SignalId,
    pub level: f64,
    /// Position of the value within the step, `0.0..1.0` of the step size.
    pub relative_time: f64,
}

/// Latest sensor levels observed from the running pipeline.
///
/// Fields hold NaN until the model has emitted the corresponding signal at
/// least once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub bg: f64,
    pub ig: f64,
    pub iob: f64,
    pub cob: f64,
    pub delivered_insulin: f64,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            bg: f64::NAN,
            ig: f64::NAN,
            iob: f64::NAN,
            cob: f64::NAN,
            delivered_insulin: f64::NAN,
        }
    }
}

/// Observer keeping the most recent level of each sensor signal.
#[derive(Debug, Default)]
struct SensorTap {
    state: Mutex<SensorReading>,
}

impl SensorTap {
    fn reading(&self) -> SensorReading {
        *self.state.lock()
    }
}

impl EventObserver for SensorTap {
    fn on_event(&self, event: &DeviceEvent) {
        if event.code != EventCode::Level {
            return;
        }
        let mut state = self.state.lock();
        if event.signal_id == signals::BG {
            state.bg = event.level;
        } else if event.signal_id == signals::IG {
            state.ig = event.level;
        } else if event.signal_id == signals::IOB {
            state.iob = event.level;
        } else if event.signal_id == signals::COB {
            state.cob = event.level;
        } else if event.signal_id == signals::DELIVERED_INSULIN {
            state.delivered_insulin = event.level;
        }
    }
}

/// Simulation time and segment counters, owned by the foreground thread.
///
/// Constructing an event from them is guarded so a step and a terminate
/// cannot race.
#[derive(Debug)]
struct SessionClock {
    /// Rat-time timestamp of the current step boundary.
    current_time: f64,
    segment_id: u64,
}

/// A running gameplay session over a launched pipeline chain.
pub struct GameSession {
    execution: Box<dyn Execution>,
    sensors: Arc<SensorTap>,
    clock: Mutex<SessionClock>,
    /// Step size in rat time.
    step_size: f64,
}

impl GameSession {
    /// Compile the gameplay configuration for `(class, id)`, launch it and
    /// perform the initial synchronization step so the model emits its
    /// starting state.
    pub fn create(
        engine: &dyn Engine,
        catalogue: &Catalogue,
        class: u16,
        id: u16,
        stepping_ms: u32,
        output_log: &str,
    ) -> Result<Self, SessionError> {
        let step_size = ONE_SECOND * (stepping_ms as f64 / 1000.0);
        let configuration = build_config(
            catalogue,
            class,
            id,
            step_size,
            "",
            output_log,
            Purpose::Gameplay,
            None,
        )?;

        let sensors = Arc::new(SensorTap::default());
        let observer: Arc<dyn EventObserver> = sensors.clone();
        let execution = engine.launch(&configuration, observer)?;

        // only the initial timestamp corresponds to real time; stepping
        // advances it in fixed increments from here
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let session = Self {
            execution,
            sensors,
            clock: Mutex::new(SessionClock {
                current_time: unix_time_to_rat_time(now),
                segment_id: 1,
            }),
            step_size,
        };

        debug!(class, id, stepping_ms, "gameplay session launched");
        session.synchronize(true)?;
        Ok(session)
    }

    /// Inject the step's inputs in ascending intra-step time order, advance
    /// the simulation by one step size and pulse the synchronization signal
    /// so the model computes the next state.
    ///
    /// Ties between inputs keep their array order, so timestamps reaching
    /// the engine are monotonically non-decreasing within the step.
    pub fn step(&self, inputs: &[StepInput]) -> Result<SensorReading, SessionError> {
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        order.sort_by(|&a, &b| {
            inputs[a]
                .relative_time
                .partial_cmp(&inputs[b].relative_time)
                .unwrap_or(Ordering::Equal)
        });

        {
            let clock = self.clock.lock();
            for index in order {
                let input = &inputs[index];
                self.execution.inject(DeviceEvent::level(
                    input.signal,
                    input.level,
                    clock.current_time + input.relative_time * self.step_size,
                    clock.segment_id,
                ))?;
            }
        }

        self.synchronize(false)?;
        Ok(self.sensors.reading())
    }

    /// Latest sensor levels without advancing the simulation.
    pub fn reading(&self) -> SensorReading {
        self.sensors.reading()
    }

    /// Inject a shutdown event and tear the pipeline down, waiting for the
    /// execution thread to drain.
    pub fn terminate(self) -> Result<(), SessionError> {
        let clock = self.clock.lock();
        self.execution
            .inject(DeviceEvent::shutdown(clock.current_time, clock.segment_id))?;
        drop(clock);
        self.execution.terminate(true)?;
        Ok(())
    }

    // The initial pulse does not advance time: it just wakes the model so
    // it emits the starting state.
    fn synchronize(&self, initial: bool) -> Result<(), SessionError> {
        let mut clock = self.clock.lock();
        if !initial {
            clock.current_time += self.step_size;
        }
        self.execution.inject(DeviceEvent::level(
            signals::SYNCHRONIZATION,
            0.0,
            clock.current_time,
            clock.segment_id,
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_tap_tracks_latest_levels() {
        let tap = SensorTap::default();
        assert!(tap.reading().bg.is_nan());

        tap.on_event(&DeviceEvent::level(signals::BG, 5.2, 25_569.0, 1));
        tap.on_event(&DeviceEvent::level(signals::IG, 5.0, 25_569.0, 1));
        tap.on_event(&DeviceEvent::level(signals::BG, 5.4, 25_569.1, 1));

        let reading = tap.reading();
        assert_eq!(reading.bg, 5.4);
        assert_eq!(reading.ig, 5.0);
        assert!(reading.iob.is_nan());
    }

    #[test]
    fn test_sensor_tap_ignores_shutdown_and_foreign_signals() {
        let tap = SensorTap::default();
        tap.on_event(&DeviceEvent::shutdown(25_569.0, 1));
        tap.on_event(&DeviceEvent::level(
            signals::SYNCHRONIZATION,
            1.0,
            25_569.0,
            1,
        ));
        assert!(tap.reading().bg.is_nan());
        assert!(tap.reading().cob.is_nan());
    }
}
