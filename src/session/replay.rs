//! Synchronous replay of a recorded session: the engine streams the log on
//! its own thread while the foreground caller pulls one value at a time
//! through the single-slot handoff.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::replay_only_config;
use crate::engine::{signals, DeviceEvent, Engine, EventCode, EventObserver, Execution};

use super::handoff::{handoff, HandoffReceiver, HandoffSender, ReplayEntry};
use super::SessionError;

/// Observer bridging the execution thread into the handoff channel.
///
/// Posting blocks the execution thread until the foreground has taken the
/// previous entry, which is what throttles the replay to the caller's pace.
struct HandoffBridge {
    slot: Mutex<HandoffSender>,
}

impl HandoffBridge {
    fn interesting(signal: crate::engine::SignalId) -> bool {
        signal == signals::BG
            || signal == signals::IG
            || signal == signals::IOB
            || signal == signals::COB
            || signal == signals::DELIVERED_INSULIN
    }
}

impl EventObserver for HandoffBridge {
    fn on_event(&self, event: &DeviceEvent) {
        match event.code {
            EventCode::Level if Self::interesting(event.signal_id) => {
                // holding the lock while blocked is fine: the single
                // producer is this execution thread
                self.slot.lock().post(ReplayEntry {
                    signal: event.signal_id,
                    level: event.level,
                    device_time: event.device_time,
                });
            }
            EventCode::ShutDown => self.slot.lock().close(),
            _ => {}
        }
    }
}

/// A replay of one recorded session log, pulled entry by entry.
pub struct ReplaySession {
    execution: Box<dyn Execution>,
    receiver: HandoffReceiver,
}

impl ReplaySession {
    /// Compile the one-section replay document for `input_log` and launch
    /// it. The execution starts emitting immediately and blocks on the
    /// handoff until the first [`step`](Self::step).
    pub fn create(engine: &dyn Engine, input_log: &str) -> Result<Self, SessionError> {
        let configuration = replay_only_config(input_log);

        let (sender, receiver) = handoff();
        let bridge = Arc::new(HandoffBridge {
            slot: Mutex::new(sender),
        });
        let execution = engine.launch(&configuration, bridge)?;

        debug!(input_log, "replay session launched");
        Ok(Self {
            execution,
            receiver,
        })
    }

    /// Pull the next replayed value. `None` means the recorded stream has
    /// ended; every pending entry is delivered before that.
    pub fn step(&self) -> Option<ReplayEntry> {
        self.receiver.take()
    }

    /// Tear the execution down without waiting for the remaining stream.
    ///
    /// Dropping the receiver first unblocks an execution thread parked on a
    /// full slot, so the shutdown cannot deadlock.
    pub fn terminate(self) -> Result<(), SessionError> {
        drop(self.receiver);
        self.execution.terminate(true)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_posts_levels_and_closes_on_shutdown() {
        let (sender, receiver) = handoff();
        let bridge = HandoffBridge {
            slot: Mutex::new(sender),
        };

        bridge.on_event(&DeviceEvent::level(signals::IG, 6.1, 25_569.0, 1));
        assert_eq!(
            receiver.take(),
            Some(ReplayEntry {
                signal: signals::IG,
                level: 6.1,
                device_time: 25_569.0,
            })
        );

        bridge.on_event(&DeviceEvent::shutdown(25_569.0, 1));
        assert_eq!(receiver.take(), None);
    }

    #[test]
    fn test_bridge_skips_uninteresting_signals() {
        let (sender, receiver) = handoff();
        let bridge = HandoffBridge {
            slot: Mutex::new(sender),
        };

        // a synchronization pulse must never occupy the slot
        bridge.on_event(&DeviceEvent::level(
            signals::SYNCHRONIZATION,
            0.0,
            25_569.0,
            1,
        ));
        bridge.on_event(&DeviceEvent::level(signals::BG, 4.9, 25_569.0, 1));
        assert_eq!(receiver.take().map(|entry| entry.signal), Some(signals::BG));
    }
}
