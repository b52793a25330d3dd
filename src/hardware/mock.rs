//! Mock Hardware Implementations
//!
//! Provides a simulated SRF05 for running the daemon and the tests without a
//! physical sensor.
//!
//! # Available Mocks
//!
//! - `SimulatedSrf05` - a [`SignalLine`] that answers a trigger pulse with an
//!   echo pulse whose start and width are counted in polls, exactly the unit
//!   the driver measures in.
//!
//! The simulated line is cheap to clone; all clones share the same state, so a
//! test can keep one clone to reconfigure the sensor and inspect the line
//! history while the driver owns the other. Only the most recent
//! [`EVENT_LOG_CAPACITY`] line events are kept.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::capabilities::SignalLine;
use crate::error::{AppResult, DaqError};

/// Line events kept by a simulated sensor; older ones are dropped.
pub const EVENT_LOG_CAPACITY: usize = 64;

/// Something the driver did to the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Switched to (or stayed in) output mode driving this level
    Output(bool),
    /// Switched to input mode
    Input,
}

/// How the simulated sensor answers a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoProfile {
    /// Echo goes high after `delay` polls and stays high for `width` polls
    Echo {
        /// Polls before the echo starts
        delay: u64,
        /// Polls the echo stays high
        width: u64,
    },
    /// Sensor never raises the line (not connected / not triggered)
    Silent,
    /// Echo starts after `delay` polls and never ends (echo lost)
    Stuck {
        /// Polls before the echo starts
        delay: u64,
    },
    /// Every sample fails with an I/O error
    Faulty,
}

#[derive(Debug)]
struct SimState {
    profile: EchoProfile,
    output: Option<bool>,
    triggered: bool,
    armed: bool,
    polls: u64,
    events: VecDeque<LineEvent>,
    triggers: u64,
}

impl SimState {
    fn log(&mut self, event: LineEvent) {
        if self.events.len() == EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Simulated SRF05 sensor attached to a single line
#[derive(Debug, Clone)]
pub struct SimulatedSrf05 {
    line: u32,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedSrf05 {
    /// Sensor that answers every trigger with the given profile
    pub fn new(line: u32, profile: EchoProfile) -> Self {
        Self {
            line,
            state: Arc::new(Mutex::new(SimState {
                profile,
                output: None,
                triggered: false,
                armed: false,
                polls: 0,
                events: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
                triggers: 0,
            })),
        }
    }

    /// Sensor with an echo of `width` polls after a short start delay
    pub fn with_echo_width(line: u32, width: u64) -> Self {
        Self::new(line, EchoProfile::Echo { delay: 10, width })
    }

    /// Change how the sensor answers subsequent triggers
    pub fn set_profile(&self, profile: EchoProfile) {
        self.state.lock().profile = profile;
    }

    /// Number of complete trigger pulses seen (high then low, then input)
    pub fn trigger_count(&self) -> u64 {
        self.state.lock().triggers
    }

    /// Recent line events, oldest first
    pub fn events(&self) -> Vec<LineEvent> {
        self.state.lock().events.iter().copied().collect()
    }

    /// Forget recorded events
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }
}

impl SignalLine for SimulatedSrf05 {
    fn id(&self) -> u32 {
        self.line
    }

    fn set_output(&mut self, high: bool) -> AppResult<()> {
        let mut state = self.state.lock();
        state.log(LineEvent::Output(high));
        state.armed = false;
        if high {
            state.triggered = true;
        }
        state.output = Some(high);
        Ok(())
    }

    fn set_input(&mut self) -> AppResult<()> {
        let mut state = self.state.lock();
        state.log(LineEvent::Input);
        // A trigger is a high pulse that ended low before the line was released
        if state.triggered && state.output == Some(false) {
            state.triggers += 1;
            state.armed = true;
            state.polls = 0;
        }
        state.triggered = false;
        state.output = None;
        Ok(())
    }

    fn is_high(&mut self) -> AppResult<bool> {
        let mut state = self.state.lock();
        if state.profile == EchoProfile::Faulty {
            return Err(DaqError::LineUnavailable {
                line: self.line,
                message: "simulated read failure".into(),
            });
        }
        if let Some(level) = state.output {
            return Ok(level);
        }
        if !state.armed {
            return Ok(false);
        }

        let poll = state.polls;
        state.polls += 1;

        let high = match state.profile {
            EchoProfile::Echo { delay, width } => poll >= delay && poll < delay.saturating_add(width),
            EchoProfile::Silent => false,
            EchoProfile::Stuck { delay } => poll >= delay,
            EchoProfile::Faulty => false,
        };
        Ok(high)
    }
}
