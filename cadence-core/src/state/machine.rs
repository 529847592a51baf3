//! Lifecycle state machine definition

/// Engine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// No polling thread; submissions are buffered for a later start
    #[default]
    Stopped,
    /// Polling thread active
    Running,
}

/// Events that drive lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lifecycle {
    /// Caller requested start and setup allowed it
    Start,
    /// Setup failed under an abort policy
    SetupAborted,
    /// Caller requested stop
    Stop,
    /// Polling thread exited on its own (fatal loop fault)
    LoopExited,
}

impl EngineState {
    /// Check if the polling thread should be active
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Running)
    }

    /// Process a lifecycle event and return the next state
    pub fn transition(self, event: Lifecycle) -> Self {
        use EngineState::*;
        use Lifecycle::*;

        match (self, event) {
            (Stopped, Start) => Running,
            (Running, Stop) => Stopped,
            (Running, LoopExited) => Stopped,

            // Setup failure never leaves a running engine behind
            (_, SetupAborted) => Stopped,

            // Default: stay in current state
            _ => self,
        }
    }
}
