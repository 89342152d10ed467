use std::fmt;

/// Phases a single `generate()` call moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Building,
    RateLimited,
    Calling,
    Validating,
    FallingBack,
    Done,
}

#[derive(Debug, Clone)]
pub struct StateTransitionError {
    from: GenerationState,
    to: GenerationState,
    message: String,
}

impl fmt::Display for StateTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid state transition from {:?} to {:?}: {}",
            self.from, self.to, self.message
        )
    }
}

impl std::error::Error for StateTransitionError {}

/// One pass per call; no state is ever revisited.
pub struct GenerationStateMachine {
    current_state: GenerationState,
    visited: Vec<GenerationState>,
}

impl Default for GenerationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: GenerationState::Idle,
            visited: vec![GenerationState::Idle],
        }
    }

    pub fn current(&self) -> GenerationState {
        self.current_state
    }

    /// States entered so far, in order
    pub fn path(&self) -> &[GenerationState] {
        &self.visited
    }

    pub fn is_done(&self) -> bool {
        self.current_state == GenerationState::Done
    }

    /// Validate and perform state transition
    pub fn transition_to(&mut self, new_state: GenerationState) -> Result<(), StateTransitionError> {
        if !self.is_valid_transition(self.current_state, new_state) {
            log::error!("[FLOW] State transition INVALID: {:?} -> {:?}", self.current_state, new_state);
            return Err(StateTransitionError {
                from: self.current_state,
                to: new_state,
                message: "Transition not allowed by state machine rules".to_string(),
            });
        }

        if self.visited.contains(&new_state) {
            return Err(StateTransitionError {
                from: self.current_state,
                to: new_state,
                message: "State already visited during this generation".to_string(),
            });
        }

        log::debug!("[FLOW] {:?} -> {:?}", self.current_state, new_state);
        self.current_state = new_state;
        self.visited.push(new_state);
        Ok(())
    }

    fn is_valid_transition(&self, from: GenerationState, to: GenerationState) -> bool {
        use GenerationState::*;

        matches!(
            (from, to),
            (Idle, Building)
                // AI disabled skips straight to the fallback
                | (Idle, FallingBack)
                // Invalid input ends the call
                | (Idle, Done)
                | (Building, RateLimited)
                | (RateLimited, Calling)
                | (Calling, Validating)
                | (Calling, FallingBack)
                // Fallback disabled or unrecoverable upstream error
                | (Calling, Done)
                | (Validating, Done)
                | (FallingBack, Done)
        )
    }
}
