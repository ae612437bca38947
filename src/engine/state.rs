//! Codec state machine
//!
//! The three-state lifecycle every codec class shares. Transitions are
//! validated CAS operations so any thread can observe the state without a
//! lock; `closed` is absorbing.

use std::sync::atomic::{AtomicU8, Ordering};

/// Codec lifecycle state (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    /// Not yet configured
    Unconfigured,
    /// Configured and ready to process work
    Configured,
    /// Closed permanently
    Closed,
}

impl CodecState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecState::Unconfigured => "unconfigured",
            CodecState::Configured => "configured",
            CodecState::Closed => "closed",
        }
    }

    fn from_u8(v: u8) -> CodecState {
        match v {
            0 => CodecState::Unconfigured,
            1 => CodecState::Configured,
            _ => CodecState::Closed,
        }
    }
}

impl std::fmt::Display for CodecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free codec state cell
///
/// Writers are the façade (validated transitions) and the caller-side error
/// path; readers are any thread.
pub struct AtomicCodecState(AtomicU8);

impl AtomicCodecState {
    pub fn new() -> Self {
        Self(AtomicU8::new(CodecState::Unconfigured as u8))
    }

    pub fn load(&self) -> CodecState {
        CodecState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Transition to `configured`; fails if closed
    pub fn set_configured(&self) -> bool {
        self.transition(|s| (s != CodecState::Closed).then_some(CodecState::Configured))
    }

    /// Transition to `unconfigured` (reset); fails if closed
    pub fn set_unconfigured(&self) -> bool {
        self.transition(|s| (s != CodecState::Closed).then_some(CodecState::Unconfigured))
    }

    /// Transition to `closed`
    ///
    /// Returns true if this call performed the transition, false if the state
    /// was already closed. Used to run close-teardown exactly once.
    pub fn close(&self) -> bool {
        self.transition(|s| (s != CodecState::Closed).then_some(CodecState::Closed))
    }

    fn transition(&self, f: impl Fn(CodecState) -> Option<CodecState>) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let Some(next) = f(CodecState::from_u8(current)) else {
                return false;
            };
            match self.0.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for AtomicCodecState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = AtomicCodecState::new();
        assert_eq!(state.load(), CodecState::Unconfigured);
    }

    #[test]
    fn test_configure_and_reset() {
        let state = AtomicCodecState::new();
        assert!(state.set_configured());
        assert_eq!(state.load(), CodecState::Configured);
        assert!(state.set_unconfigured());
        assert_eq!(state.load(), CodecState::Unconfigured);
    }

    #[test]
    fn test_closed_is_absorbing() {
        let state = AtomicCodecState::new();
        assert!(state.close());
        assert!(!state.close()); // second close reports already-closed
        assert!(!state.set_configured());
        assert!(!state.set_unconfigured());
        assert_eq!(state.load(), CodecState::Closed);
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(CodecState::Unconfigured.as_str(), "unconfigured");
        assert_eq!(CodecState::Configured.as_str(), "configured");
        assert_eq!(CodecState::Closed.as_str(), "closed");
    }
}
