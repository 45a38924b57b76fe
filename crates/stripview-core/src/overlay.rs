//! Overlay lifetime state machine and render-target arbitration
//!
//! ```text
//! Idle -> Receiving -> Decoding -> Displaying -> Dismissing -> Idle
//!           |             |
//!           +-------------+--> Idle   (validation/decode error, abort)
//! ```
//!
//! The deadline is anchored at `started_at`, the moment the payload was
//! fully received, so decode time counts against the display timeout.

use core::fmt;

use crate::config::DisplayTimeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Idle,
    Receiving,
    Decoding,
    Displaying,
    Dismissing,
}

impl OverlayPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlayPhase::Idle => "idle",
            OverlayPhase::Receiving => "receiving",
            OverlayPhase::Decoding => "decoding",
            OverlayPhase::Displaying => "displaying",
            OverlayPhase::Dismissing => "dismissing",
        }
    }

    /// Upload in flight (Receiving and Decoding report as one state)
    pub fn is_busy(self) -> bool {
        matches!(self, OverlayPhase::Receiving | OverlayPhase::Decoding)
    }
}

impl fmt::Display for OverlayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Background,
    Overlay,
}

/// Transition not allowed from the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: OverlayPhase,
    pub to: OverlayPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    Never,
    At(u64),
}

/// What is on screen and until when
#[derive(Debug, Clone)]
pub struct OverlayState {
    phase: OverlayPhase,
    timeout: DisplayTimeout,
    started_at: Option<u64>,
    deadline: Option<Deadline>,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            phase: OverlayPhase::Idle,
            timeout: DisplayTimeout::Never,
            started_at: None,
            deadline: None,
        }
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    pub fn timeout(&self) -> DisplayTimeout {
        self.timeout
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn render_target(&self) -> RenderTarget {
        match self.phase {
            OverlayPhase::Idle => RenderTarget::Background,
            _ => RenderTarget::Overlay,
        }
    }

    fn check(&self, allowed: &[OverlayPhase], to: OverlayPhase) -> Result<(), InvalidTransition> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.phase,
                to,
            })
        }
    }

    /// Idle -> Receiving
    pub fn begin(&mut self, timeout: DisplayTimeout) -> Result<(), InvalidTransition> {
        self.check(&[OverlayPhase::Idle], OverlayPhase::Receiving)?;
        self.phase = OverlayPhase::Receiving;
        self.timeout = timeout;
        self.started_at = None;
        self.deadline = None;
        Ok(())
    }

    /// Receiving -> Decoding, anchoring the timer at `now_ms`
    pub fn mark_received(&mut self, now_ms: u64) -> Result<(), InvalidTransition> {
        self.check(&[OverlayPhase::Receiving], OverlayPhase::Decoding)?;
        self.phase = OverlayPhase::Decoding;
        self.started_at = Some(now_ms);
        Ok(())
    }

    /// Decoding -> Displaying, arming the deadline
    pub fn mark_displayed(&mut self) -> Result<(), InvalidTransition> {
        self.check(&[OverlayPhase::Decoding], OverlayPhase::Displaying)?;
        let started = self.started_at.unwrap_or(0);
        self.deadline = Some(match self.timeout.as_millis() {
            None => Deadline::Never,
            Some(ms) => Deadline::At(started.saturating_add(ms)),
        });
        self.phase = OverlayPhase::Displaying;
        Ok(())
    }

    /// Displaying -> Dismissing
    pub fn begin_dismiss(&mut self) -> Result<(), InvalidTransition> {
        self.check(&[OverlayPhase::Displaying], OverlayPhase::Dismissing)?;
        self.phase = OverlayPhase::Dismissing;
        Ok(())
    }

    /// Dismissing -> Idle
    pub fn finish_dismiss(&mut self) -> Result<(), InvalidTransition> {
        self.check(&[OverlayPhase::Dismissing], OverlayPhase::Idle)?;
        self.reset();
        Ok(())
    }

    /// Receiving/Decoding -> Idle after an error or cancellation
    pub fn abort(&mut self) -> Result<(), InvalidTransition> {
        self.check(
            &[OverlayPhase::Receiving, OverlayPhase::Decoding],
            OverlayPhase::Idle,
        )?;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.phase = OverlayPhase::Idle;
        self.started_at = None;
        self.deadline = None;
    }

    /// Deadline has passed (elapsed >= timeout)
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.phase == OverlayPhase::Displaying
            && matches!(self.deadline, Some(Deadline::At(at)) if now_ms >= at)
    }

    /// Time left on screen; `None` when no deadline applies
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match self.deadline {
            Some(Deadline::At(at)) if self.phase == OverlayPhase::Displaying => {
                Some(at.saturating_sub(now_ms))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displayed(timeout: DisplayTimeout, at: u64) -> OverlayState {
        let mut state = OverlayState::new();
        state.begin(timeout).unwrap();
        state.mark_received(at).unwrap();
        state.mark_displayed().unwrap();
        state
    }

    #[test]
    fn full_lifecycle_returns_to_idle() {
        let mut state = displayed(DisplayTimeout::Seconds(5), 1_000);
        assert_eq!(state.phase(), OverlayPhase::Displaying);
        assert_eq!(state.render_target(), RenderTarget::Overlay);
        state.begin_dismiss().unwrap();
        state.finish_dismiss().unwrap();
        assert_eq!(state.phase(), OverlayPhase::Idle);
        assert_eq!(state.render_target(), RenderTarget::Background);
    }

    #[test]
    fn deadline_is_anchored_at_receipt() {
        let state = displayed(DisplayTimeout::Seconds(5), 1_000);
        assert!(!state.is_expired(5_999));
        assert!(state.is_expired(6_000));
        assert_eq!(state.remaining_ms(2_000), Some(4_000));
    }

    #[test]
    fn never_timeout_never_expires() {
        let state = displayed(DisplayTimeout::Never, 0);
        assert!(!state.is_expired(u64::MAX));
        assert_eq!(state.remaining_ms(10), None);
    }

    #[test]
    fn second_begin_is_rejected() {
        let mut state = OverlayState::new();
        state.begin(DisplayTimeout::Never).unwrap();
        assert_eq!(
            state.begin(DisplayTimeout::Never),
            Err(InvalidTransition {
                from: OverlayPhase::Receiving,
                to: OverlayPhase::Receiving
            })
        );
    }

    #[test]
    fn abort_only_from_busy_phases() {
        let mut state = OverlayState::new();
        assert!(state.abort().is_err());
        state.begin(DisplayTimeout::Never).unwrap();
        state.mark_received(0).unwrap();
        state.abort().unwrap();
        assert_eq!(state.phase(), OverlayPhase::Idle);
        assert!(state.started_at().is_none());

        let mut shown = displayed(DisplayTimeout::Never, 0);
        assert!(shown.abort().is_err());
    }
}
