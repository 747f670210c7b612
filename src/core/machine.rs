//! Probe state machine for gallery enumeration.
//!
//! The host sometimes renumbers the trailing suffix when a gallery is
//! reordered (`..._2_1.jpg` becomes `..._3_2.jpg`), so one miss does not mean
//! the gallery is over. After a miss the machine bumps the suffix once, then
//! the middle index once, and only stops when both probes miss too. Both
//! coordinates only ever move up.
//!
//! [`ProbeState::step`] is pure: it never touches the network.

use crate::core::model::RecoveryPolicy;
use crate::core::pattern::ImageUrlPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep the image that was just fetched, then probe the next candidate.
    Store,
    /// Nothing to keep; probe the (adjusted) candidate.
    Retry,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeState {
    pub phase: Phase,
    pub pattern: ImageUrlPattern,
    pub tried_suffix_bump: bool,
    pub tried_index_bump: bool,
    policy: RecoveryPolicy,
}

impl ProbeState {
    pub fn start(pattern: ImageUrlPattern, policy: RecoveryPolicy) -> Self {
        Self {
            phase: Phase::Probing,
            pattern,
            tried_suffix_bump: false,
            tried_index_bump: false,
            policy,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Candidate url for the current coordinates.
    pub fn candidate(&self) -> String {
        self.pattern.render()
    }

    pub fn step(mut self, outcome: Outcome) -> (Self, Action) {
        if self.phase == Phase::Done {
            return (self, Action::Stop);
        }

        match outcome {
            Outcome::Found => {
                self.pattern.middle_index += 1;
                self.tried_suffix_bump = false;
                self.tried_index_bump = false;
                (self, Action::Store)
            }
            Outcome::Missing if self.policy == RecoveryPolicy::Strict => {
                self.phase = Phase::Done;
                (self, Action::Stop)
            }
            Outcome::Missing if !self.tried_suffix_bump => {
                self.pattern.suffix = self.pattern.suffix.incremented();
                self.tried_suffix_bump = true;
                (self, Action::Retry)
            }
            Outcome::Missing if !self.tried_index_bump => {
                self.pattern.middle_index += 1;
                self.tried_index_bump = true;
                (self, Action::Retry)
            }
            Outcome::Missing => {
                self.phase = Phase::Done;
                (self, Action::Stop)
            }
        }
    }
}
