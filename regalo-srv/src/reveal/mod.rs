//! Reveal state machine
//!
//! `Loading → [Waiting] → Idle → Opening → Playing → Revealed`, with `Error`
//! reachable from `Loading` only. Every trigger checks the current phase;
//! a trigger in the wrong phase is rejected and leaves the machine as it was.

pub mod gate;

use chrono::{DateTime, Utc};
use regalo_common::events::{CelebrationParams, CountdownData, Effect};
use regalo_common::RevealPhase;

use crate::engine::Assignment;
use crate::error::{Error, Result};
use crate::share::{build_share_message, ShareMessage};
use crate::variants::VariantDescriptor;

pub use gate::Gate;

/// One phase change and the effect the presentation should play for it
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: RevealPhase,
    pub to: RevealPhase,
    pub effect: Option<Effect>,
}

/// Result of a countdown tick while `Waiting`
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Gate still closed; countdown recomputed
    Counting(CountdownData),
    /// Gate opened; the machine moved to `Idle` and the ticker should stop
    GateOpened(Transition),
}

/// Per-session reveal state
#[derive(Debug, Clone)]
pub struct RevealMachine {
    phase: RevealPhase,
    gate: Gate,
    assignment: Option<Assignment>,
    error_message: Option<String>,
    countdown: Option<CountdownData>,
    last_effect: Option<Effect>,
    history: Vec<RevealPhase>,
}

impl RevealMachine {
    pub fn new(gate: Gate) -> Self {
        Self {
            phase: RevealPhase::Loading,
            gate,
            assignment: None,
            error_message: None,
            countdown: None,
            last_effect: None,
            history: vec![RevealPhase::Loading],
        }
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    /// Variant fixed at resolution; `None` before that or after a failure
    pub fn variant(&self) -> Option<&'static VariantDescriptor> {
        self.assignment.as_ref().map(Assignment::variant)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn countdown(&self) -> Option<CountdownData> {
        self.countdown
    }

    /// Effect of the most recent transition, if it had one
    pub fn last_effect(&self) -> Option<&Effect> {
        self.last_effect.as_ref()
    }

    /// Every phase entered so far, in order
    pub fn history(&self) -> &[RevealPhase] {
        &self.history
    }

    /// Assignment resolved: `Loading → Waiting` if gated, else `Loading → Idle`
    pub fn resolve(&mut self, assignment: Assignment, now: DateTime<Utc>) -> Result<Transition> {
        self.expect(RevealPhase::Loading, "resolve")?;
        self.assignment = Some(assignment);

        if self.gate.is_open(now) {
            Ok(self.enter(RevealPhase::Idle, None))
        } else {
            self.countdown = self.gate.countdown(now);
            Ok(self.enter(RevealPhase::Waiting, None))
        }
    }

    /// Identity or assignment failed: `Loading → Error`
    pub fn fail(&mut self, message: impl Into<String>) -> Result<Transition> {
        self.expect(RevealPhase::Loading, "fail")?;
        self.error_message = Some(message.into());
        Ok(self.enter(RevealPhase::Error, None))
    }

    /// Periodic tick while `Waiting`
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        self.expect(RevealPhase::Waiting, "tick")?;

        match self.gate.countdown(now) {
            Some(remaining) => {
                self.countdown = Some(remaining);
                Ok(TickOutcome::Counting(remaining))
            }
            None => {
                self.countdown = None;
                Ok(TickOutcome::GateOpened(self.enter(RevealPhase::Idle, None)))
            }
        }
    }

    /// Visitor tapped the closed card: `Idle → Opening`
    pub fn open(&mut self) -> Result<Transition> {
        self.expect(RevealPhase::Idle, "open")?;
        Ok(self.enter(RevealPhase::Opening, Some(Effect::Flourish)))
    }

    /// Opening beat elapsed: `Opening → Playing`
    pub fn finish_opening(&mut self) -> Result<Transition> {
        self.expect(RevealPhase::Opening, "start playback")?;
        Ok(self.enter(RevealPhase::Playing, None))
    }

    /// Video reached its natural end: `Playing → Revealed`
    pub fn video_ended(&mut self) -> Result<Transition> {
        self.expect(RevealPhase::Playing, "finish video")?;
        Ok(self.enter(
            RevealPhase::Revealed,
            Some(Effect::Celebrate(CelebrationParams::default())),
        ))
    }

    /// Share payload for the revealed phrase
    pub fn share(&self, page_url: &str) -> Result<ShareMessage> {
        self.expect(RevealPhase::Revealed, "share")?;
        let phrase = self
            .assignment
            .as_ref()
            .map(|a| a.phrase_text.as_str())
            .unwrap_or_default();
        Ok(build_share_message(phrase, page_url))
    }

    fn expect(&self, phase: RevealPhase, action: &'static str) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                phase: self.phase,
            })
        }
    }

    fn enter(&mut self, to: RevealPhase, effect: Option<Effect>) -> Transition {
        let from = self.phase;
        self.phase = to;
        self.history.push(to);
        self.last_effect = effect.clone();
        Transition { from, to, effect }
    }
}
