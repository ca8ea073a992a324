//! Event types for the reveal experience
//!
//! Provides the reveal phase enumeration, the effects attached to phase
//! transitions, and the EventBus that fans events out to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Visible phase of one reveal session
///
/// `Loading → [Waiting] → Idle → Opening → Playing → Revealed`, with
/// `Error` reachable from `Loading` only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RevealPhase {
    /// Identity and assignment are being resolved
    Loading,
    /// Assignment ready, gate still closed
    Waiting,
    /// Closed card shown, waiting for the visitor to tap it
    Idle,
    /// Opening flourish in progress
    Opening,
    /// Variant video playing
    Playing,
    /// Final message card with share action
    Revealed,
    /// Loading failed; only a fresh load retries
    Error,
}

impl std::fmt::Display for RevealPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevealPhase::Loading => write!(f, "loading"),
            RevealPhase::Waiting => write!(f, "waiting"),
            RevealPhase::Idle => write!(f, "idle"),
            RevealPhase::Opening => write!(f, "opening"),
            RevealPhase::Playing => write!(f, "playing"),
            RevealPhase::Revealed => write!(f, "revealed"),
            RevealPhase::Error => write!(f, "error"),
        }
    }
}

/// Time remaining until the gate opens
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownData {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Confetti burst parameters for the celebration effect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CelebrationParams {
    pub particle_count: u32,
    pub spread: u32,
    pub origin_y: f32,
    pub colors: Vec<String>,
}

impl Default for CelebrationParams {
    fn default() -> Self {
        Self {
            particle_count: 150,
            spread: 70,
            origin_y: 0.6,
            colors: vec![
                "#FFD700".to_string(),
                "#FF4500".to_string(),
                "#00FF00".to_string(),
            ],
        }
    }
}

/// One-shot presentation effect attached to a transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Effect {
    /// Shake/scale flourish on the closed card (`Idle → Opening`)
    Flourish,
    /// Confetti burst (`Playing → Revealed`)
    Celebrate(CelebrationParams),
}

/// Reveal event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RevealEvent {
    /// Session moved from one phase to another
    PhaseChanged {
        session_id: Uuid,
        old_phase: RevealPhase,
        new_phase: RevealPhase,
        timestamp: DateTime<Utc>,
    },

    /// Countdown recomputed while the gate is closed (once per tick)
    CountdownTick {
        session_id: Uuid,
        remaining: CountdownData,
        timestamp: DateTime<Utc>,
    },

    /// Presentation effect to play now
    EffectTriggered {
        session_id: Uuid,
        effect: Effect,
        timestamp: DateTime<Utc>,
    },
}

impl RevealEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            RevealEvent::PhaseChanged { .. } => "PhaseChanged",
            RevealEvent::CountdownTick { .. } => "CountdownTick",
            RevealEvent::EffectTriggered { .. } => "EffectTriggered",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            RevealEvent::PhaseChanged { session_id, .. }
            | RevealEvent::CountdownTick { session_id, .. }
            | RevealEvent::EffectTriggered { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus for reveal events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RevealEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RevealEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RevealEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
