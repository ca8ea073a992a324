//! Reveal sessions
//!
//! A session owns one [`RevealMachine`] and the timer tasks that drive it:
//! the countdown ticker while `Waiting` and the opening beat between
//! `Opening` and `Playing`. Ending or dropping a session aborts its timers.
//!
//! Sessions leave the registry on `DELETE`, once their last event stream
//! has been gone for the grace period, or when the sweeper finds them past
//! their TTL with no stream attached.

use chrono::{DateTime, Utc};
use regalo_common::events::{CountdownData, Effect, EventBus, RevealEvent};
use regalo_common::time::Clock;
use regalo_common::RevealPhase;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{AssignmentEngine, AssignmentOrigin};
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::reveal::{Gate, RevealMachine, TickOutcome, Transition};
use crate::share::ShareMessage;
use crate::variants::{VariantDescriptor, CARD_IMAGE_PATH};

/// Session timing
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub opening_delay: Duration,
    pub countdown_tick: Duration,
    /// Time a session survives after its last event stream closes
    pub stream_grace: Duration,
}

/// What the presentation layer needs to render the current phase
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    /// Anonymous identity for the browser to keep; absent if acquisition failed
    pub identity: Option<String>,
    pub phase: RevealPhase,
    pub card_image: &'static str,
    /// Fixed once the assignment resolves
    pub variant: Option<VariantDescriptor>,
    /// Phrase text, only once revealed
    pub phrase: Option<String>,
    pub countdown: Option<CountdownData>,
    pub error: Option<String>,
    pub origin: Option<AssignmentOrigin>,
    /// Effect of the latest transition, replayed by clients that missed it
    pub last_effect: Option<Effect>,
}

#[derive(Default)]
struct SessionTimers {
    countdown: Option<JoinHandle<()>>,
    opening: Option<JoinHandle<()>>,
}

impl SessionTimers {
    fn abort_all(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        if let Some(handle) = self.opening.take() {
            handle.abort();
        }
    }
}

/// One visitor's pass through the reveal
pub struct RevealSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    identity: std::sync::Mutex<Option<String>>,
    machine: Mutex<RevealMachine>,
    timers: std::sync::Mutex<SessionTimers>,
    streams: AtomicUsize,
    timing: SessionTiming,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl RevealSession {
    pub fn new(gate: Gate, timing: SessionTiming, events: EventBus, clock: Arc<dyn Clock>) -> Arc<Self> {
        let created_at = clock.now();
        Arc::new(Self {
            id: Uuid::new_v4(),
            created_at,
            identity: std::sync::Mutex::new(None),
            machine: Mutex::new(RevealMachine::new(gate)),
            timers: std::sync::Mutex::new(SessionTimers::default()),
            streams: AtomicUsize::new(0),
            timing,
            events,
            clock,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn phase(&self) -> RevealPhase {
        self.machine.lock().await.phase()
    }

    /// Acquire identity and resolve the assignment, leaving `Loading`
    ///
    /// Failures are not returned: they move the session to `Error` with a
    /// user-facing message.
    pub async fn load(
        self: &Arc<Self>,
        identities: &dyn IdentityProvider,
        engine: &AssignmentEngine,
        presented_identity: Option<&str>,
    ) {
        let outcome = match identities.acquire_identity(presented_identity).await {
            Ok(identity) => {
                *self.identity.lock().unwrap_or_else(|e| e.into_inner()) = Some(identity.clone());
                engine.resolve_assignment(&identity).await
            }
            Err(e) => Err(e),
        };

        let mut machine = self.machine.lock().await;
        let result = match outcome {
            Ok(assignment) => machine.resolve(assignment, self.clock.now()),
            Err(e) => {
                warn!("Session {} failed to load: {}", self.id, e);
                machine.fail(e.user_message())
            }
        };

        match result {
            Ok(transition) => {
                self.publish(&transition);
                if transition.to == RevealPhase::Waiting {
                    self.start_countdown();
                }
            }
            Err(e) => warn!("Session {} loaded twice: {}", self.id, e),
        }
    }

    /// Visitor tapped the card; schedules `Opening → Playing`
    pub async fn open(self: &Arc<Self>) -> Result<Transition> {
        let transition = self.machine.lock().await.open()?;
        self.publish(&transition);

        let session = Arc::downgrade(self);
        let delay = self.timing.opening_delay;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(session) = session.upgrade() {
                session.finish_opening().await;
            }
        });
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).opening = Some(handle);

        Ok(transition)
    }

    async fn finish_opening(&self) {
        let result = self.machine.lock().await.finish_opening();
        match result {
            Ok(transition) => self.publish(&transition),
            Err(e) => debug!("Opening beat ignored for {}: {}", self.id, e),
        }
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).opening = None;
    }

    /// Video played to its end
    pub async fn video_ended(&self) -> Result<Transition> {
        let mut machine = self.machine.lock().await;
        let transition = machine.video_ended()?;
        info!("Session {} revealed via {:?}", self.id, machine.history());
        drop(machine);

        self.publish(&transition);
        Ok(transition)
    }

    /// Share payload; only in `Revealed`
    pub async fn share(&self, page_url: &str) -> Result<ShareMessage> {
        self.machine.lock().await.share(page_url)
    }

    /// Current state for rendering
    pub async fn view(&self) -> SessionView {
        let machine = self.machine.lock().await;
        let phase = machine.phase();
        let assignment = machine.assignment();

        SessionView {
            session_id: self.id,
            identity: self.identity.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            phase,
            card_image: CARD_IMAGE_PATH,
            variant: machine.variant().copied(),
            phrase: if phase == RevealPhase::Revealed {
                assignment.map(|a| a.phrase_text.clone())
            } else {
                None
            },
            countdown: machine.countdown(),
            error: machine.error_message().map(str::to_string),
            origin: assignment.map(|a| a.origin),
            last_effect: machine.last_effect().cloned(),
        }
    }

    /// Number of event streams currently attached
    pub fn stream_count(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    /// Stop all timers; the session stays readable
    pub fn end(&self) {
        let counting = self.countdown_running();
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).abort_all();
        debug!("Session {} ended (countdown running: {})", self.id, counting);
    }

    /// Whether the countdown ticker is still scheduled
    pub fn countdown_running(&self) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .countdown
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn start_countdown(self: &Arc<Self>) {
        let session: Weak<Self> = Arc::downgrade(self);
        let period = self.timing.countdown_tick;

        let handle = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            tick.tick().await;

            loop {
                tick.tick().await;

                let Some(session) = session.upgrade() else {
                    break;
                };
                if session.countdown_tick().await {
                    break;
                }
            }
        });

        self.timers.lock().unwrap_or_else(|e| e.into_inner()).countdown = Some(handle);
    }

    /// One countdown tick; returns true when the ticker should stop
    async fn countdown_tick(&self) -> bool {
        let now = self.clock.now();
        let outcome = self.machine.lock().await.tick(now);

        match outcome {
            Ok(TickOutcome::Counting(remaining)) => {
                self.events.emit_lossy(RevealEvent::CountdownTick {
                    session_id: self.id,
                    remaining,
                    timestamp: now,
                });
                false
            }
            Ok(TickOutcome::GateOpened(transition)) => {
                info!("Gate opened for session {}", self.id);
                self.publish(&transition);
                true
            }
            Err(e) => {
                debug!("Countdown stopped for {}: {}", self.id, e);
                true
            }
        }
    }

    fn publish(&self, transition: &Transition) {
        let timestamp = self.clock.now();
        debug!(
            "Session {}: {} -> {}",
            self.id, transition.from, transition.to
        );

        self.events.emit_lossy(RevealEvent::PhaseChanged {
            session_id: self.id,
            old_phase: transition.from,
            new_phase: transition.to,
            timestamp,
        });

        if let Some(effect) = &transition.effect {
            self.events.emit_lossy(RevealEvent::EffectTriggered {
                session_id: self.id,
                effect: effect.clone(),
                timestamp,
            });
        }
    }
}

impl Drop for RevealSession {
    fn drop(&mut self) {
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).abort_all();
    }
}

/// Live sessions by id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<RevealSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<RevealSession>) {
        self.sessions.write().await.insert(session.id(), session);
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<RevealSession>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound(id))
    }

    /// Remove and end a session
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(Error::SessionNotFound(id))?;
        session.end();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Count an event stream against `session` until the lease drops
    pub fn attach_stream(self: &Arc<Self>, session: &Arc<RevealSession>) -> StreamLease {
        session.streams.fetch_add(1, Ordering::SeqCst);
        StreamLease {
            registry: Arc::downgrade(self),
            session: session.clone(),
        }
    }

    /// Remove `id` if no stream has reattached since its last one closed
    async fn remove_if_detached(&self, id: Uuid) {
        let mut sessions = self.sessions.write().await;
        let detached = sessions.get(&id).is_some_and(|s| s.stream_count() == 0);
        if detached {
            if let Some(session) = sessions.remove(&id) {
                session.end();
                info!("Session {} closed after its event stream went away", id);
            }
        }
    }

    /// End sessions created at least `ttl` before `now` that have no stream
    pub async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        // A TTL beyond chrono's range never expires anything
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;

        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.stream_count() == 0 && now - s.created_at() >= ttl)
            .map(|s| s.id())
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.end();
            }
        }

        if !expired.is_empty() {
            info!(
                "Swept {} abandoned sessions, {} remain",
                expired.len(),
                sessions.len()
            );
        }
        expired.len()
    }

    /// End every session (server shutdown)
    pub async fn end_all(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values() {
            session.end();
        }
        info!("Ended {} reveal sessions", sessions.len());
        sessions.clear();
    }
}

/// One attached event stream; dropping it starts the session's grace period
pub struct StreamLease {
    registry: Weak<SessionRegistry>,
    session: Arc<RevealSession>,
}

impl StreamLease {
    pub fn session(&self) -> &Arc<RevealSession> {
        &self.session
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        if self.session.streams.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let registry = self.registry.clone();
        let id = self.session.id();
        let grace = self.session.timing.stream_grace;

        debug!("Last event stream for {} closed, grace {:?}", id, grace);
        runtime.spawn(async move {
            sleep(grace).await;
            if let Some(registry) = registry.upgrade() {
                registry.remove_if_detached(id).await;
            }
        });
    }
}

/// Periodically sweep sessions abandoned without ever streaming
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        tick.tick().await;

        loop {
            tick.tick().await;
            registry.sweep(clock.now(), ttl).await;
        }
    })
}
