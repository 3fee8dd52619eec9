//! Turn scheduling.
//!
//! `TurnScheduler` owns the debate state, alternates the two speakers,
//! paces automatic progression and halts on generation failures. It is a
//! cheap cloneable handle; all clones drive the same session.
//!
//! Two counters guard against stale work:
//! - the session token is bumped by `reset`, and a generation result that
//!   comes back with an older token is dropped;
//! - the pacing token is bumped whenever the auto-advance timer is armed or
//!   cancelled, and the timer re-checks it under the lock when it fires.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::DebateError;
use crate::generator::{ArgumentGenerator, GenerationRequest};
use crate::participant::{AIParticipant, Speaker, SpeakerPair};
use crate::scoring::ArgumentScore;
use crate::state::{DebateMessage, DebateState};

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Events emitted during a debate.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    /// A participant is about to speak.
    SpeakerStart { speaker: Speaker, name: String, round: u32 },
    /// A participant's argument was recorded.
    SpeakerMessage { name: String, message: DebateMessage },
    /// An argument was scored.
    ArgumentScored { speaker: Speaker, score: ArgumentScore },
    /// Generation failed; the debate is halted until retried.
    GenerationFailed {
        speaker: Speaker,
        round: u32,
        reason: String,
        retries_left: u32,
    },
    /// The retry budget is spent; only a reset continues.
    RetryExhausted { reason: String },
    /// The debate has concluded.
    DebateEnd,
    /// The session was reset.
    Reset,
}

/// Hook run inside the append critical section, after a message is
/// recorded and before anyone else can observe the new state.
pub trait TurnObserver: Send + Sync {
    /// May update `state` (e.g. the score pair) and return an extra event.
    fn on_message_appended(
        &self,
        state: &mut DebateState,
        message: &DebateMessage,
    ) -> Option<DebateEvent>;

    fn on_reset(&self) {}
}

/// Externally visible phase of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerStatus {
    /// Nothing said yet, ready to start.
    Idle,
    Active { auto: bool },
    Generating { speaker: Speaker, round: u32 },
    Paused,
    Error { reason: String, retries_left: u32 },
    /// Retry budget spent; requires reset.
    Exhausted { reason: String },
    Complete,
}

impl SchedulerStatus {
    /// True when nothing will happen without user action.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SchedulerStatus::Complete
                | SchedulerStatus::Error { .. }
                | SchedulerStatus::Exhausted { .. }
                | SchedulerStatus::Paused
        )
    }
}

/// Result of a turn that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Spoke(DebateMessage),
    /// The session was reset while the turn was in flight; the result was
    /// dropped.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub auto_delay: Duration,
    pub retry_limit: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            auto_delay: Duration::from_millis(3000),
            retry_limit: 3,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingFailure {
    speaker: Speaker,
    round: u32,
    reason: String,
    retries_used: u32,
}

#[derive(Default)]
struct Pacing {
    token: u64,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    state: DebateState,
    auto_mode: bool,
    in_flight: Option<(Speaker, u32)>,
    failure: Option<PendingFailure>,
    exhausted: Option<String>,
    session: u64,
    pacing: Pacing,
    retry_limit: u32,
}

impl Inner {
    fn ensure_can_advance(&self) -> Result<(), DebateError> {
        if self.exhausted.is_some() {
            return Err(DebateError::RetryExhausted {
                attempts: self.retry_limit,
            });
        }
        if self.state.is_complete() {
            return Err(DebateError::DebateComplete);
        }
        if self.in_flight.is_some() {
            return Err(DebateError::TurnInFlight);
        }
        if let Some(failure) = &self.failure {
            return Err(DebateError::ErrorPending(failure.reason.clone()));
        }
        if !self.state.is_active {
            return Err(DebateError::Paused);
        }
        Ok(())
    }

    fn can_auto_advance(&self) -> bool {
        self.auto_mode && self.ensure_can_advance().is_ok()
    }

    fn status(&self) -> SchedulerStatus {
        if let Some(reason) = &self.exhausted {
            return SchedulerStatus::Exhausted {
                reason: reason.clone(),
            };
        }
        if self.state.is_complete() {
            return SchedulerStatus::Complete;
        }
        if let Some((speaker, round)) = self.in_flight {
            return SchedulerStatus::Generating { speaker, round };
        }
        if let Some(failure) = &self.failure {
            return SchedulerStatus::Error {
                reason: failure.reason.clone(),
                retries_left: self.retry_limit.saturating_sub(failure.retries_used),
            };
        }
        if !self.state.is_active {
            return SchedulerStatus::Paused;
        }
        if self.state.messages.is_empty() && !self.auto_mode {
            return SchedulerStatus::Idle;
        }
        SchedulerStatus::Active {
            auto: self.auto_mode,
        }
    }

    /// Cancel any pending auto-advance.
    fn disarm(&mut self) {
        self.pacing.token += 1;
        if let Some(handle) = self.pacing.handle.take() {
            handle.abort();
        }
    }
}

/// A claimed turn: the in-flight flag is set and the request is frozen.
struct TurnTicket {
    session: u64,
    speaker: Speaker,
    round: u32,
    retries_used: u32,
    request: GenerationRequest,
}

struct Shared {
    inner: Mutex<Inner>,
    participants: SpeakerPair<AIParticipant>,
    generator: Arc<dyn ArgumentGenerator>,
    settings: SchedulerSettings,
    observer: Option<Arc<dyn TurnObserver>>,
    callback: RwLock<Option<DebateCallback>>,
    status_tx: watch::Sender<SchedulerStatus>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            inner.disarm();
        }
    }
}

/// Drives one debate session.
#[derive(Clone)]
pub struct TurnScheduler {
    shared: Arc<Shared>,
}

impl TurnScheduler {
    pub fn new(
        topic: impl Into<String>,
        max_rounds: u32,
        participants: SpeakerPair<AIParticipant>,
        generator: Arc<dyn ArgumentGenerator>,
        settings: SchedulerSettings,
        observer: Option<Arc<dyn TurnObserver>>,
    ) -> Self {
        let inner = Inner {
            state: DebateState::new(topic, max_rounds),
            auto_mode: false,
            in_flight: None,
            failure: None,
            exhausted: None,
            session: 0,
            pacing: Pacing::default(),
            retry_limit: settings.retry_limit,
        };
        let (status_tx, _) = watch::channel(inner.status());

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                participants,
                generator,
                settings,
                observer,
                callback: RwLock::new(None),
                status_tx,
            }),
        }
    }

    /// Set a callback for debate events.
    pub fn set_callback(&self, callback: DebateCallback) {
        let mut slot = self
            .shared
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(callback);
    }

    pub fn participants(&self) -> &SpeakerPair<AIParticipant> {
        &self.shared.participants
    }

    pub fn snapshot(&self) -> DebateState {
        self.lock().state.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.lock().status()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn is_auto(&self) -> bool {
        self.lock().auto_mode
    }

    /// Generate the next turn.
    pub async fn advance_turn(&self) -> Result<TurnOutcome, DebateError> {
        let ticket = {
            let mut inner = self.lock();
            inner.ensure_can_advance()?;
            let speaker = inner.state.next_speaker();
            let round = inner.state.target_round(speaker);
            self.claim_turn(&mut inner, speaker, round, 0)
        };
        self.announce(&ticket);
        self.run_turn(ticket).await
    }

    /// Retry the turn that failed, for the same speaker and round.
    pub async fn retry(&self) -> Result<TurnOutcome, DebateError> {
        let ticket = {
            let mut inner = self.lock();
            if inner.exhausted.is_some() {
                return Err(DebateError::RetryExhausted {
                    attempts: inner.retry_limit,
                });
            }
            if inner.in_flight.is_some() {
                return Err(DebateError::TurnInFlight);
            }
            let Some(failure) = inner.failure.take() else {
                return Err(DebateError::NoPendingError);
            };

            if failure.retries_used >= inner.retry_limit {
                tracing::warn!(
                    attempts = failure.retries_used,
                    "retry budget exhausted, reset required"
                );
                let reason = format!(
                    "Maximum retry attempts reached. Last error: {}",
                    failure.reason
                );
                inner.exhausted = Some(reason.clone());
                inner.failure = Some(failure);
                let attempts = inner.retry_limit;
                drop(inner);
                self.publish_status();
                self.emit(DebateEvent::RetryExhausted { reason });
                return Err(DebateError::RetryExhausted { attempts });
            }

            tracing::info!(
                speaker = ?failure.speaker,
                round = failure.round,
                attempt = failure.retries_used + 1,
                "retrying failed turn"
            );
            inner.state.is_active = true;
            self.claim_turn(
                &mut inner,
                failure.speaker,
                failure.round,
                failure.retries_used + 1,
            )
        };
        self.announce(&ticket);
        self.run_turn(ticket).await
    }

    /// Switch to automatic progression. Speaks immediately if the debate
    /// has not started, otherwise arms the pacing timer.
    pub async fn start_auto(&self) -> Result<Option<TurnOutcome>, DebateError> {
        let start_now = {
            let mut inner = self.lock();
            if inner.exhausted.is_some() {
                return Err(DebateError::RetryExhausted {
                    attempts: inner.retry_limit,
                });
            }
            if inner.state.is_complete() {
                return Err(DebateError::DebateComplete);
            }
            if inner.in_flight.is_some() {
                return Err(DebateError::TurnInFlight);
            }
            if let Some(failure) = &inner.failure {
                return Err(DebateError::ErrorPending(failure.reason.clone()));
            }
            inner.auto_mode = true;
            inner.state.is_active = true;
            inner.state.messages.is_empty()
        };

        if start_now {
            return self.advance_turn().await.map(Some);
        }
        self.rearm();
        self.publish_status();
        Ok(None)
    }

    /// Stop progression: auto mode off, debate inactive, timer cancelled.
    pub fn pause(&self) {
        {
            let mut inner = self.lock();
            inner.auto_mode = false;
            inner.state.is_active = false;
            inner.disarm();
        }
        self.publish_status();
    }

    /// Allow manual progression again after a pause.
    pub fn resume(&self) -> Result<(), DebateError> {
        {
            let mut inner = self.lock();
            if inner.exhausted.is_some() {
                return Err(DebateError::RetryExhausted {
                    attempts: inner.retry_limit,
                });
            }
            if let Some(failure) = &inner.failure {
                return Err(DebateError::ErrorPending(failure.reason.clone()));
            }
            inner.state.is_active = true;
        }
        self.rearm();
        self.publish_status();
        Ok(())
    }

    /// Back to the pre-debate state. Pending timers are cancelled and any
    /// in-flight result will be dropped.
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.disarm();
            inner.session += 1;
            let topic = std::mem::take(&mut inner.state.topic);
            let max_rounds = inner.state.max_rounds;
            inner.state = DebateState::new(topic, max_rounds);
            inner.auto_mode = false;
            inner.in_flight = None;
            inner.failure = None;
            inner.exhausted = None;
            if let Some(observer) = &self.shared.observer {
                observer.on_reset();
            }
        }
        tracing::info!("debate reset");
        self.publish_status();
        self.emit(DebateEvent::Reset);
    }

    /// Manual score adjustment, saturating at zero.
    pub fn adjust_score(&self, speaker: Speaker, delta: i32) {
        self.lock().state.adjust_score(speaker, delta);
    }

    /// Run `f` against the state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut DebateState) -> R) -> R {
        f(&mut self.lock().state)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn claim_turn(
        &self,
        inner: &mut Inner,
        speaker: Speaker,
        round: u32,
        retries_used: u32,
    ) -> TurnTicket {
        inner.disarm();
        inner.in_flight = Some((speaker, round));
        let participants = &self.shared.participants;
        TurnTicket {
            session: inner.session,
            speaker,
            round,
            retries_used,
            request: GenerationRequest {
                topic: inner.state.topic.clone(),
                speaker,
                participant: participants.get(speaker).clone(),
                opponent: participants.get(speaker.opponent()).clone(),
                history: inner.state.messages.clone(),
                round,
                max_rounds: inner.state.max_rounds,
            },
        }
    }

    fn announce(&self, ticket: &TurnTicket) {
        self.publish_status();
        self.emit(DebateEvent::SpeakerStart {
            speaker: ticket.speaker,
            name: ticket.request.participant.name.clone(),
            round: ticket.round,
        });
    }

    async fn run_turn(&self, ticket: TurnTicket) -> Result<TurnOutcome, DebateError> {
        let result = self.shared.generator.generate(&ticket.request).await;

        let mut events = Vec::new();
        let outcome = {
            let mut inner = self.lock();
            if inner.session != ticket.session {
                tracing::debug!(
                    speaker = ?ticket.speaker,
                    round = ticket.round,
                    "dropping result from a reset session"
                );
                return Ok(TurnOutcome::Stale);
            }
            inner.in_flight = None;

            match result.and_then(non_empty) {
                Ok(text) => {
                    let message = DebateMessage::new(ticket.speaker, text, ticket.round);
                    inner.state.record(message.clone());
                    inner.failure = None;
                    tracing::info!(
                        speaker = ?ticket.speaker,
                        round = ticket.round,
                        current_round = inner.state.current_round,
                        "turn recorded"
                    );

                    events.push(DebateEvent::SpeakerMessage {
                        name: ticket.request.participant.name.clone(),
                        message: message.clone(),
                    });
                    if let Some(observer) = &self.shared.observer {
                        events.extend(observer.on_message_appended(&mut inner.state, &message));
                    }
                    if inner.state.is_complete() {
                        inner.auto_mode = false;
                        inner.disarm();
                        events.push(DebateEvent::DebateEnd);
                    }
                    Ok(TurnOutcome::Spoke(message))
                }
                Err(e) => {
                    let reason = match e {
                        DebateError::GenerationFailure(reason) => reason,
                        other => other.to_string(),
                    };
                    tracing::warn!(
                        speaker = ?ticket.speaker,
                        round = ticket.round,
                        error = %reason,
                        "argument generation failed"
                    );
                    inner.failure = Some(PendingFailure {
                        speaker: ticket.speaker,
                        round: ticket.round,
                        reason: reason.clone(),
                        retries_used: ticket.retries_used,
                    });
                    inner.state.is_active = false;
                    inner.auto_mode = false;
                    inner.disarm();
                    events.push(DebateEvent::GenerationFailed {
                        speaker: ticket.speaker,
                        round: ticket.round,
                        reason: reason.clone(),
                        retries_left: inner.retry_limit.saturating_sub(ticket.retries_used),
                    });
                    Err(DebateError::GenerationFailure(reason))
                }
            }
        };

        self.rearm();
        self.publish_status();
        for event in events {
            self.emit(event);
        }
        outcome
    }

    /// Cancel any pending auto-advance and schedule a new one if the
    /// session can currently auto-advance.
    fn rearm(&self) {
        let mut inner = self.lock();
        inner.disarm();
        if !inner.can_auto_advance() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no tokio runtime, auto mode cannot be paced");
            return;
        };

        let token = inner.pacing.token;
        let delay = self.shared.settings.auto_delay;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        inner.pacing.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                TurnScheduler { shared }.fire_auto(token).await;
            }
        }));
    }

    async fn fire_auto(&self, token: u64) {
        let ticket = {
            let mut inner = self.lock();
            if inner.pacing.token != token {
                tracing::debug!("auto-advance timer superseded");
                return;
            }
            // This task is the pending handle; detach it so re-arming from
            // inside the turn does not abort the running task.
            inner.pacing.handle = None;
            if !inner.can_auto_advance() {
                tracing::debug!("auto-advance no longer allowed");
                return;
            }
            let speaker = inner.state.next_speaker();
            let round = inner.state.target_round(speaker);
            self.claim_turn(&mut inner, speaker, round, 0)
        };
        self.announce(&ticket);
        if let Err(e) = self.run_turn(ticket).await {
            tracing::debug!(error = %e, "auto turn halted");
        }
    }

    fn publish_status(&self) {
        let status = self.status();
        self.shared.status_tx.send_replace(status);
    }

    /// Emit an event if a callback is registered.
    fn emit(&self, event: DebateEvent) {
        let callback = self
            .shared
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ref callback) = *callback {
            callback(event);
        }
    }
}

fn non_empty(text: String) -> Result<String, DebateError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DebateError::GenerationFailure(
            "No response received from AI model".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
