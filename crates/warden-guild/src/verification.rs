//! Join-time verification
//!
//! A joining member receives an arithmetic question by direct message and
//! has a bounded time to answer it in that DM channel. Every session ends in
//! exactly one of three outcomes:
//!
//! - `Verified`: the first reply parsed to the expected integer
//! - `Rejected`: the first reply was not an integer or was wrong
//! - `TimedOut`: no reply before the deadline, or the member left first
//!
//! Failed sessions notify the member and remove them from the guild, except
//! when the member already left. The wait runs in a background task; the
//! session table only routes replies and cancellations to it.

use crate::task_registry::TaskRegistry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;
use warden_core::effects::{GuildPlatformEffects, PhysicalTimeEffects, RandomEffects};
use warden_core::{ChannelId, Member, Message, OutgoingMessage, UserId, VerificationConfig, WardenError};

const SUCCESS_TEXT: &str = "Thank you! You have been verified and allowed to stay.";
const TIMEOUT_TEXT: &str = "You did not answer in time. You will be kicked.";
const WRONG_ANSWER_TEXT: &str = "Incorrect answer. You will be kicked.";
const NOT_A_NUMBER_TEXT: &str = "Invalid answer format. You will be kicked.";

/// Arithmetic operator of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
}

impl Operator {
    fn apply(self, a: i64, b: i64) -> i64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
        }
    }
}

/// A verification question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Left operand
    pub a: i64,
    /// Right operand
    pub b: i64,
    /// Operator
    pub op: Operator,
}

impl Question {
    /// Create a new question
    pub fn new(a: i64, b: i64, op: Operator) -> Self {
        Self { a, b, op }
    }

    /// Draw operands from the configured range, then the operator
    pub async fn draw(random: &dyn RandomEffects, config: &VerificationConfig) -> Self {
        let a = random
            .random_range(config.operand_min, config.operand_max)
            .await;
        let b = random
            .random_range(config.operand_min, config.operand_max)
            .await;
        let op = if random.random_bool().await {
            Operator::Add
        } else {
            Operator::Subtract
        };
        Self { a, b, op }
    }

    /// The only accepted answer
    pub fn expected_answer(&self) -> i64 {
        self.op.apply(self.a, self.b)
    }

    /// Human-readable question text
    pub fn prompt(&self) -> String {
        format!("What is {} {} {}?", self.a, self.op, self.b)
    }

    /// Judge a reply
    pub fn check(&self, reply: &str) -> Result<(), RejectReason> {
        let answer: i64 = reply.trim().parse().map_err(|_| RejectReason::NotANumber)?;
        if answer == self.expected_answer() {
            Ok(())
        } else {
            Err(RejectReason::WrongAnswer)
        }
    }
}

/// Why a reply was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Reply did not parse as an integer
    NotANumber,
    /// Integer did not match
    WrongAnswer,
}

/// Terminal state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    /// Correct answer in time
    Verified,
    /// No answer in time, or the member left
    TimedOut,
    /// Wrong or malformed answer
    Rejected(RejectReason),
}

/// Outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStats {
    /// Sessions ending `Verified`
    pub verified: u64,
    /// Sessions ending `TimedOut`
    pub timed_out: u64,
    /// Sessions ending `Rejected`
    pub rejected: u64,
}

impl VerificationStats {
    /// Failed sessions of either kind
    pub fn failures(&self) -> u64 {
        self.timed_out + self.rejected
    }
}

#[derive(Debug, Default)]
struct Counters {
    verified: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: VerificationOutcome) {
        let counter = match outcome {
            VerificationOutcome::Verified => &self.verified,
            VerificationOutcome::TimedOut => &self.timed_out,
            VerificationOutcome::Rejected(_) => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> VerificationStats {
        VerificationStats {
            verified: self.verified.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a started session
#[derive(Debug)]
pub struct SessionHandle {
    /// Session id, used in logs
    pub session_id: Uuid,
    /// Member being verified
    pub member_id: UserId,
    /// Question sent
    pub question: Question,
    /// Deadline in physical milliseconds
    pub deadline_ms: u64,
    outcome: oneshot::Receiver<VerificationOutcome>,
}

impl SessionHandle {
    /// Wait for the terminal outcome; `None` if the service shut down first
    pub async fn outcome(self) -> Option<VerificationOutcome> {
        self.outcome.await.ok()
    }
}

#[derive(Debug)]
struct PendingSession {
    session_id: Uuid,
    dm_channel: Option<ChannelId>,
    reply_tx: Option<oneshot::Sender<String>>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

enum Wake {
    Reply(String),
    Expired,
    Departed,
}

struct VerificationInner {
    platform: Arc<dyn GuildPlatformEffects>,
    time: Arc<dyn PhysicalTimeEffects>,
    random: Arc<dyn RandomEffects>,
    config: VerificationConfig,
    tasks: Arc<TaskRegistry>,
    sessions: Mutex<HashMap<UserId, PendingSession>>,
    counters: Counters,
}

/// Verification state machine
#[derive(Clone)]
pub struct VerificationService {
    inner: Arc<VerificationInner>,
}

impl fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationService")
            .field("config", &self.inner.config)
            .field("pending", &self.pending_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl VerificationService {
    /// Create a new verification service
    pub fn new(
        platform: Arc<dyn GuildPlatformEffects>,
        time: Arc<dyn PhysicalTimeEffects>,
        random: Arc<dyn RandomEffects>,
        config: VerificationConfig,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(VerificationInner {
                platform,
                time,
                random,
                config,
                tasks,
                sessions: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Start verifying a newly joined member
    ///
    /// Returns `Ok(None)` for bots and for members whose session is still
    /// pending. Fails if the question cannot be delivered; no session exists
    /// afterwards.
    pub async fn begin(&self, member: &Member) -> Result<Option<SessionHandle>, WardenError> {
        let user = member.user_id;
        if member.bot {
            tracing::debug!(user = %user, "skipping verification for bot account");
            return Ok(None);
        }

        let session_id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut sessions = self.inner.sessions.lock();
            if sessions.contains_key(&user) {
                tracing::debug!(user = %user, "verification already pending, ignoring duplicate join");
                return Ok(None);
            }
            sessions.insert(
                user,
                PendingSession {
                    session_id,
                    dm_channel: None,
                    reply_tx: Some(reply_tx),
                    cancel_tx: Some(cancel_tx),
                },
            );
        }

        let inner = &self.inner;
        let question = Question::draw(inner.random.as_ref(), &inner.config).await;
        let prompt = format!(
            "Welcome to the server! To verify you're not a bot, please answer this question within {}:\n{}",
            describe_timeout(inner.config.timeout_secs),
            question.prompt()
        );

        let dm = match inner
            .platform
            .send_direct_message(user, OutgoingMessage::text(prompt))
            .await
        {
            Ok(dm) => dm,
            Err(e) => {
                inner.end_session(user, session_id);
                tracing::warn!(user = %user, error = %e, "could not deliver verification question");
                return Err(e.into());
            }
        };
        if let Some(session) = inner
            .sessions
            .lock()
            .get_mut(&user)
            .filter(|s| s.session_id == session_id)
        {
            session.dm_channel = Some(dm.channel_id);
        }

        let deadline_ms = inner
            .time
            .physical_time_ms()
            .await
            .saturating_add(inner.config.timeout_secs.saturating_mul(1000));
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let task_inner = inner.clone();
        inner.tasks.spawn_cancellable(async move {
            let outcome = task_inner
                .run_session(user, session_id, question, reply_rx, cancel_rx)
                .await;
            let _ = outcome_tx.send(outcome);
        });

        tracing::info!(user = %user, session = %session_id, "verification started");
        Ok(Some(SessionHandle {
            session_id,
            member_id: user,
            question,
            deadline_ms,
            outcome: outcome_rx,
        }))
    }

    /// Route a direct message to the author's pending session
    ///
    /// Only the first reply in the session's DM channel counts. Returns
    /// whether the message was consumed.
    pub fn offer_reply(&self, message: &Message) -> bool {
        if !message.is_direct {
            return false;
        }

        let reply_tx = {
            let mut sessions = self.inner.sessions.lock();
            match sessions.get_mut(&message.author.user_id) {
                Some(session) if session.dm_channel == Some(message.channel_id) => {
                    session.reply_tx.take()
                }
                _ => None,
            }
        };
        reply_tx.is_some_and(|tx| tx.send(message.content.clone()).is_ok())
    }

    /// Cancel the pending session of a departed member
    ///
    /// The session resolves `TimedOut` without notification or removal.
    pub fn on_member_departure(&self, user: UserId) -> bool {
        let session = self.inner.sessions.lock().remove(&user);
        match session {
            Some(mut session) => {
                if let Some(cancel) = session.cancel_tx.take() {
                    let _ = cancel.send(());
                }
                tracing::debug!(user = %user, session = %session.session_id, "cancelled verification of departed member");
                true
            }
            None => false,
        }
    }

    /// Is a session pending for `user`
    pub fn is_pending(&self, user: UserId) -> bool {
        self.inner.sessions.lock().contains_key(&user)
    }

    /// Number of pending sessions
    pub fn pending_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Outcome counters
    pub fn stats(&self) -> VerificationStats {
        self.inner.counters.snapshot()
    }
}

impl VerificationInner {
    async fn run_session(
        &self,
        user: UserId,
        session_id: Uuid,
        question: Question,
        reply_rx: oneshot::Receiver<String>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> VerificationOutcome {
        let timeout_ms = self.config.timeout_secs.saturating_mul(1000);
        let wake = tokio::select! {
            reply = reply_rx => match reply {
                Ok(text) => Wake::Reply(text),
                // Sender dropped: the session was removed on departure.
                Err(_) => Wake::Departed,
            },
            _ = cancel_rx => Wake::Departed,
            _ = self.time.sleep_ms(timeout_ms) => Wake::Expired,
        };

        // Leave the table before any side effect so a rejoin starts fresh.
        self.end_session(user, session_id);

        let outcome = match wake {
            Wake::Departed => {
                tracing::info!(user = %user, session = %session_id, "member left before answering");
                VerificationOutcome::TimedOut
            }
            Wake::Expired => {
                self.notify(user, TIMEOUT_TEXT).await;
                self.remove(user, "Failed verification: no answer").await;
                VerificationOutcome::TimedOut
            }
            Wake::Reply(text) => match question.check(&text) {
                Ok(()) => {
                    self.notify(user, SUCCESS_TEXT).await;
                    VerificationOutcome::Verified
                }
                Err(reason) => {
                    let (text, audit) = match reason {
                        RejectReason::NotANumber => {
                            (NOT_A_NUMBER_TEXT, "Failed verification: invalid answer")
                        }
                        RejectReason::WrongAnswer => {
                            (WRONG_ANSWER_TEXT, "Failed verification: wrong answer")
                        }
                    };
                    self.notify(user, text).await;
                    self.remove(user, audit).await;
                    VerificationOutcome::Rejected(reason)
                }
            },
        };

        self.counters.record(outcome);
        tracing::info!(user = %user, session = %session_id, outcome = ?outcome, "verification finished");
        outcome
    }

    fn end_session(&self, user: UserId, session_id: Uuid) {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(&user)
            .is_some_and(|s| s.session_id == session_id)
        {
            sessions.remove(&user);
        }
    }

    async fn notify(&self, user: UserId, text: &str) {
        if let Err(e) = self
            .platform
            .send_direct_message(user, OutgoingMessage::text(text))
            .await
        {
            tracing::warn!(user = %user, error = %e, "failed to send verification result");
        }
    }

    async fn remove(&self, user: UserId, reason: &str) {
        match self.platform.remove_member(user, reason).await {
            Ok(()) => tracing::info!(user = %user, reason, "removed unverified member"),
            Err(e) if e.is_not_found() => {
                tracing::debug!(user = %user, "unverified member already gone");
            }
            Err(e) => tracing::warn!(user = %user, error = %e, "failed to remove unverified member"),
        }
    }
}

fn describe_timeout(secs: u64) -> String {
    match secs {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{s} seconds"),
    }
}
