//! Moderation: timed bans and vote reactions
//!
//! A temporary ban is applied immediately and lifted by a background task
//! once its duration elapses. Schedules live in memory only; a restart drops
//! them and the ban stays until lifted by hand.

use crate::error::ModerationError;
use crate::task_registry::TaskRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;
use warden_core::effects::{GuildPlatformEffects, PhysicalTimeEffects};
use warden_core::{Actor, ChannelId, Message, OutgoingMessage, UserId};

/// Reactions added to every message in the vote channel
pub const VOTE_REACTIONS: [&str; 2] = ["👍", "👎"];

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Length of a ban
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanDuration {
    /// Until lifted by hand
    Permanent,
    /// `Nd`
    Days(u64),
    /// `Nh`
    Hours(u64),
}

impl BanDuration {
    /// Parse `Nd`, `Nh` or `permanent`; a missing argument is permanent
    pub fn parse(raw: Option<&str>) -> Result<Self, ModerationError> {
        let Some(raw) = raw.map(str::trim) else {
            return Ok(Self::Permanent);
        };
        if raw.eq_ignore_ascii_case("permanent") {
            return Ok(Self::Permanent);
        }

        let invalid = || ModerationError::InvalidDuration(raw.to_string());
        let mut chars = raw.chars();
        let unit = chars.next_back().ok_or_else(invalid)?;
        let amount: u64 = chars.as_str().parse().map_err(|_| invalid())?;
        if amount == 0 {
            return Err(invalid());
        }
        match unit {
            'd' => Ok(Self::Days(amount)),
            'h' => Ok(Self::Hours(amount)),
            _ => Err(invalid()),
        }
    }

    /// Length in milliseconds; `None` when permanent
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Permanent => None,
            Self::Days(n) => Some(n.saturating_mul(MS_PER_DAY)),
            Self::Hours(n) => Some(n.saturating_mul(MS_PER_HOUR)),
        }
    }
}

impl fmt::Display for BanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Days(n) => write!(f, "{n}d"),
            Self::Hours(n) => write!(f, "{n}h"),
        }
    }
}

/// An applied ban
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    /// Banned user
    pub target: UserId,
    /// Requested length
    pub duration: BanDuration,
    /// When the ban will be lifted, for temporary bans
    pub unban_at_ms: Option<u64>,
}

#[derive(Debug)]
struct ScheduledUnban {
    id: Uuid,
    unban_at_ms: u64,
    // Dropping the sender cancels the schedule as well.
    _cancel: oneshot::Sender<()>,
}

struct ModerationInner {
    platform: Arc<dyn GuildPlatformEffects>,
    time: Arc<dyn PhysicalTimeEffects>,
    tasks: Arc<TaskRegistry>,
    vote_channel: Option<ChannelId>,
    scheduled: Mutex<HashMap<UserId, ScheduledUnban>>,
}

/// Moderation service
#[derive(Clone)]
pub struct ModerationService {
    inner: Arc<ModerationInner>,
}

impl fmt::Debug for ModerationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModerationService")
            .field("vote_channel", &self.inner.vote_channel)
            .field("pending_unbans", &self.inner.scheduled.lock().len())
            .finish()
    }
}

impl ModerationService {
    /// Create a new moderation service
    pub fn new(
        platform: Arc<dyn GuildPlatformEffects>,
        time: Arc<dyn PhysicalTimeEffects>,
        tasks: Arc<TaskRegistry>,
        vote_channel: Option<ChannelId>,
    ) -> Self {
        Self {
            inner: Arc::new(ModerationInner {
                platform,
                time,
                tasks,
                vote_channel,
                scheduled: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Ban `target`, announcing the result in `announce`
    ///
    /// Any pending unban for `target` is cancelled first. A temporary ban
    /// schedules its own lift, announced in the same channel.
    pub async fn ban(
        &self,
        actor: &Actor,
        target: UserId,
        duration: BanDuration,
        reason: &str,
        announce: ChannelId,
    ) -> Result<BanRecord, ModerationError> {
        if !actor.permissions.ban_members {
            return Err(ModerationError::MissingPermission(actor.user_id));
        }

        self.cancel_scheduled(target);
        self.inner.platform.ban_member(target, reason).await?;
        tracing::info!(user = %target, by = %actor.user_id, duration = %duration, "member banned");

        let unban_at_ms = match duration.as_millis() {
            Some(ms) => {
                self.inner
                    .announce(
                        announce,
                        format!("Banned {} for {duration}.", target.mention()),
                    )
                    .await;
                Some(self.schedule_unban(target, duration, ms, announce).await)
            }
            None => {
                self.inner
                    .announce(announce, format!("Banned {} permanently.", target.mention()))
                    .await;
                None
            }
        };

        Ok(BanRecord {
            target,
            duration,
            unban_at_ms,
        })
    }

    /// A ban was lifted out-of-band; drop its schedule
    pub fn on_member_unbanned(&self, user: UserId) -> bool {
        let cancelled = self.cancel_scheduled(user);
        if cancelled {
            tracing::info!(user = %user, "ban lifted manually, scheduled unban cancelled");
        }
        cancelled
    }

    /// Users with a scheduled unban and its due time, soonest first
    pub fn pending_unbans(&self) -> Vec<(UserId, u64)> {
        let mut pending: Vec<_> = self
            .inner
            .scheduled
            .lock()
            .iter()
            .map(|(user, s)| (*user, s.unban_at_ms))
            .collect();
        pending.sort_by_key(|(user, at)| (*at, *user));
        pending
    }

    /// Seed vote reactions on a vote-channel message
    ///
    /// Applies to non-bot messages in the vote channel or in any channel under
    /// it as a category. Returns whether the message qualified.
    pub async fn apply_vote_reactions(&self, message: &Message) -> bool {
        let Some(vote_channel) = self.inner.vote_channel else {
            return false;
        };
        if message.author.bot || message.is_direct {
            return false;
        }
        if message.channel_id != vote_channel && message.category_id != Some(vote_channel) {
            return false;
        }

        let target = message.reference();
        if let Err(e) = self.inner.platform.clear_reactions(target).await {
            tracing::warn!(message = %message.id, error = %e, "failed to clear reactions");
        }
        for symbol in VOTE_REACTIONS {
            if let Err(e) = self.inner.platform.add_reaction(target, symbol).await {
                tracing::warn!(message = %message.id, symbol, error = %e, "failed to add vote reaction");
            }
        }
        true
    }

    async fn schedule_unban(
        &self,
        target: UserId,
        duration: BanDuration,
        delay_ms: u64,
        announce: ChannelId,
    ) -> u64 {
        let id = Uuid::new_v4();
        let unban_at_ms = self
            .inner
            .time
            .physical_time_ms()
            .await
            .saturating_add(delay_ms);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.inner.scheduled.lock().insert(
            target,
            ScheduledUnban {
                id,
                unban_at_ms,
                _cancel: cancel_tx,
            },
        );

        let inner = self.inner.clone();
        self.inner.tasks.spawn_cancellable(async move {
            tokio::select! {
                _ = cancel_rx => {
                    tracing::debug!(user = %target, "scheduled unban dropped");
                    return;
                }
                _ = inner.time.sleep_ms(delay_ms) => {}
            }
            if inner.claim_schedule(target, id) {
                inner.lift_ban(target, duration, announce).await;
            }
        });

        unban_at_ms
    }

    fn cancel_scheduled(&self, user: UserId) -> bool {
        self.inner.scheduled.lock().remove(&user).is_some()
    }
}

impl ModerationInner {
    fn claim_schedule(&self, user: UserId, id: Uuid) -> bool {
        let mut scheduled = self.scheduled.lock();
        if scheduled.get(&user).is_some_and(|s| s.id == id) {
            scheduled.remove(&user);
            true
        } else {
            false
        }
    }

    async fn lift_ban(&self, user: UserId, duration: BanDuration, announce: ChannelId) {
        match self
            .platform
            .unban_member(user, "Temporary ban expired")
            .await
        {
            Ok(()) => {
                tracing::info!(user = %user, duration = %duration, "temporary ban lifted");
                self.announce(
                    announce,
                    format!("{} has been unbanned after {duration}.", user.mention()),
                )
                .await;
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(user = %user, "ban already lifted");
            }
            Err(e) => tracing::warn!(user = %user, error = %e, "failed to lift temporary ban"),
        }
    }

    async fn announce(&self, channel: ChannelId, text: String) {
        if let Err(e) = self
            .platform
            .send_channel_message(channel, OutgoingMessage::text(text))
            .await
        {
            tracing::warn!(channel = %channel, error = %e, "failed to post moderation notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use warden_effects::RealTimeHandler;
    use warden_testkit::fixtures::{GENERAL_CHANNEL, VOTE_CHANNEL};
    use warden_testkit::{test_member, MockPlatform, PlatformAction};

    fn moderator() -> Actor {
        let mut member = test_member(5, "mod");
        member.permissions.ban_members = true;
        Actor::from(&member)
    }

    fn service(platform: &MockPlatform) -> ModerationService {
        ModerationService::new(
            Arc::new(platform.clone()),
            Arc::new(RealTimeHandler::new()),
            Arc::new(TaskRegistry::new()),
            Some(VOTE_CHANNEL),
        )
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(BanDuration::parse(None), Ok(BanDuration::Permanent));
        assert_eq!(BanDuration::parse(Some("Permanent")), Ok(BanDuration::Permanent));
        assert_eq!(BanDuration::parse(Some("7d")), Ok(BanDuration::Days(7)));
        assert_eq!(BanDuration::parse(Some("12h")), Ok(BanDuration::Hours(12)));
        assert_eq!(BanDuration::Days(2).as_millis(), Some(2 * MS_PER_DAY));

        for bad in ["", "d", "7w", "-3h", "0d", "1.5h", "7дн"] {
            assert_matches!(
                BanDuration::parse(Some(bad)),
                Err(ModerationError::InvalidDuration(_)),
                "{bad}"
            );
        }
    }

    #[tokio::test]
    async fn test_ban_requires_permission() {
        let platform = MockPlatform::new();
        let moderation = service(&platform);
        let actor = Actor::from(&test_member(6, "regular"));

        let err = moderation
            .ban(&actor, UserId::new(9), BanDuration::Permanent, "spam", GENERAL_CHANNEL)
            .await
            .unwrap_err();
        assert_eq!(err, ModerationError::MissingPermission(actor.user_id));
        assert!(!platform.is_banned(UserId::new(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_temporary_ban_is_lifted() {
        let platform = MockPlatform::new();
        platform.add_text_channel(GENERAL_CHANNEL, "general");
        let moderation = service(&platform);
        let target = UserId::new(9);

        let record = moderation
            .ban(&moderator(), target, BanDuration::Hours(12), "spam", GENERAL_CHANNEL)
            .await
            .unwrap();
        assert!(record.unban_at_ms.is_some());
        assert!(platform.is_banned(target));
        assert_eq!(moderation.pending_unbans().len(), 1);

        tokio::time::sleep(Duration::from_millis(12 * MS_PER_HOUR + 1)).await;
        tokio::task::yield_now().await;

        assert!(!platform.is_banned(target));
        assert!(moderation.pending_unbans().is_empty());
        let texts = platform.channel_texts(GENERAL_CHANNEL);
        assert_eq!(texts[0], "Banned <@9> for 12h.");
        assert_eq!(texts[1], "<@9> has been unbanned after 12h.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_unban_cancels_schedule() {
        let platform = MockPlatform::new();
        platform.add_text_channel(GENERAL_CHANNEL, "general");
        let moderation = service(&platform);
        let target = UserId::new(9);

        moderation
            .ban(&moderator(), target, BanDuration::Days(1), "spam", GENERAL_CHANNEL)
            .await
            .unwrap();
        assert!(moderation.on_member_unbanned(target));

        tokio::time::sleep(Duration::from_millis(2 * MS_PER_DAY)).await;
        assert_eq!(
            platform.count_actions(|a| matches!(a, PlatformAction::Unbanned { .. })),
            0
        );
        assert_eq!(platform.channel_texts(GENERAL_CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn test_vote_reactions() {
        let platform = MockPlatform::new();
        platform.add_text_channel(VOTE_CHANNEL, "votes");
        platform.add_channel_in_category(ChannelId::new(77), "proposal", VOTE_CHANNEL);
        platform.add_text_channel(GENERAL_CHANNEL, "general");
        let moderation = service(&platform);
        let alice = test_member(10, "alice");

        let direct = platform.post_message(VOTE_CHANNEL, &alice, "idea");
        assert!(moderation.apply_vote_reactions(&direct).await);
        assert_eq!(platform.reactions_on(direct.reference()).len(), 2);

        let nested = platform.post_message(ChannelId::new(77), &alice, "idea");
        assert!(moderation.apply_vote_reactions(&nested).await);

        let elsewhere = platform.post_message(GENERAL_CHANNEL, &alice, "idea");
        assert!(!moderation.apply_vote_reactions(&elsewhere).await);
        assert!(platform.reactions_on(elsewhere.reference()).is_empty());
    }
}
