// File: memequeue-core/src/services/queue/coordinator.rs
//
// The playback coordinator: serializes paid activations into a channel's
// single play slot and arbitrates finish/skip/clear/pause calls arriving
// concurrently from streamer UI, moderators, timers and overlay clients.
// There is no in-process lock; multiple service instances may run at once,
// so all coordination happens in the database via serializable transactions
// and guarded conditional writes (see retry.rs).

use std::sync::Arc;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{debug, info};
use uuid::Uuid;

use memequeue_common::models::activation::{Activation, ActivationStatus, EndReason};
use memequeue_common::models::queue::{
    ClearOutcome, FinishOutcome, Initiator, PlaybackPayload, ResumeOutcome, ToggleOutcome,
};
use memequeue_common::traits::repository_traits::{
    ActivationRepository, ChannelStateRepository, WalletLedger,
};
use crate::db::Database;
use crate::eventbus::{EventBus, QueueEvent};
use crate::services::queue::retry::{begin_serializable, run_with_retries};
use crate::Error;

/// Skips landing within this window of `played_at` count as "never really
/// played" and refund the charge; later skips do not.
pub const EARLY_SKIP_REFUND_WINDOW_MS: i64 = 3_000;

/// A skip refunds only while the clip has barely started: the reason must be
/// a skip, the row must have actually been promoted, the charge must not
/// have been returned already, and the elapsed playback time must be under
/// the refund window. Zero-priced (owner) activations have no money to move.
fn refund_eligible(reason: EndReason, act: &Activation, now: DateTime<Utc>) -> bool {
    if !reason.is_skip() {
        return false;
    }
    if act.price_coins <= 0 || act.refunded_at.is_some() {
        return false;
    }
    match act.played_at {
        Some(played_at) => (now - played_at).num_milliseconds() < EARLY_SKIP_REFUND_WINDOW_MS,
        None => false,
    }
}

pub struct QueueCoordinator {
    db: Database,
    event_bus: Arc<EventBus>,
    activation_repo: Arc<dyn ActivationRepository + Send + Sync>,
    state_repo: Arc<dyn ChannelStateRepository + Send + Sync>,
    wallet_ledger: Arc<dyn WalletLedger + Send + Sync>,
}

impl QueueCoordinator {
    pub fn new(
        db: Database,
        event_bus: Arc<EventBus>,
        activation_repo: Arc<dyn ActivationRepository + Send + Sync>,
        state_repo: Arc<dyn ChannelStateRepository + Send + Sync>,
        wallet_ledger: Arc<dyn WalletLedger + Send + Sync>,
    ) -> Self {
        Self {
            db,
            event_bus,
            activation_repo,
            state_repo,
            wallet_ledger,
        }
    }

    /// Close the channel's current `playing` activation, refund an early
    /// skip, and promote the next queued activation unless playback is
    /// paused.
    pub async fn finish_current(
        &self,
        channel_id: Uuid,
        reason: EndReason,
        initiator: Option<Initiator>,
    ) -> Result<FinishOutcome, Error> {
        let (outcome, events) = run_with_retries("finish_current", || {
            self.finish_current_attempt(channel_id, reason, initiator)
        })
        .await?;
        self.publish_all(events).await;
        Ok(outcome)
    }

    /// Convenience wrapper: skip the current activation on behalf of a
    /// streamer or moderator.
    pub async fn skip(
        &self,
        channel_id: Uuid,
        initiator: Initiator,
    ) -> Result<FinishOutcome, Error> {
        let reason = EndReason::for_skip_by(initiator.role);
        self.finish_current(channel_id, reason, Some(initiator)).await
    }

    /// Cancel every `queued` activation on the channel, refunding each charge
    /// that has not already been returned. The current `playing` activation
    /// is left alone.
    pub async fn clear(
        &self,
        channel_id: Uuid,
        initiator: Initiator,
    ) -> Result<ClearOutcome, Error> {
        let (outcome, events) =
            run_with_retries("clear", || self.clear_attempt(channel_id, initiator)).await?;
        self.publish_all(events).await;
        Ok(outcome)
    }

    /// Toggle whether admission may create new queued rows. Idempotent: no
    /// revision bump when the flag already matches.
    pub async fn set_intake_paused(
        &self,
        channel_id: Uuid,
        paused: bool,
    ) -> Result<ToggleOutcome, Error> {
        let (outcome, events) = run_with_retries("set_intake_paused", || {
            self.set_intake_paused_attempt(channel_id, paused)
        })
        .await?;
        self.publish_all(events).await;
        Ok(outcome)
    }

    /// Toggle whether the coordinator may promote into the play slot.
    /// Idempotent like `set_intake_paused`.
    pub async fn set_playback_paused(
        &self,
        channel_id: Uuid,
        paused: bool,
    ) -> Result<ToggleOutcome, Error> {
        let (outcome, events) = run_with_retries("set_playback_paused", || {
            self.set_playback_paused_attempt(channel_id, paused)
        })
        .await?;
        self.publish_all(events).await;
        Ok(outcome)
    }

    /// Clear the overlay pause flag if set and, when the slot is empty, try
    /// to promote the oldest queued activation.
    pub async fn resume_playback(&self, channel_id: Uuid) -> Result<ResumeOutcome, Error> {
        let (outcome, events) =
            run_with_retries("resume_playback", || self.resume_playback_attempt(channel_id))
                .await?;
        self.publish_all(events).await;
        Ok(outcome)
    }

    // Events are buffered during the attempt and published only after the
    // transaction has committed; a rolled-back attempt emits nothing.
    async fn publish_all(&self, events: Vec<QueueEvent>) {
        for event in events {
            self.event_bus.publish(event).await;
        }
    }

    async fn finish_current_attempt(
        &self,
        channel_id: Uuid,
        reason: EndReason,
        initiator: Option<Initiator>,
    ) -> Result<(FinishOutcome, Vec<QueueEvent>), Error> {
        let mut tx = begin_serializable(self.db.pool()).await?;

        let state = match self.state_repo.get(&mut tx, channel_id).await? {
            Some(s) => s,
            None => return Ok((FinishOutcome::NoCurrent, vec![])),
        };
        let current_id = match state.current_activation_id {
            Some(id) => id,
            None => return Ok((FinishOutcome::NoCurrent, vec![])),
        };

        let act = match self.activation_repo.get(&mut tx, current_id).await? {
            Some(a) => a,
            None => return Ok((FinishOutcome::NotPlaying, vec![])),
        };
        if act.channel_id != channel_id || act.status != ActivationStatus::Playing {
            return Ok((FinishOutcome::NotPlaying, vec![]));
        }

        let now = Utc::now();
        let refund = refund_eligible(reason, &act, now);

        let closed = self
            .activation_repo
            .finish_playing(&mut tx, act.activation_id, reason, initiator.as_ref(), refund, now)
            .await?;
        if !closed {
            // Another actor resolved it between our read and the guarded
            // write; quiet no-op for the caller.
            return Ok((FinishOutcome::NotPlaying, vec![]));
        }

        let refunded_coins = if refund {
            self.wallet_ledger
                .lock_for_update(&mut tx, act.user_id, channel_id)
                .await?;
            self.wallet_ledger
                .increment(&mut tx, act.user_id, channel_id, act.price_coins)
                .await?;
            act.price_coins
        } else {
            0
        };

        let mut revision = match self
            .state_repo
            .release_current(&mut tx, channel_id, act.activation_id)
            .await?
        {
            Some(rev) => rev,
            None => {
                return Err(Error::QueueConflict(format!(
                    "channel {} slot changed under finish_current",
                    channel_id
                )));
            }
        };

        let playback_paused = state.overlay_playback_paused;
        let mut next = None;
        if !playback_paused {
            if let Some((payload, rev)) = self.promote_next(&mut tx, channel_id, now).await? {
                revision = rev;
                next = Some(payload);
            }
        }

        tx.commit().await?;

        info!(
            "finish_current: channel={} activation={} reason={} refunded={} next={:?}",
            channel_id,
            act.activation_id,
            reason,
            refunded_coins,
            next.as_ref().map(|p| p.activation_id)
        );

        let mut events = vec![QueueEvent::ActivationEnded {
            channel_id,
            activation_id: act.activation_id,
            reason,
            refunded_coins,
            queue_revision: revision,
        }];
        if let Some(payload) = &next {
            events.push(QueueEvent::ActivationStarted {
                channel_id,
                payload: payload.clone(),
                queue_revision: revision,
            });
        }
        events.push(QueueEvent::QueueChanged {
            channel_id,
            queue_revision: revision,
        });

        Ok((
            FinishOutcome::Finished {
                activation_id: act.activation_id,
                refunded_coins,
                next,
                playback_paused,
                queue_revision: revision,
            },
            events,
        ))
    }

    async fn clear_attempt(
        &self,
        channel_id: Uuid,
        initiator: Initiator,
    ) -> Result<(ClearOutcome, Vec<QueueEvent>), Error> {
        let mut tx = begin_serializable(self.db.pool()).await?;

        let state = self.state_repo.ensure(&mut tx, channel_id).await?;
        let queued = self.activation_repo.list_queued(&mut tx, channel_id).await?;
        let now = Utc::now();

        let mut cleared = 0u64;
        let mut refunded = 0u64;
        let mut refunded_coins = 0i64;
        for act in &queued {
            let refund = act.refunded_at.is_none() && act.price_coins > 0;
            let closed = self
                .activation_repo
                .cancel_queued(&mut tx, act.activation_id, Some(&initiator), refund, now)
                .await?;
            if !closed {
                // Raced away (promoted or already cancelled); rows closed so
                // far stay closed.
                debug!(
                    "clear: activation {} no longer queued, skipping",
                    act.activation_id
                );
                continue;
            }
            cleared += 1;
            if refund {
                self.wallet_ledger
                    .lock_for_update(&mut tx, act.user_id, channel_id)
                    .await?;
                self.wallet_ledger
                    .increment(&mut tx, act.user_id, channel_id, act.price_coins)
                    .await?;
                refunded += 1;
                refunded_coins += act.price_coins;
            }
        }

        let revision = if cleared > 0 {
            self.state_repo.bump_revision(&mut tx, channel_id).await?
        } else {
            state.queue_revision
        };

        tx.commit().await?;

        info!(
            "clear: channel={} cleared={} refunded={} coins={}",
            channel_id, cleared, refunded, refunded_coins
        );

        let mut events = vec![];
        if cleared > 0 {
            events.push(QueueEvent::QueueChanged {
                channel_id,
                queue_revision: revision,
            });
        }

        Ok((
            ClearOutcome {
                cleared,
                refunded,
                refunded_coins,
                queue_revision: revision,
            },
            events,
        ))
    }

    async fn set_intake_paused_attempt(
        &self,
        channel_id: Uuid,
        paused: bool,
    ) -> Result<(ToggleOutcome, Vec<QueueEvent>), Error> {
        let mut tx = begin_serializable(self.db.pool()).await?;

        let state = self.state_repo.ensure(&mut tx, channel_id).await?;
        let enabled = !paused;
        if state.activations_enabled == enabled {
            // Already in the requested state; no revision bump, no
            // notification.
            tx.commit().await?;
            return Ok((
                ToggleOutcome {
                    changed: false,
                    queue_revision: state.queue_revision,
                },
                vec![],
            ));
        }

        let revision = match self
            .state_repo
            .set_intake_enabled(&mut tx, channel_id, enabled, state.activations_enabled)
            .await?
        {
            Some(rev) => rev,
            None => {
                return Err(Error::QueueConflict(format!(
                    "channel {} intake flag changed under set_intake_paused",
                    channel_id
                )));
            }
        };

        tx.commit().await?;

        Ok((
            ToggleOutcome {
                changed: true,
                queue_revision: revision,
            },
            vec![QueueEvent::QueueChanged {
                channel_id,
                queue_revision: revision,
            }],
        ))
    }

    async fn set_playback_paused_attempt(
        &self,
        channel_id: Uuid,
        paused: bool,
    ) -> Result<(ToggleOutcome, Vec<QueueEvent>), Error> {
        let mut tx = begin_serializable(self.db.pool()).await?;

        let state = self.state_repo.ensure(&mut tx, channel_id).await?;
        if state.overlay_playback_paused == paused {
            tx.commit().await?;
            return Ok((
                ToggleOutcome {
                    changed: false,
                    queue_revision: state.queue_revision,
                },
                vec![],
            ));
        }

        let revision = match self
            .state_repo
            .set_playback_paused(&mut tx, channel_id, paused, state.overlay_playback_paused)
            .await?
        {
            Some(rev) => rev,
            None => {
                return Err(Error::QueueConflict(format!(
                    "channel {} pause flag changed under set_playback_paused",
                    channel_id
                )));
            }
        };

        tx.commit().await?;

        Ok((
            ToggleOutcome {
                changed: true,
                queue_revision: revision,
            },
            vec![QueueEvent::QueueChanged {
                channel_id,
                queue_revision: revision,
            }],
        ))
    }

    async fn resume_playback_attempt(
        &self,
        channel_id: Uuid,
    ) -> Result<(ResumeOutcome, Vec<QueueEvent>), Error> {
        let mut tx = begin_serializable(self.db.pool()).await?;

        let state = self.state_repo.ensure(&mut tx, channel_id).await?;
        let mut revision = state.queue_revision;
        let mut events = vec![];

        if state.overlay_playback_paused {
            revision = match self
                .state_repo
                .set_playback_paused(&mut tx, channel_id, false, true)
                .await?
            {
                Some(rev) => rev,
                None => {
                    return Err(Error::QueueConflict(format!(
                        "channel {} pause flag changed under resume_playback",
                        channel_id
                    )));
                }
            };
            events.push(QueueEvent::QueueChanged {
                channel_id,
                queue_revision: revision,
            });
        }

        if let Some(current_id) = state.current_activation_id {
            tx.commit().await?;
            return Ok((
                ResumeOutcome::AlreadyPlaying {
                    activation_id: current_id,
                    queue_revision: revision,
                },
                events,
            ));
        }

        let now = Utc::now();
        let outcome = match self.activation_repo.oldest_queued(&mut tx, channel_id).await? {
            None => ResumeOutcome::Idle {
                queue_revision: revision,
            },
            Some(next_act) => {
                if !self
                    .activation_repo
                    .mark_playing(&mut tx, next_act.activation_id, now)
                    .await?
                {
                    // A concurrent finish_current won the promotion race;
                    // report no promotion and keep the flag change.
                    debug!(
                        "resume_playback: activation {} promoted by another writer",
                        next_act.activation_id
                    );
                    ResumeOutcome::Idle {
                        queue_revision: revision,
                    }
                } else {
                    revision = match self
                        .state_repo
                        .claim_current(&mut tx, channel_id, next_act.activation_id)
                        .await?
                    {
                        Some(rev) => rev,
                        None => {
                            return Err(Error::QueueConflict(format!(
                                "channel {} slot claimed under resume_playback",
                                channel_id
                            )));
                        }
                    };
                    let payload = self
                        .activation_repo
                        .playback_payload(&mut tx, next_act.activation_id)
                        .await?
                        .ok_or_else(|| {
                            Error::NotFound(format!(
                                "playback payload for activation {}",
                                next_act.activation_id
                            ))
                        })?;
                    events.push(QueueEvent::ActivationStarted {
                        channel_id,
                        payload: payload.clone(),
                        queue_revision: revision,
                    });
                    events.push(QueueEvent::QueueChanged {
                        channel_id,
                        queue_revision: revision,
                    });
                    ResumeOutcome::Promoted {
                        next: payload,
                        queue_revision: revision,
                    }
                }
            }
        };

        tx.commit().await?;
        Ok((outcome, events))
    }

    /// Promote the oldest queued activation into the empty slot. Both writes
    /// are guarded; either one losing its race raises the conflict signal so
    /// the operation re-runs from a fresh read.
    async fn promote_next(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<(PlaybackPayload, i64)>, Error> {
        let next_act = match self.activation_repo.oldest_queued(conn, channel_id).await? {
            Some(a) => a,
            None => return Ok(None),
        };

        if !self
            .activation_repo
            .mark_playing(conn, next_act.activation_id, now)
            .await?
        {
            return Err(Error::QueueConflict(format!(
                "activation {} left queued state during promotion",
                next_act.activation_id
            )));
        }

        let revision = match self
            .state_repo
            .claim_current(conn, channel_id, next_act.activation_id)
            .await?
        {
            Some(rev) => rev,
            None => {
                return Err(Error::QueueConflict(format!(
                    "channel {} slot claimed during promotion",
                    channel_id
                )));
            }
        };

        let payload = self
            .activation_repo
            .playback_payload(conn, next_act.activation_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "playback payload for activation {}",
                    next_act.activation_id
                ))
            })?;

        Ok(Some((payload, revision)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use memequeue_common::models::queue::ActorRole;

    fn playing_activation(played_ms_ago: i64, now: DateTime<Utc>) -> Activation {
        let mut act = Activation::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 50);
        act.status = ActivationStatus::Playing;
        act.played_at = Some(now - Duration::milliseconds(played_ms_ago));
        act
    }

    #[test]
    fn skip_inside_window_refunds() {
        let now = Utc::now();
        let act = playing_activation(2_999, now);
        assert!(refund_eligible(EndReason::SkippedByMod, &act, now));
        assert!(refund_eligible(EndReason::SkippedByStreamer, &act, now));
    }

    #[test]
    fn skip_outside_window_does_not_refund() {
        let now = Utc::now();
        let act = playing_activation(3_001, now);
        assert!(!refund_eligible(EndReason::SkippedByMod, &act, now));
    }

    #[test]
    fn natural_completion_never_refunds() {
        let now = Utc::now();
        let act = playing_activation(0, now);
        assert!(!refund_eligible(EndReason::Natural, &act, now));
        assert!(!refund_eligible(EndReason::Timeout, &act, now));
        assert!(!refund_eligible(EndReason::Error, &act, now));
    }

    #[test]
    fn already_refunded_or_unplayed_rows_are_ineligible() {
        let now = Utc::now();
        let mut act = playing_activation(100, now);
        act.refunded_at = Some(now);
        assert!(!refund_eligible(EndReason::SkippedByMod, &act, now));

        let mut act = playing_activation(100, now);
        act.played_at = None;
        assert!(!refund_eligible(EndReason::SkippedByMod, &act, now));
    }

    #[test]
    fn owner_priced_rows_have_nothing_to_refund() {
        let now = Utc::now();
        let mut act = playing_activation(100, now);
        act.price_coins = 0;
        assert!(!refund_eligible(EndReason::SkippedByStreamer, &act, now));
    }

    #[test]
    fn skip_reason_follows_initiator_role() {
        assert_eq!(
            EndReason::for_skip_by(ActorRole::Streamer),
            EndReason::SkippedByStreamer
        );
        assert_eq!(
            EndReason::for_skip_by(ActorRole::Moderator),
            EndReason::SkippedByMod
        );
    }
}
