// File: memequeue-core/src/services/queue/admission.rs
//
// Admission: the path that turns "viewer clicked a meme" into a queued
// activation row. Runs under the same transactional/retry discipline as the
// coordinator, because the wallet debit and the insert must land together.
// Promotion is never done here; the coordinator owns the play slot.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use memequeue_common::models::activation::Activation;
use memequeue_common::models::queue::EnqueueOutcome;
use memequeue_common::traits::repository_traits::{
    ActivationRepository, ChannelStateRepository, MemeRepository, WalletLedger,
};
use crate::db::Database;
use crate::eventbus::{EventBus, QueueEvent};
use crate::services::queue::retry::{begin_serializable, run_with_retries};
use crate::Error;

pub struct ActivationAdmission {
    db: Database,
    event_bus: Arc<EventBus>,
    activation_repo: Arc<dyn ActivationRepository + Send + Sync>,
    state_repo: Arc<dyn ChannelStateRepository + Send + Sync>,
    meme_repo: Arc<dyn MemeRepository + Send + Sync>,
    wallet_ledger: Arc<dyn WalletLedger + Send + Sync>,
}

impl ActivationAdmission {
    pub fn new(
        db: Database,
        event_bus: Arc<EventBus>,
        activation_repo: Arc<dyn ActivationRepository + Send + Sync>,
        state_repo: Arc<dyn ChannelStateRepository + Send + Sync>,
        meme_repo: Arc<dyn MemeRepository + Send + Sync>,
        wallet_ledger: Arc<dyn WalletLedger + Send + Sync>,
    ) -> Self {
        Self {
            db,
            event_bus,
            activation_repo,
            state_repo,
            meme_repo,
            wallet_ledger,
        }
    }

    /// Validate and queue one activation, debiting the wallet up front.
    /// The charge is taken at admission time, not at play time; an early
    /// skip returns it through the coordinator's refund path.
    pub async fn enqueue(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        channel_meme_id: Uuid,
    ) -> Result<EnqueueOutcome, Error> {
        let (outcome, events) = run_with_retries("enqueue", || {
            self.enqueue_attempt(channel_id, user_id, channel_meme_id)
        })
        .await?;
        for event in events {
            self.event_bus.publish(event).await;
        }
        Ok(outcome)
    }

    async fn enqueue_attempt(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        channel_meme_id: Uuid,
    ) -> Result<(EnqueueOutcome, Vec<QueueEvent>), Error> {
        let mut tx = begin_serializable(self.db.pool()).await?;

        let state = self.state_repo.ensure(&mut tx, channel_id).await?;
        if !state.activations_enabled {
            debug!("enqueue: channel {} has intake paused", channel_id);
            return Ok((EnqueueOutcome::IntakePaused, vec![]));
        }

        let meme = match self.meme_repo.get(&mut tx, channel_meme_id).await? {
            Some(m) => m,
            None => return Ok((EnqueueOutcome::MemeNotFound, vec![])),
        };
        if meme.channel_id != channel_id || !meme.is_enabled {
            return Ok((EnqueueOutcome::MemeNotFound, vec![]));
        }

        // The channel owner plays their own catalog for free.
        let price = if user_id == channel_id {
            0
        } else {
            meme.price_coins
        };

        if price > 0 {
            let wallet = self
                .wallet_ledger
                .lock_for_update(&mut tx, user_id, channel_id)
                .await?;
            if wallet.balance < price {
                return Ok((
                    EnqueueOutcome::InsufficientFunds {
                        balance: wallet.balance,
                        required: price,
                    },
                    vec![],
                ));
            }
            self.wallet_ledger
                .decrement(&mut tx, user_id, channel_id, price)
                .await?;
        }

        let act = Activation::new(channel_id, channel_meme_id, user_id, price);
        self.activation_repo.insert(&mut tx, &act).await?;
        let position = self.activation_repo.queued_count(&mut tx, channel_id).await?;
        let revision = self.state_repo.bump_revision(&mut tx, channel_id).await?;

        tx.commit().await?;

        info!(
            "enqueue: channel={} user={} meme={} charged={} position={}",
            channel_id, user_id, channel_meme_id, price, position
        );

        Ok((
            EnqueueOutcome::Queued {
                activation_id: act.activation_id,
                position,
                charged_coins: price,
                queue_revision: revision,
            },
            vec![QueueEvent::QueueChanged {
                channel_id,
                queue_revision: revision,
            }],
        ))
    }
}
