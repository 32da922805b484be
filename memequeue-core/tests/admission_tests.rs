// memequeue-core/tests/admission_tests.rs

use std::sync::Arc;
use uuid::Uuid;

use memequeue_common::models::queue::EnqueueOutcome;
use memequeue_core::db::Database;
use memequeue_core::eventbus::EventBus;
use memequeue_core::repositories::postgres::{
    PostgresActivationRepository, PostgresChannelStateRepository, PostgresMemeRepository,
    PostgresWalletLedger,
};
use memequeue_core::services::queue::{ActivationAdmission, QueueCoordinator};
use memequeue_core::test_utils::helpers::{
    fund_wallet, seed_meme, seed_user, setup_test_database, wallet_balance,
};
use memequeue_core::Error;

struct TestContext {
    db: Database,
    admission: ActivationAdmission,
    coordinator: QueueCoordinator,
}

async fn setup() -> Result<TestContext, Error> {
    let db = setup_test_database().await?;
    let pool = db.pool().clone();
    let bus = Arc::new(EventBus::new());

    let activation_repo = Arc::new(PostgresActivationRepository::new(pool.clone()));
    let state_repo = Arc::new(PostgresChannelStateRepository::new(pool.clone()));
    let meme_repo = Arc::new(PostgresMemeRepository::new(pool.clone()));
    let wallet_ledger = Arc::new(PostgresWalletLedger::new(pool.clone()));

    let coordinator = QueueCoordinator::new(
        db.clone(),
        bus.clone(),
        activation_repo.clone(),
        state_repo.clone(),
        wallet_ledger.clone(),
    );
    let admission = ActivationAdmission::new(
        db.clone(),
        bus,
        activation_repo,
        state_repo,
        meme_repo,
        wallet_ledger,
    );

    Ok(TestContext {
        db,
        admission,
        coordinator,
    })
}

#[tokio::test]
async fn test_enqueue_debits_wallet_and_orders_queue() -> Result<(), Error> {
    let ctx = setup().await?;
    let owner = seed_user(ctx.db.pool(), "adm_streamer").await?;
    let channel_id = owner.user_id;
    let viewer = seed_user(ctx.db.pool(), "adm_viewer").await?;
    fund_wallet(ctx.db.pool(), viewer.user_id, channel_id, 100).await?;
    let meme = seed_meme(ctx.db.pool(), channel_id, "adm-meme", 4_000, 30).await?;

    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, meme.channel_meme_id)
        .await?
    {
        EnqueueOutcome::Queued {
            position,
            charged_coins,
            ..
        } => {
            assert_eq!(position, 1);
            assert_eq!(charged_coins, 30);
        }
        other => panic!("expected Queued, got {:?}", other),
    }
    assert_eq!(wallet_balance(ctx.db.pool(), viewer.user_id, channel_id).await?, 70);

    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, meme.channel_meme_id)
        .await?
    {
        EnqueueOutcome::Queued { position, .. } => assert_eq!(position, 2),
        other => panic!("expected Queued, got {:?}", other),
    }
    assert_eq!(wallet_balance(ctx.db.pool(), viewer.user_id, channel_id).await?, 40);
    Ok(())
}

#[tokio::test]
async fn test_enqueue_rejects_insufficient_funds() -> Result<(), Error> {
    let ctx = setup().await?;
    let owner = seed_user(ctx.db.pool(), "poor_streamer").await?;
    let channel_id = owner.user_id;
    let viewer = seed_user(ctx.db.pool(), "poor_viewer").await?;
    fund_wallet(ctx.db.pool(), viewer.user_id, channel_id, 10).await?;
    let meme = seed_meme(ctx.db.pool(), channel_id, "pricey-meme", 4_000, 50).await?;

    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, meme.channel_meme_id)
        .await?
    {
        EnqueueOutcome::InsufficientFunds { balance, required } => {
            assert_eq!(balance, 10);
            assert_eq!(required, 50);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    // Nothing inserted, nothing charged.
    assert_eq!(wallet_balance(ctx.db.pool(), viewer.user_id, channel_id).await?, 10);
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activations WHERE channel_id = $1",
    )
    .bind(channel_id)
    .fetch_one(ctx.db.pool())
    .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn test_owner_queues_for_free() -> Result<(), Error> {
    let ctx = setup().await?;
    let owner = seed_user(ctx.db.pool(), "free_streamer").await?;
    let channel_id = owner.user_id;
    let meme = seed_meme(ctx.db.pool(), channel_id, "own-meme", 4_000, 500).await?;

    // No wallet row, huge price: the owner is charged nothing.
    match ctx
        .admission
        .enqueue(channel_id, owner.user_id, meme.channel_meme_id)
        .await?
    {
        EnqueueOutcome::Queued { charged_coins, .. } => assert_eq!(charged_coins, 0),
        other => panic!("expected Queued, got {:?}", other),
    }
    assert_eq!(wallet_balance(ctx.db.pool(), owner.user_id, channel_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_enqueue_respects_intake_pause() -> Result<(), Error> {
    let ctx = setup().await?;
    let owner = seed_user(ctx.db.pool(), "pause_streamer").await?;
    let channel_id = owner.user_id;
    let viewer = seed_user(ctx.db.pool(), "pause_viewer").await?;
    fund_wallet(ctx.db.pool(), viewer.user_id, channel_id, 100).await?;
    let meme = seed_meme(ctx.db.pool(), channel_id, "pause-meme", 4_000, 10).await?;

    ctx.coordinator.set_intake_paused(channel_id, true).await?;
    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, meme.channel_meme_id)
        .await?
    {
        EnqueueOutcome::IntakePaused => {}
        other => panic!("expected IntakePaused, got {:?}", other),
    }
    assert_eq!(wallet_balance(ctx.db.pool(), viewer.user_id, channel_id).await?, 100);

    ctx.coordinator.set_intake_paused(channel_id, false).await?;
    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, meme.channel_meme_id)
        .await?
    {
        EnqueueOutcome::Queued { .. } => {}
        other => panic!("expected Queued, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_enqueue_rejects_unknown_disabled_or_foreign_memes() -> Result<(), Error> {
    let ctx = setup().await?;
    let owner = seed_user(ctx.db.pool(), "meme_streamer").await?;
    let channel_id = owner.user_id;
    let other_owner = seed_user(ctx.db.pool(), "other_streamer").await?;
    let viewer = seed_user(ctx.db.pool(), "meme_viewer").await?;
    fund_wallet(ctx.db.pool(), viewer.user_id, channel_id, 100).await?;

    // Unknown id.
    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, Uuid::new_v4())
        .await?
    {
        EnqueueOutcome::MemeNotFound => {}
        other => panic!("expected MemeNotFound, got {:?}", other),
    }

    // Belongs to another channel.
    let foreign = seed_meme(ctx.db.pool(), other_owner.user_id, "foreign-meme", 4_000, 10).await?;
    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, foreign.channel_meme_id)
        .await?
    {
        EnqueueOutcome::MemeNotFound => {}
        other => panic!("expected MemeNotFound, got {:?}", other),
    }

    // Disabled in the catalog.
    let disabled = seed_meme(ctx.db.pool(), channel_id, "disabled-meme", 4_000, 10).await?;
    sqlx::query("UPDATE channel_memes SET is_enabled = FALSE WHERE channel_meme_id = $1")
        .bind(disabled.channel_meme_id)
        .execute(ctx.db.pool())
        .await?;
    match ctx
        .admission
        .enqueue(channel_id, viewer.user_id, disabled.channel_meme_id)
        .await?
    {
        EnqueueOutcome::MemeNotFound => {}
        other => panic!("expected MemeNotFound, got {:?}", other),
    }

    assert_eq!(wallet_balance(ctx.db.pool(), viewer.user_id, channel_id).await?, 100);
    Ok(())
}
