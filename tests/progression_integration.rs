// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progression integration tests.
//!
//! These tests require the Firestore emulator to be running; each test
//! isolates itself with a unique user ID.

use runpass_tracker::error::AppError;
use runpass_tracker::models::{Run, TierCatalog, UserProfile, UserProgress};
use runpass_tracker::services::ProgressionService;
use std::sync::Arc;

mod common;
use common::test_db;

fn unique_user_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn test_run(user_id: &str, distance_km: f64, is_ranked: bool) -> Run {
    Run {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        total_distance_km: distance_km,
        total_time_seconds: 3000,
        lap_times: vec!["25:00".to_string(), "25:00".to_string()],
        num_laps: 2,
        run_date: "2024-03-10".to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        is_ranked,
    }
}

async fn setup_user(db: &runpass_tracker::db::FirestoreDb, prefix: &str) -> String {
    let user_id = unique_user_id(prefix);
    db.upsert_user(&UserProfile {
        user_id: user_id.clone(),
        email: Some("runner@example.com".to_string()),
        username: "Runner".to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    })
    .await
    .expect("Failed to create test user");
    db.set_user_progress(&user_id, &UserProgress::default())
        .await
        .expect("Failed to initialize progress");
    user_id
}

#[tokio::test]
async fn test_deleting_run_revokes_tier_and_equipped_badge() {
    require_emulator!();

    let db = test_db().await;
    let catalog = Arc::new(TierCatalog::builtin());
    let progression = ProgressionService::new(db.clone(), catalog.clone());
    let user_id = setup_user(&db, "revoke").await;

    // 25 km total: tiers 1 (10 km) and 2 (20 km) unlocked
    let keeper = test_run(&user_id, 10.0, false);
    let deletable = test_run(&user_id, 15.0, false);
    db.set_run(&keeper).await.expect("set_run failed");
    progression.on_run_submitted(&keeper).await.expect("submit failed");
    db.set_run(&deletable).await.expect("set_run failed");
    progression
        .on_run_submitted(&deletable)
        .await
        .expect("submit failed");

    // Equip the tier 2 badge
    let mut progress = db
        .get_user_progress(&user_id)
        .await
        .expect("get progress failed")
        .expect("progress missing");
    assert!(progress.unlocked_tiers.contains(&2));
    let tier2_payload = catalog.get(2).unwrap().reward.payload().to_string();
    progress.equipped_badge = Some(tier2_payload.clone());
    db.set_equipped_rewards(&user_id, &progress)
        .await
        .expect("equip failed");

    // Delete the 15 km run: 10 km remain, tier 2 is revoked and the
    // equipped badge must be cleared with it.
    db.delete_run(&deletable.id).await.expect("delete failed");
    let progress = progression
        .on_run_deleted(&deletable)
        .await
        .expect("on_run_deleted failed");

    assert_eq!(progress.total_distance_km, 10.0);
    assert!(progress.unlocked_tiers.contains(&1));
    assert!(!progress.unlocked_tiers.contains(&2));
    assert_eq!(progress.equipped_badge, None);
}

#[tokio::test]
async fn test_ranked_run_updates_training_score() {
    require_emulator!();

    let db = test_db().await;
    let catalog = Arc::new(TierCatalog::builtin());
    let progression = ProgressionService::new(db.clone(), catalog);
    let user_id = setup_user(&db, "ranked").await;

    // 11 km in 3000s beats the goal pace with a full K-factor: +25
    let mut run = test_run(&user_id, 11.0, true);
    run.total_time_seconds = 3000;
    db.set_run(&run).await.expect("set_run failed");
    let progress = progression.on_run_submitted(&run).await.expect("submit failed");

    assert_eq!(progress.training_score, 1025);

    // Unranked runs leave the score alone
    let unranked = test_run(&user_id, 5.0, false);
    db.set_run(&unranked).await.expect("set_run failed");
    let progress = progression
        .on_run_submitted(&unranked)
        .await
        .expect("submit failed");

    assert_eq!(progress.training_score, 1025);
}

#[tokio::test]
async fn test_progress_update_fails_for_missing_user() {
    require_emulator!();

    let db = test_db().await;
    let catalog = Arc::new(TierCatalog::builtin());
    let progression = ProgressionService::new(db.clone(), catalog);

    let run = test_run(&unique_user_id("ghost"), 5.0, false);
    let result = progression.on_run_submitted(&run).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_full_recompute_repairs_drift_and_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let catalog = Arc::new(TierCatalog::builtin());
    let progression = ProgressionService::new(db.clone(), catalog);
    let user_id = setup_user(&db, "sync").await;

    // Write run documents without folding them into the aggregate,
    // simulating a crash between the two writes.
    for distance in [12.0, 9.5] {
        db.set_run(&test_run(&user_id, distance, false))
            .await
            .expect("set_run failed");
    }

    let first = progression
        .recompute_full_progress(&user_id)
        .await
        .expect("sync failed");

    assert_eq!(first.total_distance_km, 21.5);
    assert!(first.unlocked_tiers.contains(&2));

    let second = progression
        .recompute_full_progress(&user_id)
        .await
        .expect("second sync failed");

    assert_eq!(first.total_distance_km, second.total_distance_km);
    assert_eq!(first.unlocked_tiers, second.unlocked_tiers);
    assert_eq!(first.training_score, second.training_score);
    assert_eq!(first.equipped_badge, second.equipped_badge);
    assert_eq!(first.equipped_tagline, second.equipped_tagline);
}

#[tokio::test]
async fn test_double_applied_deletion_clamps_at_zero() {
    require_emulator!();

    let db = test_db().await;
    let catalog = Arc::new(TierCatalog::builtin());
    let progression = ProgressionService::new(db.clone(), catalog);
    let user_id = setup_user(&db, "clamp").await;

    let run = test_run(&user_id, 15.0, false);
    db.set_run(&run).await.expect("set_run failed");
    progression.on_run_submitted(&run).await.expect("submit failed");

    // Apply the deletion twice (e.g. a retried delete request)
    db.delete_run(&run.id).await.expect("delete failed");
    progression.on_run_deleted(&run).await.expect("first delete failed");
    let progress = progression
        .on_run_deleted(&run)
        .await
        .expect("second delete failed");

    assert_eq!(progress.total_distance_km, 0.0);
    assert!(progress.unlocked_tiers.is_empty());
}
