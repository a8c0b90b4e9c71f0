// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progression service.
//!
//! Handles the core workflow around run mutations:
//! 1. A run document is written (or deleted) by the API layer
//! 2. The signed distance delta is folded into the user's progression
//!    aggregate atomically (tiers, training score, equipped cosmetics)
//! 3. Drift between the aggregate and the run history is repaired by an
//!    idempotent full recompute
//!
//! The run write and the aggregate update are two separate writes, not
//! one transaction. A crash between them leaves totals stale until the
//! next sync; `recompute_full_progress` is the recovery path.

use std::sync::Arc;

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::progress::{cumulative_totals, RankedRun};
use crate::models::{Run, TierCatalog, UserProgress};
use crate::time_utils::format_utc_rfc3339_millis;

/// Tolerance when comparing stored vs recomputed distance totals.
const DRIFT_EPSILON_KM: f64 = 1e-9;

/// Applies run mutations to user progression state.
pub struct ProgressionService {
    db: FirestoreDb,
    catalog: Arc<TierCatalog>,
}

impl ProgressionService {
    pub fn new(db: FirestoreDb, catalog: Arc<TierCatalog>) -> Self {
        Self { db, catalog }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    /// Fold a newly persisted run into the owner's progression.
    ///
    /// Ranked runs additionally update the training score; the API layer
    /// has already rejected ranked runs with zero distance or time.
    pub async fn on_run_submitted(&self, run: &Run) -> Result<UserProgress> {
        let ranked_run = run.is_ranked.then_some(RankedRun {
            distance_km: run.total_distance_km,
            time_seconds: run.total_time_seconds,
        });

        let progress = self
            .db
            .apply_progress_update(
                &run.user_id,
                run.total_distance_km,
                ranked_run,
                &self.catalog,
            )
            .await?;

        tracing::info!(
            user_id = %run.user_id,
            run_id = %run.id,
            distance_km = run.total_distance_km,
            ranked = run.is_ranked,
            "Run folded into progression"
        );

        Ok(progress)
    }

    /// Remove a deleted run's distance from the owner's progression.
    ///
    /// Applies the negative delta with no rating change. The recompute
    /// inside the transaction can shrink the unlocked tier set, which in
    /// turn revokes equipped cosmetics that are no longer earned.
    pub async fn on_run_deleted(&self, run: &Run) -> Result<UserProgress> {
        let progress = self
            .db
            .apply_progress_update(&run.user_id, -run.total_distance_km, None, &self.catalog)
            .await?;

        tracing::info!(
            user_id = %run.user_id,
            run_id = %run.id,
            distance_km = run.total_distance_km,
            "Deleted run removed from progression"
        );

        Ok(progress)
    }

    /// Rebuild totals and tiers from the complete run history.
    ///
    /// Idempotent: running it twice with no intervening run changes
    /// yields identical state. Stored/recomputed divergence is logged
    /// and overwritten, never surfaced as a failure.
    pub async fn recompute_full_progress(&self, user_id: &str) -> Result<UserProgress> {
        let mut progress = self
            .db
            .get_user_progress(user_id)
            .await?
            .ok_or_else(|| crate::error::AppError::NotFound(format!("User {} not found", user_id)))?;

        let runs = self.db.list_runs_for_user(user_id).await?;
        let totals = cumulative_totals(&runs);

        if (progress.total_distance_km - totals.total_distance_km).abs() > DRIFT_EPSILON_KM {
            tracing::warn!(
                user_id,
                stored_km = progress.total_distance_km,
                recomputed_km = totals.total_distance_km,
                runs = runs.len(),
                "Stored progress drifted from run history, overwriting"
            );
        }

        let now = format_utc_rfc3339_millis(chrono::Utc::now());
        progress.apply_recomputed_totals(totals, &self.catalog, &now);

        self.db.set_user_progress(user_id, &progress).await?;

        tracing::info!(
            user_id,
            total_distance_km = progress.total_distance_km,
            unlocked = progress.unlocked_tiers.len(),
            "Progress recomputed from run history"
        );

        Ok(progress)
    }
}
