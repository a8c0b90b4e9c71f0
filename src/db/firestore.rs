// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, progression aggregate)
//! - Runs (recorded run documents)
//! - Leaderboard (top users by training score)
//!
//! The progression aggregate is updated through a transactional
//! read-recompute-write so concurrent run submissions for the same user
//! cannot lose updates.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{RankedRun, Run, TierCatalog, UserProfile, UserProgress};
use crate::time_utils::format_utc_rfc3339_millis;
use firestore::paths;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Bounded retry for the progress transaction. Conflicts are rare and
/// resolve quickly, so a handful of attempts is plenty.
const MAX_TXN_ATTEMPTS: u32 = 5;
const TXN_RETRY_BASE_DELAY_MS: u64 = 50;

/// Maximum users returned by the leaderboard query.
const LEADERBOARD_LIMIT: u32 = 100;

/// Cursor into a user's run listing, ordered by `created_at` descending.
#[derive(Debug, Clone)]
pub struct RunQueryCursor {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub run_id: String,
}

/// One row of the training score leaderboard.
///
/// Deserialized straight from the `users` document; progression fields
/// may be absent on brand-new users, hence the defaults.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_training_score")]
    pub training_score: i64,
}

fn default_training_score() -> i64 {
    crate::rating::DEFAULT_TRAINING_SCORE
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user's profile fields.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user's profile fields.
    ///
    /// Masked to the profile fields so the progression aggregate on the
    /// same document is never clobbered.
    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(UserProfile::{user_id, email, username, created_at}))
            .in_col(collections::USERS)
            .document_id(&profile.user_id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a user's progression aggregate.
    ///
    /// Returns `Some(defaults)` for a user document that exists but has
    /// never been through a progress update.
    pub async fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite a user's progression aggregate (masked partial write).
    ///
    /// Used by the full-recompute path; run-triggered updates go through
    /// [`FirestoreDb::apply_progress_update`] instead.
    pub async fn set_user_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(UserProgress::{
                total_distance_km,
                unlocked_tiers,
                training_score,
                equipped_badge,
                equipped_tagline,
                progress_updated_at
            }))
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(progress)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Update only the equipped cosmetic slots.
    ///
    /// Narrow mask: an equip action must not write back totals or tiers
    /// it read moments earlier, or it could revert a concurrent run
    /// mutation.
    pub async fn set_equipped_rewards(
        &self,
        user_id: &str,
        progress: &UserProgress,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(UserProgress::{equipped_badge, equipped_tagline}))
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(progress)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Top users by training score, descending.
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([(
                "training_score",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(LEADERBOARD_LIMIT)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Run Operations ──────────────────────────────────────────

    /// Get a run by ID.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<Run>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RUNS)
            .obj()
            .one(run_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a run record.
    pub async fn set_run(&self, run: &Run) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RUNS)
            .document_id(&run.id)
            .object(run)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a run record.
    pub async fn delete_run(&self, run_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::RUNS)
            .document_id(run_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get all runs for a user (full history, used by the sync path).
    pub async fn list_runs_for_user(&self, user_id: &str) -> Result<Vec<Run>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RUNS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get runs for a user, newest first, with cursor pagination.
    ///
    /// `created_at` is stored with millisecond precision so the strict
    /// less-than cursor filter does not skip runs recorded in the same
    /// second.
    pub async fn get_runs_for_user(
        &self,
        user_id: &str,
        cursor: Option<&RunQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Run>, AppError> {
        let query = self.get_client()?.fluent().select().from(collections::RUNS);

        let user_id = user_id.to_string();
        let query = if let Some(cursor) = cursor {
            let before = format_utc_rfc3339_millis(cursor.created_at);
            query.filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("created_at").less_than(before.clone()),
                ])
            })
        } else {
            query.filter(move |q| q.field("user_id").eq(user_id.clone()))
        };

        query
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Atomic Progress Update ─────────────────────────────────────

    /// Atomically fold a distance delta (and optional ranked-run score
    /// update) into a user's progression aggregate.
    ///
    /// The whole read-recompute-write sequence runs inside a Firestore
    /// transaction and is retried with exponential backoff when the
    /// commit fails under concurrent writers; every retry re-reads the
    /// aggregate fresh, so the recomputation always runs against the
    /// latest committed state.
    ///
    /// Fails with `NotFound` (no partial write) if the user document
    /// does not exist, and with `Conflict` once retries are exhausted.
    pub async fn apply_progress_update(
        &self,
        user_id: &str,
        distance_delta_km: f64,
        ranked_run: Option<RankedRun>,
        catalog: &TierCatalog,
    ) -> Result<UserProgress, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_progress_update(user_id, distance_delta_km, ranked_run, catalog)
                .await
            {
                Ok(progress) => return Ok(progress),
                // Retry only commit-level store errors; NotFound and the
                // like are final.
                Err(AppError::Database(msg)) if attempt < MAX_TXN_ATTEMPTS => {
                    let delay_ms = TXN_RETRY_BASE_DELAY_MS << (attempt - 1);
                    tracing::warn!(
                        user_id,
                        attempt,
                        delay_ms,
                        error = %msg,
                        "Progress transaction failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                }
                Err(AppError::Database(msg)) => {
                    tracing::error!(
                        user_id,
                        attempts = attempt,
                        error = %msg,
                        "Progress transaction retries exhausted"
                    );
                    return Err(AppError::Conflict(format!(
                        "Progress update could not be committed after {} attempts",
                        attempt
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt of the read-recompute-write sequence.
    async fn try_progress_update(
        &self,
        user_id: &str,
        distance_delta_km: f64,
        ranked_run: Option<RankedRun>,
        catalog: &TierCatalog,
    ) -> Result<UserProgress, AppError> {
        let now = format_utc_rfc3339_millis(chrono::Utc::now());

        // Begin a transaction
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // 1. Read the current aggregate within the transaction scope
        let current: Option<UserProgress> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read progress in transaction: {}", e))
            })?;

        // 2. Abort on a missing user document: nothing is written.
        let Some(mut progress) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        };

        // 3. Recompute in memory: total, tier set (from scratch, so a
        //    deletion can revoke tiers), score, equipped cosmetics.
        progress.apply_distance_delta(distance_delta_km, ranked_run, catalog, &now);

        // 4. Add the masked aggregate write to the transaction
        self.get_client()?
            .fluent()
            .update()
            .fields(paths!(UserProgress::{
                total_distance_km,
                unlocked_tiers,
                training_score,
                equipped_badge,
                equipped_tagline,
                progress_updated_at
            }))
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&progress)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add progress to transaction: {}", e))
            })?;

        // 5. Commit atomically; a concurrent writer surfaces here
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user_id,
            distance_delta_km,
            ranked = ranked_run.is_some(),
            total_distance_km = progress.total_distance_km,
            training_score = progress.training_score,
            "Progress updated atomically"
        );

        Ok(progress)
    }

    // ─── User Data Deletion ─────────────────────────────────────────

    /// Delete ALL data for a user: every run plus the user document.
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // Concurrent deletes with a limit to avoid overloading Firestore.
        let runs = self.list_runs_for_user(user_id).await?;
        let run_ids: Vec<String> = runs.iter().map(|run| run.id.clone()).collect();
        stream::iter(run_ids)
            .map(|run_id| async move { self.delete_run(&run_id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        deleted_count += runs.len();
        tracing::debug!(user_id, count = runs.len(), "Deleted runs");

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        deleted_count += 1;
        tracing::debug!(user_id, "Deleted user document");

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
