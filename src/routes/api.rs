// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::firestore::{LeaderboardEntry, RunQueryCursor};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{RewardKind, Run, UserProfile, UserProgress};
use crate::time_utils::format_utc_rfc3339_millis;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_PER_PAGE: u32 = 100;
const MAX_USERNAME_LEN: usize = 50;
const MAX_LAPS: u32 = 200;
const CURSOR_PARTS: usize = 3;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/runs", post(create_run).get(get_runs))
        .route("/api/runs/{id}", delete(delete_run))
        .route("/api/progress", get(get_progress))
        .route("/api/progress/sync", post(sync_progress))
        .route("/api/equip", put(equip_reward))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/account", delete(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Progression fields of the current user, as returned by the API.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressResponse {
    pub total_distance_km: f64,
    pub unlocked_tiers: Vec<u32>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub training_score: i64,
    pub equipped_badge: Option<String>,
    pub equipped_tagline: Option<String>,
}

impl From<UserProgress> for ProgressResponse {
    fn from(progress: UserProgress) -> Self {
        Self {
            total_distance_km: progress.total_distance_km,
            unlocked_tiers: progress.unlocked_tiers.into_iter().collect(),
            training_score: progress.training_score,
            equipped_badge: progress.equipped_badge,
            equipped_tagline: progress.equipped_tagline,
        }
    }
}

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub username: String,
    pub created_at: String,
    pub progress: ProgressResponse,
}

/// Get current user profile and progression.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    let progress = state
        .db
        .get_user_progress(&user.user_id)
        .await?
        .unwrap_or_default();

    Ok(Json(UserResponse {
        user_id: profile.user_id,
        email: profile.email,
        username: profile.username,
        created_at: profile.created_at,
        progress: progress.into(),
    }))
}

#[derive(Deserialize)]
struct UpdateMeRequest {
    username: String,
    #[serde(default)]
    email: Option<String>,
}

/// Update the current user's profile.
///
/// Creates the user document (with default progression fields) on first
/// call, matching the sign-in bootstrap the frontend expects.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }

    let existing = state.db.get_user(&user.user_id).await?;
    let is_new = existing.is_none();

    let profile = match existing {
        Some(mut profile) => {
            profile.username = username.to_string();
            if body.email.is_some() {
                profile.email = body.email;
            }
            profile
        }
        None => UserProfile {
            user_id: user.user_id.clone(),
            email: body.email,
            username: username.to_string(),
            created_at: format_utc_rfc3339_millis(chrono::Utc::now()),
        },
    };

    state.db.upsert_user(&profile).await?;

    // First sign-in: materialize the progression fields so later
    // progress transactions find the document populated.
    let progress = if is_new {
        let defaults = UserProgress::default();
        state.db.set_user_progress(&user.user_id, &defaults).await?;
        defaults
    } else {
        state
            .db
            .get_user_progress(&user.user_id)
            .await?
            .unwrap_or_default()
    };

    tracing::info!(user_id = %user.user_id, is_new, "User profile updated");

    Ok(Json(UserResponse {
        user_id: profile.user_id,
        email: profile.email,
        username: profile.username,
        created_at: profile.created_at,
        progress: progress.into(),
    }))
}

// ─── Runs ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NewRunRequest {
    total_distance_km: f64,
    #[serde(default)]
    total_time_seconds: u64,
    #[serde(default)]
    lap_times: Vec<String>,
    #[serde(default)]
    num_laps: u32,
    run_date: String,
    #[serde(default)]
    is_ranked: bool,
}

/// Run record plus the progression state it produced.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RunMutationResponse {
    pub run_id: String,
    pub progress: ProgressResponse,
}

/// Reject malformed run input before it reaches the progression core.
fn validate_new_run(body: &NewRunRequest) -> Result<()> {
    if !body.total_distance_km.is_finite() || body.total_distance_km <= 0.0 {
        return Err(AppError::BadRequest(
            "Run distance must be a positive number of kilometers".to_string(),
        ));
    }
    if body.num_laps > MAX_LAPS || body.lap_times.len() > MAX_LAPS as usize {
        return Err(AppError::BadRequest(format!(
            "At most {} laps are supported",
            MAX_LAPS
        )));
    }
    // Accept a plain date or a full datetime; only the date part is
    // validated.
    let date_part = body.run_date.get(..10).unwrap_or("");
    if chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d").is_err() {
        return Err(AppError::BadRequest(
            "Run date must be an ISO 8601 date".to_string(),
        ));
    }
    if body.is_ranked && body.total_time_seconds == 0 {
        return Err(AppError::BadRequest(
            "Ranked runs require a positive total time".to_string(),
        ));
    }
    Ok(())
}

/// Record a new run and fold it into the user's progression.
async fn create_run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewRunRequest>,
) -> Result<Json<RunMutationResponse>> {
    validate_new_run(&body)?;

    let run = Run {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.user_id.clone(),
        total_distance_km: body.total_distance_km,
        total_time_seconds: body.total_time_seconds,
        lap_times: body.lap_times,
        num_laps: body.num_laps,
        run_date: body.run_date,
        created_at: format_utc_rfc3339_millis(chrono::Utc::now()),
        is_ranked: body.is_ranked,
    };

    // Two writes: the run document, then the progression aggregate. A
    // failure in between leaves totals stale until the next sync.
    state.db.set_run(&run).await?;
    let progress = state.progression.on_run_submitted(&run).await?;

    Ok(Json(RunMutationResponse {
        run_id: run.id,
        progress: progress.into(),
    }))
}

/// Delete a run and remove its distance from the user's progression.
async fn delete_run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(run_id): Path<String>,
) -> Result<Json<RunMutationResponse>> {
    let run = state
        .db
        .get_run(&run_id)
        .await?
        // Another user's run reads as missing rather than forbidden.
        .filter(|run| run.user_id == user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))?;

    state.db.delete_run(&run.id).await?;
    let progress = state.progression.on_run_deleted(&run).await?;

    Ok(Json(RunMutationResponse {
        run_id: run.id,
        progress: progress.into(),
    }))
}

#[derive(Deserialize)]
struct RunsQuery {
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    50
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<RunQueryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let parts: Vec<&str> = decoded_str.split(':').collect();
            if parts.len() != CURSOR_PARTS {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let run_id = parts[2].to_string();
            let created_at =
                chrono::DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(RunQueryCursor { created_at, run_id })
        })
        .transpose()
}

fn encode_cursor(cursor: RunQueryCursor) -> String {
    let payload = format!(
        "{}:{}:{}",
        cursor.created_at.timestamp(),
        cursor.created_at.timestamp_subsec_nanos(),
        cursor.run_id
    );
    URL_SAFE_NO_PAD.encode(payload)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RunsResponse {
    pub runs: Vec<RunSummary>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RunSummary {
    pub id: String,
    pub run_date: String,
    pub created_at: String,
    pub total_distance_km: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_time_seconds: u64,
    pub num_laps: u32,
    pub is_ranked: bool,
}

/// Get the user's runs, newest first.
async fn get_runs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<RunsResponse>> {
    tracing::debug!(
        user_id = %user.user_id,
        cursor = ?params.cursor,
        per_page = params.per_page,
        "Fetching runs"
    );

    let limit = params.per_page.clamp(1, MAX_PER_PAGE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    // Fetch one extra item to determine if another page is available.
    let fetch_limit = limit.saturating_add(1);
    let mut results = state
        .db
        .get_runs_for_user(&user.user_id, cursor.as_ref(), fetch_limit)
        .await?;

    let has_more = results.len() > limit as usize;
    if has_more {
        results.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        results.last().and_then(|run| {
            let created_at = chrono::DateTime::parse_from_rfc3339(&run.created_at)
                .ok()?
                .with_timezone(&chrono::Utc);
            Some(encode_cursor(RunQueryCursor {
                created_at,
                run_id: run.id.clone(),
            }))
        })
    } else {
        None
    };

    let runs = results
        .into_iter()
        .map(|run| RunSummary {
            id: run.id,
            run_date: run.run_date,
            created_at: run.created_at,
            total_distance_km: run.total_distance_km,
            total_time_seconds: run.total_time_seconds,
            num_laps: run.num_laps,
            is_ranked: run.is_ranked,
        })
        .collect();

    Ok(Json(RunsResponse {
        runs,
        per_page: limit,
        next_cursor,
    }))
}

// ─── Progression ─────────────────────────────────────────────

/// Get the user's progression aggregate.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProgressResponse>> {
    let progress = state
        .db
        .get_user_progress(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(progress.into()))
}

/// Rebuild the user's progression from the complete run history.
///
/// Idempotent; the recovery path when the run write and the progress
/// update got separated by a failure.
async fn sync_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProgressResponse>> {
    let progress = state
        .progression
        .recompute_full_progress(&user.user_id)
        .await?;

    Ok(Json(progress.into()))
}

// ─── Equipped Rewards ────────────────────────────────────────

#[derive(Deserialize)]
struct EquipRequest {
    kind: RewardKind,
    /// Tier whose reward to equip; `null` unequips the slot.
    tier: Option<u32>,
}

/// Equip or unequip a cosmetic reward from an unlocked tier.
async fn equip_reward(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<EquipRequest>,
) -> Result<Json<ProgressResponse>> {
    let mut progress = state
        .db
        .get_user_progress(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    let payload = match body.tier {
        Some(tier_number) => {
            let tier = state
                .progression
                .catalog()
                .get(tier_number)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Unknown tier {}", tier_number))
                })?;
            if tier.reward.kind() != body.kind {
                return Err(AppError::BadRequest(format!(
                    "Tier {} does not grant that reward kind",
                    tier_number
                )));
            }
            if !progress.unlocked_tiers.contains(&tier_number) {
                return Err(AppError::BadRequest(format!(
                    "Tier {} is not unlocked",
                    tier_number
                )));
            }
            Some(tier.reward.payload().to_string())
        }
        None => None,
    };

    match body.kind {
        RewardKind::Badge => progress.equipped_badge = payload,
        RewardKind::Tagline => progress.equipped_tagline = payload,
    }

    state
        .db
        .set_equipped_rewards(&user.user_id, &progress)
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        kind = ?body.kind,
        tier = ?body.tier,
        "Equipped rewards updated"
    );

    Ok(Json(progress.into()))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub deleted_documents: usize,
}

/// Delete the user's account and all associated data.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated account deletion");

    let deleted_documents = state.db.delete_user_data(&user.user_id).await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        deleted_documents,
    }))
}

// ─── Leaderboard ─────────────────────────────────────────────

/// Top users by training score.
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let entries = state.db.get_leaderboard().await?;
    Ok(Json(entries))
}
