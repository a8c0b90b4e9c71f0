// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run record model for storage and API.

use serde::{Deserialize, Serialize};

/// Stored run record in Firestore.
///
/// Immutable once written; deleted on explicit user action, never updated
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Document ID (server-assigned UUID)
    pub id: String,
    /// Owner user ID
    pub user_id: String,
    /// Total distance in kilometers (> 0)
    pub total_distance_km: f64,
    /// Total time in seconds
    #[serde(default)]
    pub total_time_seconds: u64,
    /// Per-lap durations as "MM:SS" strings, in lap order
    #[serde(default)]
    pub lap_times: Vec<String>,
    /// Number of laps
    #[serde(default)]
    pub num_laps: u32,
    /// Date of the run (ISO 8601, user-supplied)
    pub run_date: String,
    /// When this run was recorded (ISO 8601, server-assigned)
    pub created_at: String,
    /// Whether this run counts toward the training score
    #[serde(default)]
    pub is_ranked: bool,
}
