//! User progression aggregate for battle pass and training score.
//!
//! One document per user, updated atomically with run writes via
//! Firestore transactions. `unlocked_tiers` is always recomputed from the
//! cumulative distance, never incrementally patched: a deletion must be
//! able to remove tiers, and increment-only updates drift under
//! concurrent writers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::rewards::{reconcile_equipped, EquippedRewards};
use crate::models::tier::TierCatalog;
use crate::models::Run;
use crate::rating;

/// Progression fields of the `users/{user_id}` document.
///
/// Written with a field mask so the profile fields stored alongside are
/// never touched by progress updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    /// Sum of all non-deleted runs' distances. Never negative.
    #[serde(default)]
    pub total_distance_km: f64,
    /// Exactly the tiers whose threshold is within `total_distance_km`
    #[serde(default)]
    pub unlocked_tiers: BTreeSet<u32>,
    /// Pairwise-comparison skill rating, updated per ranked run
    #[serde(default = "default_training_score")]
    pub training_score: i64,
    /// Equipped badge payload (image URL), if any
    #[serde(default)]
    pub equipped_badge: Option<String>,
    /// Equipped tagline payload (display text), if any
    #[serde(default)]
    pub equipped_tagline: Option<String>,
    /// Last progress update timestamp (ISO 8601)
    #[serde(default)]
    pub progress_updated_at: String,
}

fn default_training_score() -> i64 {
    rating::DEFAULT_TRAINING_SCORE
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_distance_km: 0.0,
            unlocked_tiers: BTreeSet::new(),
            training_score: rating::DEFAULT_TRAINING_SCORE,
            equipped_badge: None,
            equipped_tagline: None,
            progress_updated_at: String::new(),
        }
    }
}

/// Distance and time of a ranked run, passed to the score update.
#[derive(Debug, Clone, Copy)]
pub struct RankedRun {
    pub distance_km: f64,
    pub time_seconds: u64,
}

/// Cumulative totals folded from a run history.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CumulativeTotals {
    pub total_distance_km: f64,
    pub total_time_seconds: u64,
}

/// The tiers unlocked at a given cumulative distance.
///
/// Inclusive threshold: landing exactly on `km_required` unlocks the
/// tier. Pure and deterministic; monotonic in `total_distance_km`.
pub fn unlocked_tiers(total_distance_km: f64, catalog: &TierCatalog) -> BTreeSet<u32> {
    catalog
        .tiers()
        .iter()
        .filter(|t| t.km_required <= total_distance_km)
        .map(|t| t.tier)
        .collect()
}

/// Sum distance and time over a run history.
///
/// Runs with missing numeric fields deserialize as zero and simply
/// contribute nothing.
pub fn cumulative_totals(runs: &[Run]) -> CumulativeTotals {
    runs.iter().fold(CumulativeTotals::default(), |acc, run| {
        CumulativeTotals {
            total_distance_km: acc.total_distance_km + run.total_distance_km,
            total_time_seconds: acc.total_time_seconds + run.total_time_seconds,
        }
    })
}

impl UserProgress {
    /// Fold one signed distance delta (positive for a new run, negative
    /// for a deletion) into the aggregate.
    ///
    /// The distance floor at zero keeps a double-applied deletion or
    /// drifted total from ever producing a negative cumulative distance.
    pub fn apply_distance_delta(
        &mut self,
        distance_delta_km: f64,
        ranked_run: Option<RankedRun>,
        catalog: &TierCatalog,
        now: &str,
    ) {
        self.total_distance_km = (self.total_distance_km + distance_delta_km).max(0.0);
        self.unlocked_tiers = unlocked_tiers(self.total_distance_km, catalog);

        if let Some(run) = ranked_run {
            self.training_score =
                rating::update_training_score(self.training_score, run.distance_km, run.time_seconds);
        }

        self.reconcile_rewards(catalog);
        self.progress_updated_at = now.to_string();
    }

    /// Replace the aggregate with totals recomputed from the full run
    /// history. The training score is left untouched; it is derived from
    /// the sequence of ranked runs, not from totals.
    pub fn apply_recomputed_totals(
        &mut self,
        totals: CumulativeTotals,
        catalog: &TierCatalog,
        now: &str,
    ) {
        self.total_distance_km = totals.total_distance_km.max(0.0);
        self.unlocked_tiers = unlocked_tiers(self.total_distance_km, catalog);
        self.reconcile_rewards(catalog);
        self.progress_updated_at = now.to_string();
    }

    /// Clear equipped cosmetics whose tier is no longer unlocked.
    fn reconcile_rewards(&mut self, catalog: &TierCatalog) {
        let equipped = EquippedRewards {
            badge: self.equipped_badge.take(),
            tagline: self.equipped_tagline.take(),
        };
        let reconciled = reconcile_equipped(equipped, &self.unlocked_tiers, catalog);
        self.equipped_badge = reconciled.badge;
        self.equipped_tagline = reconciled.tagline;
    }
}
