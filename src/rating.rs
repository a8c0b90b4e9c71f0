// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training score engine.
//!
//! Each ranked run is scored as a one-sided pairwise comparison against a
//! fixed virtual opponent running at goal pace. The opponent never gains
//! or loses rating; only the user's score moves.

/// Score assigned to new users.
pub const DEFAULT_TRAINING_SCORE: i64 = 1000;

/// Absolute lower bound on the training score.
pub const TRAINING_SCORE_FLOOR: i64 = 500;

/// Fixed rating of the goal-pace opponent.
const GOAL_RATING: f64 = 1000.0;

/// Reference run the goal pace is derived from: 11 km in one hour.
const REFERENCE_DISTANCE_KM: f64 = 11.0;
const REFERENCE_DURATION_SECS: f64 = 3600.0;

/// Maximum rating swing for a full reference-distance run.
const MAX_K_FACTOR: f64 = 50.0;

/// Goal pace in seconds per kilometer (~327.27).
fn goal_pace_sec_per_km() -> f64 {
    REFERENCE_DURATION_SECS / REFERENCE_DISTANCE_KM
}

/// Compute the updated training score after one ranked run.
///
/// The caller guarantees `distance_km > 0`; zero-distance ranked runs are
/// rejected at the API boundary before reaching this function.
///
/// The K-factor scales with how much of the reference distance was
/// covered, so a short run can only move the score a little, while a
/// reference-distance (or longer) run gets the full swing.
pub fn update_training_score(current_score: i64, distance_km: f64, time_seconds: u64) -> i64 {
    debug_assert!(distance_km > 0.0);

    let actual_pace = time_seconds as f64 / distance_km;
    let outcome = if actual_pace < goal_pace_sec_per_km() {
        1.0
    } else {
        0.0
    };

    let k_factor = (MAX_K_FACTOR * (distance_km / REFERENCE_DISTANCE_KM).min(1.0)).round();
    let expected = 1.0 / (1.0 + 10f64.powf((GOAL_RATING - current_score as f64) / 400.0));

    let new_score = (current_score as f64 + k_factor * (outcome - expected)).round() as i64;
    new_score.max(TRAINING_SCORE_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_distance_win_from_default() {
        // 11 km in 3000s is ~272.7 s/km, faster than the ~327.27 s/km goal.
        // k = 50, expected = 0.5 at equal ratings, so +25.
        let score = update_training_score(1000, 11.0, 3000);
        assert_eq!(score, 1025);
    }

    #[test]
    fn test_half_reference_loss_from_above_goal() {
        // 5.5 km in 2000s is ~363.6 s/km, slower than goal. k = 25.
        // expected = 1/(1+10^((1000-1025)/400)) ~= 0.536
        // new = round(1025 + 25 * (0 - 0.536)) = 1012
        let score = update_training_score(1025, 5.5, 2000);
        assert_eq!(score, 1012);
    }

    #[test]
    fn test_exact_goal_pace_counts_as_loss() {
        // Outcome is a win only when strictly faster than goal pace.
        let score = update_training_score(1000, 11.0, 3600);
        assert!(score < 1000);
    }

    #[test]
    fn test_score_never_drops_below_floor() {
        let mut score = 520;
        for _ in 0..100 {
            score = update_training_score(score, 11.0, 7200);
            assert!(score >= TRAINING_SCORE_FLOOR);
        }
        assert_eq!(score, TRAINING_SCORE_FLOOR);
    }

    #[test]
    fn test_single_run_swing_bounded_by_max_k() {
        for (distance, time) in [(11.0, 3000), (11.0, 7200), (50.0, 3000), (50.0, 60000)] {
            let score = update_training_score(1000, distance, time);
            assert!((score - 1000).abs() <= 50, "swing too large: {}", score);
        }
    }

    #[test]
    fn test_short_run_has_small_k_factor() {
        // 1.1 km is 10% of the reference distance: k = 5, win gains at
        // most 5 points from an even matchup.
        let score = update_training_score(1000, 1.1, 200);
        assert!(score > 1000);
        assert!(score <= 1005);
    }

    #[test]
    fn test_long_run_k_factor_capped() {
        // 22 km does not earn more than the full swing.
        let fast_long = update_training_score(1000, 22.0, 6000);
        let fast_ref = update_training_score(1000, 11.0, 3000);
        assert_eq!(fast_long, fast_ref);
    }

    #[test]
    fn test_underdog_gains_more_than_favorite() {
        let underdog_gain = update_training_score(800, 11.0, 3000) - 800;
        let favorite_gain = update_training_score(1200, 11.0, 3000) - 1200;
        assert!(underdog_gain > favorite_gain);
    }
}
