// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Equipped-reward consistency guard.
//!
//! Equipped cosmetics must always reference a reward from a currently
//! unlocked tier. Deleting a run can shrink the unlocked set, so this
//! runs on every distance-changing mutation, in both directions.

use std::collections::BTreeSet;

use crate::models::tier::{RewardKind, TierCatalog};

/// The user's currently equipped cosmetics, one slot per reward kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquippedRewards {
    pub badge: Option<String>,
    pub tagline: Option<String>,
}

/// Payload values of the given kind reachable from the unlocked tier set.
fn valid_payloads<'a>(
    unlocked_tiers: &BTreeSet<u32>,
    catalog: &'a TierCatalog,
    kind: RewardKind,
) -> BTreeSet<&'a str> {
    catalog
        .tiers()
        .iter()
        .filter(|t| unlocked_tiers.contains(&t.tier) && t.reward.kind() == kind)
        .map(|t| t.reward.payload())
        .collect()
}

/// Clear any equipped value whose granting tier is no longer unlocked.
///
/// Without this, a user could bank a reward and then delete the
/// qualifying run while keeping it equipped.
pub fn reconcile_equipped(
    equipped: EquippedRewards,
    unlocked_tiers: &BTreeSet<u32>,
    catalog: &TierCatalog,
) -> EquippedRewards {
    let keep = |value: Option<String>, kind: RewardKind| {
        value.filter(|v| valid_payloads(unlocked_tiers, catalog, kind).contains(v.as_str()))
    };

    EquippedRewards {
        badge: keep(equipped.badge, RewardKind::Badge),
        tagline: keep(equipped.tagline, RewardKind::Tagline),
    }
}
