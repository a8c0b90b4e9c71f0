// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Battle pass tier catalog.
//!
//! Tiers are defined once at build time and injected into every component
//! that needs them, so tests can run against alternate catalogs.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// The cosmetic reward granted by a tier.
///
/// Each kind maps to exactly one equip slot on the user document
/// (`equipped_badge` / `equipped_tagline`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reward {
    /// Image displayed next to the username.
    Badge { image_url: String },
    /// Short text displayed under the username.
    Tagline { text: String },
}

/// Reward kind, used to select an equip slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Badge,
    Tagline,
}

impl Reward {
    pub fn kind(&self) -> RewardKind {
        match self {
            Reward::Badge { .. } => RewardKind::Badge,
            Reward::Tagline { .. } => RewardKind::Tagline,
        }
    }

    /// The payload value stored in the matching equip slot.
    pub fn payload(&self) -> &str {
        match self {
            Reward::Badge { image_url } => image_url,
            Reward::Tagline { text } => text,
        }
    }
}

/// A single battle pass tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Tier {
    /// Tier number (unique, ascending 1..N)
    pub tier: u32,
    /// Cumulative distance needed to unlock this tier
    pub km_required: f64,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
    /// Cosmetic reward granted on unlock
    pub reward: Reward,
}

/// Catalog construction errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate or non-ascending tier number: {0}")]
    TierOrder(u32),

    #[error("tier {0} threshold is not strictly greater than the previous tier")]
    ThresholdOrder(u32),
}

/// Ordered, validated tier table.
///
/// Invariants: tier numbers are unique and ascending, `km_required` is
/// strictly increasing. Both are checked at construction.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
}

impl TierCatalog {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, CatalogError> {
        for pair in tiers.windows(2) {
            if pair[1].tier <= pair[0].tier {
                return Err(CatalogError::TierOrder(pair[1].tier));
            }
            if pair[1].km_required <= pair[0].km_required {
                return Err(CatalogError::ThresholdOrder(pair[1].tier));
            }
        }
        Ok(Self { tiers })
    }

    /// All tiers, ascending by `km_required`.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Look up a tier by number.
    pub fn get(&self, tier: u32) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// The built-in production catalog: 25 tiers at 10 km increments.
    pub fn builtin() -> Self {
        let badge = |tier, name: &str, description: &str, image: &str| Tier {
            tier,
            km_required: (tier * 10) as f64,
            name: name.to_string(),
            description: description.to_string(),
            reward: Reward::Badge {
                image_url: format!("/badges/{}", image),
            },
        };
        let tagline = |tier, name: &str, description: &str| Tier {
            tier,
            km_required: (tier * 10) as f64,
            name: name.to_string(),
            description: description.to_string(),
            reward: Reward::Tagline {
                text: name.to_string(),
            },
        };

        let tiers = vec![
            tagline(1, "Road Runner", "A classic tagline for a dedicated runner."),
            badge(2, "First Twenty", "Complete your first 20 kilometers.", "first-twenty.png"),
            tagline(3, "In Training", "Time to train."),
            tagline(4, "Pace Setter", "You set the tempo now."),
            badge(5, "Fifty Club", "Fifty kilometers behind you.", "fifty-club.png"),
            tagline(6, "Consistency", "Congrats on 60 km."),
            badge(7, "Trail Blazer", "Seventy kilometers of trail.", "trail-blazer.png"),
            badge(8, "Iron Legs", "Eighty kilometers and counting.", "iron-legs.png"),
            tagline(9, "Determined", "Who is going to stop you."),
            badge(10, "Century Club", "Welcome to the 100 km club.", "century-club.png"),
            tagline(11, "Winner", "A symbol of victory."),
            badge(12, "Night Owl", "Kilometers logged after dark.", "night-owl.png"),
            tagline(13, "Focused", "Your dedication is unwavering."),
            badge(14, "Storm Chaser", "Rain or shine.", "storm-chaser.png"),
            tagline(15, "150K Milestone", "Another major achievement unlocked."),
            tagline(16, "Sunrise Run", "For the early birds."),
            badge(17, "Mountain Goat", "Hills hold no fear.", "mountain-goat.png"),
            tagline(18, "Athlete", "You are a true athlete."),
            tagline(19, "Unstoppable", "Nothing can stop you now."),
            badge(20, "Double Century", "An incredible 200 kilometers.", "double-century.png"),
            tagline(21, "The Zone", "You have achieved a state of flow."),
            badge(22, "Metronome", "Splits you could set a watch by.", "metronome.png"),
            tagline(23, "Front Runner", "Always out in front."),
            tagline(24, "Elite Runner", "You are among the best."),
            badge(25, "Legend", "The final tier. A true legend.", "legend.png"),
        ];

        // Validated here so a bad edit to the table fails at startup, not
        // in the middle of a progress update.
        Self::new(tiers).expect("built-in tier catalog violates ordering invariants")
    }
}
