// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod progress;
pub mod rewards;
pub mod run;
pub mod tier;
pub mod user;

pub use progress::{CumulativeTotals, RankedRun, UserProgress};
pub use rewards::EquippedRewards;
pub use run::Run;
pub use tier::{Reward, RewardKind, Tier, TierCatalog};
pub use user::UserProfile;
