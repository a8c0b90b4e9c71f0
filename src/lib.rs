// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Runpass-Tracker: log runs, climb the training score leaderboard,
//! unlock battle pass tiers.
//!
//! This crate provides the backend API for recording runs and keeping
//! each user's progression aggregate (cumulative distance, unlocked
//! tiers, training score, equipped cosmetics) consistent with the run
//! history.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod rating;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::ProgressionService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub progression: ProgressionService,
}
