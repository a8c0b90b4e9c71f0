//! User profile model for storage and API.

use serde::{Deserialize, Serialize};

/// Identity fields of the `users/{user_id}` document.
///
/// The progression fields living on the same document are modeled
/// separately as [`crate::models::UserProgress`]; both sides are written
/// with field masks so neither clobbers the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity-provider user ID (also used as document ID)
    pub user_id: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    /// Display name
    pub username: String,
    /// When the user first signed in
    pub created_at: String,
}
