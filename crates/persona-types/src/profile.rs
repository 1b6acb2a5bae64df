use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::ProfileKey;
use crate::viewer::ViewerId;

/// A stored profile document.
///
/// The `payload` is application data and is never interpreted by the
/// interaction tracker. Counters start at zero and change only through an
/// interaction commit; `created_at` never changes after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "uuid")]
    pub key: ProfileKey,
    /// Principal that created the profile, if it was created by one.
    #[serde(default, rename = "uid", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub payload: Value,
    pub total_interactions: u64,
    pub unique_viewers: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Profile {
    /// A freshly created profile with both counters at zero.
    pub fn new(
        key: ProfileKey,
        owner: Option<String>,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            owner,
            payload,
            total_interactions: 0,
            unique_viewers: 0,
            created_at,
            last_updated: created_at,
        }
    }

    pub fn counters(&self) -> InteractionCounters {
        InteractionCounters {
            total: self.total_interactions,
            unique: self.unique_viewers,
        }
    }

    /// Returns the profile with one more interaction applied.
    ///
    /// `first_view` additionally bumps the distinct-viewer counter.
    pub fn with_interaction(&self, first_view: bool, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.total_interactions += 1;
        if first_view {
            next.unique_viewers += 1;
        }
        next.last_updated = at;
        next
    }
}

/// The `(total, unique)` counter pair of a profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCounters {
    pub total: u64,
    pub unique: u64,
}

impl InteractionCounters {
    pub const fn new(total: u64, unique: u64) -> Self {
        Self { total, unique }
    }
}

/// Witness that `viewer` has already been counted against `profile`.
///
/// Created once, never updated or deleted. Its existence, not its content,
/// is what makes repeat views idempotent for `unique_viewers`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerRecord {
    pub profile: ProfileKey,
    pub viewer: ViewerId,
    pub first_seen_at: DateTime<Utc>,
}

impl ViewerRecord {
    pub fn new(profile: ProfileKey, viewer: ViewerId, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            profile,
            viewer,
            first_seen_at,
        }
    }
}
