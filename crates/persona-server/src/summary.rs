//! Owner-facing profile summaries for the `/objects/awoken` listing.

use chrono::{DateTime, Utc};
use persona_types::{Profile, ProfileKey};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_NAME: &str = "Unknown object";
pub const DEFAULT_LOCATION: &str = "No location";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub uuid: ProfileKey,
    pub name: String,
    pub image_url: Option<Value>,
    pub last_interaction: DateTime<Utc>,
    pub location: Value,
    pub greeting: Option<Value>,
    pub personality_tags: Option<Value>,
    pub total_interactions: u64,
    pub unique_viewers: u64,
}

impl ProfileSummary {
    pub fn from_profile(profile: &Profile) -> Self {
        let payload = &profile.payload;
        let name = lookup(payload, &["/generatedProfile/aiPersonalityProfile/name"])
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| DEFAULT_NAME.to_string());

        Self {
            uuid: profile.key.clone(),
            name,
            image_url: lookup(payload, &["/userInput/photoPath", "/userInput/imageUrl"]).cloned(),
            last_interaction: profile.last_updated,
            location: lookup(payload, &["/userInput/location", "/generatedProfile/location"])
                .cloned()
                .unwrap_or_else(|| Value::String(DEFAULT_LOCATION.into())),
            greeting: lookup(payload, &["/userInput/greeting", "/generatedProfile/greeting"])
                .cloned(),
            personality_tags: lookup(
                payload,
                &["/userInput/personalityTags", "/generatedProfile/personalityTags"],
            )
            .cloned(),
            total_interactions: profile.total_interactions,
            unique_viewers: profile.unique_viewers,
        }
    }
}

/// First non-null value among `pointers`.
fn lookup<'a>(payload: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| payload.pointer(p))
        .find(|v| !v.is_null())
}
