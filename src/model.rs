// Game Record Model - flat CLZ-style collection entry
// Field names follow the CLZ export headers so records round-trip
// through CSV import and the JSON API unchanged.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cataloged game. All catalog fields are plain strings; the CLZ export
/// carries dates as text and we keep them that way.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Game {
    #[serde(rename = "Platform")]
    pub platform: String,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "ReleaseDate")]
    pub release_date: String,

    #[serde(rename = "Publisher")]
    pub publisher: String,

    #[serde(rename = "Developer")]
    pub developer: String,

    #[serde(rename = "Genre")]
    pub genre: String,

    #[serde(rename = "AddedDate")]
    pub added_date: String,

    /// Stable identity (UUID). Not part of the CLZ export; assigned on
    /// import/creation and never changes afterwards.
    #[serde(default)]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl Game {
    /// Compute the dedup hash used to skip duplicate imports.
    /// Deduplication key is platform + title; identity is `id`.
    pub fn compute_dedup_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}", self.platform, self.title));
        format!("{:x}", hasher.finalize())
    }

    /// Assign identity and bookkeeping fields for a freshly imported record.
    pub fn init_identity(&mut self) {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }

        if self.added_date.is_empty() {
            self.added_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        }
    }
}
