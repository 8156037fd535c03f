//! Game and review records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: String,
    pub score: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub max_players: u32,
    pub download_count: u64,
    pub reviews: Vec<Review>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: u64 = self.reviews.iter().map(|r| u64::from(r.score)).sum();
        Some(total as f64 / self.reviews.len() as f64)
    }
}
